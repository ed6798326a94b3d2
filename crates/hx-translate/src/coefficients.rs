//! Regression-output tables: point estimates and their covariance.
//!
//! - Coefficients: one data row, one column per regressor name.
//! - Covariance: square; the first column holds row labels (written by
//!   pandas as an empty header, read back as `Unnamed: 0`), the header holds
//!   column labels.

use std::path::Path;

use hx_core::{Error, Result};
use nalgebra::{DMatrix, DVector};

use crate::table::Table;

/// Select `names` from the first row of a coefficients table.
pub fn coefficients_from_table(table: &Table, names: &[&str]) -> Result<DVector<f64>> {
    table.require(names)?;
    if table.n_rows() == 0 {
        return Err(Error::Validation(format!("{}: coefficients table has no rows", table.name())));
    }
    let values = names
        .iter()
        .map(|name| table.f64_column(name).map(|col| col[0]))
        .collect::<Result<Vec<_>>>()?;
    Ok(DVector::from_vec(values))
}

/// Select the `names` x `names` block of a labelled covariance table.
pub fn covariance_from_table(table: &Table, names: &[&str]) -> Result<DMatrix<f64>> {
    let label_col = table
        .headers()
        .first()
        .ok_or_else(|| Error::Validation(format!("{}: covariance table is empty", table.name())))?;
    let row_labels = table.column(label_col)?;

    table.require(names)?;
    let missing_rows: Vec<String> = names
        .iter()
        .filter(|n| !row_labels.iter().any(|l| l.as_str() == **n))
        .map(|n| format!("row '{n}'"))
        .collect();
    if !missing_rows.is_empty() {
        return Err(Error::MissingColumn { table: table.name().to_string(), columns: missing_rows });
    }

    let k = names.len();
    let mut sigma = DMatrix::zeros(k, k);
    for (j, col_name) in names.iter().enumerate() {
        let col = table.f64_column(col_name)?;
        for (i, row_name) in names.iter().enumerate() {
            // Labels were checked above; `position` cannot miss here.
            if let Some(r) = row_labels.iter().position(|l| l.as_str() == *row_name) {
                sigma[(i, j)] = col[r];
            }
        }
    }

    if !sigma.iter().all(|v| v.is_finite()) {
        return Err(Error::Validation(format!("{}: covariance contains non-finite values", table.name())));
    }
    Ok(sigma)
}

/// Read the point-estimate vector for `names` from a CSV file.
pub fn read_coefficients(path: &Path, names: &[&str]) -> Result<DVector<f64>> {
    coefficients_from_table(&Table::from_path(path)?, names)
}

/// Read the covariance block for `names` from a CSV file.
pub fn read_covariance(path: &Path, names: &[&str]) -> Result<DMatrix<f64>> {
    covariance_from_table(&Table::from_path(path)?, names)
}
