//! Column-named CSV tables.
//!
//! Every cell is kept as its raw string; typed access happens per column so
//! that a missing column or an unparseable cell is reported with the table
//! and column name attached.

use std::io::Read;
use std::path::Path;

use hx_core::{Error, Result};

/// An in-memory table: named columns of raw string cells.
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    headers: Vec<String>,
    columns: Vec<Vec<String>>,
}

impl Table {
    /// Read a comma-separated file with a header row.
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(path.display().to_string(), file)
    }

    /// Read CSV from any reader. `name` is used in error messages.
    pub fn from_reader<R: Read>(name: impl Into<String>, reader: R) -> Result<Self> {
        let name = name.into();
        let mut rdr = csv::ReaderBuilder::new().has_headers(true).flexible(false).from_reader(reader);

        let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();
        if headers.is_empty() {
            return Err(Error::Validation(format!("{name}: CSV file has no columns")));
        }

        let mut columns: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
        for record in rdr.records() {
            let record = record?;
            for (j, field) in record.iter().enumerate() {
                columns[j].push(field.trim().to_string());
            }
        }

        log::debug!("{name}: read {} rows x {} columns", columns[0].len(), headers.len());
        Ok(Self { name, headers, columns })
    }

    /// Build a table from `(header, cells)` pairs. All columns must have equal length.
    pub fn from_columns(name: impl Into<String>, cols: Vec<(String, Vec<String>)>) -> Result<Self> {
        let name = name.into();
        let n = cols.first().map(|(_, c)| c.len()).unwrap_or(0);
        if let Some((h, c)) = cols.iter().find(|(_, c)| c.len() != n) {
            return Err(Error::ShapeMismatch(format!(
                "{name}: column '{h}' has {} rows, expected {n}",
                c.len()
            )));
        }
        let (headers, columns) = cols.into_iter().unzip();
        Ok(Self { name, headers, columns })
    }

    /// Table name (usually the source path).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Column headers in file order.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Number of data rows.
    pub fn n_rows(&self) -> usize {
        self.columns.first().map(Vec::len).unwrap_or(0)
    }

    /// Whether `column` exists.
    pub fn has_column(&self, column: &str) -> bool {
        self.headers.iter().any(|h| h == column)
    }

    /// Fail with [`Error::MissingColumn`] naming every absent column.
    pub fn require<S: AsRef<str>>(&self, columns: &[S]) -> Result<()> {
        let missing: Vec<String> = columns
            .iter()
            .map(AsRef::as_ref)
            .filter(|c| !self.has_column(c))
            .map(str::to_string)
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::MissingColumn { table: self.name.clone(), columns: missing })
        }
    }

    /// Raw cells of `column`.
    pub fn column(&self, column: &str) -> Result<&[String]> {
        self.headers
            .iter()
            .position(|h| h == column)
            .map(|j| self.columns[j].as_slice())
            .ok_or_else(|| Error::missing_column(&self.name, column))
    }

    /// Parse `column` as floats.
    pub fn f64_column(&self, column: &str) -> Result<Vec<f64>> {
        self.column(column)?
            .iter()
            .enumerate()
            .map(|(i, s)| {
                s.parse::<f64>().map_err(|_| {
                    Error::Validation(format!(
                        "{}: column '{column}' row {i}: cannot parse '{s}' as a number",
                        self.name
                    ))
                })
            })
            .collect()
    }

    /// Parse `column` as integers. Integral floats (`12.0`) are accepted.
    pub fn i64_column(&self, column: &str) -> Result<Vec<i64>> {
        self.column(column)?
            .iter()
            .enumerate()
            .map(|(i, s)| {
                parse_integral(s).ok_or_else(|| {
                    Error::Validation(format!(
                        "{}: column '{column}' row {i}: cannot parse '{s}' as an integer",
                        self.name
                    ))
                })
            })
            .collect()
    }

}

fn parse_integral(s: &str) -> Option<i64> {
    if let Ok(v) = s.parse::<i64>() {
        return Some(v);
    }
    let f = s.parse::<f64>().ok()?;
    (f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15).then_some(f as i64)
}
