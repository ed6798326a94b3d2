//! Pairwise dominance probabilities between strata.
//!
//! Entry `(i, j)` is the share of paired simulation draws in which stratum
//! `i` is strictly larger than stratum `j`. Ties count for neither side, so
//! `d[i,j] + d[j,i] = 1` only holds when ties have probability zero.

use hx_core::{Error, Result};
use nalgebra::DMatrix;

/// How the (undefined) diagonal is filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiagonalFill {
    /// `NaN`.
    #[default]
    Nan,
    /// `0.5`.
    Half,
}

/// Labelled `K x K` dominance matrix.
#[derive(Debug, Clone)]
pub struct DominanceMatrix {
    /// Row/column labels.
    pub labels: Vec<String>,
    /// `values[(i, j)] = P(value_i > value_j)`.
    pub values: DMatrix<f64>,
}

impl DominanceMatrix {
    /// Number of strata.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// `true` for a `0 x 0` matrix (never produced by [`dominance_matrix`]).
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Row-major copy, e.g. for serialization.
    pub fn rows(&self) -> Vec<Vec<f64>> {
        self.values.row_iter().map(|r| r.iter().copied().collect()).collect()
    }
}

/// Dominance matrix from `K` parallel draw vectors.
///
/// `labels` defaults to `"0".."K-1"`.
pub fn dominance_matrix<S: AsRef<[f64]>>(
    columns: &[S],
    labels: Option<&[String]>,
    diagonal: DiagonalFill,
) -> Result<DominanceMatrix> {
    let k = columns.len();
    if k == 0 {
        return Err(Error::InvalidArgument("need at least one set of draws".to_string()));
    }
    let num_sims = columns[0].as_ref().len();
    if num_sims == 0 {
        return Err(Error::InvalidArgument("draw vectors must be non-empty".to_string()));
    }
    if let Some((j, c)) = columns.iter().enumerate().find(|(_, c)| c.as_ref().len() != num_sims) {
        return Err(Error::ShapeMismatch(format!(
            "draw vector {j} has length {}, expected {num_sims}",
            c.as_ref().len()
        )));
    }
    let labels: Vec<String> = match labels {
        Some(l) if l.len() != k => {
            return Err(Error::ShapeMismatch(format!("labels must have length K={k}, got {}", l.len())));
        }
        Some(l) => l.to_vec(),
        None => (0..k).map(|i| i.to_string()).collect(),
    };

    let fill = match diagonal {
        DiagonalFill::Nan => f64::NAN,
        DiagonalFill::Half => 0.5,
    };
    let mut values = DMatrix::from_element(k, k, fill);
    for i in 0..k {
        let a = columns[i].as_ref();
        for j in (0..k).filter(|&j| j != i) {
            let b = columns[j].as_ref();
            let wins = a.iter().zip(b).filter(|(x, y)| x > y).count();
            values[(i, j)] = wins as f64 / num_sims as f64;
        }
    }
    Ok(DominanceMatrix { labels, values })
}

/// Dominance matrix from a `(num_sims, K)` draw matrix (one column per stratum).
pub fn dominance_matrix_from_draws(
    draws: &DMatrix<f64>,
    labels: Option<&[String]>,
    diagonal: DiagonalFill,
) -> Result<DominanceMatrix> {
    let columns: Vec<Vec<f64>> =
        draws.column_iter().map(|c| c.iter().copied().collect()).collect();
    dominance_matrix(&columns, labels, diagonal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_strict_wins() {
        let a = vec![1.0, 2.0, 3.0, 4.0];
        let b = vec![0.0, 3.0, 3.0, 1.0];
        let d = dominance_matrix(&[a, b], None, DiagonalFill::Nan).unwrap();
        assert_eq!(d.labels, vec!["0", "1"]);
        assert!((d.values[(0, 1)] - 0.5).abs() < 1e-15);
        assert!((d.values[(1, 0)] - 0.25).abs() < 1e-15);
        assert!(d.values[(0, 0)].is_nan() && d.values[(1, 1)].is_nan());
    }

    #[test]
    fn half_diagonal_and_labels() {
        let labels: Vec<String> = ["Non", "Small", "Medium"].iter().map(|s| s.to_string()).collect();
        let cols = [vec![1.0, 2.0], vec![0.0, 5.0], vec![3.0, 3.0]];
        let d = dominance_matrix(&cols, Some(&labels), DiagonalFill::Half).unwrap();
        assert_eq!(d.len(), 3);
        for i in 0..3 {
            assert_eq!(d.values[(i, i)], 0.5);
        }
        assert_eq!(d.values[(2, 0)], 1.0);
        assert_eq!(d.rows()[0], vec![0.5, 0.5, 0.0]);
    }

    #[test]
    fn complementary_for_continuous_draws() {
        let draws = DMatrix::from_fn(500, 4, |s, k| ((s * 7919 + k * 104_729) % 1009) as f64 + 0.1 * k as f64);
        let d = dominance_matrix_from_draws(&draws, None, DiagonalFill::Nan).unwrap();
        for i in 0..4 {
            for j in 0..4 {
                if i == j {
                    continue;
                }
                let v = d.values[(i, j)];
                assert!((0.0..=1.0).contains(&v));
                assert!((v + d.values[(j, i)] - 1.0).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn shape_and_argument_errors() {
        let cols = [vec![1.0, 2.0], vec![1.0]];
        assert!(matches!(dominance_matrix(&cols, None, DiagonalFill::Nan), Err(Error::ShapeMismatch(_))));
        let labels = vec!["only".to_string()];
        let ok = [vec![1.0], vec![2.0]];
        assert!(matches!(
            dominance_matrix(&ok, Some(&labels), DiagonalFill::Nan),
            Err(Error::ShapeMismatch(_))
        ));
        let none: [Vec<f64>; 0] = [];
        assert!(matches!(dominance_matrix(&none, None, DiagonalFill::Nan), Err(Error::InvalidArgument(_))));
    }
}
