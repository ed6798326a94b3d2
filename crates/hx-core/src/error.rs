//! Error types for hubext

use thiserror::Error;

/// hubext error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A required column is absent from an input table.
    #[error("missing column(s) in {table}: {columns:?}")]
    MissingColumn {
        /// Table (or file) the columns were looked up in.
        table: String,
        /// Every required column that was not found.
        columns: Vec<String>,
    },

    /// Matrix or vector dimensions disagree with what the operation expects.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Argument outside its valid domain (sample counts, weights, empty strata).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Malformed input data (unparseable cells, broken joins).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Numerical failure (e.g. a covariance that is not positive definite).
    #[error("Computation error: {0}")]
    Computation(String),
}

impl Error {
    /// Convenience constructor for a single missing column.
    pub fn missing_column(table: impl Into<String>, column: impl Into<String>) -> Self {
        Error::MissingColumn { table: table.into(), columns: vec![column.into()] }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
