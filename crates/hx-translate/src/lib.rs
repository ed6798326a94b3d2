//! # hx-translate
//!
//! Input translators for hubext.
//!
//! Supports:
//! - column-named CSV tables
//! - airline-market / airport-market panels (m:1 merge, one-hot hub columns)
//! - regression coefficient and covariance tables

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod coefficients;
pub mod market_data;
pub mod table;

pub use coefficients::{read_coefficients, read_covariance};
pub use market_data::{
    ObservationColumns, load_market_panel, load_observations, merge_market_tables,
    observations_from_table,
};
pub use table::Table;
