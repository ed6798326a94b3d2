//! # hx-core
//!
//! Core types for hubext: the error enum shared by every crate and the
//! market-structure domain types (hub bins, market keys, airline
//! observations) consumed by ingestion and inference.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{AirlineObservation, HubBin, HubDummy, MarketKey, N_HUB_BINS, SummaryStats};

/// hubext version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
