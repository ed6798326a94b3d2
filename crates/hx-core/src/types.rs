//! Common data types for hubext

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Number of hub-size categories (non-hub, small, medium, large).
pub const N_HUB_BINS: usize = 4;

/// Hub-size category of an airline or an airport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum HubBin {
    /// Not a hub.
    NonHub = 0,
    /// Small hub.
    Small = 1,
    /// Medium hub.
    Medium = 2,
    /// Large hub.
    Large = 3,
}

impl HubBin {
    /// All bins in code order.
    pub const ALL: [HubBin; N_HUB_BINS] =
        [HubBin::NonHub, HubBin::Small, HubBin::Medium, HubBin::Large];

    /// Integer code (0-3).
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Short label used in tables.
    pub fn label(self) -> &'static str {
        match self {
            HubBin::NonHub => "Non",
            HubBin::Small => "Small",
            HubBin::Medium => "Medium",
            HubBin::Large => "Large",
        }
    }

    /// Airport-level description.
    pub fn airport_description(self) -> &'static str {
        match self {
            HubBin::NonHub => "Non-hub airports",
            HubBin::Small => "Small hub airports",
            HubBin::Medium => "Medium hub airports",
            HubBin::Large => "Large hub airports",
        }
    }

    /// Parse a floating-point category code as it appears in CSV input (`2`, `2.0`).
    pub fn from_f64(code: f64) -> Result<Self> {
        if code.fract() != 0.0 || !(0.0..N_HUB_BINS as f64).contains(&code) {
            return Err(Error::InvalidArgument(format!("hub size must be an integer in 0..=3, got {code}")));
        }
        Self::try_from(code as u8)
    }
}

impl TryFrom<u8> for HubBin {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            0 => Ok(HubBin::NonHub),
            1 => Ok(HubBin::Small),
            2 => Ok(HubBin::Medium),
            3 => Ok(HubBin::Large),
            other => Err(Error::InvalidArgument(format!("hub size must be in 0..=3, got {other}"))),
        }
    }
}

impl std::fmt::Display for HubBin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.index())
    }
}

/// Per-observation hub indicator row.
///
/// Usually the one-hot encoding of the airline hub bin, but any indicator
/// values read from input dummy columns are carried as-is.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HubDummy(pub [f64; N_HUB_BINS]);

impl HubDummy {
    /// One-hot row for `bin`.
    pub fn one_hot(bin: HubBin) -> Self {
        let mut v = [0.0; N_HUB_BINS];
        v[bin.index()] = 1.0;
        Self(v)
    }

    /// Indicator values by bin.
    #[inline]
    pub fn values(&self) -> &[f64; N_HUB_BINS] {
        &self.0
    }
}

/// Market key: origin airport, year, month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MarketKey {
    /// Origin airport identifier.
    pub origin_airport_id: i64,
    /// Calendar year.
    pub year: i32,
    /// Calendar month (1-12).
    pub month: u8,
}

impl MarketKey {
    /// Create a new key.
    pub fn new(origin_airport_id: i64, year: i32, month: u8) -> Self {
        Self { origin_airport_id, year, month }
    }
}

/// One airline's position in one airport-month market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirlineObservation {
    /// Market this row belongs to.
    pub market: MarketKey,
    /// Value of the first group-key column; carried to outputs as the market identifier.
    pub market_id: i64,
    /// Airline's share of departures in the market, in `[0, 1]`.
    pub market_share: f64,
    /// Market concentration (Herfindahl-Hirschman index), shared within a market.
    pub hhi: f64,
    /// Monthly departures of the airline at the airport.
    pub monthly_flights: f64,
    /// Airport hub category (constant within a market).
    pub airport_hub_size: HubBin,
    /// Airline hub category at the airport.
    pub airline_hub_size: HubBin,
    /// Hub indicator row for the airline.
    pub hub_dummy: HubDummy,
}

/// Location summary of a set of simulation draws.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    /// 50th percentile.
    pub median: f64,
    /// Arithmetic mean.
    pub mean: f64,
    /// 2.5th percentile.
    pub p2_5: f64,
    /// 97.5th percentile.
    pub p97_5: f64,
}
