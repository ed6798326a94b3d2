//! Market grouping.
//!
//! Airline observations are partitioned by [`MarketKey`] through an explicit
//! index (key -> row list). Markets with a single airline have no competitors
//! and are dropped. For every remaining market the hub-weighted share totals
//!
//! `S_total[bin] = sum_j share_j * hub_dummy_j[bin]`
//!
//! are precomputed so that each airline's "all other carriers" vector is a
//! single subtraction of its own contribution.

use std::collections::BTreeMap;

use hx_core::{AirlineObservation, MarketKey, N_HUB_BINS};

/// One market with at least two airlines.
#[derive(Debug, Clone)]
pub struct MarketGroup {
    /// Market key.
    pub key: MarketKey,
    /// Row indices into the observation slice, in input order.
    pub rows: Vec<usize>,
    /// Hub-weighted market share summed over every airline in the market.
    pub hub_share_totals: [f64; N_HUB_BINS],
}

impl MarketGroup {
    /// Number of airlines in the market.
    #[inline]
    pub fn n_airlines(&self) -> usize {
        self.rows.len()
    }
}

/// Observations partitioned into competitive markets.
#[derive(Debug, Clone)]
pub struct GroupedMarkets<'a> {
    observations: &'a [AirlineObservation],
    markets: Vec<MarketGroup>,
    n_skipped: usize,
}

impl<'a> GroupedMarkets<'a> {
    /// Underlying observations (all rows, including skipped markets).
    pub fn observations(&self) -> &'a [AirlineObservation] {
        self.observations
    }

    /// Markets with more than one airline, in ascending key order.
    pub fn markets(&self) -> &[MarketGroup] {
        &self.markets
    }

    /// Number of single-airline markets that were dropped.
    pub fn n_skipped(&self) -> usize {
        self.n_skipped
    }

    /// Total airline rows across eligible markets.
    pub fn n_rows(&self) -> usize {
        self.markets.iter().map(MarketGroup::n_airlines).sum()
    }

    /// `true` when no market has more than one airline.
    pub fn is_empty(&self) -> bool {
        self.markets.is_empty()
    }
}

/// Build the key -> rows index. Rows keep input order inside each market.
pub fn market_index(observations: &[AirlineObservation]) -> BTreeMap<MarketKey, Vec<usize>> {
    let mut index: BTreeMap<MarketKey, Vec<usize>> = BTreeMap::new();
    for (i, obs) in observations.iter().enumerate() {
        index.entry(obs.market).or_default().push(i);
    }
    index
}

/// Hub-weighted share totals over `rows`.
pub fn hub_share_totals(observations: &[AirlineObservation], rows: &[usize]) -> [f64; N_HUB_BINS] {
    let mut totals = [0.0; N_HUB_BINS];
    for &i in rows {
        let obs = &observations[i];
        for (t, d) in totals.iter_mut().zip(obs.hub_dummy.values()) {
            *t += obs.market_share * d;
        }
    }
    totals
}

/// Partition observations into markets and precompute hub share totals.
pub fn group_markets(observations: &[AirlineObservation]) -> GroupedMarkets<'_> {
    let index = market_index(observations);
    let n_total = index.len();

    let markets: Vec<MarketGroup> = index
        .into_iter()
        .filter(|(_, rows)| rows.len() > 1)
        .map(|(key, rows)| {
            let hub_share_totals = hub_share_totals(observations, &rows);
            MarketGroup { key, rows, hub_share_totals }
        })
        .collect();

    let n_skipped = n_total - markets.len();
    log::debug!(
        "grouped {} rows into {} markets ({} kept, {} single-airline skipped)",
        observations.len(),
        n_total,
        markets.len(),
        n_skipped
    );

    GroupedMarkets { observations, markets, n_skipped }
}
