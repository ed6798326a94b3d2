//! Market-structure externality propagation.
//!
//! For airline `i` in a market with HHI `H`:
//!
//! ```text
//! comp1_i      = 2 (s_i - H)
//! others_i[b]  = S_total[b] - s_i * d_i[b]
//! comp2_i[s]   = sum_b draws[s, b] * others_i[b]
//! effect_i[s]  = comp1_i * comp2_i[s]
//! ```
//!
//! Each market is handled as one block: `others` is an `(n_airlines, 4)`
//! matrix, so `comp2` for every simulation is a single product with the
//! transposed draw matrix.

use hx_core::{AirlineObservation, Error, HubBin, N_HUB_BINS, Result};
use nalgebra::{DMatrix, DVector};
use serde::Serialize;

use crate::market::{GroupedMarkets, MarketGroup};

/// Simulated effects and the row-aligned observation attributes.
#[derive(Debug, Clone)]
pub struct SimulatedEffects {
    /// Shape `(N, num_sims)`.
    pub effect: DMatrix<f64>,
    /// Monthly flights per row.
    pub monthly_flights: Vec<f64>,
    /// Market share per row.
    pub market_share: Vec<f64>,
    /// Airport hub category per row.
    pub airport_hub_size: Vec<HubBin>,
    /// Market identifier (first group key) per row.
    pub market_id: Vec<i64>,
}

impl SimulatedEffects {
    /// Number of rows (airline observations in competitive markets).
    pub fn n_obs(&self) -> usize {
        self.effect.nrows()
    }

    /// Number of simulation columns.
    pub fn num_sims(&self) -> usize {
        self.effect.ncols()
    }

    /// `true` when no market had more than one airline.
    pub fn is_empty(&self) -> bool {
        self.n_obs() == 0
    }
}

/// Deterministic ("true") externality of one airline observation.
///
/// [`point_effects`] emits these in sorted market-key order (origin airport,
/// year, month), then input order within a market, the same row order as
/// [`SimulatedEffects`]. First-appearance order of the input is not kept.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointEffect {
    /// Monthly flights.
    pub monthly_flights: f64,
    /// Market share.
    pub market_share: f64,
    /// Airport hub category.
    pub airport_hub_size: HubBin,
    /// Airline hub category.
    pub airline_hub_size: HubBin,
    /// Market HHI.
    pub hhi: f64,
    /// Number of airlines in the market.
    pub num_airlines: usize,
    /// Origin airport identifier.
    pub airport_id: i64,
    /// Externality evaluated at the point estimates.
    pub effect: f64,
}

/// Own-concentration term and competitor hub vector for every airline in `market`.
///
/// Returns `(comp1, others)` with shapes `(n)` and `(n, 4)`.
fn market_terms(
    observations: &[AirlineObservation],
    market: &MarketGroup,
) -> (DVector<f64>, DMatrix<f64>) {
    let n = market.n_airlines();
    let comp1 = DVector::from_iterator(
        n,
        market.rows.iter().map(|&i| 2.0 * (observations[i].market_share - observations[i].hhi)),
    );
    let others = DMatrix::from_fn(n, N_HUB_BINS, |r, b| {
        let obs = &observations[market.rows[r]];
        market.hub_share_totals[b] - obs.market_share * obs.hub_dummy.values()[b]
    });
    (comp1, others)
}

/// Propagate every coefficient draw through the externality formula.
///
/// `draws` has shape `(num_sims, 4)`. Rows of the output follow market key
/// order, then input order within a market. Without a competitive market
/// the result is empty with shape `(0, num_sims)`.
pub fn propagate_effects(
    markets: &GroupedMarkets<'_>,
    draws: &DMatrix<f64>,
) -> Result<SimulatedEffects> {
    if draws.ncols() != N_HUB_BINS {
        return Err(Error::ShapeMismatch(format!(
            "draw matrix must have shape (num_sims, {N_HUB_BINS}), got ({}, {})",
            draws.nrows(),
            draws.ncols()
        )));
    }

    let num_sims = draws.nrows();
    let n = markets.n_rows();
    let observations = markets.observations();
    let draws_t = draws.transpose();

    let mut effect = DMatrix::<f64>::zeros(n, num_sims);
    let mut monthly_flights = Vec::with_capacity(n);
    let mut market_share = Vec::with_capacity(n);
    let mut airport_hub_size = Vec::with_capacity(n);
    let mut market_id = Vec::with_capacity(n);

    let mut offset = 0;
    for market in markets.markets() {
        let (comp1, others) = market_terms(observations, market);
        let mut block = others * &draws_t;
        for (mut row, c1) in block.row_iter_mut().zip(comp1.iter()) {
            row *= *c1;
        }
        effect.rows_mut(offset, block.nrows()).copy_from(&block);
        offset += block.nrows();

        for &i in &market.rows {
            let obs = &observations[i];
            monthly_flights.push(obs.monthly_flights);
            market_share.push(obs.market_share);
            airport_hub_size.push(obs.airport_hub_size);
            market_id.push(obs.market_id);
        }
    }

    log::debug!(
        "propagated {} draws over {} rows in {} markets",
        num_sims,
        n,
        markets.markets().len()
    );
    Ok(SimulatedEffects { effect, monthly_flights, market_share, airport_hub_size, market_id })
}

/// Evaluate the externality at a single coefficient vector (one per hub bin).
///
/// Rows follow the sorted market-key order of `markets`, not the input order.
pub fn point_effects(markets: &GroupedMarkets<'_>, true_params: &[f64]) -> Result<Vec<PointEffect>> {
    if true_params.len() != N_HUB_BINS {
        return Err(Error::ShapeMismatch(format!(
            "true_params must have length {N_HUB_BINS}, got {}",
            true_params.len()
        )));
    }

    let params = DVector::from_column_slice(true_params);
    let observations = markets.observations();
    let mut out = Vec::with_capacity(markets.n_rows());

    for market in markets.markets() {
        let (comp1, others) = market_terms(observations, market);
        let comp2 = others * &params;
        for (r, &i) in market.rows.iter().enumerate() {
            let obs = &observations[i];
            out.push(PointEffect {
                monthly_flights: obs.monthly_flights,
                market_share: obs.market_share,
                airport_hub_size: obs.airport_hub_size,
                airline_hub_size: obs.airline_hub_size,
                hhi: obs.hhi,
                num_airlines: market.n_airlines(),
                airport_id: obs.market.origin_airport_id,
                effect: comp1[r] * comp2[r],
            });
        }
    }
    Ok(out)
}
