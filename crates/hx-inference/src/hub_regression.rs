//! Hub-stratified linear approximations of simulated effects.
//!
//! For each airport hub stratum `h` and each simulation column `s`:
//!
//! `effect[i, s] = alpha[h, s] + beta[h, s] * share[i]`,  `i in stratum h`
//!
//! All columns of a stratum share the design `X = [1, share]`, so the
//! whole stratum is solved at once with the normal equations
//! `(X'WX)^+ X'W Y`. The pseudo-inverse gives the minimum-norm solution when
//! the stratum has a single row or a single distinct share.
//!
//! Strata are independent and are fitted in parallel (Rayon); the result is
//! always in hub order.

use hx_core::{Error, HubBin, Result, SummaryStats};
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use serde::Serialize;

use crate::summary::summarize;

/// Relative cutoff for singular values of `X'WX` in the pseudo-inverse.
const PINV_RCOND: f64 = 1e-12;

/// Observation weighting for weighted least squares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightScheme {
    /// Market share.
    MarketShare,
    /// Monthly flights.
    Flights,
    /// Market share times monthly flights.
    MarketShareTimesFlights,
}

impl WeightScheme {
    /// Per-row weights for this scheme.
    pub fn weights(self, market_share: &[f64], monthly_flights: &[f64]) -> Result<Vec<f64>> {
        if market_share.len() != monthly_flights.len() {
            return Err(Error::ShapeMismatch(format!(
                "market_share ({}) and monthly_flights ({}) must align",
                market_share.len(),
                monthly_flights.len()
            )));
        }
        Ok(match self {
            WeightScheme::MarketShare => market_share.to_vec(),
            WeightScheme::Flights => monthly_flights.to_vec(),
            WeightScheme::MarketShareTimesFlights => {
                market_share.iter().zip(monthly_flights).map(|(s, f)| s * f).collect()
            }
        })
    }
}

impl std::str::FromStr for WeightScheme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ms" | "market_share" => Ok(Self::MarketShare),
            "flights" => Ok(Self::Flights),
            "ms_x_flights" | "market_share_x_flights" => Ok(Self::MarketShareTimesFlights),
            other => Err(Error::InvalidArgument(format!("unknown weight scheme '{other}'"))),
        }
    }
}

/// Summary of one stratum across simulations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HubSummary {
    /// Rows in the stratum.
    pub n_obs: usize,
    /// Intercept distribution.
    pub intercept: SummaryStats,
    /// Slope distribution.
    pub slope: SummaryStats,
}

/// Per-simulation fits for one hub stratum.
#[derive(Debug, Clone)]
pub struct HubFit {
    /// Stratum.
    pub hub: HubBin,
    /// Intercept per simulation column.
    pub intercepts: Vec<f64>,
    /// Slope per simulation column.
    pub slopes: Vec<f64>,
    /// Rows, intercept and slope summaries.
    pub summary: HubSummary,
}

/// Fits per stratum, in hub order.
#[derive(Debug, Clone)]
pub struct HubRegression {
    /// One entry per fitted [`HubBin`], in code order.
    pub fits: Vec<HubFit>,
}

impl HubRegression {
    /// Fitted strata, in hub order.
    pub fn hubs(&self) -> Vec<HubBin> {
        self.fits.iter().map(|f| f.hub).collect()
    }

    /// Strata with no fit (no rows in the data).
    pub fn absent_hubs(&self) -> Vec<HubBin> {
        HubBin::ALL.into_iter().filter(|h| self.fits.iter().all(|f| f.hub != *h)).collect()
    }

    /// Slope vectors, one per hub.
    pub fn slopes(&self) -> Vec<&[f64]> {
        self.fits.iter().map(|f| f.slopes.as_slice()).collect()
    }

    /// Intercept vectors, one per hub.
    pub fn intercepts(&self) -> Vec<&[f64]> {
        self.fits.iter().map(|f| f.intercepts.as_slice()).collect()
    }

    /// Summaries keyed by hub.
    pub fn summaries(&self) -> Vec<(HubBin, HubSummary)> {
        self.fits.iter().map(|f| (f.hub, f.summary)).collect()
    }
}

fn validate_inputs(
    market_share: &[f64],
    hub_size: &[HubBin],
    effect: &DMatrix<f64>,
    weights: Option<&[f64]>,
) -> Result<()> {
    let n = market_share.len();
    if hub_size.len() != n || effect.nrows() != n {
        return Err(Error::ShapeMismatch(format!(
            "market_share ({n}), hub_size ({}) and effect rows ({}) must align",
            hub_size.len(),
            effect.nrows()
        )));
    }
    if let Some(w) = weights.filter(|w| w.len() != n) {
        return Err(Error::ShapeMismatch(format!(
            "weights length ({}) != number of observations ({n})",
            w.len()
        )));
    }
    Ok(())
}

/// Fit every simulation column for a single hub stratum.
///
/// Fails with [`Error::InvalidArgument`] if the stratum is empty or if any
/// of its weights is not strictly positive.
pub fn fit_stratum(
    hub: HubBin,
    market_share: &[f64],
    hub_size: &[HubBin],
    effect: &DMatrix<f64>,
    weights: Option<&[f64]>,
) -> Result<HubFit> {
    validate_inputs(market_share, hub_size, effect, weights)?;

    let rows: Vec<usize> = (0..hub_size.len()).filter(|&i| hub_size[i] == hub).collect();
    let n_obs = rows.len();
    if n_obs == 0 {
        return Err(Error::InvalidArgument(format!("hub {hub} has no observations to regress")));
    }

    let w: DVector<f64> = match weights {
        Some(w) => {
            let w_hub = DVector::from_iterator(n_obs, rows.iter().map(|&i| w[i]));
            if w_hub.iter().any(|v| !(v.is_finite() && *v > 0.0)) {
                return Err(Error::InvalidArgument(format!(
                    "non-positive weights found for hub {hub}"
                )));
            }
            w_hub
        }
        None => DVector::from_element(n_obs, 1.0),
    };

    let x = DMatrix::from_fn(n_obs, 2, |r, c| if c == 0 { 1.0 } else { market_share[rows[r]] });
    let y = effect.select_rows(&rows);

    // X'W: scale column r of X' by w_r.
    let mut xtw = x.transpose();
    for (mut col, wr) in xtw.column_iter_mut().zip(w.iter()) {
        col *= *wr;
    }
    let xtwx = &xtw * &x;
    let xtwy = &xtw * &y;

    let eps = PINV_RCOND * xtwx.amax().max(f64::MIN_POSITIVE);
    let pinv = xtwx
        .pseudo_inverse(eps)
        .map_err(|e| Error::Computation(format!("hub {hub}: pseudo-inverse failed: {e}")))?;
    let beta = pinv * xtwy;

    let intercepts: Vec<f64> = beta.row(0).iter().copied().collect();
    let slopes: Vec<f64> = beta.row(1).iter().copied().collect();
    let summary = HubSummary { n_obs, intercept: summarize(&intercepts), slope: summarize(&slopes) };

    log::debug!("hub {hub}: fitted {} columns over {n_obs} rows", effect.ncols());
    Ok(HubFit { hub, intercepts, slopes, summary })
}

/// Fit all four hub strata for every simulation column.
///
/// Any empty stratum fails the whole call; use [`fit_stratum`] to guard
/// strata individually.
pub fn fit_hub_slopes(
    market_share: &[f64],
    hub_size: &[HubBin],
    effect: &DMatrix<f64>,
    weights: Option<&[f64]>,
) -> Result<HubRegression> {
    validate_inputs(market_share, hub_size, effect, weights)?;
    let fits = HubBin::ALL
        .par_iter()
        .map(|&hub| fit_stratum(hub, market_share, hub_size, effect, weights))
        .collect::<Result<Vec<_>>>()?;
    Ok(HubRegression { fits })
}

/// Fit the strata that have rows, in hub order.
///
/// Empty strata are skipped with a warning and reported by
/// [`HubRegression::absent_hubs`]. Fails with [`Error::InvalidArgument`] only
/// when every stratum is empty.
pub fn fit_present_strata(
    market_share: &[f64],
    hub_size: &[HubBin],
    effect: &DMatrix<f64>,
    weights: Option<&[f64]>,
) -> Result<HubRegression> {
    validate_inputs(market_share, hub_size, effect, weights)?;
    let (present, absent): (Vec<HubBin>, Vec<HubBin>) =
        HubBin::ALL.into_iter().partition(|h| hub_size.contains(h));
    for hub in &absent {
        log::warn!("hub {hub}: no observations, stratum skipped");
    }
    if present.is_empty() {
        return Err(Error::InvalidArgument("no hub stratum has observations".to_string()));
    }
    let fits = present
        .par_iter()
        .map(|&hub| fit_stratum(hub, market_share, hub_size, effect, weights))
        .collect::<Result<Vec<_>>>()?;
    Ok(HubRegression { fits })
}

/// Single-column convenience: intercept and slope of `effect ~ 1 + share` in one stratum.
pub fn fit_line(
    hub: HubBin,
    market_share: &[f64],
    hub_size: &[HubBin],
    effect: &[f64],
    weights: Option<&[f64]>,
) -> Result<(f64, f64)> {
    let y = DMatrix::from_column_slice(effect.len(), 1, effect);
    let fit = fit_stratum(hub, market_share, hub_size, &y, weights)?;
    Ok((fit.intercepts[0], fit.slopes[0]))
}
