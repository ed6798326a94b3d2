//! Glue between ingestion and inference shared by the subcommands.

use anyhow::{Context, Result};
use hx_core::{AirlineObservation, HubBin};
use hx_inference::{
    DecompositionMethod, DiagonalFill, DominanceMatrix, HubRegression, PointEffect,
    ReflectedDensity, SHARE_SUPPORT, SamplerConfig, SamplingMode, SmoothedCurve, TrueFit,
    WeightScheme, combined_point_estimates, dominance_matrix, draw_coefficients,
    fit_present_strata, fit_true_externality_present, group_markets, kernel_smooth_by_hub,
    point_effects, propagate_effects, reflected_kde_by_hub,
};
use nalgebra::{DMatrix, DVector};
use std::path::{Path, PathBuf};

/// Input files of one analysis.
#[derive(Debug, Clone)]
pub struct InputPaths {
    pub airline: PathBuf,
    pub airport: PathBuf,
    pub coefficients: PathBuf,
    pub covariance: PathBuf,
}

/// Simulation knobs (CLI flags or run config).
#[derive(Debug, Clone)]
pub struct SimulationOptions {
    pub mode: SamplingMode,
    pub num_sims: usize,
    pub seed: u64,
    /// `None` uses the mode's default factorisation.
    pub method: Option<DecompositionMethod>,
    /// `None` is ordinary least squares.
    pub weights: Option<WeightScheme>,
}

impl SimulationOptions {
    pub fn sampler_config(&self) -> SamplerConfig {
        SamplerConfig {
            num_sims: self.num_sims,
            seed: self.seed,
            method: self.method.unwrap_or_else(|| self.mode.default_method()),
        }
    }
}

/// Smoothing knobs for the point-estimate outputs.
#[derive(Debug, Clone, Copy)]
pub struct SmoothingOptions {
    pub bandwidth: f64,
    pub n_grid: usize,
    pub density_grid: usize,
    /// Grid bounds of the market-share densities.
    pub density_range: (f64, f64),
}

impl Default for SmoothingOptions {
    fn default() -> Self {
        Self { bandwidth: 0.05, n_grid: 100, density_grid: 1000, density_range: SHARE_SUPPORT }
    }
}

/// Parse a weight scheme name; `none` means unweighted.
pub fn parse_weights(name: &str) -> Result<Option<WeightScheme>> {
    if name.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    Ok(Some(name.parse()?))
}

pub fn weights_name(weights: Option<WeightScheme>) -> &'static str {
    match weights {
        None => "none",
        Some(WeightScheme::MarketShare) => "market_share",
        Some(WeightScheme::Flights) => "flights",
        Some(WeightScheme::MarketShareTimesFlights) => "market_share_x_flights",
    }
}

pub fn mode_name(mode: SamplingMode) -> &'static str {
    match mode {
        SamplingMode::HubDecomposed => "hub",
        SamplingMode::Pooled => "pooled",
    }
}

pub fn method_name(method: DecompositionMethod) -> &'static str {
    match method {
        DecompositionMethod::Cholesky => "cholesky",
        DecompositionMethod::Svd => "svd",
    }
}

pub fn load_observations(airline: &Path, airport: &Path) -> Result<Vec<AirlineObservation>> {
    tracing::info!(airline = %airline.display(), airport = %airport.display(), "loading market panel");
    let obs = hx_translate::load_observations(airline, airport)
        .with_context(|| format!("failed to load market panel from {}", airline.display()))?;
    tracing::info!(rows = obs.len(), "market panel loaded");
    Ok(obs)
}

pub fn load_coefficients(path: &Path, mode: SamplingMode) -> Result<DVector<f64>> {
    hx_translate::read_coefficients(path, mode.regressor_names())
        .with_context(|| format!("failed to read coefficients from {}", path.display()))
}

pub fn load_covariance(path: &Path, mode: SamplingMode) -> Result<DMatrix<f64>> {
    hx_translate::read_covariance(path, mode.regressor_names())
        .with_context(|| format!("failed to read covariance from {}", path.display()))
}

/// Result of the simulate-and-regress workflow.
#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub options: SimulationOptions,
    pub method: DecompositionMethod,
    pub n_observations: usize,
    pub n_markets: usize,
    pub n_skipped_markets: usize,
    pub n_rows: usize,
    pub true_params: [f64; 4],
    pub regression: HubRegression,
    pub slope_dominance: DominanceMatrix,
    pub intercept_dominance: DominanceMatrix,
}

pub fn hub_labels(hubs: &[HubBin]) -> Vec<String> {
    hubs.iter().map(|h| h.label().to_string()).collect()
}

/// Sample coefficients, propagate, regress per hub and compare strata.
pub fn simulate(
    observations: &[AirlineObservation],
    mu: &DVector<f64>,
    sigma: &DMatrix<f64>,
    options: &SimulationOptions,
) -> Result<SimulationReport> {
    let config = options.sampler_config();
    let draws = draw_coefficients(options.mode, mu, sigma, &config)?;
    tracing::info!(num_sims = draws.num_sims(), seed = config.seed, "coefficients drawn");

    let markets = group_markets(observations);
    tracing::info!(
        markets = markets.markets().len(),
        skipped = markets.n_skipped(),
        rows = markets.n_rows(),
        "markets grouped"
    );
    if markets.is_empty() {
        anyhow::bail!("no market has more than one airline; nothing to simulate");
    }

    let effects = propagate_effects(&markets, &draws.draws)?;
    let weights = options
        .weights
        .map(|w| w.weights(&effects.market_share, &effects.monthly_flights))
        .transpose()?;
    let regression = fit_present_strata(
        &effects.market_share,
        &effects.airport_hub_size,
        &effects.effect,
        weights.as_deref(),
    )?;
    tracing::info!(
        strata = regression.fits.len(),
        absent = regression.absent_hubs().len(),
        "hub regressions fitted"
    );

    // Dominance covers the fitted strata only.
    let labels = hub_labels(&regression.hubs());
    let slope_dominance = dominance_matrix(&regression.slopes(), Some(&labels), DiagonalFill::Nan)?;
    let intercept_dominance =
        dominance_matrix(&regression.intercepts(), Some(&labels), DiagonalFill::Nan)?;

    Ok(SimulationReport {
        options: options.clone(),
        method: config.method,
        n_observations: observations.len(),
        n_markets: markets.markets().len(),
        n_skipped_markets: markets.n_skipped(),
        n_rows: effects.n_obs(),
        true_params: draws.true_params,
        regression,
        slope_dominance,
        intercept_dominance,
    })
}

/// Point-estimate externality, its per-hub line fits and smoothers.
#[derive(Debug, Clone)]
pub struct TrueEffectReport {
    pub mode: SamplingMode,
    pub weights: WeightScheme,
    pub true_params: [f64; 4],
    pub points: Vec<PointEffect>,
    pub fits: Vec<TrueFit>,
    pub smoothing: SmoothingOptions,
    pub effect_curves: Vec<(HubBin, SmoothedCurve)>,
    pub share_densities: Vec<(HubBin, ReflectedDensity)>,
}

pub fn true_effect(
    observations: &[AirlineObservation],
    mu: &DVector<f64>,
    mode: SamplingMode,
    weights: WeightScheme,
    smoothing: SmoothingOptions,
) -> Result<TrueEffectReport> {
    let true_params = combined_point_estimates(mode, mu)?;
    let markets = group_markets(observations);
    let points = point_effects(&markets, &true_params)?;
    if points.is_empty() {
        anyhow::bail!("no market has more than one airline; nothing to evaluate");
    }
    let fits = fit_true_externality_present(&points, weights)?;
    tracing::info!(points = points.len(), "point-estimate externality fitted");

    let share: Vec<f64> = points.iter().map(|p| p.market_share).collect();
    let effect: Vec<f64> = points.iter().map(|p| p.effect).collect();
    let flights: Vec<f64> = points.iter().map(|p| p.monthly_flights).collect();
    let hubs: Vec<HubBin> = points.iter().map(|p| p.airport_hub_size).collect();

    let effect_curves = kernel_smooth_by_hub(
        &share,
        &effect,
        &hubs,
        Some(&flights),
        smoothing.bandwidth,
        smoothing.n_grid,
    )?;
    let share_densities =
        reflected_kde_by_hub(
            &share,
            &hubs,
            smoothing.bandwidth,
            smoothing.density_grid,
            Some(smoothing.density_range),
        )?;

    Ok(TrueEffectReport {
        mode,
        weights,
        true_params,
        points,
        fits,
        smoothing,
        effect_curves,
        share_densities,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hx_core::{HubDummy, MarketKey};

    /// Competitive markets at large and small hub airports only.
    fn two_category_panel() -> Vec<AirlineObservation> {
        let mut out = Vec::new();
        for (airport, airport_hub) in [(31, HubBin::Large), (32, HubBin::Small)] {
            for (month, shares) in [(1u8, [0.3, 0.7]), (2, [0.4, 0.6])] {
                let hhi: f64 = shares.iter().map(|s| s * s).sum();
                for (i, &share) in shares.iter().enumerate() {
                    let airline_hub = HubBin::ALL[i * 3];
                    out.push(AirlineObservation {
                        market: MarketKey::new(airport, 2021, month),
                        market_id: airport,
                        market_share: share,
                        hhi,
                        monthly_flights: 400.0 * share,
                        airport_hub_size: airport_hub,
                        airline_hub_size: airline_hub,
                        hub_dummy: HubDummy::one_hot(airline_hub),
                    });
                }
            }
        }
        out
    }

    #[test]
    fn simulate_skips_hubs_without_rows() {
        let mu = DVector::from_vec(vec![0.3, 0.2]);
        let sigma = DMatrix::from_row_slice(2, 2, &[0.01, 0.002, 0.002, 0.02]);
        let options = SimulationOptions {
            mode: SamplingMode::Pooled,
            num_sims: 30,
            seed: 5,
            method: None,
            weights: Some(WeightScheme::MarketShare),
        };
        let report = simulate(&two_category_panel(), &mu, &sigma, &options).unwrap();
        assert_eq!(report.regression.hubs(), vec![HubBin::Small, HubBin::Large]);
        assert_eq!(report.regression.absent_hubs(), vec![HubBin::NonHub, HubBin::Medium]);
        assert_eq!(report.slope_dominance.labels, vec!["Small", "Large"]);
        assert_eq!(report.slope_dominance.len(), 2);
        assert_eq!(report.intercept_dominance.len(), 2);
    }

    #[test]
    fn true_effect_skips_hubs_and_grids_the_unit_interval() {
        let mu = DVector::from_vec(vec![0.3, 0.2]);
        let smoothing = SmoothingOptions { density_grid: 51, ..SmoothingOptions::default() };
        let report = true_effect(
            &two_category_panel(),
            &mu,
            SamplingMode::Pooled,
            WeightScheme::MarketShareTimesFlights,
            smoothing,
        )
        .unwrap();
        let fitted: Vec<HubBin> = report.fits.iter().map(|f| f.hub).collect();
        assert_eq!(fitted, vec![HubBin::Small, HubBin::Large]);
        assert_eq!(report.share_densities.len(), 2);
        for (_, d) in &report.share_densities {
            assert_eq!(d.x.len(), 51);
            assert_eq!(d.x[0], 0.0);
            assert_eq!(d.x[50], 1.0);
        }
    }

    #[test]
    fn weight_names_round_trip() {
        for name in ["none", "flights", "market_share", "market_share_x_flights"] {
            assert_eq!(weights_name(parse_weights(name).unwrap()), name);
        }
        assert_eq!(parse_weights("ms").unwrap(), Some(WeightScheme::MarketShare));
        assert!(parse_weights("bogus").is_err());
    }

    #[test]
    fn method_defaults_follow_mode() {
        let mut opts = SimulationOptions {
            mode: SamplingMode::Pooled,
            num_sims: 10,
            seed: 1,
            method: None,
            weights: None,
        };
        assert_eq!(opts.sampler_config().method, DecompositionMethod::Svd);
        opts.mode = SamplingMode::HubDecomposed;
        assert_eq!(opts.sampler_config().method, DecompositionMethod::Cholesky);
        opts.method = Some(DecompositionMethod::Svd);
        assert_eq!(opts.sampler_config().method, DecompositionMethod::Svd);
    }
}
