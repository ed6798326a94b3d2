//! Coefficient sampling from a multivariate-normal approximation.
//!
//! The delay regressions report point estimates `mu` and a covariance
//! `Sigma`. Uncertainty is propagated by drawing joint coefficient vectors
//! from `N(mu, Sigma)`; the point estimate itself is never simulated.
//!
//! Two layouts are supported:
//! - **hub-decomposed**: 8 coefficients (4 origin + 4 destination hub
//!   bins), combined pairwise into 4 origin+destination effects;
//! - **pooled**: 2 coefficients (origin, destination) whose sum is
//!   replicated across the 4 hub columns. All strata then share one draw,
//!   which is the "no hub heterogeneity" baseline.

use hx_core::{Error, N_HUB_BINS, Result};
use nalgebra::{DMatrix, DVector};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, StandardNormal};

/// Regressor names for the pooled layout.
pub const POOLED_REGRESSORS: [&str; 2] = ["hhiorigin", "hhidest"];

/// Regressor names for the hub-decomposed layout: origin bins, then destination bins.
pub const HUB_REGRESSORS: [&str; 2 * N_HUB_BINS] = [
    "nonhubairlineconcorigin",
    "smallhubairlineconcorigin",
    "mediumhubairlineconcorigin",
    "largehubairlineconcorigin",
    "nonhubairlineconcdest",
    "smallhubairlineconcdest",
    "mediumhubairlineconcdest",
    "largehubairlineconcdest",
];

/// Factorisation used to turn standard normals into correlated draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecompositionMethod {
    /// `Sigma = L L'`; requires a positive-definite covariance.
    Cholesky,
    /// `Sigma = U S V'`; tolerates positive-semidefinite covariances.
    Svd,
}

impl std::str::FromStr for DecompositionMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cholesky" => Ok(Self::Cholesky),
            "svd" => Ok(Self::Svd),
            other => Err(Error::InvalidArgument(format!("unknown decomposition method '{other}'"))),
        }
    }
}

/// Coefficient layout of the regression output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingMode {
    /// Eight hub-specific origin/destination coefficients.
    HubDecomposed,
    /// One origin and one destination coefficient.
    Pooled,
}

impl SamplingMode {
    /// Regressor names looked up in the coefficient and covariance tables.
    pub fn regressor_names(self) -> &'static [&'static str] {
        match self {
            SamplingMode::HubDecomposed => &HUB_REGRESSORS,
            SamplingMode::Pooled => &POOLED_REGRESSORS,
        }
    }

    /// Default factorisation for this layout.
    pub fn default_method(self) -> DecompositionMethod {
        match self {
            SamplingMode::HubDecomposed => DecompositionMethod::Cholesky,
            SamplingMode::Pooled => DecompositionMethod::Svd,
        }
    }
}

impl std::str::FromStr for SamplingMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "hub" | "hub_decomposed" => Ok(Self::HubDecomposed),
            "pooled" | "basic" => Ok(Self::Pooled),
            other => Err(Error::InvalidArgument(format!("unknown sampling mode '{other}'"))),
        }
    }
}

/// Sampler configuration.
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Number of joint draws (must be > 0).
    pub num_sims: usize,
    /// RNG seed. Identical seed + inputs give bit-identical draws.
    pub seed: u64,
    /// Covariance factorisation.
    pub method: DecompositionMethod,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self { num_sims: 1000, seed: 12345, method: DecompositionMethod::Cholesky }
    }
}

/// Combined origin+destination draws, one column per hub bin.
#[derive(Debug, Clone)]
pub struct CoefficientDraws {
    /// Shape `(num_sims, 4)`.
    pub draws: DMatrix<f64>,
    /// Deterministic combined point estimates, one per hub bin.
    pub true_params: [f64; N_HUB_BINS],
}

impl CoefficientDraws {
    /// Number of simulation draws.
    pub fn num_sims(&self) -> usize {
        self.draws.nrows()
    }
}

fn validate_mvn_inputs(mu: &DVector<f64>, sigma: &DMatrix<f64>, num_sims: usize) -> Result<()> {
    if num_sims == 0 {
        return Err(Error::InvalidArgument("num_sims must be positive".to_string()));
    }
    let k = mu.len();
    if k == 0 {
        return Err(Error::ShapeMismatch("mu must be non-empty".to_string()));
    }
    if sigma.nrows() != k || sigma.ncols() != k {
        return Err(Error::ShapeMismatch(format!(
            "Sigma must be {k}x{k} to match mu, got {}x{}",
            sigma.nrows(),
            sigma.ncols()
        )));
    }
    if mu.iter().chain(sigma.iter()).any(|v| !v.is_finite()) {
        return Err(Error::InvalidArgument("mu and Sigma must be finite".to_string()));
    }
    let scale = sigma.amax().max(f64::MIN_POSITIVE);
    if (sigma - sigma.transpose()).amax() > 1e-10 * scale {
        return Err(Error::InvalidArgument("Sigma must be symmetric".to_string()));
    }
    Ok(())
}

/// Right factor `A'` with `A A' = Sigma`, so that a row of standard normals
/// `z'` maps to `z' A'`.
fn right_factor(sigma: &DMatrix<f64>, method: DecompositionMethod) -> Result<DMatrix<f64>> {
    match method {
        DecompositionMethod::Cholesky => {
            let chol = sigma.clone().cholesky().ok_or_else(|| {
                Error::Computation("covariance not positive definite (Cholesky failed)".to_string())
            })?;
            Ok(chol.l().transpose())
        }
        DecompositionMethod::Svd => {
            let svd = sigma.clone().svd(false, true);
            let v_t = svd
                .v_t
                .ok_or_else(|| Error::Computation("SVD did not produce V'".to_string()))?;
            let s = &svd.singular_values;

            // Sigma must be reproduced by V' S V; otherwise it has negative eigenvalues.
            let recon = v_t.transpose() * DMatrix::from_diagonal(s) * &v_t;
            let scale = sigma.amax().max(f64::MIN_POSITIVE);
            if (&recon - sigma).amax() > 1e-8 * scale {
                return Err(Error::Computation(
                    "covariance is not positive-semidefinite".to_string(),
                ));
            }

            let sqrt_s = s.map(f64::sqrt);
            Ok(DMatrix::from_diagonal(&sqrt_s) * v_t)
        }
    }
}

/// Draw `num_sims` joint vectors from `N(mu, Sigma)`.
///
/// Returns a `(num_sims, K)` matrix. Standard normals are consumed row by
/// row from a single `StdRng` seeded with `seed`.
pub fn sample_mvn(
    mu: &DVector<f64>,
    sigma: &DMatrix<f64>,
    num_sims: usize,
    seed: u64,
    method: DecompositionMethod,
) -> Result<DMatrix<f64>> {
    validate_mvn_inputs(mu, sigma, num_sims)?;
    let k = mu.len();
    let factor = right_factor(sigma, method)?;

    let mut rng = StdRng::seed_from_u64(seed);
    let z: Vec<f64> = (0..num_sims * k).map(|_| StandardNormal.sample(&mut rng)).collect();
    let z = DMatrix::from_row_slice(num_sims, k, &z);

    let mu_t = mu.transpose();
    let mut draws = z * factor;
    for mut row in draws.row_iter_mut() {
        row += &mu_t;
    }
    Ok(draws)
}

/// Deterministic origin+destination effect per hub bin at the point estimates.
pub fn combined_point_estimates(mode: SamplingMode, mu: &DVector<f64>) -> Result<[f64; N_HUB_BINS]> {
    let expected = mode.regressor_names().len();
    if mu.len() != expected {
        return Err(Error::ShapeMismatch(format!(
            "{mode:?} sampling needs {expected} coefficients, got {}",
            mu.len()
        )));
    }
    Ok(match mode {
        SamplingMode::HubDecomposed => std::array::from_fn(|b| mu[b] + mu[N_HUB_BINS + b]),
        SamplingMode::Pooled => [mu.sum(); N_HUB_BINS],
    })
}

/// Hub-decomposed draws: `mu`/`Sigma` over [`HUB_REGRESSORS`] (K = 8).
///
/// Origin and destination draws are summed per hub bin.
pub fn hub_decomposed_draws(
    mu: &DVector<f64>,
    sigma: &DMatrix<f64>,
    config: &SamplerConfig,
) -> Result<CoefficientDraws> {
    let true_params = combined_point_estimates(SamplingMode::HubDecomposed, mu)?;
    let raw = sample_mvn(mu, sigma, config.num_sims, config.seed, config.method)?;
    let draws = raw.columns(0, N_HUB_BINS) + raw.columns(N_HUB_BINS, N_HUB_BINS);
    log::debug!("drew {} hub-decomposed coefficient vectors (seed {})", config.num_sims, config.seed);
    Ok(CoefficientDraws { draws, true_params })
}

/// Pooled draws: `mu`/`Sigma` over [`POOLED_REGRESSORS`] (K = 2).
///
/// The combined draw is replicated across all hub columns.
pub fn pooled_draws(
    mu: &DVector<f64>,
    sigma: &DMatrix<f64>,
    config: &SamplerConfig,
) -> Result<CoefficientDraws> {
    let true_params = combined_point_estimates(SamplingMode::Pooled, mu)?;
    let raw = sample_mvn(mu, sigma, config.num_sims, config.seed, config.method)?;
    let combined: DVector<f64> = raw.column_sum();
    let draws = DMatrix::from_fn(config.num_sims, N_HUB_BINS, |s, _| combined[s]);
    log::debug!("drew {} pooled coefficient vectors (seed {})", config.num_sims, config.seed);
    Ok(CoefficientDraws { draws, true_params })
}

/// Dispatch on `mode`.
pub fn draw_coefficients(
    mode: SamplingMode,
    mu: &DVector<f64>,
    sigma: &DMatrix<f64>,
    config: &SamplerConfig,
) -> Result<CoefficientDraws> {
    match mode {
        SamplingMode::HubDecomposed => hub_decomposed_draws(mu, sigma, config),
        SamplingMode::Pooled => pooled_draws(mu, sigma, config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sigma3() -> DMatrix<f64> {
        DMatrix::from_row_slice(3, 3, &[1.0, 0.3, -0.2, 0.3, 0.5, 0.1, -0.2, 0.1, 0.8])
    }

    fn empirical_moments(draws: &DMatrix<f64>) -> (DVector<f64>, DMatrix<f64>) {
        let n = draws.nrows() as f64;
        let mean: DVector<f64> = draws.row_mean().transpose();
        let mean_t = mean.transpose();
        let mut centered = draws.clone();
        for mut row in centered.row_iter_mut() {
            row -= &mean_t;
        }
        let cov = centered.transpose() * &centered / (n - 1.0);
        (mean, cov)
    }

    #[test]
    fn same_seed_is_bit_identical() {
        let mu = DVector::from_vec(vec![0.1, -2.0, 3.0]);
        for method in [DecompositionMethod::Cholesky, DecompositionMethod::Svd] {
            let a = sample_mvn(&mu, &sigma3(), 50, 7, method).unwrap();
            let b = sample_mvn(&mu, &sigma3(), 50, 7, method).unwrap();
            assert_eq!(a, b);
            let c = sample_mvn(&mu, &sigma3(), 50, 8, method).unwrap();
            assert_ne!(a, c);
        }
    }

    #[test]
    fn large_sample_moments_converge() {
        let mu = DVector::from_vec(vec![0.1, -2.0, 3.0]);
        for method in [DecompositionMethod::Cholesky, DecompositionMethod::Svd] {
            let draws = sample_mvn(&mu, &sigma3(), 100_000, 12345, method).unwrap();
            assert_eq!(draws.shape(), (100_000, 3));
            let (mean, cov) = empirical_moments(&draws);
            for j in 0..3 {
                assert!((mean[j] - mu[j]).abs() < 0.02, "{method:?} mean[{j}]={}", mean[j]);
                for k in 0..3 {
                    assert!(
                        (cov[(j, k)] - sigma3()[(j, k)]).abs() < 0.03,
                        "{method:?} cov[{j},{k}]={}",
                        cov[(j, k)]
                    );
                }
            }
        }
    }

    #[test]
    fn svd_handles_singular_psd_covariance() {
        // Perfectly correlated pair: rank 1.
        let sigma = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        let mu = DVector::from_vec(vec![0.0, 0.0]);
        assert!(matches!(
            sample_mvn(&mu, &sigma, 10, 1, DecompositionMethod::Cholesky),
            Err(Error::Computation(_))
        ));
        let draws = sample_mvn(&mu, &sigma, 10, 1, DecompositionMethod::Svd).unwrap();
        for s in 0..10 {
            assert_relative_eq!(draws[(s, 0)], draws[(s, 1)], epsilon = 1e-10);
        }
    }

    #[test]
    fn indefinite_covariance_is_rejected() {
        let sigma = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 1.0]);
        let mu = DVector::from_vec(vec![0.0, 0.0]);
        assert!(sample_mvn(&mu, &sigma, 10, 1, DecompositionMethod::Svd).is_err());
    }

    #[test]
    fn invalid_arguments_and_shapes() {
        let mu = DVector::from_vec(vec![0.0, 0.0, 0.0]);
        assert!(matches!(
            sample_mvn(&mu, &sigma3(), 0, 1, DecompositionMethod::Cholesky),
            Err(Error::InvalidArgument(_))
        ));
        let mu2 = DVector::from_vec(vec![0.0, 0.0]);
        assert!(matches!(
            sample_mvn(&mu2, &sigma3(), 5, 1, DecompositionMethod::Cholesky),
            Err(Error::ShapeMismatch(_))
        ));
        let cfg = SamplerConfig::default();
        assert!(matches!(pooled_draws(&mu, &sigma3(), &cfg), Err(Error::ShapeMismatch(_))));
    }

    #[test]
    fn pooled_draws_replicate_combined_effect() {
        let mu = DVector::from_vec(vec![-0.5, 0.25]);
        let sigma = DMatrix::from_row_slice(2, 2, &[0.04, 0.01, 0.01, 0.09]);
        let cfg = SamplerConfig { num_sims: 200, seed: 3, method: DecompositionMethod::Svd };
        let out = pooled_draws(&mu, &sigma, &cfg).unwrap();
        assert_eq!(out.draws.shape(), (200, 4));
        assert_eq!(out.true_params, [-0.25; 4]);

        let raw = sample_mvn(&mu, &sigma, 200, 3, DecompositionMethod::Svd).unwrap();
        for s in 0..200 {
            let combined = raw[(s, 0)] + raw[(s, 1)];
            for b in 0..4 {
                assert_eq!(out.draws[(s, b)], combined);
            }
        }
    }

    #[test]
    fn hub_draws_sum_origin_and_destination() {
        let mu = DVector::from_vec(vec![1.0, 2.0, 3.0, 4.0, 10.0, 20.0, 30.0, 40.0]);
        let sigma = DMatrix::from_diagonal_element(8, 8, 0.01);
        let cfg = SamplerConfig { num_sims: 25, seed: 99, method: DecompositionMethod::Cholesky };
        let out = hub_decomposed_draws(&mu, &sigma, &cfg).unwrap();
        assert_eq!(out.true_params, [11.0, 22.0, 33.0, 44.0]);
        assert_eq!(out.num_sims(), 25);

        let raw = sample_mvn(&mu, &sigma, 25, 99, DecompositionMethod::Cholesky).unwrap();
        for s in 0..25 {
            for b in 0..4 {
                assert_eq!(out.draws[(s, b)], raw[(s, b)] + raw[(s, b + 4)]);
            }
        }
    }

    #[test]
    fn mode_and_method_parse() {
        assert_eq!("hub".parse::<SamplingMode>().unwrap(), SamplingMode::HubDecomposed);
        assert_eq!("Pooled".parse::<SamplingMode>().unwrap(), SamplingMode::Pooled);
        assert_eq!("SVD".parse::<DecompositionMethod>().unwrap(), DecompositionMethod::Svd);
        assert!("qr".parse::<DecompositionMethod>().is_err());
        assert_eq!(SamplingMode::HubDecomposed.regressor_names().len(), 8);
    }
}
