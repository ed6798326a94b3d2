//! # hx-inference
//!
//! Simulation-based inference for the hub externality model.
//!
//! Pipeline:
//! - group airline observations into competitive markets ([`market`])
//! - draw combined coefficient vectors from the estimated normal ([`sampler`])
//! - push every draw through the externality formula ([`externality`])
//! - fit per-hub lines to each simulation column ([`hub_regression`])
//! - compare strata pairwise across draws ([`dominance`])
//!
//! [`true_effect`] and [`smoothing`] work on the point-estimate effects.
//!
//! Library code logs through the `log` facade; binaries choose the subscriber.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Pairwise dominance probabilities.
pub mod dominance;
/// Externality propagation (simulated and point estimate).
pub mod externality;
/// Per-hub least squares over simulation columns.
pub mod hub_regression;
/// Market grouping and hub share totals.
pub mod market;
/// Multivariate normal coefficient sampling.
pub mod sampler;
/// Kernel smoothers and reflected KDE.
pub mod smoothing;
/// Median/mean/percentile summaries.
pub mod summary;
/// Weighted fits of the point-estimate externality.
pub mod true_effect;

pub use dominance::{DiagonalFill, DominanceMatrix, dominance_matrix, dominance_matrix_from_draws};
pub use externality::{PointEffect, SimulatedEffects, point_effects, propagate_effects};
pub use hub_regression::{
    HubFit, HubRegression, HubSummary, WeightScheme, fit_hub_slopes, fit_line, fit_present_strata,
    fit_stratum,
};
pub use market::{GroupedMarkets, MarketGroup, group_markets};
pub use sampler::{
    CoefficientDraws, DecompositionMethod, HUB_REGRESSORS, POOLED_REGRESSORS, SamplerConfig,
    SamplingMode, combined_point_estimates, draw_coefficients, sample_mvn,
};
pub use smoothing::{
    ReflectedDensity, SHARE_SUPPORT, SmoothedCurve, kernel_smooth, kernel_smooth_by_hub,
    reflected_kde, reflected_kde_by_hub,
};
pub use summary::summarize;
pub use true_effect::{TrueFit, fit_true_externality, fit_true_externality_present};
