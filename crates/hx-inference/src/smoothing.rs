//! Gaussian kernel smoothers over market share.
//!
//! - [`kernel_smooth`]: Nadaraya-Watson regression of an effect on share.
//! - [`reflected_kde`]: share density with reflection at the `[0, 1]` boundaries,
//!   plus the share-weighted density `x f(x)` normalized to unit area.

use hx_core::{Error, HubBin, Result};
use serde::Serialize;

const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7;

/// Support of market share; the reflection points of [`reflected_kde`].
pub const SHARE_SUPPORT: (f64, f64) = (0.0, 1.0);

/// Half-width added on each side when the grid range is degenerate.
const DEGENERATE_RANGE_EPS: f64 = 1e-6;

/// Smoothed curve on an even grid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SmoothedCurve {
    /// Grid.
    pub x: Vec<f64>,
    /// Smoothed value per grid point (`NaN` where the kernel mass is zero).
    pub y: Vec<f64>,
}

/// Boundary-reflected density estimate on an even grid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReflectedDensity {
    /// Grid.
    pub x: Vec<f64>,
    /// Density `f(x)` including the reflected mass.
    pub density: Vec<f64>,
    /// `x f(x)` normalized to integrate to one on the grid.
    pub share_weighted: Vec<f64>,
}

fn check_kernel_args(bandwidth: f64, n_grid: usize) -> Result<()> {
    if !(bandwidth.is_finite() && bandwidth > 0.0) {
        return Err(Error::InvalidArgument(format!("bandwidth must be > 0, got {bandwidth}")));
    }
    if n_grid < 2 {
        return Err(Error::InvalidArgument(format!("n_grid must be >= 2, got {n_grid}")));
    }
    Ok(())
}

fn linspace(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    let step = (hi - lo) / (n - 1) as f64;
    (0..n).map(|i| if i + 1 == n { hi } else { lo + step * i as f64 }).collect()
}

fn min_max(xs: &[f64]) -> (f64, f64) {
    xs.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
}

#[inline]
fn gaussian(u: f64) -> f64 {
    (-0.5 * u * u).exp()
}

/// Nadaraya-Watson smoother of `y` on `x` with optional observation weights.
///
/// The grid spans `min(x)..=max(x)` with `n_grid` points.
pub fn kernel_smooth(
    x: &[f64],
    y: &[f64],
    weights: Option<&[f64]>,
    bandwidth: f64,
    n_grid: usize,
) -> Result<SmoothedCurve> {
    check_kernel_args(bandwidth, n_grid)?;
    if x.is_empty() {
        return Err(Error::InvalidArgument("kernel_smooth needs at least one point".to_string()));
    }
    if y.len() != x.len() || weights.is_some_and(|w| w.len() != x.len()) {
        return Err(Error::ShapeMismatch(format!(
            "x ({}), y ({}) and weights must have the same length",
            x.len(),
            y.len()
        )));
    }

    let (lo, hi) = min_max(x);
    let grid = linspace(lo, hi, n_grid);
    let smoothed = grid
        .iter()
        .map(|&g| {
            let mut num = 0.0;
            let mut den = 0.0;
            for (i, (&xi, &yi)) in x.iter().zip(y).enumerate() {
                let k = gaussian((xi - g) / bandwidth) * weights.map_or(1.0, |w| w[i]);
                num += k * yi;
                den += k;
            }
            if den > 0.0 { num / den } else { f64::NAN }
        })
        .collect();
    Ok(SmoothedCurve { x: grid, y: smoothed })
}

/// [`kernel_smooth`] applied to each airport hub stratum. Empty strata are skipped.
pub fn kernel_smooth_by_hub(
    x: &[f64],
    y: &[f64],
    hub_size: &[HubBin],
    weights: Option<&[f64]>,
    bandwidth: f64,
    n_grid: usize,
) -> Result<Vec<(HubBin, SmoothedCurve)>> {
    if hub_size.len() != x.len() || y.len() != x.len() || weights.is_some_and(|w| w.len() != x.len()) {
        return Err(Error::ShapeMismatch(format!(
            "x ({}), y ({}), hub_size ({}) and weights must have the same length",
            x.len(),
            y.len(),
            hub_size.len()
        )));
    }
    let mut out = Vec::new();
    for hub in HubBin::ALL {
        let rows: Vec<usize> = (0..x.len()).filter(|&i| hub_size[i] == hub).collect();
        if rows.is_empty() {
            continue;
        }
        let xs: Vec<f64> = rows.iter().map(|&i| x[i]).collect();
        let ys: Vec<f64> = rows.iter().map(|&i| y[i]).collect();
        let ws: Option<Vec<f64>> = weights.map(|w| rows.iter().map(|&i| w[i]).collect());
        out.push((hub, kernel_smooth(&xs, &ys, ws.as_deref(), bandwidth, n_grid)?));
    }
    Ok(out)
}

/// Gaussian KDE of `data` with reflection about 0 and 1.
///
/// `range` sets the grid bounds; pass [`SHARE_SUPPORT`] for the full share
/// interval. `None` spans `min..=max` of the data.
pub fn reflected_kde(
    data: &[f64],
    bandwidth: f64,
    n_grid: usize,
    range: Option<(f64, f64)>,
) -> Result<ReflectedDensity> {
    check_kernel_args(bandwidth, n_grid)?;
    if data.is_empty() {
        return Err(Error::InvalidArgument("reflected_kde needs at least one point".to_string()));
    }

    if let Some((lo, hi)) = range.filter(|(lo, hi)| !(lo.is_finite() && hi.is_finite() && lo <= hi)) {
        return Err(Error::InvalidArgument(format!("invalid density range [{lo}, {hi}]")));
    }
    let (mut lo, mut hi) = range.unwrap_or_else(|| min_max(data));
    if lo == hi {
        lo -= DEGENERATE_RANGE_EPS;
        hi += DEGENERATE_RANGE_EPS;
    }
    let grid = linspace(lo, hi, n_grid);

    let norm = INV_SQRT_2PI / (data.len() as f64 * bandwidth);
    let kde = |g: f64| norm * data.iter().map(|&d| gaussian((g - d) / bandwidth)).sum::<f64>();
    let density: Vec<f64> = grid.iter().map(|&g| kde(g) + kde(-g) + kde(2.0 - g)).collect();

    let dx = grid[1] - grid[0];
    let mut share_weighted: Vec<f64> = grid.iter().zip(&density).map(|(x, f)| x * f).collect();
    let area = share_weighted.iter().sum::<f64>() * dx;
    if area > 0.0 {
        share_weighted.iter_mut().for_each(|v| *v /= area);
    }

    Ok(ReflectedDensity { x: grid, density, share_weighted })
}

/// [`reflected_kde`] of market share per airport hub. Empty strata are skipped.
pub fn reflected_kde_by_hub(
    market_share: &[f64],
    hub_size: &[HubBin],
    bandwidth: f64,
    n_grid: usize,
    range: Option<(f64, f64)>,
) -> Result<Vec<(HubBin, ReflectedDensity)>> {
    if hub_size.len() != market_share.len() {
        return Err(Error::ShapeMismatch(format!(
            "market_share ({}) and hub_size ({}) must have the same length",
            market_share.len(),
            hub_size.len()
        )));
    }
    let mut out = Vec::new();
    for hub in HubBin::ALL {
        let data: Vec<f64> =
            market_share.iter().zip(hub_size).filter(|(_, h)| **h == hub).map(|(s, _)| *s).collect();
        if data.is_empty() {
            continue;
        }
        out.push((hub, reflected_kde(&data, bandwidth, n_grid, range)?));
    }
    Ok(out)
}
