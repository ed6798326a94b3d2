//! Weighted line fits of the point-estimate externality, per airport hub.

use hx_core::{Error, HubBin, Result};
use serde::Serialize;

use crate::externality::PointEffect;
use crate::hub_regression::{WeightScheme, fit_line};

/// Intercept and slope of `effect ~ 1 + share` for one airport hub stratum.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrueFit {
    /// Stratum.
    pub hub: HubBin,
    /// Human-readable stratum label.
    pub label: String,
    /// Intercept.
    pub intercept: f64,
    /// Slope on market share.
    pub slope: f64,
    /// Rows used in the fit.
    pub n_obs: usize,
    /// Rows dropped for non-finite values or non-positive weights.
    pub n_dropped: usize,
}

/// Fit every airport hub stratum of the point effects with WLS.
///
/// Rows with a non-finite effect, share or weight, or a weight `<= 0`, are
/// dropped before fitting. A stratum left empty fails with
/// [`Error::InvalidArgument`].
pub fn fit_true_externality(points: &[PointEffect], scheme: WeightScheme) -> Result<Vec<TrueFit>> {
    let weights = point_weights(points, scheme)?;
    HubBin::ALL
        .into_iter()
        .map(|hub| {
            fit_hub(hub, points, &weights)?.ok_or_else(|| {
                Error::InvalidArgument(format!("no usable observations for {}", hub.airport_description()))
            })
        })
        .collect()
}

/// Like [`fit_true_externality`], but strata without usable rows are skipped.
///
/// Fails with [`Error::InvalidArgument`] only when no stratum can be fitted.
pub fn fit_true_externality_present(
    points: &[PointEffect],
    scheme: WeightScheme,
) -> Result<Vec<TrueFit>> {
    let weights = point_weights(points, scheme)?;
    let mut fits = Vec::with_capacity(HubBin::ALL.len());
    for hub in HubBin::ALL {
        match fit_hub(hub, points, &weights)? {
            Some(fit) => fits.push(fit),
            None => log::warn!("{}: no usable observations, stratum skipped", hub.airport_description()),
        }
    }
    if fits.is_empty() {
        return Err(Error::InvalidArgument("no hub stratum has usable observations".to_string()));
    }
    Ok(fits)
}

fn point_weights(points: &[PointEffect], scheme: WeightScheme) -> Result<Vec<f64>> {
    let share: Vec<f64> = points.iter().map(|p| p.market_share).collect();
    let flights: Vec<f64> = points.iter().map(|p| p.monthly_flights).collect();
    scheme.weights(&share, &flights)
}

/// WLS line for one stratum; `None` when no row survives filtering.
fn fit_hub(hub: HubBin, points: &[PointEffect], weights: &[f64]) -> Result<Option<TrueFit>> {
    let mut x = Vec::new();
    let mut y = Vec::new();
    let mut w = Vec::new();
    let mut n_dropped = 0usize;
    for (p, &wi) in points.iter().zip(weights).filter(|(p, _)| p.airport_hub_size == hub) {
        let ok = p.effect.is_finite() && p.market_share.is_finite() && wi.is_finite() && wi > 0.0;
        if ok {
            x.push(p.market_share);
            y.push(p.effect);
            w.push(wi);
        } else {
            n_dropped += 1;
        }
    }
    if n_dropped > 0 {
        log::warn!("hub {hub}: dropped {n_dropped} rows with non-finite values or non-positive weights");
    }
    if x.is_empty() {
        return Ok(None);
    }

    let hubs = vec![hub; x.len()];
    let (intercept, slope) = fit_line(hub, &x, &hubs, &y, Some(&w))?;
    Ok(Some(TrueFit {
        hub,
        label: hub.airport_description().to_string(),
        intercept,
        slope,
        n_obs: x.len(),
        n_dropped,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn point(hub: HubBin, share: f64, flights: f64, effect: f64) -> PointEffect {
        PointEffect {
            monthly_flights: flights,
            market_share: share,
            airport_hub_size: hub,
            airline_hub_size: hub,
            hhi: 0.5,
            num_airlines: 2,
            airport_id: 1,
            effect,
        }
    }

    fn all_hubs_on_lines() -> Vec<PointEffect> {
        let mut out = Vec::new();
        for hub in HubBin::ALL {
            let k = hub.index() as f64;
            for &s in &[0.1, 0.3, 0.6, 0.8] {
                out.push(point(hub, s, 50.0 + 10.0 * s, k - (k + 1.0) * s));
            }
        }
        out
    }

    #[test]
    fn recovers_exact_lines_with_labels() {
        let fits = fit_true_externality(&all_hubs_on_lines(), WeightScheme::MarketShareTimesFlights).unwrap();
        assert_eq!(fits.len(), 4);
        for (fit, hub) in fits.iter().zip(HubBin::ALL) {
            let k = hub.index() as f64;
            assert_eq!(fit.hub, hub);
            assert_eq!(fit.n_obs, 4);
            assert_eq!(fit.n_dropped, 0);
            assert_relative_eq!(fit.intercept, k, epsilon = 1e-9);
            assert_relative_eq!(fit.slope, -(k + 1.0), epsilon = 1e-9);
        }
        assert_eq!(fits[0].label, "Non-hub airports");
        assert_eq!(fits[3].label, "Large hub airports");
    }

    #[test]
    fn drops_bad_rows() {
        let mut points = all_hubs_on_lines();
        points.push(point(HubBin::Small, 0.5, 10.0, f64::NAN));
        points.push(point(HubBin::Small, 0.5, 0.0, 100.0));
        let fits = fit_true_externality(&points, WeightScheme::Flights).unwrap();
        assert_eq!(fits[1].n_dropped, 2);
        assert_eq!(fits[1].n_obs, 4);
        assert_relative_eq!(fits[1].slope, -2.0, epsilon = 1e-9);
    }

    #[test]
    fn empty_stratum_after_filtering_fails() {
        let points: Vec<PointEffect> =
            all_hubs_on_lines().into_iter().filter(|p| p.airport_hub_size != HubBin::Medium).collect();
        assert!(matches!(
            fit_true_externality(&points, WeightScheme::MarketShare),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn present_variant_skips_missing_strata() {
        let points: Vec<PointEffect> =
            all_hubs_on_lines().into_iter().filter(|p| p.airport_hub_size != HubBin::NonHub).collect();
        let fits = fit_true_externality_present(&points, WeightScheme::Flights).unwrap();
        let hubs: Vec<HubBin> = fits.iter().map(|f| f.hub).collect();
        assert_eq!(hubs, vec![HubBin::Small, HubBin::Medium, HubBin::Large]);
        assert_relative_eq!(fits[2].slope, -4.0, epsilon = 1e-9);

        let unusable = vec![point(HubBin::Large, 0.5, 0.0, 1.0)];
        assert!(matches!(
            fit_true_externality_present(&unusable, WeightScheme::Flights),
            Err(Error::InvalidArgument(_))
        ));
    }
}
