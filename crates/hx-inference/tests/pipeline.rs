//! End-to-end: sample -> propagate -> regress -> dominance.

use hx_core::{AirlineObservation, Error, HubBin, HubDummy, MarketKey};
use hx_inference::{
    DiagonalFill, SamplerConfig, SamplingMode, WeightScheme, dominance_matrix, draw_coefficients,
    fit_hub_slopes, fit_present_strata, fit_stratum, fit_true_externality, group_markets,
    point_effects, propagate_effects,
};
use nalgebra::{DMatrix, DVector};

fn row(
    airport: i64,
    month: u8,
    share: f64,
    hhi: f64,
    airline_hub: HubBin,
    airport_hub: HubBin,
) -> AirlineObservation {
    AirlineObservation {
        market: MarketKey::new(airport, 2019, month),
        market_id: airport,
        market_share: share,
        hhi,
        monthly_flights: 1000.0 * share,
        airport_hub_size: airport_hub,
        airline_hub_size: airline_hub,
        hub_dummy: HubDummy::one_hot(airline_hub),
    }
}

/// Two markets per airport hub stratum, each with three airlines.
fn panel() -> Vec<AirlineObservation> {
    let mut out = Vec::new();
    for (a, airport_hub) in HubBin::ALL.into_iter().enumerate() {
        for (m, shares) in [[0.5, 0.3, 0.2], [0.7, 0.2, 0.1]].iter().enumerate() {
            let hhi: f64 = shares.iter().map(|s| s * s).sum();
            for (i, &s) in shares.iter().enumerate() {
                let airline_hub = HubBin::ALL[(a + i) % 4];
                out.push(row(100 + a as i64, 1 + m as u8, s, hhi, airline_hub, airport_hub));
            }
        }
    }
    out
}

fn hub_inputs() -> (DVector<f64>, DMatrix<f64>) {
    let mu = DVector::from_vec(vec![0.2, -0.1, 0.4, 0.8, 0.1, 0.0, -0.3, 0.5]);
    let mut sigma = DMatrix::from_element(8, 8, 0.002);
    sigma.fill_diagonal(0.01);
    (mu, sigma)
}

#[test]
fn small_panel_keeps_only_competitive_rows() {
    // Three airlines over two airline hub bins, plus a monopoly market.
    let data = vec![
        row(1, 1, 0.5, 0.38, HubBin::Large, HubBin::Large),
        row(1, 1, 0.3, 0.38, HubBin::Large, HubBin::Large),
        row(1, 1, 0.2, 0.38, HubBin::Small, HubBin::Large),
        row(2, 1, 1.0, 1.0, HubBin::Medium, HubBin::Medium),
    ];
    let grouped = group_markets(&data);
    let (mu, sigma) = hub_inputs();
    let config = SamplerConfig { num_sims: 10, ..SamplerConfig::default() };
    let draws = draw_coefficients(SamplingMode::HubDecomposed, &mu, &sigma, &config).unwrap();

    let effects = propagate_effects(&grouped, &draws.draws).unwrap();
    assert_eq!(effects.effect.shape(), (3, 10));
    assert!(effects.airport_hub_size.iter().all(|h| *h == HubBin::Large));

    // Only the large-hub stratum has rows.
    let fit = fit_stratum(HubBin::Large, &effects.market_share, &effects.airport_hub_size, &effects.effect, None)
        .unwrap();
    assert_eq!(fit.slopes.len(), 10);
    assert!(matches!(
        fit_hub_slopes(&effects.market_share, &effects.airport_hub_size, &effects.effect, None),
        Err(Error::InvalidArgument(_))
    ));
    let present =
        fit_present_strata(&effects.market_share, &effects.airport_hub_size, &effects.effect, None).unwrap();
    assert!(present.fits.len() <= 2);
    assert_eq!(present.hubs(), vec![HubBin::Large]);
}

#[test]
fn full_pipeline_is_reproducible_and_consistent() {
    let data = panel();
    let grouped = group_markets(&data);
    let (mu, sigma) = hub_inputs();
    let config = SamplerConfig { num_sims: 200, ..SamplerConfig::default() };

    let run = || {
        let draws = draw_coefficients(SamplingMode::HubDecomposed, &mu, &sigma, &config).unwrap();
        let effects = propagate_effects(&grouped, &draws.draws).unwrap();
        let weights = WeightScheme::Flights.weights(&effects.market_share, &effects.monthly_flights).unwrap();
        let fits =
            fit_hub_slopes(&effects.market_share, &effects.airport_hub_size, &effects.effect, Some(&weights))
                .unwrap();
        (draws, effects, fits)
    };
    let (draws, effects, fits) = run();
    let (_, effects2, fits2) = run();
    assert_eq!(effects.effect, effects2.effect);
    assert_eq!(fits.slopes(), fits2.slopes());

    assert_eq!(effects.n_obs(), 24);
    assert_eq!(fits.fits.len(), 4);
    for (fit, hub) in fits.fits.iter().zip(HubBin::ALL) {
        assert_eq!(fit.hub, hub);
        assert_eq!(fit.summary.n_obs, 6);
        assert!(fit.summary.slope.p2_5 <= fit.summary.slope.median);
        assert!(fit.summary.slope.median <= fit.summary.slope.p97_5);
    }

    let labels: Vec<String> = HubBin::ALL.iter().map(|h| h.label().to_string()).collect();
    let dom = dominance_matrix(&fits.slopes(), Some(&labels), DiagonalFill::Nan).unwrap();
    for i in 0..4 {
        assert!(dom.values[(i, i)].is_nan());
        for j in (0..4).filter(|&j| j != i) {
            let p = dom.values[(i, j)];
            assert!((0.0..=1.0).contains(&p));
            assert!(p + dom.values[(j, i)] <= 1.0 + 1e-12);
        }
    }

    // Point effects line up with the simulated rows and fit in every stratum.
    let points = point_effects(&grouped, &draws.true_params).unwrap();
    assert_eq!(points.len(), effects.n_obs());
    for (p, s) in points.iter().zip(&effects.market_share) {
        assert_eq!(p.market_share, *s);
    }
    let true_fits = fit_true_externality(&points, WeightScheme::MarketShareTimesFlights).unwrap();
    assert_eq!(true_fits.len(), 4);
    assert!(true_fits.iter().all(|f| f.n_dropped == 0 && f.slope.is_finite()));
}

#[test]
fn pooled_mode_replicates_columns() {
    let data = panel();
    let grouped = group_markets(&data);
    let mu = DVector::from_vec(vec![0.3, 0.2]);
    let sigma = DMatrix::from_row_slice(2, 2, &[0.01, 0.002, 0.002, 0.02]);
    let config = SamplerConfig { num_sims: 25, ..SamplerConfig::default() };
    let draws = draw_coefficients(SamplingMode::Pooled, &mu, &sigma, &config).unwrap();
    for s in 0..25 {
        for b in 1..4 {
            assert_eq!(draws.draws[(s, b)], draws.draws[(s, 0)]);
        }
    }
    assert!((draws.true_params[2] - 0.5).abs() < 1e-15);
    let effects = propagate_effects(&grouped, &draws.draws).unwrap();
    assert_eq!(effects.num_sims(), 25);
}
