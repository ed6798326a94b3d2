//! JSON artifacts and text tables for `hubext` outputs.
//!
//! Non-finite numbers (the dominance diagonal) serialize as `null`.

use hx_core::{HubBin, SummaryStats};
use hx_inference::{DominanceMatrix, TrueFit};
use serde_json::{Value, json};
use std::fmt::Write as _;

use crate::pipeline::{SimulationReport, TrueEffectReport, method_name, mode_name, weights_name};

pub fn effects_summary_json(report: &SimulationReport) -> Value {
    let hubs: Vec<Value> = report
        .regression
        .fits
        .iter()
        .map(|f| {
            json!({
                "hub": f.hub.index(),
                "label": f.hub.label(),
                "n_obs": f.summary.n_obs,
                "intercept": f.summary.intercept,
                "slope": f.summary.slope,
            })
        })
        .collect();

    json!({
        "tool": "hubext",
        "tool_version": hx_core::VERSION,
        "mode": mode_name(report.options.mode),
        "num_sims": report.options.num_sims,
        "seed": report.options.seed,
        "method": method_name(report.method),
        "weights": weights_name(report.options.weights),
        "n_observations": report.n_observations,
        "n_markets": report.n_markets,
        "n_skipped_markets": report.n_skipped_markets,
        "n_rows": report.n_rows,
        "true_params": report.true_params,
        "hubs": hubs,
        "absent_hubs": hub_codes(&report.regression.absent_hubs()),
        "slopes": report.regression.slopes(),
        "intercepts": report.regression.intercepts(),
    })
}

pub fn dominance_json(quantity: &str, matrix: &DominanceMatrix) -> Value {
    json!({
        "quantity": quantity,
        "labels": matrix.labels,
        "values": matrix.rows(),
    })
}

/// Everything `simulate` prints or writes as one document.
pub fn simulation_json(report: &SimulationReport) -> Value {
    let mut v = effects_summary_json(report);
    v["dominance"] = json!({
        "slope": dominance_json("slope", &report.slope_dominance),
        "intercept": dominance_json("intercept", &report.intercept_dominance),
    });
    v
}

pub fn true_externality_json(report: &TrueEffectReport) -> Value {
    json!({
        "mode": mode_name(report.mode),
        "weights": weights_name(Some(report.weights)),
        "true_params": report.true_params,
        "n_points": report.points.len(),
        "fits": report.fits,
        "absent_hubs": hub_codes(&absent_fits(&report.fits)),
    })
}

pub fn smoothing_json(report: &TrueEffectReport) -> Value {
    let curves: Vec<Value> = report
        .effect_curves
        .iter()
        .map(|(hub, c)| json!({ "hub": hub.index(), "label": hub.airport_description(), "x": c.x, "y": c.y }))
        .collect();
    let densities: Vec<Value> = report
        .share_densities
        .iter()
        .map(|(hub, d)| {
            json!({
                "hub": hub.index(),
                "label": hub.label(),
                "x": d.x,
                "density": d.density,
                "share_weighted": d.share_weighted,
            })
        })
        .collect();
    json!({
        "bandwidth": report.smoothing.bandwidth,
        "n_grid": report.smoothing.n_grid,
        "density_grid": report.smoothing.density_grid,
        "density_range": [report.smoothing.density_range.0, report.smoothing.density_range.1],
        "effect_by_hub": curves,
        "market_share_density": densities,
    })
}

fn hub_codes(hubs: &[HubBin]) -> Vec<usize> {
    hubs.iter().map(|h| h.index()).collect()
}

fn absent_fits(fits: &[TrueFit]) -> Vec<HubBin> {
    HubBin::ALL.into_iter().filter(|h| fits.iter().all(|f| f.hub != *h)).collect()
}

fn fmt_num(v: f64) -> String {
    if v.is_nan() { "NaN".to_string() } else { format!("{v:.6}") }
}

fn stat(s: &SummaryStats, row: &str) -> f64 {
    match row {
        "median" => s.median,
        "mean" => s.mean,
        "p2_5" => s.p2_5,
        _ => s.p97_5,
    }
}

/// Per-hub tables: rows median/mean/p2_5/p97_5, columns n_obs/intercept/slope.
///
/// Each hub block starts with `Hub size: <code>` followed by the indented table.
pub fn summary_tables(summaries: &[(HubBin, hx_inference::HubSummary)]) -> String {
    let mut out = String::new();
    for (hub, s) in summaries {
        let _ = writeln!(out, "Hub size: {hub}");
        let _ = writeln!(out, "    {:<8} {:>8} {:>14} {:>14}", "", "n_obs", "intercept", "slope");
        for row in ["median", "mean", "p2_5", "p97_5"] {
            let _ = writeln!(
                out,
                "    {:<8} {:>8} {:>14} {:>14}",
                row,
                s.n_obs,
                fmt_num(stat(&s.intercept, row)),
                fmt_num(stat(&s.slope, row))
            );
        }
    }
    out
}

pub fn dominance_table(title: &str, matrix: &DominanceMatrix) -> String {
    let mut out = format!("{title}\n");
    let _ = write!(out, "    {:<8}", "");
    for l in &matrix.labels {
        let _ = write!(out, " {l:>8}");
    }
    out.push('\n');
    for (i, label) in matrix.labels.iter().enumerate() {
        let _ = write!(out, "    {label:<8}");
        for j in 0..matrix.len() {
            let v = matrix.values[(i, j)];
            let cell = if v.is_nan() { "NaN".to_string() } else { format!("{v:.3}") };
            let _ = write!(out, " {cell:>8}");
        }
        out.push('\n');
    }
    out
}
