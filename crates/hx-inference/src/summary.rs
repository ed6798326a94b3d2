//! Location summaries of simulation draws.

use hx_core::SummaryStats;

/// Median, mean, 2.5th and 97.5th percentile. Empty input gives all-`NaN`.
///
/// Percentiles interpolate between neighbouring order statistics at rank
/// `q (n - 1)`.
pub fn summarize(samples: &[f64]) -> SummaryStats {
    let n = samples.len();
    if n == 0 {
        return SummaryStats { median: f64::NAN, mean: f64::NAN, p2_5: f64::NAN, p97_5: f64::NAN };
    }

    let mut order = samples.to_vec();
    order.sort_by(f64::total_cmp);
    let last = n - 1;
    let at_rank = |q: f64| {
        let rank = q * last as f64;
        let below = rank.floor() as usize;
        let above = (below + 1).min(last);
        let frac = rank - below as f64;
        order[below] + frac * (order[above] - order[below])
    };

    SummaryStats {
        median: at_rank(0.5),
        mean: order.iter().sum::<f64>() / n as f64,
        p2_5: at_rank(0.025),
        p97_5: at_rank(0.975),
    }
}
