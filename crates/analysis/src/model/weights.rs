//! Study weighting for the fixed-effect and random-effects models

use super::stats::inverse_variance;

/// Fixed-effect weights `1 / vᵢ`
pub fn fixed_weights(variances: &[f64], weights: &mut Vec<f64>) {
    weights.clear();
    weights.extend(variances.iter().map(|&v| inverse_variance(v)));
}

/// DerSimonian–Laird random-effects weights `1 / (vᵢ + τ²)`.
///
/// Returns τ². The dispersion statistic is taken over the study variances
/// around the mean effect size, `Q = Σ (vᵢ − mean(es))² / vᵢ`. τ² is floored
/// at zero and set to zero when it cannot be estimated (a single study, or
/// a non-finite estimate).
pub fn random_weights(effect_sizes: &[f64], variances: &[f64], weights: &mut Vec<f64>) -> f64 {
    let n = effect_sizes.len();
    let mean_es = effect_sizes.iter().sum::<f64>() / n as f64;

    let q: f64 = variances
        .iter()
        .map(|&v| (v - mean_es) * (v - mean_es) / v)
        .sum();
    let df = n as f64 - 1.0;

    let (sum_w, sum_w2) = variances.iter().fold((0.0, 0.0), |(s, s2), &v| {
        let w = inverse_variance(v);
        (s + w, s2 + w * w)
    });
    let c = sum_w - sum_w2 / sum_w;

    // C vanishes for a single study; rounding can leave a tiny residue
    let tau_squared = if n > 1 && c > f64::EPSILON * sum_w {
        let t = (q - df) / c;
        if t.is_finite() { t.max(0.0) } else { 0.0 }
    } else {
        0.0
    };

    weights.clear();
    weights.extend(variances.iter().map(|&v| inverse_variance(v + tau_squared)));
    tau_squared
}
