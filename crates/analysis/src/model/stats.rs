//! Statistics helpers shared by the pooling models

use statrs::distribution::{ContinuousCDF, Normal};

/// Two-sided 95% standard-normal quantile
pub const Z_95: f64 = 1.96;

/// Which tail(s) a p-value covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tail {
    OneSided,
    #[default]
    TwoSided,
}

/// Inverse-variance weight `1 / v`
#[inline]
pub fn inverse_variance(variance: f64) -> f64 {
    1.0 / variance
}

/// 95% confidence interval `es ± 1.96·se`
#[inline]
pub fn confidence_interval(effect_size: f64, standard_error: f64) -> (f64, f64) {
    let margin = Z_95 * standard_error;
    (effect_size - margin, effect_size + margin)
}

/// Cochran's Q: `Σ wᵢ·(esᵢ − total)²`
pub fn heterogeneity(effect_sizes: &[f64], weights: &[f64], total: f64) -> f64 {
    effect_sizes
        .iter()
        .zip(weights)
        .map(|(&es, &w)| w * (es - total) * (es - total))
        .sum()
}

/// z statistic of `x` against the null value `x0`
#[inline]
pub fn z_value(x: f64, standard_error: f64, x0: f64) -> f64 {
    (x - x0) / standard_error
}

/// Standard-normal p-value of `z`
pub fn p_from_z(z: f64, tail: Tail) -> f64 {
    let upper = Normal::standard().sf(z.abs());
    match tail {
        Tail::OneSided => upper,
        Tail::TwoSided => (2.0 * upper).min(1.0),
    }
}
