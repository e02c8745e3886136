//! Fixed-effect and random-effects pooling models
//!
//! Both models pool per-study `(effect size, variance)` pairs with
//! inverse-variance weights; they differ only in how the weights are
//! formed. See [`weights`] for the two weighting schemes.

pub mod stats;
pub mod weights;

use crate::study::Study;
use stats::{Tail, confidence_interval, heterogeneity, p_from_z, z_value};
use std::str::FromStr;
use voxmeta_core::{Error, Result};

/// Pooling model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelKind {
    /// One true effect shared by all studies
    Fixed,
    /// DerSimonian–Laird between-study variance added to every study
    #[default]
    Random,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Fixed => "fixed",
            ModelKind::Random => "random",
        }
    }

    /// Fill `weights` for the given studies and return τ² (0 for fixed)
    fn weigh(&self, effect_sizes: &[f64], variances: &[f64], out: &mut Vec<f64>) -> f64 {
        match self {
            ModelKind::Fixed => {
                weights::fixed_weights(variances, out);
                0.0
            }
            ModelKind::Random => weights::random_weights(effect_sizes, variances, out),
        }
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "fixed" => Ok(ModelKind::Fixed),
            "random" => Ok(ModelKind::Random),
            _ => Err(Error::UnknownModel(s.to_string())),
        }
    }
}

/// Output channels of a pooled result, in storage order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaChannel {
    EffectSize,
    Variance,
    StandardError,
    LowerLimit,
    UpperLimit,
    Heterogeneity,
    Z,
    P,
}

impl MetaChannel {
    pub const ALL: [MetaChannel; 8] = [
        MetaChannel::EffectSize,
        MetaChannel::Variance,
        MetaChannel::StandardError,
        MetaChannel::LowerLimit,
        MetaChannel::UpperLimit,
        MetaChannel::Heterogeneity,
        MetaChannel::Z,
        MetaChannel::P,
    ];

    /// Position along the channel axis
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn name(&self) -> &'static str {
        match self {
            MetaChannel::EffectSize => "effect_size",
            MetaChannel::Variance => "variance",
            MetaChannel::StandardError => "standard_error",
            MetaChannel::LowerLimit => "lower_limit",
            MetaChannel::UpperLimit => "upper_limit",
            MetaChannel::Heterogeneity => "heterogeneity",
            MetaChannel::Z => "z",
            MetaChannel::P => "p",
        }
    }
}

/// Pooled statistics of one aggregation
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MetaResult {
    pub effect_size: f64,
    pub variance: f64,
    pub standard_error: f64,
    pub lower_limit: f64,
    pub upper_limit: f64,
    pub heterogeneity: f64,
    pub z: f64,
    pub p: f64,
}

impl MetaResult {
    /// Number of channels
    pub const CHANNELS: usize = 8;

    /// Values in [`MetaChannel::ALL`] order
    pub fn to_array(&self) -> [f64; 8] {
        [
            self.effect_size,
            self.variance,
            self.standard_error,
            self.lower_limit,
            self.upper_limit,
            self.heterogeneity,
            self.z,
            self.p,
        ]
    }

    pub fn get(&self, channel: MetaChannel) -> f64 {
        self.to_array()[channel.index()]
    }
}

fn validate(effect_sizes: &[f64], variances: &[f64]) -> Result<()> {
    if effect_sizes.len() != variances.len() {
        return Err(Error::ShapeMismatch {
            expected: vec![effect_sizes.len()],
            actual: vec![variances.len()],
        });
    }
    if effect_sizes.is_empty() {
        return Err(Error::NoStudies);
    }
    for (index, (&es, &v)) in effect_sizes.iter().zip(variances).enumerate() {
        if !(v.is_finite() && v > 0.0) {
            return Err(Error::NonPositiveVariance { index, value: v });
        }
        if !es.is_finite() {
            return Err(Error::NonFiniteEffectSize { index });
        }
    }
    Ok(())
}

fn summarize(effect_sizes: &[f64], weights: &[f64]) -> MetaResult {
    let (sum_w, sum_ew) = effect_sizes
        .iter()
        .zip(weights)
        .fold((0.0, 0.0), |(s, se), (&es, &w)| (s + w, se + es * w));

    let effect_size = sum_ew / sum_w;
    let variance = 1.0 / sum_w;
    let standard_error = variance.sqrt();
    let (lower_limit, upper_limit) = confidence_interval(effect_size, standard_error);
    let z = z_value(effect_size, standard_error, 0.0);

    MetaResult {
        effect_size,
        variance,
        standard_error,
        lower_limit,
        upper_limit,
        heterogeneity: heterogeneity(effect_sizes, weights, effect_size),
        z,
        p: p_from_z(z, Tail::TwoSided),
    }
}

/// Pool studies without keeping the weights.
///
/// `scratch` is reused for the weights so a caller pooling many locations
/// allocates once.
pub fn pool(
    kind: ModelKind,
    effect_sizes: &[f64],
    variances: &[f64],
    scratch: &mut Vec<f64>,
) -> Result<MetaResult> {
    validate(effect_sizes, variances)?;
    kind.weigh(effect_sizes, variances, scratch);
    Ok(summarize(effect_sizes, scratch))
}

/// One row of a forest plot
#[derive(Debug, Clone, PartialEq)]
pub struct ForestRow {
    pub name: String,
    pub effect_size: f64,
    pub variance: f64,
    pub lower: f64,
    pub upper: f64,
    /// Share of the total weight, in percent
    pub weight_percent: f64,
}

/// A fitted pooling model
#[derive(Debug, Clone)]
pub struct Model {
    kind: ModelKind,
    effect_sizes: Vec<f64>,
    variances: Vec<f64>,
    weights: Vec<f64>,
    tau_squared: f64,
    result: MetaResult,
}

impl Model {
    /// Fit a model to per-study effect sizes and variances
    pub fn fit(kind: ModelKind, effect_sizes: &[f64], variances: &[f64]) -> Result<Self> {
        validate(effect_sizes, variances)?;
        let mut weights = Vec::with_capacity(effect_sizes.len());
        let tau_squared = kind.weigh(effect_sizes, variances, &mut weights);
        let result = summarize(effect_sizes, &weights);
        Ok(Self {
            kind,
            effect_sizes: effect_sizes.to_vec(),
            variances: variances.to_vec(),
            weights,
            tau_squared,
            result,
        })
    }

    /// Fit a model to studies
    pub fn from_studies(kind: ModelKind, studies: &[Study<'_>]) -> Result<Self> {
        let (es, var): (Vec<f64>, Vec<f64>) = studies
            .iter()
            .map(|s| (s.effect_size(), s.variance()))
            .unzip();
        Self::fit(kind, &es, &var)
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.effect_sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effect_sizes.is_empty()
    }

    pub fn effect_sizes(&self) -> &[f64] {
        &self.effect_sizes
    }

    pub fn variances(&self) -> &[f64] {
        &self.variances
    }

    /// Per-study weights (unnormalized)
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Between-study variance; always 0 for the fixed model
    pub fn tau_squared(&self) -> f64 {
        self.tau_squared
    }

    pub fn result(&self) -> &MetaResult {
        &self.result
    }

    /// Per-study forest plot rows; `studies` must be the ones this model was fit on
    pub fn forest(&self, studies: &[Study<'_>]) -> Result<Vec<ForestRow>> {
        if studies.len() != self.len() {
            return Err(Error::ShapeMismatch {
                expected: vec![self.len()],
                actual: vec![studies.len()],
            });
        }
        let total: f64 = self.weights.iter().sum();
        Ok(studies
            .iter()
            .zip(&self.weights)
            .map(|(study, &w)| {
                let (lower, upper) = study.confidence_interval();
                ForestRow {
                    name: study.name().to_string(),
                    effect_size: study.effect_size(),
                    variance: study.variance(),
                    lower,
                    upper,
                    weight_percent: 100.0 * w / total,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::SampleStats;
    use crate::study::EffectSizeMethod;
    use approx::assert_relative_eq;

    const ES: [f64; 5] = [0.12, 0.85, -0.30, 0.44, 1.10];
    const VAR: [f64; 5] = [0.04, 0.09, 0.02, 0.16, 0.05];

    #[test]
    fn test_fixed_equal_studies() {
        let model = Model::fit(ModelKind::Fixed, &[0.7, 0.7], &[0.3, 0.3]).unwrap();
        let r = model.result();
        assert_relative_eq!(r.effect_size, 0.7, epsilon = 1e-12);
        assert_relative_eq!(r.variance, 0.15, epsilon = 1e-12);
        assert_relative_eq!(r.heterogeneity, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_fixed_weighted_mean() {
        let model = Model::fit(ModelKind::Fixed, &[1.0, 2.0], &[1.0, 0.5]).unwrap();
        // weights 1 and 2
        let r = model.result();
        assert_relative_eq!(r.effect_size, 5.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(r.variance, 1.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(r.standard_error, (1.0_f64 / 3.0).sqrt(), epsilon = 1e-12);
        // Q = 1*(1-5/3)^2 + 2*(2-5/3)^2 = 4/9 + 2/9
        assert_relative_eq!(r.heterogeneity, 2.0 / 3.0, epsilon = 1e-12);
        assert_eq!(model.tau_squared(), 0.0);
    }

    #[test]
    fn test_random_variance_not_below_fixed() {
        let fixed = Model::fit(ModelKind::Fixed, &ES, &VAR).unwrap();
        let random = Model::fit(ModelKind::Random, &ES, &VAR).unwrap();
        assert!(random.tau_squared() >= 0.0);
        assert!(
            random.result().variance >= fixed.result().variance,
            "random {} < fixed {}",
            random.result().variance,
            fixed.result().variance
        );
    }

    #[test]
    fn test_tau_squared_never_negative() {
        let cases: [(&[f64], &[f64]); 4] = [
            (&[0.0, 0.0], &[1.0, 1.0]),
            (&[5.0, -5.0, 0.1], &[0.01, 2.0, 9.0]),
            (&[0.3], &[0.2]),
            (&[100.0, 100.0, 100.0, 100.0], &[1e-6, 1e3, 1.0, 0.5]),
        ];
        for (es, var) in cases {
            let model = Model::fit(ModelKind::Random, es, var).unwrap();
            assert!(model.tau_squared() >= 0.0, "tau2 {} for {:?}", model.tau_squared(), es);
        }
    }

    #[test]
    fn test_confidence_interval_brackets() {
        for kind in [ModelKind::Fixed, ModelKind::Random] {
            let r = *Model::fit(kind, &ES, &VAR).unwrap().result();
            assert!(r.lower_limit <= r.effect_size && r.effect_size <= r.upper_limit);
            assert_relative_eq!(
                r.upper_limit - r.lower_limit,
                2.0 * 1.96 * r.standard_error,
                epsilon = 1e-12
            );
            assert_relative_eq!(r.z, r.effect_size / r.standard_error, epsilon = 1e-12);
            assert!((0.0..=1.0).contains(&r.p));
        }
    }

    #[test]
    fn test_null_effect_p_is_one() {
        let r = *Model::fit(ModelKind::Fixed, &[0.5, -0.5], &[1.0, 1.0]).unwrap().result();
        assert_eq!(r.z, 0.0);
        assert_relative_eq!(r.p, 1.0, epsilon = 1e-15);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(matches!(Model::fit(ModelKind::Fixed, &[], &[]), Err(Error::NoStudies)));
        assert!(matches!(
            Model::fit(ModelKind::Random, &[0.1, 0.2], &[0.1, 0.0]),
            Err(Error::NonPositiveVariance { index: 1, .. })
        ));
        assert!(matches!(
            Model::fit(ModelKind::Random, &[f64::INFINITY], &[0.1]),
            Err(Error::NonFiniteEffectSize { index: 0 })
        ));
        assert!(matches!(
            Model::fit(ModelKind::Fixed, &[0.1], &[0.1, 0.2]),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_pool_matches_fit() {
        let mut scratch = Vec::new();
        for kind in [ModelKind::Fixed, ModelKind::Random] {
            let pooled = pool(kind, &ES, &VAR, &mut scratch).unwrap();
            let fitted = Model::fit(kind, &ES, &VAR).unwrap();
            assert_eq!(&pooled, fitted.result());
        }
    }

    #[test]
    fn test_forest_weights_sum_to_100() {
        let stats = [
            (SampleStats::new(10.0, 2.0, 20), SampleStats::new(8.0, 2.0, 20)),
            (SampleStats::new(9.0, 3.0, 15), SampleStats::new(8.5, 2.5, 18)),
            (SampleStats::new(11.0, 1.5, 30), SampleStats::new(9.0, 1.8, 25)),
        ];
        let names = ["a", "b", "c"];
        let studies: Vec<_> = stats
            .iter()
            .zip(names)
            .map(|((e, c), n)| Study::new(n, EffectSizeMethod::CohenD, *e, *c).unwrap())
            .collect();

        let model = Model::from_studies(ModelKind::Random, &studies).unwrap();
        let rows = model.forest(&studies).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].name, "b");
        let total: f64 = rows.iter().map(|r| r.weight_percent).sum();
        assert_relative_eq!(total, 100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_model_from_str() {
        assert_eq!("Fixed".parse::<ModelKind>().unwrap(), ModelKind::Fixed);
        assert_eq!("random".parse::<ModelKind>().unwrap(), ModelKind::Random);
        assert!(matches!("bayes".parse::<ModelKind>(), Err(Error::UnknownModel(_))));
    }

    #[test]
    fn test_channel_order() {
        let names: Vec<_> = MetaChannel::ALL.iter().map(|c| c.name()).collect();
        assert_eq!(
            names,
            [
                "effect_size",
                "variance",
                "standard_error",
                "lower_limit",
                "upper_limit",
                "heterogeneity",
                "z",
                "p"
            ]
        );
        for (i, c) in MetaChannel::ALL.iter().enumerate() {
            assert_eq!(c.index(), i);
        }
    }
}
