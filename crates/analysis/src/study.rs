//! Studies: one center's experimental vs. control comparison

use crate::group::SampleStats;
use crate::model::stats::{Z_95, confidence_interval};
use std::str::FromStr;
use voxmeta_core::{Error, Result};

/// Effect size methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EffectSizeMethod {
    /// Standardized mean difference over the pooled standard deviation
    #[default]
    CohenD,
    /// Cohen's d with the small-sample bias correction
    HedgesG,
}

impl EffectSizeMethod {
    /// Identifier accepted by `FromStr`
    pub fn as_str(&self) -> &'static str {
        match self {
            EffectSizeMethod::CohenD => "cohen_d",
            EffectSizeMethod::HedgesG => "hedge_g",
        }
    }

    /// Compute (effect size, pooled standard deviation)
    pub fn compute(&self, experimental: &SampleStats, control: &SampleStats) -> (f64, f64) {
        let s = pooled_std(experimental, control);
        let d = (experimental.mean - control.mean) / s;
        let es = match self {
            EffectSizeMethod::CohenD => d,
            EffectSizeMethod::HedgesG => {
                hedges_correction(experimental.count + control.count) * d
            }
        };
        (es, s)
    }
}

impl std::fmt::Display for EffectSizeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EffectSizeMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "cohen_d" | "cohen" | "d" => Ok(EffectSizeMethod::CohenD),
            "hedge_g" | "hedges_g" | "g" => Ok(EffectSizeMethod::HedgesG),
            _ => Err(Error::UnknownMethod(s.to_string())),
        }
    }
}

/// Pooled standard deviation of two samples
///
/// `s = sqrt(((n1-1)s1² + (n2-1)s2²) / (n1+n2-2))`
pub fn pooled_std(a: &SampleStats, b: &SampleStats) -> f64 {
    let n1 = a.count as f64;
    let n2 = b.count as f64;
    (((n1 - 1.0) * a.std * a.std + (n2 - 1.0) * b.std * b.std) / (n1 + n2 - 2.0)).sqrt()
}

/// Small-sample correction factor `1 - 3/(4N - 9)` for total sample size N
pub fn hedges_correction(total: usize) -> f64 {
    1.0 - 3.0 / (4.0 * total as f64 - 9.0)
}

/// One center's comparison at one location.
///
/// The effect size is computed once in [`Study::new`]; accessors only
/// read it back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Study<'a> {
    name: &'a str,
    method: EffectSizeMethod,
    experimental: SampleStats,
    control: SampleStats,
    effect_size: f64,
    pooled_std: f64,
}

impl<'a> Study<'a> {
    /// Pair two samples; each group needs at least two observations
    pub fn new(
        name: &'a str,
        method: EffectSizeMethod,
        experimental: SampleStats,
        control: SampleStats,
    ) -> Result<Self> {
        if experimental.count < 2 || control.count < 2 {
            return Err(Error::InsufficientSamples {
                count1: experimental.count,
                count2: control.count,
            });
        }
        let (effect_size, pooled_std) = method.compute(&experimental, &control);
        Ok(Self {
            name,
            method,
            experimental,
            control,
            effect_size,
            pooled_std,
        })
    }

    /// Center name
    pub fn name(&self) -> &'a str {
        self.name
    }

    pub fn method(&self) -> EffectSizeMethod {
        self.method
    }

    pub fn experimental(&self) -> &SampleStats {
        &self.experimental
    }

    pub fn control(&self) -> &SampleStats {
        &self.control
    }

    pub fn effect_size(&self) -> f64 {
        self.effect_size
    }

    pub fn pooled_std(&self) -> f64 {
        self.pooled_std
    }

    /// Pooled variance, used as the study's weighting variance
    pub fn variance(&self) -> f64 {
        self.pooled_std * self.pooled_std
    }

    pub fn standard_error(&self) -> f64 {
        self.variance().sqrt()
    }

    /// 95% confidence interval of this study's effect size
    pub fn confidence_interval(&self) -> (f64, f64) {
        confidence_interval(self.effect_size, self.standard_error())
    }

    /// Half-width of the 95% interval
    pub fn margin(&self) -> f64 {
        Z_95 * self.standard_error()
    }
}
