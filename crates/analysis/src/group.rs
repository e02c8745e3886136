//! Groups: one label's population sample within one center
//!
//! A group is built in two phases. A [`RawGroup`] collects whatever the
//! caller has (raw observations stacked along axis 0, or precomputed summary
//! statistics) and [`RawGroup::derive`] turns it into an immutable [`Group`]
//! whose mean, standard deviation and count are computed exactly once.

use ndarray::{Array1, ArrayD, ArrayViewD, Axis, IxDyn};
use std::fmt;
use std::path::{Path, PathBuf};
use voxmeta_core::io::load_volumes;
use voxmeta_core::{Error, Reduction, Result};

/// Identity key of a group within a center
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Label(String);

impl Label {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Label {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Label {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<i64> for Label {
    fn from(v: i64) -> Self {
        Self(v.to_string())
    }
}

/// Summary statistics of one group at one location
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleStats {
    pub mean: f64,
    pub std: f64,
    pub count: usize,
}

impl SampleStats {
    pub fn new(mean: f64, std: f64, count: usize) -> Self {
        Self { mean, std, count }
    }
}

/// Where a group's input comes from
#[derive(Debug, Clone)]
pub enum GroupSource {
    /// Volume files, one per subject, loaded and stacked on derivation
    Paths(Vec<PathBuf>),
    /// Already materialized observations stacked along axis 0
    Observations(ArrayD<f64>),
}

/// Unvalidated group input
#[derive(Debug, Clone)]
pub struct RawGroup {
    label: Label,
    observations: Option<ArrayD<f64>>,
    mean: Option<ArrayD<f64>>,
    std: Option<ArrayD<f64>>,
    count: Option<usize>,
}

impl RawGroup {
    pub fn new(label: impl Into<Label>) -> Self {
        Self {
            label: label.into(),
            observations: None,
            mean: None,
            std: None,
            count: None,
        }
    }

    /// Raw observations, one subject per index along axis 0
    pub fn with_observations(mut self, observations: ArrayD<f64>) -> Self {
        self.observations = Some(observations);
        self
    }

    pub fn with_mean(mut self, mean: ArrayD<f64>) -> Self {
        self.mean = Some(mean);
        self
    }

    pub fn with_std(mut self, std: ArrayD<f64>) -> Self {
        self.std = Some(std);
        self
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    /// Precomputed summary statistics
    pub fn with_summary(self, mean: ArrayD<f64>, std: ArrayD<f64>, count: usize) -> Self {
        self.with_mean(mean).with_std(std).with_count(count)
    }

    /// Validate the input and compute mean, std and count.
    ///
    /// A complete summary takes precedence over observations. Otherwise the
    /// observations are reduced along axis 0 with the population standard
    /// deviation.
    pub fn derive(self) -> Result<Group> {
        let RawGroup {
            label,
            observations,
            mean,
            std,
            count,
        } = self;

        if let (Some(mean), Some(std), Some(count)) = (mean, std, count) {
            if mean.shape() != std.shape() {
                return Err(Error::ShapeMismatch {
                    expected: mean.shape().to_vec(),
                    actual: std.shape().to_vec(),
                });
            }
            // Kept observations must cover the summary's locations
            if let Some(obs) = &observations {
                let subject_shape = obs.shape().get(1..).unwrap_or(&[]);
                if obs.ndim() == 0 || subject_shape != mean.shape() {
                    return Err(Error::ShapeMismatch {
                        expected: mean.shape().to_vec(),
                        actual: subject_shape.to_vec(),
                    });
                }
            }
            return Ok(Group {
                label,
                mean: mean.as_standard_layout().into_owned(),
                std: std.as_standard_layout().into_owned(),
                count,
                observations,
            });
        }

        let Some(observations) = observations else {
            return Err(Error::MissingGroupInput {
                label: label.to_string(),
            });
        };
        if observations.ndim() == 0 || observations.len_of(Axis(0)) == 0 {
            return Err(Error::EmptyInput {
                field: "observations",
            });
        }

        let count = observations.len_of(Axis(0));
        let mean = observations
            .mean_axis(Axis(0))
            .ok_or(Error::EmptyInput {
                field: "observations",
            })?;
        let std = observations.std_axis(Axis(0), 0.0);

        Ok(Group {
            label,
            mean: mean.as_standard_layout().into_owned(),
            std: std.as_standard_layout().into_owned(),
            count,
            observations: Some(observations),
        })
    }
}

/// One label's sample with derived statistics
#[derive(Debug, Clone)]
pub struct Group {
    label: Label,
    mean: ArrayD<f64>,
    std: ArrayD<f64>,
    count: usize,
    observations: Option<ArrayD<f64>>,
}

impl Group {
    /// Group from observations stacked along axis 0
    pub fn from_observations(label: impl Into<Label>, observations: ArrayD<f64>) -> Result<Self> {
        RawGroup::new(label).with_observations(observations).derive()
    }

    /// Group from precomputed per-voxel summary statistics
    pub fn from_summary(
        label: impl Into<Label>,
        mean: ArrayD<f64>,
        std: ArrayD<f64>,
        count: usize,
    ) -> Result<Self> {
        RawGroup::new(label).with_summary(mean, std, count).derive()
    }

    /// Group from scalar summary statistics (table mode)
    pub fn from_scalar_summary(
        label: impl Into<Label>,
        mean: f64,
        std: f64,
        count: usize,
    ) -> Result<Self> {
        Self::from_summary(
            label,
            ArrayD::from_elem(IxDyn(&[]), mean),
            ArrayD::from_elem(IxDyn(&[]), std),
            count,
        )
    }

    /// Group from one volume file per subject
    pub fn from_paths<P: AsRef<Path>>(label: impl Into<Label>, paths: &[P]) -> Result<Self> {
        let observations = load_volumes(paths)?;
        Self::from_observations(label, observations)
    }

    /// Group from either paths or materialized observations
    pub fn from_source(label: impl Into<Label>, source: &GroupSource) -> Result<Self> {
        match source {
            GroupSource::Paths(paths) => Self::from_paths(label, paths),
            GroupSource::Observations(obs) => Self::from_observations(label, obs.clone()),
        }
    }

    pub fn label(&self) -> &Label {
        &self.label
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn mean(&self) -> ArrayViewD<'_, f64> {
        self.mean.view()
    }

    pub fn std(&self) -> ArrayViewD<'_, f64> {
        self.std.view()
    }

    /// Derived (mean, std, count); same values on every call
    pub fn mean_std_count(&self) -> (ArrayViewD<'_, f64>, ArrayViewD<'_, f64>, usize) {
        (self.mean.view(), self.std.view(), self.count)
    }

    /// Spatial shape (empty for scalar groups)
    pub fn shape(&self) -> &[usize] {
        self.mean.shape()
    }

    /// Number of locations (1 for scalar groups)
    pub fn len(&self) -> usize {
        self.mean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }

    /// Raw observations, when the group was built from them
    pub fn observations(&self) -> Option<ArrayViewD<'_, f64>> {
        self.observations.as_ref().map(|o| o.view())
    }

    /// Statistics at one flat (row-major) location
    pub fn stats_at(&self, index: usize) -> Result<SampleStats> {
        let len = self.mean.len();
        let (Some(mean), Some(std)) = (self.mean.as_slice(), self.std.as_slice()) else {
            return Err(Error::Other("group statistics are not contiguous".into()));
        };
        if index >= len {
            return Err(Error::IndexOutOfBounds { index, len });
        }
        Ok(SampleStats::new(mean[index], std[index], self.count))
    }

    /// Reduce every subject to one scalar over a region.
    ///
    /// `indices` are flat row-major positions within one subject's volume.
    /// The result is a scalar group whose statistics come from the reduced
    /// per-subject values.
    pub fn reduce_region(&self, indices: &[usize], reduction: Reduction) -> Result<Group> {
        let observations = self
            .observations
            .as_ref()
            .ok_or_else(|| Error::MissingObservations {
                label: self.label.to_string(),
            })?;

        let per_subject: usize = observations.shape()[1..].iter().product();
        if let Some(&bad) = indices.iter().find(|&&i| i >= per_subject) {
            return Err(Error::IndexOutOfBounds {
                index: bad,
                len: per_subject,
            });
        }

        let reduced: Array1<f64> = observations
            .outer_iter()
            .map(|subject| {
                let subject = subject.as_standard_layout();
                match subject.as_slice() {
                    Some(flat) => reduction.apply(indices.iter().map(|&i| flat[i])),
                    None => f64::NAN,
                }
            })
            .collect();

        Group::from_observations(self.label.clone(), reduced.into_dyn())
    }
}
