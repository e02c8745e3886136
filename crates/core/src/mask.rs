//! Voxel masks and region labels
//!
//! A mask is a volume whose finite, non-zero voxels are selected. When the
//! voxel values are integers they double as region labels: every distinct
//! non-zero value identifies one region; 0 is background.

use crate::error::{Error, Result};
use crate::volume::{Volume, VolumeElement};
use ndarray::{ArrayD, ArrayViewD, Dimension};
use std::collections::BTreeSet;

/// How the voxels of one region are reduced to a single value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reduction {
    /// Sum of voxel values
    Sum,
    /// Arithmetic mean of voxel values
    #[default]
    Mean,
}

impl std::str::FromStr for Reduction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "sum" => Ok(Reduction::Sum),
            "mean" | "avg" => Ok(Reduction::Mean),
            _ => Err(Error::InvalidParameter {
                name: "reduction",
                value: s.to_string(),
                reason: "expected sum or mean".into(),
            }),
        }
    }
}

impl Reduction {
    /// Reduce values gathered from one region
    pub fn apply(&self, values: impl Iterator<Item = f64>) -> f64 {
        let (sum, count) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
        match self {
            Reduction::Sum => sum,
            Reduction::Mean if count > 0 => sum / count as f64,
            Reduction::Mean => 0.0,
        }
    }
}

/// A voxel selection, optionally carrying integer region labels
#[derive(Debug, Clone)]
pub struct Mask {
    values: ArrayD<f64>,
}

impl Mask {
    /// Build a mask from any volume; finite non-zero voxels are selected
    pub fn from_volume<T: VolumeElement>(volume: &Volume<T>) -> Self {
        let values = volume
            .data()
            .mapv(|v| v.to_f64().unwrap_or(0.0))
            .as_standard_layout()
            .into_owned();
        Self { values }
    }

    /// Build a mask from raw values
    pub fn from_array(values: ArrayD<f64>) -> Self {
        Self {
            values: values.as_standard_layout().into_owned(),
        }
    }

    /// A mask selecting every voxel of the given shape
    pub fn full(shape: &[usize]) -> Self {
        Self {
            values: ArrayD::ones(ndarray::IxDyn(shape)),
        }
    }

    /// Turn a probability map into a binary mask (value > threshold)
    pub fn binarize(&self, threshold: f64) -> Self {
        Self {
            values: self
                .values
                .mapv(|v| if v > threshold { 1.0 } else { 0.0 }),
        }
    }

    /// Shape of the mask
    pub fn shape(&self) -> &[usize] {
        self.values.shape()
    }

    /// Check that `shape` matches the mask
    pub fn check_shape(&self, shape: &[usize]) -> Result<()> {
        if self.shape() != shape {
            return Err(Error::ShapeMismatch {
                expected: self.shape().to_vec(),
                actual: shape.to_vec(),
            });
        }
        Ok(())
    }

    /// Raw mask values
    pub fn values(&self) -> ArrayViewD<'_, f64> {
        self.values.view()
    }

    fn is_selected(v: f64) -> bool {
        v.is_finite() && v != 0.0
    }

    /// Flat row-major indices of selected voxels, in ascending order
    pub fn nonzero_indices(&self) -> Vec<usize> {
        self.values
            .iter()
            .enumerate()
            .filter(|&(_, &v)| Self::is_selected(v))
            .map(|(i, _)| i)
            .collect()
    }

    /// N-D coordinates of selected voxels, in row-major order
    pub fn nonzero_coordinates(&self) -> Vec<Vec<usize>> {
        self.values
            .indexed_iter()
            .filter(|&(_, &v)| Self::is_selected(v))
            .map(|(idx, _)| idx.slice().to_vec())
            .collect()
    }

    /// Number of selected voxels
    pub fn selected_count(&self) -> usize {
        self.values.iter().filter(|&&v| Self::is_selected(v)).count()
    }

    /// Sorted distinct region labels (selected values rounded to integers)
    pub fn labels(&self) -> Vec<i64> {
        self.values
            .iter()
            .filter(|&&v| Self::is_selected(v))
            .map(|&v| v.round() as i64)
            .filter(|&l| l != 0)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Flat indices of the voxels belonging to `label`
    pub fn region_indices(&self, label: i64) -> Vec<usize> {
        self.values
            .iter()
            .enumerate()
            .filter(|&(_, &v)| Self::is_selected(v) && v.round() as i64 == label)
            .map(|(i, _)| i)
            .collect()
    }

    /// Reduce `array` over the voxels of region `label`
    pub fn masked_reduction(
        &self,
        array: ArrayViewD<'_, f64>,
        label: i64,
        reduction: Reduction,
    ) -> Result<f64> {
        self.check_shape(array.shape())?;
        let indices = self.region_indices(label);
        if indices.is_empty() {
            return Err(Error::InvalidParameter {
                name: "region",
                value: label.to_string(),
                reason: "no voxel carries this label".into(),
            });
        }
        // Flat indices follow row-major order, which only matches a standard-layout view.
        let array = array.as_standard_layout();
        let flat = array
            .as_slice()
            .ok_or_else(|| Error::Other("array is not contiguous".into()))?;
        Ok(reduction.apply(indices.iter().map(|&i| flat[i])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    fn labeled_mask() -> Mask {
        // 2x3 labels: [1 1 0]
        //             [2 2 2]
        Mask::from_array(
            ArrayD::from_shape_vec(IxDyn(&[2, 3]), vec![1.0, 1.0, 0.0, 2.0, 2.0, 2.0]).unwrap(),
        )
    }

    #[test]
    fn test_nonzero_order() {
        let mask = labeled_mask();
        assert_eq!(mask.nonzero_indices(), vec![0, 1, 3, 4, 5]);
        assert_eq!(
            mask.nonzero_coordinates(),
            vec![vec![0, 0], vec![0, 1], vec![1, 0], vec![1, 1], vec![1, 2]]
        );
        assert_eq!(mask.selected_count(), 5);
    }

    #[test]
    fn test_labels() {
        let mask = labeled_mask();
        assert_eq!(mask.labels(), vec![1, 2]);
        assert_eq!(mask.region_indices(2), vec![3, 4, 5]);
    }

    #[test]
    fn test_masked_reduction() {
        let mask = labeled_mask();
        let values =
            ArrayD::from_shape_vec(IxDyn(&[2, 3]), vec![1.0, 3.0, 100.0, 2.0, 4.0, 6.0]).unwrap();

        let mean = mask.masked_reduction(values.view(), 1, Reduction::Mean).unwrap();
        assert!((mean - 2.0).abs() < 1e-12);
        let sum = mask.masked_reduction(values.view(), 2, Reduction::Sum).unwrap();
        assert!((sum - 12.0).abs() < 1e-12);
    }

    #[test]
    fn test_masked_reduction_shape_mismatch() {
        let mask = labeled_mask();
        let values = ArrayD::<f64>::zeros(IxDyn(&[3, 2]));
        assert!(mask.masked_reduction(values.view(), 1, Reduction::Mean).is_err());
    }

    #[test]
    fn test_nan_and_binarize() {
        let mask = Mask::from_array(
            ArrayD::from_shape_vec(IxDyn(&[4]), vec![f64::NAN, 0.02, 0.4, 0.9]).unwrap(),
        );
        assert_eq!(mask.nonzero_indices(), vec![1, 2, 3]);
        assert_eq!(mask.binarize(0.3).nonzero_indices(), vec![2, 3]);
    }

    #[test]
    fn test_reduction_from_str() {
        assert_eq!("SUM".parse::<Reduction>().unwrap(), Reduction::Sum);
        assert!("median".parse::<Reduction>().is_err());
    }
}
