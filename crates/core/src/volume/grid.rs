//! Main Volume type

use crate::error::{Error, Result};
use crate::volume::{VolumeElement, VoxelTransform};
use ndarray::{ArrayD, ArrayViewD, IxDyn};

/// An N-dimensional voxel grid.
///
/// `Volume<T>` stores values of type `T` in a row-major `ndarray` array with
/// associated voxel spacing and origin. Per-subject images are usually 3-D
/// (`[depth, rows, cols]`), but any rank is accepted; flattened data works too.
///
/// # Example
///
/// ```ignore
/// use voxmeta_core::Volume;
///
/// let mut volume: Volume<f64> = Volume::new(&[4, 5, 6]);
/// volume.set(&[1, 2, 3], 42.0)?;
/// assert_eq!(volume.get(&[1, 2, 3])?, 42.0);
/// ```
#[derive(Debug, Clone)]
pub struct Volume<T: VolumeElement> {
    /// Voxel data in standard (row-major) layout
    data: ArrayD<T>,
    /// Voxel spacing and origin
    transform: VoxelTransform,
}

impl<T: VolumeElement> Volume<T> {
    /// Create a new volume filled with zeros
    pub fn new(shape: &[usize]) -> Self {
        Self {
            data: ArrayD::zeros(IxDyn(shape)),
            transform: VoxelTransform::default(),
        }
    }

    /// Create a volume from row-major data
    pub fn from_vec(shape: &[usize], data: Vec<T>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(Error::ShapeMismatch {
                expected: shape.to_vec(),
                actual: vec![data.len()],
            });
        }

        let array = ArrayD::from_shape_vec(IxDyn(shape), data)
            .map_err(|e| Error::Other(e.to_string()))?;

        Ok(Self {
            data: array,
            transform: VoxelTransform::default(),
        })
    }

    /// Create a volume from an ndarray
    ///
    /// The array is copied into standard layout if needed so that flat
    /// indices always follow row-major order.
    pub fn from_array(data: ArrayD<T>) -> Self {
        let data = if data.is_standard_layout() {
            data
        } else {
            data.as_standard_layout().into_owned()
        };
        Self {
            data,
            transform: VoxelTransform::default(),
        }
    }

    /// Wrap `data` with this volume's metadata (template reuse for writers)
    pub fn with_data<U: VolumeElement>(&self, data: ArrayD<U>) -> Volume<U> {
        let mut volume = Volume::from_array(data);
        volume.set_transform(self.transform);
        volume
    }

    // Dimensions

    /// Shape of the volume
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// Number of axes
    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    /// Total number of voxels
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the volume is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    // Data access

    /// Get value at an N-D index
    pub fn get(&self, index: &[usize]) -> Result<T> {
        self.data
            .get(index)
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                index: flat_index(self.shape(), index),
                len: self.len(),
            })
    }

    /// Get value at a flat row-major index
    pub fn get_flat(&self, index: usize) -> Result<T> {
        self.data
            .as_slice()
            .and_then(|s| s.get(index))
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                index,
                len: self.len(),
            })
    }

    /// Set value at an N-D index
    pub fn set(&mut self, index: &[usize], value: T) -> Result<()> {
        let len = self.len();
        let flat = flat_index(self.shape(), index);
        match self.data.get_mut(index) {
            Some(v) => {
                *v = value;
                Ok(())
            }
            None => Err(Error::IndexOutOfBounds { index: flat, len }),
        }
    }

    /// Row-major slice of all voxels
    pub fn as_slice(&self) -> Option<&[T]> {
        self.data.as_slice()
    }

    /// Get a view of the underlying data
    pub fn view(&self) -> ArrayViewD<'_, T> {
        self.data.view()
    }

    /// Get a reference to the underlying array
    pub fn data(&self) -> &ArrayD<T> {
        &self.data
    }

    // Metadata

    /// Get the voxel transform
    pub fn transform(&self) -> &VoxelTransform {
        &self.transform
    }

    /// Set the voxel transform
    pub fn set_transform(&mut self, transform: VoxelTransform) {
        self.transform = transform;
    }

    /// Replace NaN voxels with zero
    pub fn nan_to_zero(&mut self) {
        self.data.mapv_inplace(|v| if v.is_nan() { T::zero() } else { v });
    }

    // Statistics

    /// Calculate basic statistics over non-NaN voxels
    pub fn statistics(&self) -> VolumeStatistics {
        let mut min: Option<f64> = None;
        let mut max: Option<f64> = None;
        let mut sum = 0.0;
        let mut valid_count = 0;
        let mut nonzero_count = 0;

        for v in self.data.iter().filter_map(|v| v.to_f64()) {
            if v.is_nan() {
                continue;
            }
            min = Some(min.map_or(v, |m| m.min(v)));
            max = Some(max.map_or(v, |m| m.max(v)));
            sum += v;
            valid_count += 1;
            if v != 0.0 {
                nonzero_count += 1;
            }
        }

        VolumeStatistics {
            min,
            max,
            mean: (valid_count > 0).then(|| sum / valid_count as f64),
            valid_count,
            nan_count: self.len() - valid_count,
            nonzero_count,
        }
    }
}

/// Row-major flat index of an N-D index (used for error reporting)
fn flat_index(shape: &[usize], index: &[usize]) -> usize {
    index
        .iter()
        .zip(shape)
        .fold(0, |acc, (&i, &n)| acc * n + i)
}

/// Basic statistics for a volume
#[derive(Debug, Clone)]
pub struct VolumeStatistics {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub valid_count: usize,
    pub nan_count: usize,
    pub nonzero_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_creation() {
        let volume: Volume<f32> = Volume::new(&[10, 20, 30]);
        assert_eq!(volume.shape(), &[10, 20, 30]);
        assert_eq!(volume.ndim(), 3);
        assert_eq!(volume.len(), 6000);
    }

    #[test]
    fn test_volume_access() {
        let mut volume: Volume<f64> = Volume::new(&[4, 4, 4]);
        volume.set(&[1, 2, 3], 42.0).unwrap();
        assert_eq!(volume.get(&[1, 2, 3]).unwrap(), 42.0);
        assert_eq!(volume.get_flat(16 + 8 + 3).unwrap(), 42.0);
        assert!(volume.get(&[4, 0, 0]).is_err());
        assert!(volume.set(&[0, 9, 0], 1.0).is_err());
    }

    #[test]
    fn test_from_vec_length_check() {
        assert!(Volume::from_vec(&[2, 3], vec![0.0_f64; 5]).is_err());
        let v = Volume::from_vec(&[2, 3], (0..6).map(|i| i as f64).collect()).unwrap();
        assert_eq!(v.get(&[1, 0]).unwrap(), 3.0);
    }

    #[test]
    fn test_with_data_keeps_metadata() {
        let mut template: Volume<f64> = Volume::new(&[2, 2]);
        template.set_transform(VoxelTransform::new([1.0, 2.0, 0.0], [0.5, 0.5, 1.0]));
        let out = template.with_data(ArrayD::<f32>::ones(IxDyn(&[2, 2])));
        assert_eq!(out.transform(), template.transform());
        assert_eq!(out.get(&[1, 1]).unwrap(), 1.0);
    }

    #[test]
    fn test_nan_to_zero() {
        let mut volume = Volume::from_vec(&[3], vec![1.0, f64::NAN, 2.0]).unwrap();
        volume.nan_to_zero();
        assert_eq!(volume.as_slice().unwrap(), &[1.0, 0.0, 2.0]);
    }

    #[test]
    fn test_volume_statistics() {
        let mut volume: Volume<f64> = Volume::new(&[10, 10]);
        for i in 0..10 {
            for j in 0..10 {
                volume.set(&[i, j], (i * 10 + j) as f64).unwrap();
            }
        }
        volume.set(&[0, 1], f64::NAN).unwrap();

        let stats = volume.statistics();
        assert_eq!(stats.min, Some(0.0));
        assert_eq!(stats.max, Some(99.0));
        assert_eq!(stats.valid_count, 99);
        assert_eq!(stats.nan_count, 1);
        assert_eq!(stats.nonzero_count, 98);
    }

    #[test]
    fn test_from_array_standard_layout() {
        let array = ndarray::Array2::from_shape_vec((2, 3), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
            .unwrap()
            .reversed_axes()
            .into_dyn();
        let volume = Volume::from_array(array);
        assert_eq!(volume.shape(), &[3, 2]);
        assert_eq!(volume.as_slice().unwrap(), &[1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    }
}
