//! Voxel-to-world transformation for volumes

use serde::{Deserialize, Serialize};

/// Axis-aligned mapping between voxel indices and world coordinates.
///
/// Axes are ordered like the array axes (slowest first), so for a volume of
/// shape `[depth, rows, cols]` the spacing reads `[dz, dy, dx]`:
/// ```text
/// world[k] = origin[k] + (index[k] + 0.5) * spacing[k]
/// ```
/// Volumes with fewer than three axes use the leading entries only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoxelTransform {
    /// World coordinate of the corner of the first voxel
    pub origin: [f64; 3],
    /// Voxel size along each axis
    pub spacing: [f64; 3],
}

impl VoxelTransform {
    /// Create a new transform
    pub fn new(origin: [f64; 3], spacing: [f64; 3]) -> Self {
        Self { origin, spacing }
    }

    /// Isotropic transform with the given voxel size and origin at zero
    pub fn isotropic(size: f64) -> Self {
        Self::new([0.0; 3], [size; 3])
    }

    /// Convert voxel indices to world coordinates of the voxel center
    pub fn voxel_to_world(&self, index: &[usize]) -> [f64; 3] {
        let mut world = self.origin;
        for (k, &i) in index.iter().take(3).enumerate() {
            world[k] = self.origin[k] + (i as f64 + 0.5) * self.spacing[k];
        }
        world
    }

    /// Convert world coordinates to fractional voxel indices
    ///
    /// Axes with zero spacing yield NaN.
    pub fn world_to_voxel(&self, world: [f64; 3]) -> [f64; 3] {
        let mut index = [f64::NAN; 3];
        for k in 0..3 {
            if self.spacing[k].abs() > 1e-12 {
                index[k] = (world[k] - self.origin[k]) / self.spacing[k] - 0.5;
            }
        }
        index
    }

    /// Volume of a single voxel (product of the first `ndim` spacings)
    pub fn voxel_volume(&self, ndim: usize) -> f64 {
        self.spacing.iter().take(ndim.min(3)).map(|s| s.abs()).product()
    }
}

impl Default for VoxelTransform {
    fn default() -> Self {
        Self::isotropic(1.0)
    }
}
