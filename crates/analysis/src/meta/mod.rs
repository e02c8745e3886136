//! Meta-analysis drivers
//!
//! - **table**: one pooled result from a flat table of study statistics
//! - **voxelwise**: one pooled result per selected voxel of a volume
//! - **region**: one pooled result per labeled region of a mask

pub mod region;
pub mod table;
pub mod voxelwise;

pub use region::{RegionInput, RegionMeta, RegionResult, region_meta_analysis};
pub use table::{TableMeta, TableOutput, table_meta_analysis};
pub use voxelwise::{VoxelwiseInput, VoxelwiseMeta, VoxelwiseOutput, voxelwise_meta_analysis};

use crate::model::ModelKind;
use crate::study::EffectSizeMethod;
use voxmeta_parallel::ProcessingMode;

/// Parameters shared by every driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetaParams {
    /// Pooling model
    pub model: ModelKind,
    /// Effect size method
    pub method: EffectSizeMethod,
    /// Sequential or parallel execution
    pub mode: ProcessingMode,
    /// Voxels per parallel work unit (voxelwise driver)
    pub chunk_size: usize,
}

impl Default for MetaParams {
    fn default() -> Self {
        Self {
            model: ModelKind::Random,
            method: EffectSizeMethod::CohenD,
            mode: ProcessingMode::Parallel,
            chunk_size: 4096,
        }
    }
}
