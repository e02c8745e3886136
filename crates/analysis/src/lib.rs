//! # voxmeta Analysis
//!
//! Meta-analysis engine for multi-center studies.
//!
//! ## Modules
//!
//! - **group**: per-label samples (raw observations or summary statistics)
//! - **study**: effect sizes (Cohen's d, Hedges' g) for one center
//! - **center**: centers and the cross-center evidence set
//! - **model**: fixed-effect and random-effects (DerSimonian–Laird) pooling
//! - **meta**: table, voxelwise and region drivers

pub mod center;
pub mod group;
pub mod meta;
pub mod model;
pub mod study;

pub use center::{Center, Centers, GroupPair, Location};
pub use group::{Group, GroupSource, Label, RawGroup, SampleStats};
pub use meta::{
    MetaParams, RegionInput, RegionMeta, RegionResult, TableMeta, TableOutput, VoxelwiseInput,
    VoxelwiseMeta, VoxelwiseOutput, region_meta_analysis, table_meta_analysis,
    voxelwise_meta_analysis,
};
pub use model::{ForestRow, MetaChannel, MetaResult, Model, ModelKind, pool};
pub use study::{EffectSizeMethod, Study};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::center::{Center, Centers, Location};
    pub use crate::group::{Group, GroupSource, Label};
    pub use crate::meta::{
        MetaParams, RegionInput, RegionMeta, TableMeta, VoxelwiseInput, VoxelwiseMeta,
        region_meta_analysis, table_meta_analysis, voxelwise_meta_analysis,
    };
    pub use crate::model::{MetaChannel, MetaResult, Model, ModelKind};
    pub use crate::study::{EffectSizeMethod, Study};
    pub use voxmeta_core::prelude::*;
    pub use voxmeta_parallel::ProcessingMode;
}
