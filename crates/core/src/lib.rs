//! # voxmeta Core
//!
//! Core types, traits and I/O for the voxmeta meta-analysis toolkit.
//!
//! This crate provides:
//! - `Volume<T>`: Generic N-D volume type
//! - `VoxelTransform`: Voxel spacing and origin
//! - `Mask`: Binary or labeled selection of voxels
//! - Algorithm traits for consistent API
//! - I/O for TIFF volumes and CSV study tables

pub mod error;
pub mod io;
pub mod mask;
pub mod volume;

pub use error::{Error, Result};
pub use mask::{Mask, Reduction};
pub use volume::{Volume, VolumeElement, VoxelTransform};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::Algorithm;
    pub use crate::error::{Error, Result};
    pub use crate::mask::{Mask, Reduction};
    pub use crate::volume::{Volume, VolumeElement, VoxelTransform};
}

/// Core trait for all algorithms in voxmeta.
///
/// Algorithms are pure functions that transform input data according to parameters.
pub trait Algorithm {
    /// Input type for the algorithm
    type Input;
    /// Output type for the algorithm
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    /// Error type for algorithm execution
    type Error: std::error::Error;

    /// Returns the algorithm name
    fn name(&self) -> &'static str;

    /// Returns a description of what the algorithm does
    fn description(&self) -> &'static str;

    /// Execute the algorithm
    fn execute(
        &self,
        input: Self::Input,
        params: Self::Params,
    ) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(
        &self,
        input: Self::Input,
    ) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
