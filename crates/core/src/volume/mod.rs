//! Volume data structures and operations

mod element;
mod grid;
mod transform;

pub use element::VolumeElement;
pub use grid::{Volume, VolumeStatistics};
pub use transform::VoxelTransform;
