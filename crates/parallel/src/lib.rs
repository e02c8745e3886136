//! # voxmeta Parallel
//!
//! Parallel processing strategies for voxelwise algorithms.
//!
//! This crate provides:
//! - Processing modes (sequential, all cores, fixed thread count)
//! - Chunked processing over a flat list of voxel coordinates
//!
//! Without the `parallel` feature every mode runs sequentially.

pub mod chunked;
pub mod strategy;

pub use chunked::{Chunk, ChunkIterator, ChunkedProcessor};
pub use strategy::{ParallelStrategy, ProcessingMode};
