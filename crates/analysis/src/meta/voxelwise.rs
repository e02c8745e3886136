//! Voxelwise meta-analysis
//!
//! Every selected voxel is pooled independently: one study per center is
//! built from the group statistics at that voxel, the model is fit, and the
//! eight result statistics land in the voxel's slot of the output volume.

use super::MetaParams;
use crate::center::{Centers, GroupPair, Location};
use crate::group::Label;
use crate::model::{MetaChannel, MetaResult, pool};
use ndarray::{ArrayD, ArrayViewD, Axis, IxDyn};
use std::time::Instant;
use tracing::{debug, info, warn};
use voxmeta_core::{Algorithm, Error, Mask, Result, Volume, VoxelTransform};
use voxmeta_parallel::ChunkedProcessor;

/// Result volume of a voxelwise run
#[derive(Debug, Clone)]
pub struct VoxelwiseOutput {
    /// Spatial shape plus a trailing axis of [`MetaResult::CHANNELS`]
    pub results: ArrayD<f64>,
    /// Number of voxels pooled
    pub selected: usize,
    /// Selected voxels whose studies could not be pooled (left at zero)
    pub degenerate: usize,
}

impl VoxelwiseOutput {
    /// Spatial shape, without the channel axis
    pub fn spatial_shape(&self) -> &[usize] {
        let shape = self.results.shape();
        &shape[..shape.len() - 1]
    }

    /// One channel over the spatial shape
    pub fn channel(&self, channel: MetaChannel) -> ArrayViewD<'_, f64> {
        self.results
            .index_axis(Axis(self.results.ndim() - 1), channel.index())
    }

    /// One channel as a volume carrying `transform`
    pub fn channel_volume(&self, channel: MetaChannel, transform: &VoxelTransform) -> Volume<f64> {
        let mut volume = Volume::from_array(self.channel(channel).to_owned());
        volume.set_transform(*transform);
        volume
    }
}

/// Inputs of a voxelwise run
#[derive(Debug, Clone)]
pub struct VoxelwiseInput {
    pub centers: Centers,
    pub experimental: Label,
    pub control: Label,
    /// Voxels to pool; every voxel when absent
    pub mask: Option<Mask>,
}

/// Voxelwise meta-analysis algorithm
#[derive(Debug, Clone, Default)]
pub struct VoxelwiseMeta;

impl Algorithm for VoxelwiseMeta {
    type Input = VoxelwiseInput;
    type Output = VoxelwiseOutput;
    type Params = MetaParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "VoxelwiseMeta"
    }

    fn description(&self) -> &'static str {
        "Pool experimental vs. control effect sizes across centers at every selected voxel"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        voxelwise_meta_analysis(
            &input.centers,
            &input.experimental,
            &input.control,
            input.mask.as_ref(),
            params,
        )
    }
}

/// Per-chunk buffers reused across voxels
struct Scratch {
    effect_sizes: Vec<f64>,
    variances: Vec<f64>,
    weights: Vec<f64>,
}

impl Scratch {
    fn new(studies: usize) -> Self {
        Self {
            effect_sizes: Vec::with_capacity(studies),
            variances: Vec::with_capacity(studies),
            weights: Vec::with_capacity(studies),
        }
    }
}

fn pool_voxel(
    pairs: &[GroupPair<'_>],
    index: usize,
    params: &MetaParams,
    scratch: &mut Scratch,
) -> Result<MetaResult> {
    scratch.effect_sizes.clear();
    scratch.variances.clear();
    for pair in pairs {
        let study = pair.study(params.method, Location::Voxel(index))?;
        scratch.effect_sizes.push(study.effect_size());
        scratch.variances.push(study.variance());
    }
    pool(
        params.model,
        &scratch.effect_sizes,
        &scratch.variances,
        &mut scratch.weights,
    )
}

/// Run the meta-analysis at every voxel selected by `mask`.
///
/// All centers must share one spatial shape, and the mask must have that
/// shape. Unselected voxels are zero in every channel. A voxel whose studies
/// are numerically degenerate (too few samples, zero pooled variance, no
/// contributing center) is also left at zero and counted in
/// [`VoxelwiseOutput::degenerate`]; any other error aborts the run.
pub fn voxelwise_meta_analysis(
    centers: &Centers,
    experimental: &Label,
    control: &Label,
    mask: Option<&Mask>,
    params: MetaParams,
) -> Result<VoxelwiseOutput> {
    let start = Instant::now();
    let shape = centers.spatial_shape()?;
    let voxels: usize = shape.iter().product();

    let indices = match mask {
        Some(mask) => {
            mask.check_shape(&shape)?;
            mask.nonzero_indices()
        }
        None => (0..voxels).collect(),
    };

    let pairs = centers.pairs(experimental, control);
    if pairs.is_empty() {
        warn!(
            "No center holds both [label:{}] and [label:{}]; every voxel is degenerate",
            experimental, control
        );
    }
    debug!(
        "Voxelwise: shape {:?}, {} of {} voxels selected, {} studies per voxel",
        shape,
        indices.len(),
        voxels,
        pairs.len()
    );

    let processor = ChunkedProcessor::new(params.chunk_size, params.mode);
    let pooled = processor.map_chunks(&indices, |chunk| {
        let mut scratch = Scratch::new(pairs.len());
        chunk
            .iter()
            .map(|&i| pool_voxel(&pairs, i, &params, &mut scratch))
            .collect()
    })?;

    // Output is sized once; each selected voxel owns a disjoint channel run.
    let mut out_shape = shape.clone();
    out_shape.push(MetaResult::CHANNELS);
    let mut results = ArrayD::<f64>::zeros(IxDyn(&out_shape));
    let flat = results
        .as_slice_mut()
        .ok_or_else(|| Error::Other("output volume is not contiguous".into()))?;

    let mut degenerate = 0;
    for (&voxel, outcome) in indices.iter().zip(pooled) {
        match outcome {
            Ok(result) => {
                let offset = voxel * MetaResult::CHANNELS;
                flat[offset..offset + MetaResult::CHANNELS].copy_from_slice(&result.to_array());
            }
            Err(e) if e.is_degenerate() => degenerate += 1,
            Err(e) => return Err(e),
        }
    }

    if degenerate > 0 {
        warn!(
            "{} of {} voxels could not be pooled and were set to zero",
            degenerate,
            indices.len()
        );
    }
    info!(
        "Voxelwise meta-analysis ({} model, {}) over {} voxels in {:.2?}",
        params.model,
        params.method,
        indices.len(),
        start.elapsed()
    );

    Ok(VoxelwiseOutput {
        results,
        selected: indices.len(),
        degenerate,
    })
}
