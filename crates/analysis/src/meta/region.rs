//! Region-wise meta-analysis
//!
//! Each subject's observations are reduced to one value per labeled region
//! (sum or mean of the voxels carrying the label), then the reduced groups go
//! through the same study and pooling steps as table mode. Zone handling
//! follows zonal statistics: label 0 is background.

use super::MetaParams;
use crate::center::{Centers, GroupPair};
use crate::group::Label;
use crate::model::{MetaResult, Model};
use crate::study::Study;
use tracing::{debug, info, warn};
use voxmeta_core::{Algorithm, Error, Mask, Reduction, Result};
use voxmeta_parallel::ParallelStrategy;

/// Pooled result of one region
#[derive(Debug, Clone, PartialEq)]
pub struct RegionResult {
    /// Region label from the mask
    pub region: i64,
    /// Number of studies pooled
    pub studies: usize,
    /// `None` when the region's studies could not be pooled
    pub result: Option<MetaResult>,
}

/// Inputs of a region-wise run
#[derive(Debug, Clone)]
pub struct RegionInput {
    pub centers: Centers,
    pub experimental: Label,
    pub control: Label,
    /// Integer-labeled region mask
    pub mask: Mask,
    pub reduction: Reduction,
}

/// Region-wise meta-analysis algorithm
#[derive(Debug, Clone, Default)]
pub struct RegionMeta;

impl Algorithm for RegionMeta {
    type Input = RegionInput;
    type Output = Vec<RegionResult>;
    type Params = MetaParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "RegionMeta"
    }

    fn description(&self) -> &'static str {
        "Pool experimental vs. control effect sizes across centers for every labeled region"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        region_meta_analysis(
            &input.centers,
            &input.experimental,
            &input.control,
            &input.mask,
            input.reduction,
            params,
        )
    }
}

fn pool_region(
    pairs: &[GroupPair<'_>],
    region: i64,
    indices: &[usize],
    reduction: Reduction,
    params: &MetaParams,
) -> Result<RegionResult> {
    let reduced = pairs
        .iter()
        .map(|pair| {
            Ok((
                pair.center(),
                pair.experimental().reduce_region(indices, reduction)?,
                pair.control().reduce_region(indices, reduction)?,
            ))
        })
        .collect::<Result<Vec<_>>>()?;

    let studies = reduced
        .iter()
        .map(|(center, e, c)| {
            Study::new(center, params.method, e.stats_at(0)?, c.stats_at(0)?)
        })
        .collect::<Result<Vec<_>>>();

    let fitted = studies.and_then(|s| Model::from_studies(params.model, &s));
    match fitted {
        Ok(model) => Ok(RegionResult {
            region,
            studies: model.len(),
            result: Some(*model.result()),
        }),
        Err(e) if e.is_degenerate() => {
            warn!("Region {}: {}", region, e);
            Ok(RegionResult {
                region,
                studies: 0,
                result: None,
            })
        }
        Err(e) => Err(e),
    }
}

/// Run the meta-analysis once per region label of `mask`.
///
/// Every group must carry raw observations. Results are sorted by region.
pub fn region_meta_analysis(
    centers: &Centers,
    experimental: &Label,
    control: &Label,
    mask: &Mask,
    reduction: Reduction,
    params: MetaParams,
) -> Result<Vec<RegionResult>> {
    let shape = centers.spatial_shape()?;
    mask.check_shape(&shape)?;

    let regions = mask.labels();
    let pairs = centers.pairs(experimental, control);
    debug!(
        "Region: {} regions, {} studies per region, {:?} reduction",
        regions.len(),
        pairs.len(),
        reduction
    );

    let results = params
        .mode
        .par_map(0..regions.len(), |i| {
            let region = regions[i];
            let indices = mask.region_indices(region);
            pool_region(&pairs, region, &indices, reduction, &params)
        })?
        .into_iter()
        .collect::<Result<Vec<_>>>()?;

    info!(
        "Region meta-analysis ({} model, {}) over {} regions",
        params.model,
        params.method,
        results.len()
    );
    Ok(results)
}
