//! Flat-table meta-analysis

use super::MetaParams;
use crate::center::{Centers, Location};
use crate::group::Label;
use crate::model::{ForestRow, Model};
use tracing::info;
use voxmeta_core::io::StudyRecord;
use voxmeta_core::{Algorithm, Error, Result};

/// Pooled model plus the per-study rows it was fit on
#[derive(Debug, Clone)]
pub struct TableOutput {
    pub model: Model,
    pub forest: Vec<ForestRow>,
}

/// Table meta-analysis algorithm
#[derive(Debug, Clone, Default)]
pub struct TableMeta;

impl Algorithm for TableMeta {
    type Input = Vec<StudyRecord>;
    type Output = TableOutput;
    type Params = MetaParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "TableMeta"
    }

    fn description(&self) -> &'static str {
        "Pool per-center summary statistics from a study table"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        table_meta_analysis(&input, params)
    }
}

/// Pool one study per table row.
///
/// Column group 1 is the experimental group and group 2 the control group.
pub fn table_meta_analysis(records: &[StudyRecord], params: MetaParams) -> Result<TableOutput> {
    let experimental = Label::from("experimental");
    let control = Label::from("control");

    let centers = Centers::from_table(records, &experimental, &control)?;
    let studies = centers.studies(&experimental, &control, params.method, Location::Whole)?;
    let model = Model::from_studies(params.model, &studies)?;
    let forest = model.forest(&studies)?;

    info!(
        "Pooled {} studies ({} model, {}): effect size {:.4}, p = {:.4}",
        studies.len(),
        params.model,
        params.method,
        model.result().effect_size,
        model.result().p
    );

    Ok(TableOutput { model, forest })
}
