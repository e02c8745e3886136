//! Delimited summary-statistic tables
//!
//! One row per center: `center,mean1,std1,count1,mean2,std2,count2`, where
//! group 1 is the experimental group and group 2 the control group.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Precomputed summary statistics of one center
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyRecord {
    /// Center (study) name
    #[serde(alias = "name", alias = "center_name")]
    pub center: String,
    pub mean1: f64,
    pub std1: f64,
    pub count1: usize,
    pub mean2: f64,
    pub std2: f64,
    pub count2: usize,
}

/// Read a CSV study table from disk
pub fn read_study_table<P: AsRef<Path>>(path: P) -> Result<Vec<StudyRecord>> {
    let file = File::open(path.as_ref())?;
    read_study_table_from_reader(file)
}

/// Read a CSV study table from any reader
///
/// The first row must be a header naming the columns; surrounding
/// whitespace is trimmed from every field.
pub fn read_study_table_from_reader<R: Read>(reader: R) -> Result<Vec<StudyRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut records = Vec::new();
    for row in reader.deserialize() {
        records.push(row?);
    }
    Ok(records)
}
