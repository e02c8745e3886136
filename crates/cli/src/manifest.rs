//! Center manifest: which volume files make up each center's groups
//!
//! ```json
//! { "centers": { "site_a": { "patient": ["a/p01.tif", "a/p02.tif"], "control": ["a/c01.tif"] } } }
//! ```
//!
//! Relative paths resolve against the manifest's directory.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use voxmeta_analysis::{GroupSource, Label};

#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    pub centers: BTreeMap<String, BTreeMap<String, Vec<PathBuf>>>,
}

impl Manifest {
    /// Read a manifest and resolve its paths
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::parse(&text, base)
    }

    /// Parse manifest text; relative paths are joined onto `base`
    pub fn parse(text: &str, base: &Path) -> Result<Self> {
        let mut manifest: Manifest =
            serde_json::from_str(text).context("Failed to parse manifest")?;
        if manifest.centers.is_empty() {
            bail!("Manifest lists no centers");
        }
        for (center, groups) in manifest.centers.iter_mut() {
            for (label, paths) in groups.iter_mut() {
                if paths.is_empty() {
                    bail!("Group [label:{}] in [center:{}] lists no files", label, center);
                }
                for p in paths.iter_mut() {
                    if p.is_relative() {
                        *p = base.join(&*p);
                    }
                }
            }
        }
        Ok(manifest)
    }

    /// Group sources keyed by center, then label
    pub fn sources(&self) -> BTreeMap<String, BTreeMap<Label, GroupSource>> {
        self.centers
            .iter()
            .map(|(center, groups)| {
                let groups = groups
                    .iter()
                    .map(|(label, paths)| {
                        (Label::from(label.as_str()), GroupSource::Paths(paths.clone()))
                    })
                    .collect();
                (center.clone(), groups)
            })
            .collect()
    }

    /// First listed volume, used as the output metadata template
    pub fn first_path(&self) -> Option<&Path> {
        self.centers
            .values()
            .flat_map(|groups| groups.values())
            .flat_map(|paths| paths.first())
            .map(PathBuf::as_path)
            .next()
    }

    pub fn file_count(&self) -> usize {
        self.centers
            .values()
            .flat_map(|groups| groups.values())
            .map(Vec::len)
            .sum()
    }
}
