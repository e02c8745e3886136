//! Centers: named collections of groups, one per data-collection site

use crate::group::{Group, GroupSource, Label};
use crate::study::{EffectSizeMethod, Study};
use std::collections::{BTreeMap, HashMap};
use tracing::warn;
use voxmeta_core::io::StudyRecord;
use voxmeta_core::{Error, Result};

/// Where within a group's statistics a study is taken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// The single value of a scalar group
    Whole,
    /// One flat (row-major) voxel index
    Voxel(usize),
}

/// A named set of groups sharing one shape
#[derive(Debug, Clone)]
pub struct Center {
    name: String,
    groups: HashMap<Label, Group>,
    shape: Vec<usize>,
}

impl Center {
    /// Build a center; all groups must share a shape and have unique labels
    pub fn new(name: impl Into<String>, groups: Vec<Group>) -> Result<Self> {
        let name = name.into();
        let shape = groups
            .first()
            .map(|g| g.shape().to_vec())
            .ok_or(Error::EmptyInput { field: "groups" })?;

        let mut map = HashMap::with_capacity(groups.len());
        for group in groups {
            if group.shape() != shape.as_slice() {
                return Err(Error::ShapeMismatch {
                    expected: shape,
                    actual: group.shape().to_vec(),
                });
            }
            if map.contains_key(group.label()) {
                return Err(Error::DuplicateLabel {
                    center: name,
                    label: group.label().to_string(),
                });
            }
            map.insert(group.label().clone(), group);
        }

        Ok(Self {
            name,
            groups: map,
            shape,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Common shape of every group
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn group(&self, label: &Label) -> Option<&Group> {
        self.groups.get(label)
    }

    /// Labels in sorted order
    pub fn labels(&self) -> Vec<&Label> {
        let mut labels: Vec<_> = self.groups.keys().collect();
        labels.sort();
        labels
    }

    fn lookup(&self, label: &Label) -> Result<&Group> {
        self.groups.get(label).ok_or_else(|| Error::LabelNotFound {
            center: self.name.clone(),
            label: label.to_string(),
        })
    }

    /// Resolve an experimental/control label pair
    pub fn pair(&self, experimental: &Label, control: &Label) -> Result<GroupPair<'_>> {
        Ok(GroupPair {
            center: &self.name,
            experimental: self.lookup(experimental)?,
            control: self.lookup(control)?,
        })
    }

    /// Study for a label pair at one location
    pub fn study(
        &self,
        experimental: &Label,
        control: &Label,
        method: EffectSizeMethod,
        location: Location,
    ) -> Result<Study<'_>> {
        self.pair(experimental, control)?.study(method, location)
    }
}

/// Experimental and control groups of one center, resolved once
#[derive(Debug, Clone, Copy)]
pub struct GroupPair<'a> {
    center: &'a str,
    experimental: &'a Group,
    control: &'a Group,
}

impl<'a> GroupPair<'a> {
    pub fn center(&self) -> &'a str {
        self.center
    }

    pub fn experimental(&self) -> &'a Group {
        self.experimental
    }

    pub fn control(&self) -> &'a Group {
        self.control
    }

    /// Build the study at `location`
    pub fn study(&self, method: EffectSizeMethod, location: Location) -> Result<Study<'a>> {
        let index = match location {
            Location::Voxel(i) => i,
            Location::Whole if self.experimental.len() == 1 => 0,
            Location::Whole => {
                return Err(Error::InvalidParameter {
                    name: "location",
                    value: "whole".into(),
                    reason: format!(
                        "center {} holds array groups of shape {:?}; pick a voxel",
                        self.center,
                        self.experimental.shape()
                    ),
                });
            }
        };
        Study::new(
            self.center,
            method,
            self.experimental.stats_at(index)?,
            self.control.stats_at(index)?,
        )
    }
}

/// Ordered collection of centers contributing to one aggregation
#[derive(Debug, Clone, Default)]
pub struct Centers(Vec<Center>);

impl Centers {
    pub fn new(centers: Vec<Center>) -> Self {
        Self(centers)
    }

    pub fn push(&mut self, center: Center) {
        self.0.push(center);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Center> {
        self.0.iter()
    }

    /// Group pairs of every center holding both labels.
    ///
    /// A center missing either label is reported and skipped.
    pub fn pairs(&self, experimental: &Label, control: &Label) -> Vec<GroupPair<'_>> {
        self.0
            .iter()
            .filter_map(|center| match center.pair(experimental, control) {
                Ok(pair) => Some(pair),
                Err(e) => {
                    warn!("{}", e);
                    None
                }
            })
            .collect()
    }

    /// One study per center holding both labels
    pub fn studies(
        &self,
        experimental: &Label,
        control: &Label,
        method: EffectSizeMethod,
        location: Location,
    ) -> Result<Vec<Study<'_>>> {
        self.pairs(experimental, control)
            .iter()
            .map(|pair| pair.study(method, location))
            .collect()
    }

    /// Shape shared by every center
    pub fn spatial_shape(&self) -> Result<Vec<usize>> {
        let first = self
            .0
            .first()
            .ok_or(Error::EmptyInput { field: "centers" })?;
        let shape = first.shape().to_vec();
        if let Some(bad) = self.0.iter().find(|c| c.shape() != shape.as_slice()) {
            return Err(Error::ShapeMismatch {
                expected: shape,
                actual: bad.shape().to_vec(),
            });
        }
        Ok(shape)
    }

    /// Build centers from a center → label → source mapping.
    ///
    /// Centers come out in key order. The input is only read.
    pub fn from_sources(sources: &BTreeMap<String, BTreeMap<Label, GroupSource>>) -> Result<Self> {
        sources
            .iter()
            .map(|(name, groups)| {
                let groups = groups
                    .iter()
                    .map(|(label, source)| Group::from_source(label.clone(), source))
                    .collect::<Result<Vec<_>>>()?;
                Center::new(name.clone(), groups)
            })
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }

    /// One center per table row with scalar experimental and control groups
    pub fn from_table(
        records: &[StudyRecord],
        experimental: &Label,
        control: &Label,
    ) -> Result<Self> {
        records
            .iter()
            .map(|r| {
                let e =
                    Group::from_scalar_summary(experimental.clone(), r.mean1, r.std1, r.count1)?;
                let c = Group::from_scalar_summary(control.clone(), r.mean2, r.std2, r.count2)?;
                Center::new(r.center.clone(), vec![e, c])
            })
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }
}

impl FromIterator<Center> for Centers {
    fn from_iter<I: IntoIterator<Item = Center>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Centers {
    type Item = &'a Center;
    type IntoIter = std::slice::Iter<'a, Center>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn scalar_center(name: &str, m1: f64, m2: f64) -> Center {
        Center::new(
            name,
            vec![
                Group::from_scalar_summary("ad", m1, 2.0, 20).unwrap(),
                Group::from_scalar_summary("hc", m2, 2.0, 20).unwrap(),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_duplicate_label() {
        let result = Center::new(
            "site",
            vec![
                Group::from_scalar_summary("ad", 1.0, 1.0, 5).unwrap(),
                Group::from_scalar_summary("ad", 2.0, 1.0, 5).unwrap(),
            ],
        );
        assert!(matches!(result, Err(Error::DuplicateLabel { .. })));
    }

    #[test]
    fn test_shape_mismatch() {
        let result = Center::new(
            "site",
            vec![
                Group::from_observations("ad", array![[1.0, 2.0], [3.0, 4.0]].into_dyn()).unwrap(),
                Group::from_observations("hc", array![[1.0], [3.0]].into_dyn()).unwrap(),
            ],
        );
        assert!(matches!(result, Err(Error::ShapeMismatch { .. })));
    }

    #[test]
    fn test_empty_center() {
        assert!(matches!(
            Center::new("site", Vec::new()),
            Err(Error::EmptyInput { .. })
        ));
    }

    #[test]
    fn test_center_study() {
        let center = scalar_center("site", 10.0, 8.0);
        let study = center
            .study(&"ad".into(), &"hc".into(), EffectSizeMethod::CohenD, Location::Whole)
            .unwrap();
        assert_eq!(study.name(), "site");
        assert_relative_eq!(study.effect_size(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_label_not_found() {
        let center = scalar_center("site", 10.0, 8.0);
        let err = center.pair(&"ad".into(), &"mci".into()).unwrap_err();
        assert_eq!(err.to_string(), "Couldn't find [label:mci] group in [center:site]");
    }

    #[test]
    fn test_whole_on_array_group() {
        let center = Center::new(
            "site",
            vec![
                Group::from_observations("ad", array![[1.0, 2.0], [3.0, 5.0]].into_dyn()).unwrap(),
                Group::from_observations("hc", array![[0.0, 2.0], [1.0, 4.0]].into_dyn()).unwrap(),
            ],
        )
        .unwrap();
        let pair = center.pair(&"ad".into(), &"hc".into()).unwrap();
        assert!(pair.study(EffectSizeMethod::CohenD, Location::Whole).is_err());
        assert!(pair.study(EffectSizeMethod::CohenD, Location::Voxel(1)).is_ok());
    }

    #[test]
    fn test_centers_skip_missing_label() {
        let mut centers = Centers::new(vec![
            scalar_center("a", 10.0, 8.0),
            scalar_center("b", 9.0, 8.0),
        ]);
        centers.push(
            Center::new("c", vec![Group::from_scalar_summary("ad", 1.0, 1.0, 4).unwrap()]).unwrap(),
        );

        let studies = centers
            .studies(&"ad".into(), &"hc".into(), EffectSizeMethod::CohenD, Location::Whole)
            .unwrap();
        let names: Vec<_> = studies.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_spatial_shape() {
        let centers = Centers::new(vec![
            scalar_center("a", 1.0, 0.0),
            scalar_center("b", 1.0, 0.0),
        ]);
        assert_eq!(centers.spatial_shape().unwrap(), Vec::<usize>::new());
        assert!(Centers::default().spatial_shape().is_err());
    }

    #[test]
    fn test_from_sources_does_not_consume() {
        let mut groups = BTreeMap::new();
        groups.insert(
            Label::from("ad"),
            GroupSource::Observations(array![[1.0, 2.0], [2.0, 3.0], [3.0, 7.0]].into_dyn()),
        );
        groups.insert(
            Label::from("hc"),
            GroupSource::Observations(array![[0.0, 1.0], [1.0, 1.0], [2.0, 4.0]].into_dyn()),
        );
        let mut sources = BTreeMap::new();
        sources.insert("site_b".to_string(), groups.clone());
        sources.insert("site_a".to_string(), groups);

        let centers = Centers::from_sources(&sources).unwrap();
        assert_eq!(sources.len(), 2);
        let names: Vec<_> = centers.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["site_a", "site_b"]);
        assert_eq!(centers.spatial_shape().unwrap(), vec![2]);
    }

    #[test]
    fn test_from_table() {
        let records = vec![StudyRecord {
            center: "site".into(),
            mean1: 10.0,
            std1: 2.0,
            count1: 20,
            mean2: 8.0,
            std2: 2.0,
            count2: 20,
        }];
        let (e, c) = (Label::from("exp"), Label::from("ctrl"));
        let centers = Centers::from_table(&records, &e, &c).unwrap();
        let studies = centers
            .studies(&e, &c, EffectSizeMethod::CohenD, Location::Whole)
            .unwrap();
        assert_eq!(studies.len(), 1);
        assert_relative_eq!(studies[0].effect_size(), 1.0, epsilon = 1e-12);
    }
}
