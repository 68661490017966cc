// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::error::VerifError;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

/// Category of pairs a metric consumes.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SampleDataGroup {
    SingleValued,
    Ensemble,
    DiscreteProbability,
    Dichotomous,
    SingleValuedTimeSeries,
}

/// Shape of a metric's output.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatisticType {
    DoubleScore,
    Diagram,
    BoxplotPerPair,
    BoxplotPerPool,
    DurationScore,
    DurationDiagram,
}

impl StatisticType {
    pub const ALL: [StatisticType; 6] = [
        StatisticType::DoubleScore,
        StatisticType::Diagram,
        StatisticType::BoxplotPerPair,
        StatisticType::BoxplotPerPool,
        StatisticType::DurationScore,
        StatisticType::DurationDiagram,
    ];
}

/// Metric identifier.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetricName(Cow<'static, str>);

impl MetricName {
    /// Count of pairs in a slice; still computed when the slice is below the minimum size.
    pub const SAMPLE_SIZE: MetricName = MetricName(Cow::Borrowed("SAMPLE SIZE"));

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_sample_size(&self) -> bool {
        *self == Self::SAMPLE_SIZE
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Catalogue entry describing one metric.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetricDescriptor {
    pub name: MetricName,
    pub groups: Vec<SampleDataGroup>,
    pub statistic_types: Vec<StatisticType>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub skill: bool,
    /// False for metrics that are only meaningful over the unconditional sample.
    #[cfg_attr(feature = "serde", serde(default = "default_threshold_tolerant"))]
    pub threshold_tolerant: bool,
    #[cfg_attr(feature = "serde", serde(default))]
    pub explicit_baseline_required: bool,
    /// Metric that a timing-error summary statistic summarizes.
    #[cfg_attr(feature = "serde", serde(default))]
    pub parent: Option<MetricName>,
}

#[cfg(feature = "serde")]
fn default_threshold_tolerant() -> bool {
    true
}

impl MetricDescriptor {
    pub fn new(
        name: MetricName,
        groups: impl IntoIterator<Item = SampleDataGroup>,
        statistic_types: impl IntoIterator<Item = StatisticType>,
    ) -> Self {
        Self {
            name,
            groups: groups.into_iter().collect(),
            statistic_types: statistic_types.into_iter().collect(),
            skill: false,
            threshold_tolerant: true,
            explicit_baseline_required: false,
            parent: None,
        }
    }

    pub fn skill(mut self) -> Self {
        self.skill = true;
        self
    }

    pub fn unconditional_only(mut self) -> Self {
        self.threshold_tolerant = false;
        self
    }

    pub fn requires_explicit_baseline(mut self) -> Self {
        self.explicit_baseline_required = true;
        self
    }

    pub fn with_parent(mut self, parent: MetricName) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn flags(&self) -> MetricFlags {
        MetricFlags {
            skill: self.skill,
            threshold_tolerant: self.threshold_tolerant,
            explicit_baseline_required: self.explicit_baseline_required,
        }
    }

    fn accepts(&self, group: SampleDataGroup, kind: StatisticType) -> bool {
        self.groups.contains(&group) && self.statistic_types.contains(&kind)
    }
}

/// Policy-relevant properties of a requested metric.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct MetricFlags {
    pub skill: bool,
    pub threshold_tolerant: bool,
    pub explicit_baseline_required: bool,
}

/// De-duplicated, ordered metric request for one (category, kind) pair.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MetricSet {
    metrics: BTreeMap<MetricName, MetricFlags>,
}

impl MetricSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: MetricName, flags: MetricFlags) {
        self.metrics.insert(name, flags);
    }

    pub fn contains(&self, name: &MetricName) -> bool {
        self.metrics.contains_key(name)
    }

    pub fn flags(&self, name: &MetricName) -> Option<MetricFlags> {
        self.metrics.get(name).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &MetricName> {
        self.metrics.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MetricName, MetricFlags)> {
        self.metrics.iter().map(|(name, flags)| (name, *flags))
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// The subset for which `keep` holds.
    pub fn filtered(&self, mut keep: impl FnMut(&MetricName, MetricFlags) -> bool) -> Self {
        Self {
            metrics: self
                .metrics
                .iter()
                .filter(|(name, flags)| keep(name, **flags))
                .map(|(name, flags)| (name.clone(), *flags))
                .collect(),
        }
    }

    /// The single-entry set for `name`, if present.
    pub fn only(&self, name: &MetricName) -> Option<Self> {
        self.flags(name).map(|flags| {
            let mut set = Self::new();
            set.insert(name.clone(), flags);
            set
        })
    }
}

impl FromIterator<(MetricName, MetricFlags)> for MetricSet {
    fn from_iter<I: IntoIterator<Item = (MetricName, MetricFlags)>>(iter: I) -> Self {
        Self {
            metrics: iter.into_iter().collect(),
        }
    }
}

/// The metrics requested for an evaluation, keyed by name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MetricTable {
    descriptors: BTreeMap<MetricName, MetricDescriptor>,
}

impl MetricTable {
    /// Builds a table; a name declared twice is rejected.
    pub fn new(descriptors: impl IntoIterator<Item = MetricDescriptor>) -> Result<Self, VerifError> {
        let mut table = BTreeMap::new();
        for descriptor in descriptors {
            let name = descriptor.name.clone();
            if table.insert(name.clone(), descriptor).is_some() {
                return Err(VerifError::declaration(format!(
                    "metric '{name}' is declared more than once"
                )));
            }
        }
        Ok(Self { descriptors: table })
    }

    pub fn get(&self, name: &MetricName) -> Option<&MetricDescriptor> {
        self.descriptors.get(name)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &MetricDescriptor> {
        self.descriptors.values()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Metrics that consume `group` and produce `kind`.
    pub fn select(&self, group: SampleDataGroup, kind: StatisticType) -> MetricSet {
        self.descriptors
            .values()
            .filter(|descriptor| descriptor.accepts(group, kind))
            .map(|descriptor| (descriptor.name.clone(), descriptor.flags()))
            .collect()
    }

    pub fn has(&self, group: SampleDataGroup, kind: StatisticType) -> bool {
        self.descriptors
            .values()
            .any(|descriptor| descriptor.accepts(group, kind))
    }

    pub fn has_group(&self, group: SampleDataGroup) -> bool {
        self.descriptors
            .values()
            .any(|descriptor| descriptor.groups.contains(&group))
    }

    /// Copy without any metric that consumes one of `groups`.
    pub fn without_groups(&self, groups: &[SampleDataGroup]) -> Self {
        Self {
            descriptors: self
                .descriptors
                .iter()
                .filter(|(_, descriptor)| !descriptor.groups.iter().any(|g| groups.contains(g)))
                .map(|(name, descriptor)| (name.clone(), descriptor.clone()))
                .collect(),
        }
    }

    /// Copy without the named metric.
    pub fn without(&self, name: &MetricName) -> Self {
        let mut descriptors = self.descriptors.clone();
        descriptors.remove(name);
        Self { descriptors }
    }
}

#[cfg(test)]
mod tests {
    use super::{MetricDescriptor, MetricName, MetricTable, SampleDataGroup, StatisticType};

    const MAE: MetricName = MetricName::from_static("MEAN ABSOLUTE ERROR");
    const CRPSS: MetricName = MetricName::from_static("CRPSS");

    fn table() -> MetricTable {
        MetricTable::new([
            MetricDescriptor::new(
                MAE,
                [SampleDataGroup::SingleValued],
                [StatisticType::DoubleScore],
            ),
            MetricDescriptor::new(
                MetricName::SAMPLE_SIZE,
                [SampleDataGroup::SingleValued, SampleDataGroup::Ensemble],
                [StatisticType::DoubleScore],
            ),
            MetricDescriptor::new(CRPSS, [SampleDataGroup::Ensemble], [StatisticType::DoubleScore])
                .skill()
                .requires_explicit_baseline(),
        ])
        .expect("distinct names should build a table")
    }

    #[test]
    fn select_returns_metrics_for_group_and_kind() {
        let table = table();
        let single = table.select(SampleDataGroup::SingleValued, StatisticType::DoubleScore);
        assert_eq!(single.len(), 2);
        assert!(single.contains(&MetricName::SAMPLE_SIZE));

        let ensemble = table.select(SampleDataGroup::Ensemble, StatisticType::DoubleScore);
        let crpss = ensemble.flags(&CRPSS).expect("CRPSS requested");
        assert!(crpss.skill && crpss.explicit_baseline_required);
        assert!(!table.has(SampleDataGroup::Ensemble, StatisticType::Diagram));
    }

    #[test]
    fn without_groups_drops_any_metric_touching_the_groups() {
        let reduced = table().without_groups(&[SampleDataGroup::Ensemble]);
        assert_eq!(reduced.len(), 1);
        assert!(reduced.get(&MAE).is_some());
        assert!(!reduced.has_group(SampleDataGroup::Ensemble));
    }

    #[test]
    fn duplicate_metric_names_are_rejected() {
        let err = MetricTable::new([
            MetricDescriptor::new(MAE, [SampleDataGroup::SingleValued], [StatisticType::DoubleScore]),
            MetricDescriptor::new(MAE, [SampleDataGroup::SingleValued], [StatisticType::Diagram]),
        ])
        .expect_err("duplicate names should fail");
        assert!(err.is_configuration());
    }

    #[test]
    fn metric_set_only_and_filtered() {
        let set = table().select(SampleDataGroup::SingleValued, StatisticType::DoubleScore);
        let only = set.only(&MetricName::SAMPLE_SIZE).expect("sample size present");
        assert_eq!(only.len(), 1);
        assert!(set.only(&CRPSS).is_none());
        let non_sample = set.filtered(|name, _| !name.is_sample_size());
        assert_eq!(non_sample.names().collect::<Vec<_>>(), vec![&MAE]);
    }
}
