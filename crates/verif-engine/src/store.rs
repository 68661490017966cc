// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::deferred::Deferred;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use verif_core::{
    BoxplotStatistic, DiagramStatistic, DurationDiagramStatistic, DurationScoreStatistic,
    ScoreStatistic, StatisticType, Statistics, VerifError,
};

/// Deferred statistics submitted by one slicing task, in submission order.
pub type StatisticsBatch = Vec<(StatisticType, Deferred<Statistics>)>;

#[derive(Debug)]
enum Entry {
    One(StatisticType, Deferred<Statistics>),
    Batch(Deferred<StatisticsBatch>),
}

/// Collects deferred statistics while a pool is being processed. Safe to share between
/// producers; consumed by [`StatisticsStoreBuilder::build`].
#[derive(Debug, Default)]
pub struct StatisticsStoreBuilder {
    pending: Mutex<Vec<Entry>>,
}

impl StatisticsStoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, entry: Entry) {
        let mut pending = self
            .pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        pending.push(entry);
    }

    /// Appends a deferred result for the `kind` bucket.
    pub fn add(&self, kind: StatisticType, statistics: Deferred<Statistics>) {
        self.push(Entry::One(kind, statistics));
    }

    /// Appends the results of a task that has not yet decided what it will submit. The
    /// batch keeps its place in submission order.
    pub fn add_batch(&self, batch: Deferred<StatisticsBatch>) {
        self.push(Entry::Batch(batch));
    }

    /// Number of entries appended so far; a batch counts once.
    pub fn pending(&self) -> usize {
        self.pending
            .lock()
            .map(|pending| pending.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().len())
    }

    /// Waits for every deferred result in submission order and freezes them into a store.
    /// The first failed computation is returned as the error.
    pub fn build(self) -> Result<StatisticsStore, VerifError> {
        let pending = self
            .pending
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut lists = Lists::default();
        for entry in pending {
            match entry {
                Entry::One(kind, deferred) => lists.accept(kind, deferred)?,
                Entry::Batch(batch) => {
                    for (kind, deferred) in batch.wait()? {
                        lists.accept(kind, deferred)?;
                    }
                }
            }
        }
        Ok(lists.freeze())
    }
}

#[derive(Default)]
struct Lists {
    double_scores: Vec<ScoreStatistic>,
    diagrams: Vec<DiagramStatistic>,
    boxplots_per_pair: Vec<BoxplotStatistic>,
    boxplots_per_pool: Vec<BoxplotStatistic>,
    duration_scores: Vec<DurationScoreStatistic>,
    duration_diagrams: Vec<DurationDiagramStatistic>,
}

impl Lists {
    fn accept(
        &mut self,
        kind: StatisticType,
        deferred: Deferred<Statistics>,
    ) -> Result<(), VerifError> {
        let statistics = deferred.wait()?;
        if statistics.kind() != kind {
            return Err(VerifError::computation(format!(
                "metric catalogue returned {:?} statistics for a {kind:?} request",
                statistics.kind()
            )));
        }
        self.push(statistics);
        Ok(())
    }

    fn push(&mut self, statistics: Statistics) {
        match statistics {
            Statistics::DoubleScore(values) => self.double_scores.extend(values),
            Statistics::Diagram(values) => self.diagrams.extend(values),
            Statistics::BoxplotPerPair(values) => self.boxplots_per_pair.extend(values),
            Statistics::BoxplotPerPool(values) => self.boxplots_per_pool.extend(values),
            Statistics::DurationScore(values) => self.duration_scores.extend(values),
            Statistics::DurationDiagram(values) => self.duration_diagrams.extend(values),
        }
    }

    fn freeze(self) -> StatisticsStore {
        StatisticsStore {
            double_scores: self.double_scores.into(),
            diagrams: self.diagrams.into(),
            boxplots_per_pair: self.boxplots_per_pair.into(),
            boxplots_per_pool: self.boxplots_per_pool.into(),
            duration_scores: self.duration_scores.into(),
            duration_diagrams: self.duration_diagrams.into(),
        }
    }
}

/// Immutable statistics for one pool, grouped by kind. Cheap to clone.
#[derive(Clone, Debug, PartialEq)]
pub struct StatisticsStore {
    double_scores: Arc<[ScoreStatistic]>,
    diagrams: Arc<[DiagramStatistic]>,
    boxplots_per_pair: Arc<[BoxplotStatistic]>,
    boxplots_per_pool: Arc<[BoxplotStatistic]>,
    duration_scores: Arc<[DurationScoreStatistic]>,
    duration_diagrams: Arc<[DurationDiagramStatistic]>,
}

impl Default for StatisticsStore {
    fn default() -> Self {
        Lists::default().freeze()
    }
}

fn concat<T: Clone>(first: &Arc<[T]>, second: &Arc<[T]>) -> Arc<[T]> {
    if second.is_empty() {
        return Arc::clone(first);
    }
    if first.is_empty() {
        return Arc::clone(second);
    }
    first.iter().chain(second.iter()).cloned().collect()
}

impl StatisticsStore {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn double_scores(&self) -> &[ScoreStatistic] {
        &self.double_scores
    }

    pub fn diagrams(&self) -> &[DiagramStatistic] {
        &self.diagrams
    }

    pub fn boxplots_per_pair(&self) -> &[BoxplotStatistic] {
        &self.boxplots_per_pair
    }

    pub fn boxplots_per_pool(&self) -> &[BoxplotStatistic] {
        &self.boxplots_per_pool
    }

    pub fn duration_scores(&self) -> &[DurationScoreStatistic] {
        &self.duration_scores
    }

    pub fn duration_diagrams(&self) -> &[DurationDiagramStatistic] {
        &self.duration_diagrams
    }

    /// Number of statistics of `kind`.
    pub fn count(&self, kind: StatisticType) -> usize {
        match kind {
            StatisticType::DoubleScore => self.double_scores.len(),
            StatisticType::Diagram => self.diagrams.len(),
            StatisticType::BoxplotPerPair => self.boxplots_per_pair.len(),
            StatisticType::BoxplotPerPool => self.boxplots_per_pool.len(),
            StatisticType::DurationScore => self.duration_scores.len(),
            StatisticType::DurationDiagram => self.duration_diagrams.len(),
        }
    }

    pub fn has_statistic(&self, kind: StatisticType) -> bool {
        self.count(kind) > 0
    }

    /// Kinds with at least one statistic.
    pub fn statistic_types(&self) -> BTreeSet<StatisticType> {
        StatisticType::ALL
            .into_iter()
            .filter(|kind| self.has_statistic(*kind))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.statistic_types().is_empty()
    }

    /// All of this store plus `other`'s statistics of the listed `kinds`, appended after this
    /// store's. Nothing is reordered or de-duplicated.
    pub fn merge(&self, other: &StatisticsStore, kinds: &[StatisticType]) -> StatisticsStore {
        let mut merged = self.clone();
        for kind in BTreeSet::from_iter(kinds.iter().copied()) {
            match kind {
                StatisticType::DoubleScore => {
                    merged.double_scores = concat(&self.double_scores, &other.double_scores);
                }
                StatisticType::Diagram => {
                    merged.diagrams = concat(&self.diagrams, &other.diagrams);
                }
                StatisticType::BoxplotPerPair => {
                    merged.boxplots_per_pair =
                        concat(&self.boxplots_per_pair, &other.boxplots_per_pair);
                }
                StatisticType::BoxplotPerPool => {
                    merged.boxplots_per_pool =
                        concat(&self.boxplots_per_pool, &other.boxplots_per_pool);
                }
                StatisticType::DurationScore => {
                    merged.duration_scores = concat(&self.duration_scores, &other.duration_scores);
                }
                StatisticType::DurationDiagram => {
                    merged.duration_diagrams =
                        concat(&self.duration_diagrams, &other.duration_diagrams);
                }
            }
        }
        merged
    }

    /// [`StatisticsStore::merge`] over every kind.
    pub fn combine(&self, other: &StatisticsStore) -> StatisticsStore {
        self.merge(other, &StatisticType::ALL)
    }
}

#[cfg(test)]
mod tests {
    use super::{StatisticsStore, StatisticsStoreBuilder};
    use crate::deferred::Deferred;
    use verif_core::{
        DiagramValue, Feature, FeatureGroup, MetricName, PoolMetadata, ScoreValue, Statistic,
        StatisticType, Statistics, VerifError,
    };

    fn metadata() -> PoolMetadata {
        PoolMetadata::new(FeatureGroup::single(Feature::new("A")))
    }

    fn scores(values: &[f64]) -> Statistics {
        Statistics::DoubleScore(
            values
                .iter()
                .map(|v| {
                    Statistic::new(
                        MetricName::from_static("MEAN ERROR"),
                        metadata(),
                        ScoreValue::main(*v),
                    )
                })
                .collect(),
        )
    }

    fn diagram() -> Statistics {
        Statistics::Diagram(vec![Statistic::new(
            MetricName::from_static("RELIABILITY DIAGRAM"),
            metadata(),
            DiagramValue::default(),
        )])
    }

    #[test]
    fn build_preserves_submission_order_per_kind() {
        let builder = StatisticsStoreBuilder::new();
        builder.add(StatisticType::DoubleScore, Deferred::ready(scores(&[1.0])));
        builder.add(StatisticType::Diagram, Deferred::ready(diagram()));
        builder.add(StatisticType::DoubleScore, Deferred::ready(scores(&[2.0, 3.0])));
        assert_eq!(builder.pending(), 3);

        let store = builder.build().expect("all results are ready");
        let values: Vec<f64> = store
            .double_scores()
            .iter()
            .filter_map(|s| s.value.component("MAIN"))
            .collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
        assert_eq!(store.diagrams().len(), 1);
        assert_eq!(
            store.statistic_types().into_iter().collect::<Vec<_>>(),
            vec![StatisticType::DoubleScore, StatisticType::Diagram]
        );
    }

    #[test]
    fn build_reports_failures_and_kind_mismatches() {
        let builder = StatisticsStoreBuilder::new();
        builder.add(StatisticType::DoubleScore, Deferred::ready(scores(&[1.0])));
        builder.add(
            StatisticType::DoubleScore,
            Deferred::failed(VerifError::computation("metric failed")),
        );
        assert_eq!(
            builder.build().expect_err("failure surfaces at build"),
            VerifError::computation("metric failed")
        );

        let builder = StatisticsStoreBuilder::new();
        builder.add(StatisticType::BoxplotPerPair, Deferred::ready(diagram()));
        assert!(builder.build().is_err());
    }

    #[test]
    fn batches_keep_their_place_in_submission_order() {
        let builder = StatisticsStoreBuilder::new();
        builder.add(StatisticType::DoubleScore, Deferred::ready(scores(&[1.0])));
        builder.add_batch(Deferred::ready(vec![
            (StatisticType::DoubleScore, Deferred::ready(scores(&[2.0]))),
            (StatisticType::Diagram, Deferred::ready(diagram())),
            (StatisticType::DoubleScore, Deferred::ready(scores(&[3.0]))),
        ]));
        builder.add(StatisticType::DoubleScore, Deferred::ready(scores(&[4.0])));
        assert_eq!(builder.pending(), 3);

        let store = builder.build().expect("all results are ready");
        let values: Vec<f64> = store
            .double_scores()
            .iter()
            .filter_map(|s| s.value.component("MAIN"))
            .collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(store.diagrams().len(), 1);

        let builder = StatisticsStoreBuilder::new();
        builder.add_batch(Deferred::failed(VerifError::pool("slicing failed")));
        assert_eq!(
            builder.build().expect_err("batch failure surfaces at build"),
            VerifError::pool("slicing failed")
        );
    }

    #[test]
    fn merge_concatenates_only_requested_kinds() {
        let first = StatisticsStoreBuilder::new();
        first.add(StatisticType::DoubleScore, Deferred::ready(scores(&[1.0])));
        let first = first.build().expect("first store");

        let second = StatisticsStoreBuilder::new();
        second.add(StatisticType::Diagram, Deferred::ready(diagram()));
        second.add(StatisticType::DoubleScore, Deferred::ready(scores(&[2.0])));
        let second = second.build().expect("second store");

        let merged = first.merge(&second, &[StatisticType::Diagram]);
        assert_eq!(merged.double_scores().len(), 1);
        assert_eq!(merged.diagrams().len(), 1);

        let both = first.merge(&second, &[StatisticType::DoubleScore, StatisticType::Diagram]);
        assert_eq!(both.double_scores().len(), 2);
        assert_eq!(both.double_scores()[0].value.component("MAIN"), Some(1.0));

        assert_eq!(first.combine(&StatisticsStore::empty()), first);
        assert!(StatisticsStore::empty().is_empty());
    }
}
