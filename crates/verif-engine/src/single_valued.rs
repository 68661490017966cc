// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::catalogue::MetricCatalogue;
use crate::category::{SingleValuedDichotomous, SingleValuedScores, SingleValuedTimeSeries};
use crate::dispatch::Dispatcher;
use crate::executor::Executors;
use crate::policy::SampleSizePolicy;
use crate::store::{StatisticsStore, StatisticsStoreBuilder};
use std::sync::Arc;
use tracing::{debug, trace};
use verif_core::{
    EvaluationConfig, MetricTable, MissingValues, Pool, PoolMetadata, SampleDataGroup,
    SingleValuedPair, ThresholdsByFeature, TimeSeries, VerifError,
};
use verif_slice::{pools, transform};

const GROUPS: [SampleDataGroup; 3] = [
    SampleDataGroup::SingleValued,
    SampleDataGroup::Dichotomous,
    SampleDataGroup::SingleValuedTimeSeries,
];

/// Computes single-valued, dichotomous and timing-error statistics for pools of
/// single-valued time-series.
///
/// The processor is immutable once built and may be shared between threads; each
/// [`apply`](Self::apply) call owns its result store.
pub struct SingleValuedStatisticsProcessor {
    metrics: MetricTable,
    thresholds: ThresholdsByFeature,
    policy: SampleSizePolicy,
    missing: MissingValues,
    executors: Executors,
    catalogue: Arc<dyn MetricCatalogue>,
}

impl SingleValuedStatisticsProcessor {
    /// Validates `config` and builds a processor that computes its metrics on `executors`.
    pub fn new(
        config: &EvaluationConfig,
        executors: Executors,
        catalogue: Arc<dyn MetricCatalogue>,
    ) -> Result<Self, VerifError> {
        config.validate()?;
        Ok(Self::from_parts(
            config.metric_table()?,
            config.thresholds_by_feature(),
            SampleSizePolicy::new(config.minimum_sample_size),
            config.missing_values,
            executors,
            catalogue,
        ))
    }

    pub(crate) fn from_parts(
        metrics: MetricTable,
        thresholds: ThresholdsByFeature,
        policy: SampleSizePolicy,
        missing: MissingValues,
        executors: Executors,
        catalogue: Arc<dyn MetricCatalogue>,
    ) -> Self {
        Self {
            metrics,
            thresholds,
            policy,
            missing,
            executors,
            catalogue,
        }
    }

    pub fn metrics(&self) -> &MetricTable {
        &self.metrics
    }

    /// True when any metric consumes single-valued, dichotomous or time-series pairs.
    pub fn has_metrics(&self) -> bool {
        GROUPS.iter().any(|group| self.metrics.has_group(*group))
    }

    /// Computes every requested statistic for `pool` and waits for the results.
    pub fn apply(
        &self,
        pool: &Pool<TimeSeries<SingleValuedPair>>,
    ) -> Result<StatisticsStore, VerifError> {
        let feature_group = pool.metadata().feature_group();
        if !self.has_metrics() {
            trace!(
                target: "verif.dispatch",
                feature_group = %feature_group,
                "no single-valued metrics requested"
            );
            return Ok(StatisticsStore::empty());
        }
        let pairs: usize = pool.data().iter().map(TimeSeries::len).sum();
        if pairs == 0 {
            debug!(
                target: "verif.dispatch",
                feature_group = %feature_group,
                "pool has no pairs; nothing to compute"
            );
            return Ok(StatisticsStore::empty());
        }

        let clean = transform::remove_missing_single_valued(self.missing);
        let (series, unpacked) = self.executors.run_slicing(|| {
            let series = pools::map(
                pool,
                |one: &TimeSeries<SingleValuedPair>| {
                    let kept = one.filter_map(&clean);
                    (!kept.is_empty()).then_some(kept)
                },
                PoolMetadata::clone,
            )?;
            let unpacked = pools::unpack(&series)?;
            Ok((series, unpacked))
        })?;
        debug!(
            target: "verif.dispatch",
            feature_group = %feature_group,
            pairs,
            admissible = unpacked.len(),
            "processing single-valued pool"
        );

        let store = StatisticsStoreBuilder::new();
        let dispatcher = self.dispatcher();
        dispatcher.run(SingleValuedScores, &unpacked, &store)?;
        dispatcher.run(SingleValuedDichotomous, &unpacked, &store)?;
        dispatcher.run(SingleValuedTimeSeries, &series, &store)?;
        store.build()
    }

    fn dispatcher(&self) -> Dispatcher<'_> {
        Dispatcher {
            metrics: &self.metrics,
            thresholds: &self.thresholds,
            policy: self.policy,
            executors: &self.executors,
            catalogue: &self.catalogue,
        }
    }
}
