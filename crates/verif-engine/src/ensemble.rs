// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::catalogue::MetricCatalogue;
use crate::category::{DiscreteProbability, EnsembleDichotomous, EnsembleScores};
use crate::dispatch::Dispatcher;
use crate::executor::Executors;
use crate::policy::SampleSizePolicy;
use crate::single_valued::SingleValuedStatisticsProcessor;
use crate::store::{StatisticsStore, StatisticsStoreBuilder};
use std::sync::Arc;
use tracing::debug;
use verif_core::{
    EnsembleAverageType, EnsemblePair, EvaluationConfig, MetricTable, MissingValues, Pool,
    SampleDataGroup, StatisticType, ThresholdType, ThresholdsByFeature, TimeSeries, VerifError,
};
use verif_slice::{EnsembleSummary, ensemble_summary, pools, thresholds, transform};

/// Computes ensemble, discrete-probability and dichotomous statistics for pools of ensemble
/// time-series, plus every single-valued statistic of the ensemble average.
pub struct EnsembleStatisticsProcessor {
    metrics: MetricTable,
    thresholds: ThresholdsByFeature,
    policy: SampleSizePolicy,
    missing: MissingValues,
    average: EnsembleAverageType,
    summary: EnsembleSummary,
    executors: Executors,
    catalogue: Arc<dyn MetricCatalogue>,
    single_valued: SingleValuedStatisticsProcessor,
}

impl EnsembleStatisticsProcessor {
    pub fn new(
        config: &EvaluationConfig,
        executors: Executors,
        catalogue: Arc<dyn MetricCatalogue>,
    ) -> Result<Self, VerifError> {
        config.validate()?;
        let metrics = config.metric_table()?;
        let thresholds = config.thresholds_by_feature();
        let policy = SampleSizePolicy::new(config.minimum_sample_size);

        let single_valued = SingleValuedStatisticsProcessor::from_parts(
            metrics.without_groups(&[
                SampleDataGroup::Ensemble,
                SampleDataGroup::DiscreteProbability,
            ]),
            thresholds.clone(),
            policy,
            config.missing_values,
            executors.clone(),
            Arc::clone(&catalogue),
        );

        Ok(Self {
            metrics,
            thresholds,
            policy,
            missing: config.missing_values,
            average: config.ensemble_average,
            summary: ensemble_summary(config.ensemble_average),
            executors,
            catalogue,
            single_valued,
        })
    }

    /// Replaces the function that reduces members to the single-valued forecast. The
    /// configured average type is still recorded in the metadata.
    pub fn with_ensemble_summary(mut self, summary: EnsembleSummary) -> Self {
        self.summary = summary;
        self
    }

    pub fn metrics(&self) -> &MetricTable {
        &self.metrics
    }

    pub fn ensemble_average(&self) -> EnsembleAverageType {
        self.average
    }

    /// Computes every requested statistic for `pool` and waits for the results. Ensemble
    /// results come first in each bucket, followed by those of the ensemble average.
    pub fn apply(
        &self,
        pool: &Pool<TimeSeries<EnsemblePair>>,
    ) -> Result<StatisticsStore, VerifError> {
        let feature_group = pool.metadata().feature_group();
        let pairs: usize = pool.data().iter().map(TimeSeries::len).sum();
        if pairs == 0 {
            debug!(
                target: "verif.dispatch",
                feature_group = %feature_group,
                "pool has no pairs; nothing to compute"
            );
            return Ok(StatisticsStore::empty());
        }

        let average = self.average;
        let clean = transform::remove_missing_ensemble(self.missing);
        let to_single =
            transform::ensemble_to_single_valued(Arc::clone(&self.summary), self.missing);
        let (ensemble, single) = self.executors.run_slicing(|| {
            let unpacked = pools::unpack(pool)?;
            let ensemble = pools::map(&unpacked, &clean, |metadata| {
                metadata.with_ensemble_average(average)
            })?;
            let single = pools::map(
                pool,
                |series: &TimeSeries<EnsemblePair>| {
                    let reduced = series.filter_map(&to_single);
                    (!reduced.is_empty()).then_some(reduced)
                },
                |metadata| metadata.with_ensemble_average(average),
            )?;
            Ok((ensemble, single))
        })?;
        debug!(
            target: "verif.dispatch",
            feature_group = %feature_group,
            pairs,
            admissible = ensemble.len(),
            ?average,
            "processing ensemble pool"
        );

        let store = StatisticsStoreBuilder::new();
        let dispatcher = self.dispatcher();
        dispatcher.run(EnsembleScores, &ensemble, &store)?;
        dispatcher.run(DiscreteProbability, &ensemble, &store)?;
        if self.metrics.has_group(SampleDataGroup::Dichotomous) {
            let classifiers = thresholds::decompose(&thresholds::select(
                &self.thresholds,
                feature_group.features(),
                &[ThresholdType::ProbabilityClassifier],
                false,
            ));
            if classifiers.is_empty() {
                debug!(
                    target: "verif.dispatch",
                    feature_group = %feature_group,
                    "no probability classifiers; dichotomous metrics use the ensemble average only"
                );
            } else {
                dispatcher.run(EnsembleDichotomous { classifiers }, &ensemble, &store)?;
            }
        }

        let derived = self.single_valued.apply(&single)?;
        let native = store.build()?;
        Ok(native.merge(&derived, &StatisticType::ALL))
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
