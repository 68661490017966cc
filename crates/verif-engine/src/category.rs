// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::catalogue::MetricCatalogue;
use crate::policy::EffectiveSampleSize;
use std::collections::BTreeMap;
use tracing::trace;
use verif_core::{
    DichotomousPair, EnsemblePair, Feature, MetricSet, OneOrTwoThresholds, Pool, PoolMetadata,
    ProbabilityPair, SampleDataGroup, SingleValuedPair, StatisticType, Statistics, Threshold,
    ThresholdGroup, ThresholdType, TimeSeries, VerifError,
};
use verif_slice::pools;
use verif_slice::thresholds::compose;
use verif_slice::transform;

const EVENT_THRESHOLD_TYPES: &[ThresholdType] = &[ThresholdType::Value, ThresholdType::Probability];

/// Everything that differs between pair categories: which thresholds apply, how a pool is
/// sliced by one logical threshold, which statistic kinds exist, and which catalogue entry
/// point computes them.
pub(crate) trait Category: Send + Sync + 'static {
    type Input: Clone + Send + Sync + 'static;
    type Sliced: Clone + Send + Sync + EffectiveSampleSize + 'static;

    fn group(&self) -> SampleDataGroup;

    fn statistic_types(&self) -> &'static [StatisticType];

    fn threshold_types(&self) -> &'static [ThresholdType] {
        EVENT_THRESHOLD_TYPES
    }

    fn includes_all_data(&self) -> bool;

    /// Slices the feature-decomposed pool by one threshold group. Most categories produce
    /// one slice; some produce one per secondary threshold.
    fn slice(
        &self,
        pools: &BTreeMap<Feature, Pool<Self::Input>>,
        parent: &Pool<Self::Input>,
        thresholds: &ThresholdGroup,
    ) -> Result<Vec<Pool<Self::Sliced>>, VerifError>;

    fn compute(
        catalogue: &dyn MetricCatalogue,
        kind: StatisticType,
        slice: &Pool<Self::Sliced>,
        metrics: &MetricSet,
    ) -> Result<Statistics, VerifError>;

    /// Static narrowing of the requested metrics for one slice.
    fn restrict(
        &self,
        _kind: StatisticType,
        _slice: &Pool<Self::Sliced>,
        metrics: MetricSet,
    ) -> MetricSet {
        metrics
    }
}

fn filter_slice<T, P>(
    pools: &BTreeMap<Feature, Pool<T>>,
    parent: &Pool<T>,
    thresholds: &ThresholdGroup,
    predicate: impl Fn(Threshold) -> P,
) -> Result<Pool<T>, VerifError>
where
    T: Clone,
    P: Fn(&T) -> bool,
{
    let stamped = OneOrTwoThresholds::one(compose(thresholds.values())?);
    let filters: BTreeMap<Feature, P> = thresholds
        .iter()
        .map(|(feature, threshold)| (feature.clone(), predicate(threshold.clone())))
        .collect();
    pools::filter(
        pools,
        &filters,
        parent.metadata(),
        parent.baseline().map(Pool::metadata),
        |metadata| metadata.with_thresholds(stamped.clone()),
    )
}

fn transform_slice<T, U, F>(
    pools: &BTreeMap<Feature, Pool<T>>,
    parent: &Pool<T>,
    thresholds: &ThresholdGroup,
    mapper: impl Fn(Threshold) -> F,
) -> Result<Pool<U>, VerifError>
where
    U: Clone,
    F: Fn(&T) -> Option<U>,
{
    let stamped = OneOrTwoThresholds::one(compose(thresholds.values())?);
    let mappers: BTreeMap<Feature, F> = thresholds
        .iter()
        .map(|(feature, threshold)| (feature.clone(), mapper(threshold.clone())))
        .collect();
    pools::transform(
        pools,
        &mappers,
        parent.metadata(),
        parent.baseline().map(Pool::metadata),
        |metadata| metadata.with_thresholds(stamped.clone()),
    )
}

/// Scores, diagrams and per-pool box plots of single-valued pairs.
pub(crate) struct SingleValuedScores;

impl Category for SingleValuedScores {
    type Input = SingleValuedPair;
    type Sliced = SingleValuedPair;

    fn group(&self) -> SampleDataGroup {
        SampleDataGroup::SingleValued
    }

    fn statistic_types(&self) -> &'static [StatisticType] {
        &[
            StatisticType::DoubleScore,
            StatisticType::Diagram,
            StatisticType::BoxplotPerPool,
        ]
    }

    fn includes_all_data(&self) -> bool {
        true
    }

    fn slice(
        &self,
        pools: &BTreeMap<Feature, Pool<SingleValuedPair>>,
        parent: &Pool<SingleValuedPair>,
        thresholds: &ThresholdGroup,
    ) -> Result<Vec<Pool<SingleValuedPair>>, VerifError> {
        Ok(vec![filter_slice(
            pools,
            parent,
            thresholds,
            transform::single_valued_filter,
        )?])
    }

    fn compute(
        catalogue: &dyn MetricCatalogue,
        kind: StatisticType,
        slice: &Pool<SingleValuedPair>,
        metrics: &MetricSet,
    ) -> Result<Statistics, VerifError> {
        catalogue.single_valued(kind, slice, metrics)
    }
}

/// Contingency-table scores of single-valued pairs turned into occurrences.
pub(crate) struct SingleValuedDichotomous;

impl Category for SingleValuedDichotomous {
    type Input = SingleValuedPair;
    type Sliced = DichotomousPair;

    fn group(&self) -> SampleDataGroup {
        SampleDataGroup::Dichotomous
    }

    fn statistic_types(&self) -> &'static [StatisticType] {
        &[StatisticType::DoubleScore]
    }

    fn includes_all_data(&self) -> bool {
        false
    }

    fn slice(
        &self,
        pools: &BTreeMap<Feature, Pool<SingleValuedPair>>,
        parent: &Pool<SingleValuedPair>,
        thresholds: &ThresholdGroup,
    ) -> Result<Vec<Pool<DichotomousPair>>, VerifError> {
        Ok(vec![transform_slice(
            pools,
            parent,
            thresholds,
            transform::single_valued_to_dichotomous,
        )?])
    }

    fn compute(
        catalogue: &dyn MetricCatalogue,
        kind: StatisticType,
        slice: &Pool<DichotomousPair>,
        metrics: &MetricSet,
    ) -> Result<Statistics, VerifError> {
        catalogue.dichotomous(kind, slice, metrics)
    }
}

/// Timing-error diagrams and their summaries over whole single-valued time-series.
pub(crate) struct SingleValuedTimeSeries;

impl Category for SingleValuedTimeSeries {
    type Input = TimeSeries<SingleValuedPair>;
    type Sliced = TimeSeries<SingleValuedPair>;

    fn group(&self) -> SampleDataGroup {
        SampleDataGroup::SingleValuedTimeSeries
    }

    fn statistic_types(&self) -> &'static [StatisticType] {
        &[StatisticType::DurationDiagram, StatisticType::DurationScore]
    }

    fn includes_all_data(&self) -> bool {
        true
    }

    fn slice(
        &self,
        pools: &BTreeMap<Feature, Pool<Self::Input>>,
        parent: &Pool<Self::Input>,
        thresholds: &ThresholdGroup,
    ) -> Result<Vec<Pool<Self::Sliced>>, VerifError> {
        Ok(vec![filter_slice(
            pools,
            parent,
            thresholds,
            transform::time_series_filter,
        )?])
    }

    fn compute(
        catalogue: &dyn MetricCatalogue,
        kind: StatisticType,
        slice: &Pool<Self::Sliced>,
        metrics: &MetricSet,
    ) -> Result<Statistics, VerifError> {
        catalogue.time_series(kind, slice, metrics)
    }
}

/// Scores, diagrams and per-pair box plots of ensemble pairs.
pub(crate) struct EnsembleScores;

impl Category for EnsembleScores {
    type Input = EnsemblePair;
    type Sliced = EnsemblePair;

    fn group(&self) -> SampleDataGroup {
        SampleDataGroup::Ensemble
    }

    fn statistic_types(&self) -> &'static [StatisticType] {
        &[
            StatisticType::DoubleScore,
            StatisticType::Diagram,
            StatisticType::BoxplotPerPair,
        ]
    }

    fn includes_all_data(&self) -> bool {
        true
    }

    fn slice(
        &self,
        pools: &BTreeMap<Feature, Pool<EnsemblePair>>,
        parent: &Pool<EnsemblePair>,
        thresholds: &ThresholdGroup,
    ) -> Result<Vec<Pool<EnsemblePair>>, VerifError> {
        Ok(vec![filter_slice(
            pools,
            parent,
            thresholds,
            transform::ensemble_filter,
        )?])
    }

    fn compute(
        catalogue: &dyn MetricCatalogue,
        kind: StatisticType,
        slice: &Pool<EnsemblePair>,
        metrics: &MetricSet,
    ) -> Result<Statistics, VerifError> {
        catalogue.ensemble(kind, slice, metrics)
    }

    /// A baseline evaluated as a forecast in its own right has nothing to be skillful
    /// against, so scores that need an explicit baseline are dropped.
    fn restrict(
        &self,
        kind: StatisticType,
        slice: &Pool<EnsemblePair>,
        metrics: MetricSet,
    ) -> MetricSet {
        if kind == StatisticType::DoubleScore
            && slice.metadata().is_baseline_pool()
            && !slice.has_baseline()
        {
            return metrics.filtered(|_, flags| !flags.explicit_baseline_required);
        }
        metrics
    }
}

/// Probability scores and diagrams of ensembles turned into forecast probabilities.
pub(crate) struct DiscreteProbability;

impl Category for DiscreteProbability {
    type Input = EnsemblePair;
    type Sliced = ProbabilityPair;

    fn group(&self) -> SampleDataGroup {
        SampleDataGroup::DiscreteProbability
    }

    fn statistic_types(&self) -> &'static [StatisticType] {
        &[StatisticType::DoubleScore, StatisticType::Diagram]
    }

    fn includes_all_data(&self) -> bool {
        false
    }

    fn slice(
        &self,
        pools: &BTreeMap<Feature, Pool<EnsemblePair>>,
        parent: &Pool<EnsemblePair>,
        thresholds: &ThresholdGroup,
    ) -> Result<Vec<Pool<ProbabilityPair>>, VerifError> {
        Ok(vec![transform_slice(
            pools,
            parent,
            thresholds,
            transform::ensemble_to_probability,
        )?])
    }

    fn compute(
        catalogue: &dyn MetricCatalogue,
        kind: StatisticType,
        slice: &Pool<ProbabilityPair>,
        metrics: &MetricSet,
    ) -> Result<Statistics, VerifError> {
        catalogue.discrete_probability(kind, slice, metrics)
    }
}

/// Contingency-table scores of ensembles: forecast probabilities by event threshold, then
/// occurrences by each decision (classifier) threshold group.
pub(crate) struct EnsembleDichotomous {
    pub(crate) classifiers: Vec<ThresholdGroup>,
}

impl Category for EnsembleDichotomous {
    type Input = EnsemblePair;
    type Sliced = DichotomousPair;

    fn group(&self) -> SampleDataGroup {
        SampleDataGroup::Dichotomous
    }

    fn statistic_types(&self) -> &'static [StatisticType] {
        &[StatisticType::DoubleScore]
    }

    fn includes_all_data(&self) -> bool {
        false
    }

    fn slice(
        &self,
        pools: &BTreeMap<Feature, Pool<EnsemblePair>>,
        parent: &Pool<EnsemblePair>,
        thresholds: &ThresholdGroup,
    ) -> Result<Vec<Pool<DichotomousPair>>, VerifError> {
        let event = compose(thresholds.values())?;
        let mappers: BTreeMap<Feature, _> = thresholds
            .iter()
            .map(|(feature, threshold)| {
                (
                    feature.clone(),
                    transform::ensemble_to_probability(threshold.clone()),
                )
            })
            .collect();
        let probabilities = pools::transform(
            pools,
            &mappers,
            parent.metadata(),
            parent.baseline().map(Pool::metadata),
            PoolMetadata::clone,
        )?;
        let by_feature = pools::decompose(&probabilities, pools::feature_key)?;

        let mut slices = Vec::with_capacity(self.classifiers.len());
        for classifiers in &self.classifiers {
            if !classifiers.keys().any(|feature| by_feature.contains_key(feature)) {
                trace!(
                    target: "verif.dispatch",
                    feature_group = %parent.metadata().feature_group(),
                    "decision threshold group covers no feature with pairs"
                );
                continue;
            }
            let stamped = OneOrTwoThresholds::two(event.clone(), compose(classifiers.values())?);
            let mappers: BTreeMap<Feature, _> = classifiers
                .iter()
                .map(|(feature, classifier)| {
                    (
                        feature.clone(),
                        transform::probability_to_dichotomous(classifier.clone()),
                    )
                })
                .collect();
            slices.push(pools::transform(
                &by_feature,
                &mappers,
                probabilities.metadata(),
                probabilities.baseline().map(Pool::metadata),
                |metadata| metadata.with_thresholds(stamped.clone()),
            )?);
        }
        Ok(slices)
    }

    fn compute(
        catalogue: &dyn MetricCatalogue,
        kind: StatisticType,
        slice: &Pool<DichotomousPair>,
        metrics: &MetricSet,
    ) -> Result<Statistics, VerifError> {
        catalogue.dichotomous(kind, slice, metrics)
    }
}
