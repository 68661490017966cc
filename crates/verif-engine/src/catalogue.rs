// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use verif_core::{
    DichotomousPair, EnsemblePair, MetricSet, Pool, ProbabilityPair, SingleValuedPair,
    StatisticType, Statistics, TimeSeries, VerifError,
};

fn unsupported(category: &str, kind: StatisticType) -> VerifError {
    VerifError::not_supported(format!(
        "metric catalogue does not compute {kind:?} statistics for {category} pairs"
    ))
}

/// Computes named metrics over a pool slice. One method per pair category; each returns the
/// statistics of the requested `kind`, one entry per computed metric, with the slice's
/// metadata attached.
///
/// Implementations run on the metric pool and must be thread-safe. Unimplemented categories
/// report [`VerifError::NotSupported`].
pub trait MetricCatalogue: Send + Sync {
    fn single_valued(
        &self,
        kind: StatisticType,
        pool: &Pool<SingleValuedPair>,
        metrics: &MetricSet,
    ) -> Result<Statistics, VerifError> {
        let _ = (pool, metrics);
        Err(unsupported("single-valued", kind))
    }

    fn ensemble(
        &self,
        kind: StatisticType,
        pool: &Pool<EnsemblePair>,
        metrics: &MetricSet,
    ) -> Result<Statistics, VerifError> {
        let _ = (pool, metrics);
        Err(unsupported("ensemble", kind))
    }

    fn discrete_probability(
        &self,
        kind: StatisticType,
        pool: &Pool<ProbabilityPair>,
        metrics: &MetricSet,
    ) -> Result<Statistics, VerifError> {
        let _ = (pool, metrics);
        Err(unsupported("discrete probability", kind))
    }

    fn dichotomous(
        &self,
        kind: StatisticType,
        pool: &Pool<DichotomousPair>,
        metrics: &MetricSet,
    ) -> Result<Statistics, VerifError> {
        let _ = (pool, metrics);
        Err(unsupported("dichotomous", kind))
    }

    fn time_series(
        &self,
        kind: StatisticType,
        pool: &Pool<TimeSeries<SingleValuedPair>>,
        metrics: &MetricSet,
    ) -> Result<Statistics, VerifError> {
        let _ = (pool, metrics);
        Err(unsupported("single-valued time-series", kind))
    }
}
