// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]
#![allow(dead_code)]

use std::sync::Mutex;
use verif_core::{
    BoxplotValue, DiagramValue, DichotomousPair, DurationDiagramValue, DurationScoreValue,
    EnsemblePair, MetricName, MetricSet, OneOrTwoThresholds, Pool, PoolMetadata,
    ProbabilityPair, ScoreValue, SingleValuedPair, Statistic, StatisticType, Statistics,
    TimeSeries, VerifError,
};
use verif_engine::MetricCatalogue;

/// One catalogue invocation as seen by the engine.
#[derive(Clone, Debug)]
pub struct Call {
    pub category: &'static str,
    pub kind: StatisticType,
    pub metrics: Vec<MetricName>,
    pub size: usize,
    pub metadata: PoolMetadata,
    /// Forecast values of single-valued slices, in pool order.
    pub forecasts: Vec<f64>,
}

impl Call {
    pub fn thresholds(&self) -> Option<&OneOrTwoThresholds> {
        self.metadata.thresholds()
    }
}

/// Records every call and answers with one statistic per requested metric. Scores carry the
/// slice size as their `MAIN` component.
#[derive(Debug, Default)]
pub struct RecordingCatalogue {
    calls: Mutex<Vec<Call>>,
    panic_on: Option<MetricName>,
    fail_on: Option<MetricName>,
}

impl RecordingCatalogue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn panicking_on(mut self, metric: MetricName) -> Self {
        self.panic_on = Some(metric);
        self
    }

    pub fn failing_on(mut self, metric: MetricName) -> Self {
        self.fail_on = Some(metric);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("calls lock").len()
    }

    fn record<T>(
        &self,
        category: &'static str,
        kind: StatisticType,
        pool: &Pool<T>,
        metrics: &MetricSet,
        forecasts: Vec<f64>,
    ) -> Result<Statistics, VerifError> {
        if let Some(metric) = &self.panic_on {
            if metrics.contains(metric) {
                panic!("catalogue asked to panic on {metric}");
            }
        }
        if let Some(metric) = &self.fail_on {
            if metrics.contains(metric) {
                return Err(VerifError::computation(format!("{metric} failed")));
            }
        }
        self.calls.lock().expect("calls lock").push(Call {
            category,
            kind,
            metrics: metrics.names().cloned().collect(),
            size: pool.len(),
            metadata: pool.metadata().clone(),
            forecasts,
        });
        Ok(respond(kind, pool.metadata(), metrics, pool.len()))
    }
}

fn respond(
    kind: StatisticType,
    metadata: &PoolMetadata,
    metrics: &MetricSet,
    size: usize,
) -> Statistics {
    fn each<V: Clone>(
        metadata: &PoolMetadata,
        metrics: &MetricSet,
        value: V,
    ) -> Vec<Statistic<V>> {
        metrics
            .names()
            .map(|name| Statistic::new(name.clone(), metadata.clone(), value.clone()))
            .collect()
    }

    match kind {
        StatisticType::DoubleScore => {
            Statistics::DoubleScore(each(metadata, metrics, ScoreValue::main(size as f64)))
        }
        StatisticType::Diagram => {
            Statistics::Diagram(each(metadata, metrics, DiagramValue::default()))
        }
        StatisticType::BoxplotPerPair => {
            Statistics::BoxplotPerPair(each(metadata, metrics, BoxplotValue::default()))
        }
        StatisticType::BoxplotPerPool => {
            Statistics::BoxplotPerPool(each(metadata, metrics, BoxplotValue::default()))
        }
        StatisticType::DurationScore => {
            Statistics::DurationScore(each(metadata, metrics, DurationScoreValue::default()))
        }
        StatisticType::DurationDiagram => {
            Statistics::DurationDiagram(each(metadata, metrics, DurationDiagramValue::default()))
        }
    }
}

impl MetricCatalogue for RecordingCatalogue {
    fn single_valued(
        &self,
        kind: StatisticType,
        pool: &Pool<SingleValuedPair>,
        metrics: &MetricSet,
    ) -> Result<Statistics, VerifError> {
        let forecasts = pool.data().iter().map(|pair| pair.right).collect();
        self.record("single-valued", kind, pool, metrics, forecasts)
    }

    fn ensemble(
        &self,
        kind: StatisticType,
        pool: &Pool<EnsemblePair>,
        metrics: &MetricSet,
    ) -> Result<Statistics, VerifError> {
        self.record("ensemble", kind, pool, metrics, Vec::new())
    }

    fn discrete_probability(
        &self,
        kind: StatisticType,
        pool: &Pool<ProbabilityPair>,
        metrics: &MetricSet,
    ) -> Result<Statistics, VerifError> {
        self.record("discrete-probability", kind, pool, metrics, Vec::new())
    }

    fn dichotomous(
        &self,
        kind: StatisticType,
        pool: &Pool<DichotomousPair>,
        metrics: &MetricSet,
    ) -> Result<Statistics, VerifError> {
        self.record("dichotomous", kind, pool, metrics, Vec::new())
    }

    fn time_series(
        &self,
        kind: StatisticType,
        pool: &Pool<TimeSeries<SingleValuedPair>>,
        metrics: &MetricSet,
    ) -> Result<Statistics, VerifError> {
        self.record("time-series", kind, pool, metrics, Vec::new())
    }
}
