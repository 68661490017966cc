// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]
#![allow(dead_code)]

use verif_core::{
    Ensemble, EnsemblePair, Event, ExecutorConfig, Feature, FeatureGroup, MetricDescriptor,
    MetricName, Pair, Pool, PoolMetadata, SampleDataGroup, SingleValuedPair, StatisticType,
    TimeSeries,
};
use verif_engine::Executors;

pub fn executors() -> Executors {
    Executors::new(&ExecutorConfig {
        slicing_threads: Some(2),
        metric_threads: Some(2),
    })
    .expect("worker pools should build")
}

pub fn metadata(feature: &str) -> PoolMetadata {
    PoolMetadata::new(FeatureGroup::single(Feature::new(feature)))
}

pub fn score(name: &'static str, group: SampleDataGroup) -> MetricDescriptor {
    MetricDescriptor::new(
        MetricName::from_static(name),
        [group],
        [StatisticType::DoubleScore],
    )
}

/// One series holding `pairs` at consecutive valid times.
pub fn series<T: Clone>(pairs: &[T]) -> TimeSeries<T> {
    TimeSeries::new(
        Some(0),
        pairs
            .iter()
            .enumerate()
            .map(|(i, pair)| Event::new(i as i64 * 3_600, pair.clone()))
            .collect(),
    )
}

pub fn single_valued(values: &[(f64, f64)]) -> Vec<SingleValuedPair> {
    values
        .iter()
        .map(|&(left, right)| Pair::new(left, right))
        .collect()
}

pub fn ensemble(values: &[(f64, Vec<f64>)]) -> Vec<EnsemblePair> {
    values
        .iter()
        .map(|(left, members)| Pair::new(*left, Ensemble::new(members.clone())))
        .collect()
}

/// A one-feature pool with a single series of `pairs` and an optional baseline series.
pub fn pool<T: Clone>(feature: &str, pairs: &[T], baseline: Option<&[T]>) -> Pool<TimeSeries<T>> {
    let mut builder = Pool::builder()
        .metadata(metadata(feature))
        .add_data(std::iter::once(series(pairs)));
    if let Some(baseline) = baseline {
        builder = builder
            .baseline_metadata(metadata(feature))
            .add_baseline_data(std::iter::once(series(baseline)));
    }
    builder.build().expect("fixture pool should build")
}

/// A pool over several features assembled from one-feature pools.
pub fn pooled<T: Clone>(name: &str, minis: &[Pool<TimeSeries<T>>]) -> Pool<TimeSeries<T>> {
    let features = minis
        .iter()
        .flat_map(|mini| mini.metadata().feature_group().features().iter().cloned());
    let mut builder =
        Pool::builder().metadata(PoolMetadata::new(FeatureGroup::new(Some(name), features)));
    for mini in minis {
        builder = builder.add_pool(mini);
    }
    builder.build().expect("pooled fixture should build")
}
