// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Deterministic fixtures shared by the benchmarks.

use verif_core::{
    Bounds, Event, Feature, FeatureGroup, MetricSet, Pair, Pool, PoolMetadata, ScoreValue,
    SingleValuedPair, Statistic, StatisticType, Statistics, Threshold, ThresholdOperator,
    ThresholdOrientation, ThresholdsByFeature, TimeSeries, VerifError,
};
use verif_engine::MetricCatalogue;

pub fn lcg_next(state: &mut u64) -> u64 {
    *state = state
        .wrapping_mul(6364136223846793005)
        .wrapping_add(1442695040888963407);
    *state
}

fn unit(state: &mut u64) -> f64 {
    (lcg_next(state) >> 11) as f64 / (1u64 << 53) as f64
}

pub fn feature_name(index: usize) -> Feature {
    Feature::new(format!("F{index:04}"))
}

/// `per_feature` value thresholds for each of `features` features; every fourth one is
/// labelled so that named grouping is exercised alongside exact grouping.
pub fn declared_thresholds(features: usize, per_feature: usize) -> ThresholdsByFeature {
    let mut state = 0x5eed_0f_7e57_u64;
    (0..features)
        .map(|index| {
            let declared = (0..per_feature)
                .filter_map(|k| {
                    let value = (k as f64 * 2.5 + unit(&mut state)).round();
                    let threshold = Threshold::value(
                        ThresholdOperator::Greater,
                        Bounds::One(value),
                        ThresholdOrientation::LeftAndRight,
                    )
                    .ok()?;
                    Some(if k % 4 == 0 {
                        threshold.with_label(format!("level {k}"))
                    } else {
                        threshold
                    })
                })
                .collect();
            (feature_name(index), declared)
        })
        .collect()
}

/// A pool over `features` features, each holding one series of `pairs_per_feature` pairs.
pub fn synthetic_pool(
    features: usize,
    pairs_per_feature: usize,
) -> Result<Pool<TimeSeries<SingleValuedPair>>, VerifError> {
    let mut state = 0xfeed_f00d_dead_beef_u64;
    let group = FeatureGroup::new(Some("benchmark"), (0..features).map(feature_name));
    let mut builder = Pool::builder().metadata(PoolMetadata::new(group));
    for index in 0..features {
        let events = (0..pairs_per_feature)
            .map(|step| {
                let observed = 20.0 * unit(&mut state);
                let forecast = observed + 4.0 * (unit(&mut state) - 0.5);
                Event::new(step as i64 * 3_600, Pair::new(observed, forecast))
            })
            .collect();
        let mini = Pool::builder()
            .metadata(PoolMetadata::new(FeatureGroup::single(feature_name(index))))
            .add_data(std::iter::once(TimeSeries::new(Some(0), events)))
            .build()?;
        builder = builder.add_pool(&mini);
    }
    builder.build()
}

/// Answers single-valued score requests with the slice size, so dispatch overhead dominates.
#[derive(Debug, Default)]
pub struct CountingCatalogue;

impl MetricCatalogue for CountingCatalogue {
    fn single_valued(
        &self,
        kind: StatisticType,
        pool: &Pool<SingleValuedPair>,
        metrics: &MetricSet,
    ) -> Result<Statistics, VerifError> {
        if kind != StatisticType::DoubleScore {
            return Ok(Statistics::empty(kind));
        }
        Ok(Statistics::DoubleScore(
            metrics
                .names()
                .map(|name| {
                    Statistic::new(
                        name.clone(),
                        pool.metadata().clone(),
                        ScoreValue::main(pool.len() as f64),
                    )
                })
                .collect(),
        ))
    }
}
