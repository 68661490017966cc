// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod metric;
pub mod pairs;
pub mod pool;
pub mod statistic;
pub mod threshold;

use std::collections::{BTreeMap, BTreeSet};

pub use config::{DEFAULT_MINIMUM_SAMPLE_SIZE, EvaluationConfig, ExecutorConfig};
pub use error::VerifError;
pub use metric::{
    MetricDescriptor, MetricFlags, MetricName, MetricSet, MetricTable, SampleDataGroup,
    StatisticType,
};
pub use pairs::{
    DichotomousPair, Ensemble, EnsembleAverageType, EnsemblePair, Event, MissingValues, Pair,
    Probability, ProbabilityPair, SingleValuedPair, TimeSeries,
};
pub use pool::{Climatology, Feature, FeatureGroup, Pool, PoolBuilder, PoolMetadata, TimeWindow};
pub use statistic::{
    BoxplotItem, BoxplotStatistic, BoxplotValue, DiagramStatistic, DiagramValue,
    DurationDiagramStatistic, DurationDiagramValue, DurationScoreStatistic, DurationScoreValue,
    ScoreStatistic, ScoreValue, Statistic, Statistics,
};
pub use threshold::{
    Bounds, EQUAL_TOLERANCE, OneOrTwoThresholds, Threshold, ThresholdBuilder, ThresholdOperator,
    ThresholdOrientation, ThresholdType,
};

/// Per-feature threshold declarations.
pub type ThresholdsByFeature = BTreeMap<Feature, BTreeSet<Threshold>>;

/// One logical threshold resolved for each feature of a group.
pub type ThresholdGroup = BTreeMap<Feature, Threshold>;

/// Crate identifier used in diagnostics.
pub fn crate_name() -> &'static str {
    "verif-core"
}
