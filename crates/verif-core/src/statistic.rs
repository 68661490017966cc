// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::metric::{MetricName, StatisticType};
use crate::pool::PoolMetadata;

/// One metric's output for one pool slice.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct Statistic<V> {
    pub metric: MetricName,
    pub metadata: PoolMetadata,
    pub value: V,
}

impl<V> Statistic<V> {
    pub fn new(metric: MetricName, metadata: PoolMetadata, value: V) -> Self {
        Self {
            metric,
            metadata,
            value,
        }
    }
}

/// Named real-valued components (a plain score has one, e.g. `"MAIN"`).
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScoreValue {
    pub components: Vec<(String, f64)>,
}

impl ScoreValue {
    pub fn main(value: f64) -> Self {
        Self {
            components: vec![("MAIN".to_owned(), value)],
        }
    }

    pub fn component(&self, name: &str) -> Option<f64> {
        self.components
            .iter()
            .find(|(component, _)| component == name)
            .map(|(_, value)| *value)
    }
}

/// Named vectors sharing an index, e.g. a reliability diagram.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DiagramValue {
    pub components: Vec<(String, Vec<f64>)>,
}

/// One box: an optional linked value (the pair's observation for per-pair boxes) and the
/// quantiles at [`BoxplotValue::probabilities`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BoxplotItem {
    pub linked_value: Option<f64>,
    pub quantiles: Vec<f64>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BoxplotValue {
    pub probabilities: Vec<f64>,
    pub boxes: Vec<BoxplotItem>,
}

/// Named duration components in seconds.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DurationScoreValue {
    pub components: Vec<(String, f64)>,
}

/// `(reference time, error seconds)` pairs, one per time-series.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DurationDiagramValue {
    pub pairs: Vec<(i64, i64)>,
}

pub type ScoreStatistic = Statistic<ScoreValue>;
pub type DiagramStatistic = Statistic<DiagramValue>;
pub type BoxplotStatistic = Statistic<BoxplotValue>;
pub type DurationScoreStatistic = Statistic<DurationScoreValue>;
pub type DurationDiagramStatistic = Statistic<DurationDiagramValue>;

/// Typed results for one statistic kind.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub enum Statistics {
    DoubleScore(Vec<ScoreStatistic>),
    Diagram(Vec<DiagramStatistic>),
    BoxplotPerPair(Vec<BoxplotStatistic>),
    BoxplotPerPool(Vec<BoxplotStatistic>),
    DurationScore(Vec<DurationScoreStatistic>),
    DurationDiagram(Vec<DurationDiagramStatistic>),
}

impl Statistics {
    pub fn empty(kind: StatisticType) -> Self {
        match kind {
            StatisticType::DoubleScore => Self::DoubleScore(Vec::new()),
            StatisticType::Diagram => Self::Diagram(Vec::new()),
            StatisticType::BoxplotPerPair => Self::BoxplotPerPair(Vec::new()),
            StatisticType::BoxplotPerPool => Self::BoxplotPerPool(Vec::new()),
            StatisticType::DurationScore => Self::DurationScore(Vec::new()),
            StatisticType::DurationDiagram => Self::DurationDiagram(Vec::new()),
        }
    }

    pub fn kind(&self) -> StatisticType {
        match self {
            Self::DoubleScore(_) => StatisticType::DoubleScore,
            Self::Diagram(_) => StatisticType::Diagram,
            Self::BoxplotPerPair(_) => StatisticType::BoxplotPerPair,
            Self::BoxplotPerPool(_) => StatisticType::BoxplotPerPool,
            Self::DurationScore(_) => StatisticType::DurationScore,
            Self::DurationDiagram(_) => StatisticType::DurationDiagram,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::DoubleScore(values) => values.len(),
            Self::Diagram(values) => values.len(),
            Self::BoxplotPerPair(values) | Self::BoxplotPerPool(values) => values.len(),
            Self::DurationScore(values) => values.len(),
            Self::DurationDiagram(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::{ScoreValue, Statistics};
    use crate::metric::StatisticType;

    #[test]
    fn empty_statistics_report_their_kind() {
        for kind in StatisticType::ALL {
            let empty = Statistics::empty(kind);
            assert_eq!(empty.kind(), kind);
            assert!(empty.is_empty());
        }
    }

    #[test]
    fn score_value_component_lookup() {
        let score = ScoreValue::main(0.25);
        assert_eq!(score.component("MAIN"), Some(0.25));
        assert_eq!(score.component("BIAS"), None);
    }
}
