// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::error::VerifError;
use crate::metric::{MetricDescriptor, MetricTable, SampleDataGroup, StatisticType};
use crate::pairs::{EnsembleAverageType, MissingValues};
use crate::pool::Feature;
use crate::threshold::{Threshold, ThresholdType};
use std::collections::{BTreeMap, BTreeSet};

pub const DEFAULT_MINIMUM_SAMPLE_SIZE: usize = 0;

/// Worker pool sizing. `None` lets rayon pick the thread count.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecutorConfig {
    pub slicing_threads: Option<usize>,
    pub metric_threads: Option<usize>,
}

impl ExecutorConfig {
    pub fn validate(&self) -> Result<(), VerifError> {
        if matches!(self.slicing_threads, Some(0)) {
            return Err(VerifError::invalid_input(
                "ExecutorConfig.slicing_threads must be >= 1 when provided; got 0",
            ));
        }
        if matches!(self.metric_threads, Some(0)) {
            return Err(VerifError::invalid_input(
                "ExecutorConfig.metric_threads must be >= 1 when provided; got 0",
            ));
        }
        Ok(())
    }
}

/// Declared metrics and thresholds for one evaluation plus the processing options.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Debug, PartialEq)]
pub struct EvaluationConfig {
    pub metrics: Vec<MetricDescriptor>,
    /// Raw per-feature declarations. The all-data threshold is implicit.
    pub thresholds: BTreeMap<Feature, Vec<Threshold>>,
    pub minimum_sample_size: usize,
    pub ensemble_average: EnsembleAverageType,
    pub missing_values: MissingValues,
    pub executors: ExecutorConfig,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            metrics: Vec::new(),
            thresholds: BTreeMap::new(),
            minimum_sample_size: DEFAULT_MINIMUM_SAMPLE_SIZE,
            ensemble_average: EnsembleAverageType::default(),
            missing_values: MissingValues::default(),
            executors: ExecutorConfig::default(),
        }
    }
}

impl EvaluationConfig {
    #[cfg(feature = "serde")]
    pub fn from_json(raw: &str) -> Result<Self, VerifError> {
        let config: Self = serde_json::from_str(raw).map_err(|err| {
            VerifError::declaration(format!("failed to parse evaluation config: {err}"))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// The validated metric table.
    pub fn metric_table(&self) -> Result<MetricTable, VerifError> {
        MetricTable::new(self.metrics.iter().cloned())
    }

    /// Declared thresholds as ordered sets per feature.
    pub fn thresholds_by_feature(&self) -> BTreeMap<Feature, BTreeSet<Threshold>> {
        self.thresholds
            .iter()
            .map(|(feature, thresholds)| (feature.clone(), thresholds.iter().cloned().collect()))
            .collect()
    }

    pub fn validate(&self) -> Result<(), VerifError> {
        self.executors.validate()?;

        if let Some(sentinel) = self.missing_values.sentinel {
            if !sentinel.is_finite() {
                return Err(VerifError::invalid_input(format!(
                    "EvaluationConfig.missing_values.sentinel must be finite; got {sentinel}"
                )));
            }
        }

        let table = self.metric_table()?;
        if table.is_empty() {
            return Err(VerifError::declaration(
                "cannot build a statistics processor without metrics",
            ));
        }

        let has_event_thresholds = self.thresholds.values().flatten().any(|threshold| {
            matches!(
                threshold.threshold_type(),
                ThresholdType::Value | ThresholdType::Probability
            ) && !threshold.is_all_data()
        });
        for group in [SampleDataGroup::Dichotomous, SampleDataGroup::DiscreteProbability] {
            if table.has_group(group) && !has_event_thresholds {
                return Err(VerifError::declaration(format!(
                    "{group:?} metrics require at least one value or probability threshold \
                     other than all data"
                )));
            }
        }

        for descriptor in table.descriptors() {
            if descriptor.groups.is_empty() || descriptor.statistic_types.is_empty() {
                return Err(VerifError::declaration(format!(
                    "metric '{}' must declare at least one sample data group and statistic type",
                    descriptor.name
                )));
            }
            let summary = descriptor
                .groups
                .contains(&SampleDataGroup::SingleValuedTimeSeries)
                && descriptor.statistic_types.contains(&StatisticType::DurationScore);
            if summary && descriptor.parent.is_none() {
                return Err(VerifError::declaration(format!(
                    "timing-error summary statistic '{}' must name the metric it summarizes",
                    descriptor.name
                )));
            }
        }

        Ok(())
    }
}
