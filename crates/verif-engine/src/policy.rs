// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use tracing::{debug, trace};
use verif_core::{
    DichotomousPair, EnsemblePair, MetricName, MetricSet, Pool, Probability, ProbabilityPair,
    SingleValuedPair, TimeSeries,
};

/// Number of independent samples a slice offers to its metrics.
pub trait EffectiveSampleSize: Sized {
    fn effective_sample_size(data: &[Self]) -> usize;
}

impl EffectiveSampleSize for SingleValuedPair {
    fn effective_sample_size(data: &[Self]) -> usize {
        data.len()
    }
}

impl EffectiveSampleSize for EnsemblePair {
    fn effective_sample_size(data: &[Self]) -> usize {
        data.len()
    }
}

/// The rarer of occurrences and non-occurrences.
impl EffectiveSampleSize for ProbabilityPair {
    fn effective_sample_size(data: &[Self]) -> usize {
        let occurrences = data
            .iter()
            .filter(|pair| pair.left == Probability::ONE)
            .count();
        occurrences.min(data.len() - occurrences)
    }
}

/// The rarer of occurrences and non-occurrences.
impl EffectiveSampleSize for DichotomousPair {
    fn effective_sample_size(data: &[Self]) -> usize {
        let occurrences = data.iter().filter(|pair| pair.left).count();
        occurrences.min(data.len() - occurrences)
    }
}

/// One sample per time-series.
impl<T> EffectiveSampleSize for TimeSeries<T> {
    fn effective_sample_size(data: &[Self]) -> usize {
        data.len()
    }
}

/// What to do with one pool slice.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlicePlan {
    /// Empty slice: nothing is recorded.
    Skip,
    /// Every requested metric was elided: record an empty result without computing.
    Elided,
    /// Compute these metrics over the slice.
    Compute(MetricSet),
}

/// Minimum sample size and skill rules deciding which metrics a slice receives.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SampleSizePolicy {
    minimum_sample_size: usize,
}

impl SampleSizePolicy {
    pub fn new(minimum_sample_size: usize) -> Self {
        Self {
            minimum_sample_size,
        }
    }

    pub fn minimum_sample_size(&self) -> usize {
        self.minimum_sample_size
    }

    pub fn plan<T: EffectiveSampleSize>(&self, slice: &Pool<T>, metrics: &MetricSet) -> SlicePlan {
        let metadata = slice.metadata();
        if slice.is_empty() {
            trace!(
                target: "verif.policy",
                feature_group = %metadata.feature_group(),
                thresholds = ?metadata.thresholds().map(ToString::to_string),
                "skipping empty slice"
            );
            return SlicePlan::Skip;
        }
        if metrics.is_empty() {
            return SlicePlan::Elided;
        }

        let effective = T::effective_sample_size(slice.data());
        if effective < self.minimum_sample_size {
            debug!(
                target: "verif.policy",
                feature_group = %metadata.feature_group(),
                effective,
                minimum = self.minimum_sample_size,
                "slice is below the minimum sample size"
            );
            return match metrics.only(&MetricName::SAMPLE_SIZE) {
                Some(sample_size) => SlicePlan::Compute(sample_size),
                None => SlicePlan::Elided,
            };
        }

        let mut reduced = metrics.clone();

        if let Some(baseline) = slice.baseline() {
            // Baseline size is the element count, not an effective size.
            if baseline.len() < self.minimum_sample_size {
                debug!(
                    target: "verif.policy",
                    feature_group = %metadata.feature_group(),
                    baseline = baseline.len(),
                    minimum = self.minimum_sample_size,
                    "baseline is below the minimum sample size; eliding skill metrics"
                );
                reduced = reduced.filtered(|_, flags| !flags.skill);
            }
        } else {
            reduced = reduced.filtered(|_, flags| !flags.explicit_baseline_required);
        }

        let unconditional = metadata
            .thresholds()
            .is_none_or(|thresholds| thresholds.event().is_all_data());
        if !unconditional {
            reduced = reduced.filtered(|_, flags| flags.threshold_tolerant);
        }

        if reduced.is_empty() {
            debug!(
                target: "verif.policy",
                feature_group = %metadata.feature_group(),
                requested = metrics.len(),
                "every requested metric was elided"
            );
            SlicePlan::Elided
        } else {
            SlicePlan::Compute(reduced)
        }
    }
}
