// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use std::sync::Arc;
use verif_core::{
    DichotomousPair, EnsembleAverageType, EnsemblePair, MissingValues, Pair, Probability,
    ProbabilityPair, SingleValuedPair, Threshold, ThresholdOrientation, TimeSeries,
};

/// Summary statistic used to reduce ensemble members to one value.
pub type EnsembleSummary = Arc<dyn Fn(&[f64]) -> f64 + Send + Sync>;

/// The built-in summary for `average`.
pub fn ensemble_summary(average: EnsembleAverageType) -> EnsembleSummary {
    Arc::new(move |members: &[f64]| average.summarize(members))
}

fn ensemble_mean(members: &[f64]) -> f64 {
    EnsembleAverageType::Mean.summarize(members)
}

/// Threshold condition for single-valued pairs, honouring the threshold's orientation.
pub fn single_valued_filter(threshold: Threshold) -> impl Fn(&SingleValuedPair) -> bool + Send + Sync {
    move |pair| match threshold.orientation() {
        ThresholdOrientation::Left => threshold.test(pair.left),
        ThresholdOrientation::Right
        | ThresholdOrientation::AnyRight
        | ThresholdOrientation::RightMean => threshold.test(pair.right),
        ThresholdOrientation::LeftAndRight
        | ThresholdOrientation::LeftAndAnyRight
        | ThresholdOrientation::LeftAndRightMean => {
            threshold.test(pair.left) && threshold.test(pair.right)
        }
    }
}

/// Threshold condition for ensemble pairs, honouring the threshold's orientation.
///
/// "All" conditions hold vacuously for an empty ensemble; "any" conditions never do.
pub fn ensemble_filter(threshold: Threshold) -> impl Fn(&EnsemblePair) -> bool + Send + Sync {
    move |pair| {
        let members = pair.right.members();
        let all = || members.iter().all(|member| threshold.test(*member));
        let any = || members.iter().any(|member| threshold.test(*member));
        let mean = || threshold.test(ensemble_mean(members));
        match threshold.orientation() {
            ThresholdOrientation::Left => threshold.test(pair.left),
            ThresholdOrientation::Right => all(),
            ThresholdOrientation::LeftAndRight => threshold.test(pair.left) && all(),
            ThresholdOrientation::AnyRight => any(),
            ThresholdOrientation::LeftAndAnyRight => threshold.test(pair.left) && any(),
            ThresholdOrientation::RightMean => mean(),
            ThresholdOrientation::LeftAndRightMean => threshold.test(pair.left) && mean(),
        }
    }
}

/// Threshold condition for whole single-valued time-series: a series passes when any of its
/// events meets the condition on the oriented side(s).
pub fn time_series_filter(
    threshold: Threshold,
) -> impl Fn(&TimeSeries<SingleValuedPair>) -> bool + Send + Sync {
    move |series| {
        let events = series.events();
        let any_left = || events.iter().any(|event| threshold.test(event.value.left));
        let any_right = || events.iter().any(|event| threshold.test(event.value.right));
        match threshold.orientation() {
            ThresholdOrientation::Left => any_left(),
            ThresholdOrientation::Right
            | ThresholdOrientation::AnyRight
            | ThresholdOrientation::RightMean => any_right(),
            ThresholdOrientation::LeftAndRight
            | ThresholdOrientation::LeftAndAnyRight
            | ThresholdOrientation::LeftAndRightMean => any_left() && any_right(),
        }
    }
}

/// Drops pairs with a missing observation, removes missing members, and drops pairs left
/// with no members.
pub fn remove_missing_ensemble(
    missing: MissingValues,
) -> impl Fn(&EnsemblePair) -> Option<EnsemblePair> + Clone + Send + Sync {
    move |pair| {
        if missing.is_missing(pair.left) {
            return None;
        }
        if pair.right.members().iter().all(|m| missing.is_admissible(*m)) {
            return (!pair.right.is_empty()).then(|| pair.clone());
        }
        let right = pair.right.retain_members(|member| missing.is_admissible(member));
        (!right.is_empty()).then(|| Pair::new(pair.left, right))
    }
}

/// Drops pairs with a missing value on either side.
pub fn remove_missing_single_valued(
    missing: MissingValues,
) -> impl Fn(&SingleValuedPair) -> Option<SingleValuedPair> + Clone + Send + Sync {
    move |pair| {
        (missing.is_admissible(pair.left) && missing.is_admissible(pair.right)).then(|| pair.clone())
    }
}

/// Reduces an ensemble pair to a single-valued pair. An admissible in-band summary is used
/// when present, otherwise `summary` over the admissible members. `None` when the
/// observation or every member is missing.
pub fn ensemble_to_single_valued(
    summary: EnsembleSummary,
    missing: MissingValues,
) -> impl Fn(&EnsemblePair) -> Option<SingleValuedPair> + Clone + Send + Sync {
    move |pair| {
        if missing.is_missing(pair.left) {
            return None;
        }
        if let Some(inband) = pair.right.summary().filter(|v| missing.is_admissible(*v)) {
            return Some(Pair::new(pair.left, inband));
        }
        let members: Vec<f64> = pair
            .right
            .members()
            .iter()
            .copied()
            .filter(|member| missing.is_admissible(*member))
            .collect();
        if members.is_empty() {
            return None;
        }
        Some(Pair::new(pair.left, summary(&members)))
    }
}

/// Observation becomes 1 or 0 by the threshold; the forecast becomes the fraction of members
/// meeting it. `None` for an empty ensemble.
pub fn ensemble_to_probability(
    threshold: Threshold,
) -> impl Fn(&EnsemblePair) -> Option<ProbabilityPair> + Send + Sync {
    move |pair| {
        let members = pair.right.members();
        let hits = members.iter().filter(|m| threshold.test(**m)).count();
        let right = Probability::from_fraction(hits, members.len())?;
        Some(Pair::new(Probability::from_bool(threshold.test(pair.left)), right))
    }
}

/// Both sides become 1 or 0 by the threshold.
pub fn single_valued_to_probability(
    threshold: Threshold,
) -> impl Fn(&SingleValuedPair) -> Option<ProbabilityPair> + Send + Sync {
    move |pair| {
        Some(Pair::new(
            Probability::from_bool(threshold.test(pair.left)),
            Probability::from_bool(threshold.test(pair.right)),
        ))
    }
}

/// Both sides become occurrence flags by the threshold.
pub fn single_valued_to_dichotomous(
    threshold: Threshold,
) -> impl Fn(&SingleValuedPair) -> Option<DichotomousPair> + Send + Sync {
    move |pair| Some(Pair::new(threshold.test(pair.left), threshold.test(pair.right)))
}

/// Both probabilities become occurrence flags by a decision threshold.
pub fn probability_to_dichotomous(
    classifier: Threshold,
) -> impl Fn(&ProbabilityPair) -> Option<DichotomousPair> + Send + Sync {
    move |pair| {
        Some(Pair::new(
            classifier.test(pair.left.get()),
            classifier.test(pair.right.get()),
        ))
    }
}
