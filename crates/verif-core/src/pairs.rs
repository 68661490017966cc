// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::error::VerifError;
use std::sync::Arc;

/// An observed (left) value paired with a predicted (right) value.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct Pair<L, R> {
    pub left: L,
    pub right: R,
}

impl<L, R> Pair<L, R> {
    pub fn new(left: L, right: R) -> Self {
        Self { left, right }
    }
}

pub type SingleValuedPair = Pair<f64, f64>;
pub type EnsemblePair = Pair<f64, Ensemble>;
pub type ProbabilityPair = Pair<Probability, Probability>;
pub type DichotomousPair = Pair<bool, bool>;

/// Ensemble members, optionally labelled, with an optional in-band summary value.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Ensemble {
    members: Vec<f64>,
    labels: Option<Arc<[Arc<str>]>>,
    summary: Option<f64>,
}

impl Ensemble {
    pub fn new(members: Vec<f64>) -> Self {
        Self {
            members,
            labels: None,
            summary: None,
        }
    }

    /// Attaches member labels. The label count must match the member count.
    pub fn with_labels(mut self, labels: Arc<[Arc<str>]>) -> Result<Self, VerifError> {
        if labels.len() != self.members.len() {
            return Err(VerifError::invalid_input(format!(
                "Ensemble labels must match member count; got labels={}, members={}",
                labels.len(),
                self.members.len()
            )));
        }
        self.labels = Some(labels);
        Ok(self)
    }

    pub fn with_summary(mut self, summary: f64) -> Self {
        self.summary = Some(summary);
        self
    }

    pub fn members(&self) -> &[f64] {
        &self.members
    }

    pub fn labels(&self) -> Option<&[Arc<str>]> {
        self.labels.as_deref()
    }

    pub fn summary(&self) -> Option<f64> {
        self.summary
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Keeps the members (and their labels) for which `keep` holds. The summary is dropped
    /// because it no longer describes the retained members.
    pub fn retain_members(&self, mut keep: impl FnMut(f64) -> bool) -> Self {
        let mut members = Vec::with_capacity(self.members.len());
        let mut labels = self.labels.as_ref().map(|_| Vec::new());
        for (idx, &member) in self.members.iter().enumerate() {
            if keep(member) {
                members.push(member);
                if let (Some(kept), Some(all)) = (labels.as_mut(), self.labels.as_ref()) {
                    kept.push(Arc::clone(&all[idx]));
                }
            }
        }

        Self {
            members,
            labels: labels.map(Arc::from),
            summary: None,
        }
    }
}

/// A probability in `[0, 1]`.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "f64", into = "f64"))]
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Probability(f64);

impl Probability {
    pub const ONE: Self = Self(1.0);
    pub const ZERO: Self = Self(0.0);

    pub fn new(value: f64) -> Result<Self, VerifError> {
        if !(0.0..=1.0).contains(&value) {
            return Err(VerifError::invalid_input(format!(
                "Probability must lie in [0, 1]; got {value}"
            )));
        }
        Ok(Self(value))
    }

    pub fn from_bool(occurred: bool) -> Self {
        if occurred { Self::ONE } else { Self::ZERO }
    }

    /// `hits / total`, or `None` when `total` is zero.
    pub fn from_fraction(hits: usize, total: usize) -> Option<Self> {
        (total > 0).then(|| Self(hits.min(total) as f64 / total as f64))
    }

    pub fn get(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Probability {
    type Error = VerifError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Probability> for f64 {
    fn from(value: Probability) -> Self {
        value.0
    }
}

/// One valid-time event of a time-series. Times are epoch seconds.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct Event<T> {
    pub valid_time: i64,
    pub value: T,
}

impl<T> Event<T> {
    pub fn new(valid_time: i64, value: T) -> Self {
        Self { valid_time, value }
    }
}

/// An ordered sequence of events sharing an optional reference (issue) time.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct TimeSeries<T> {
    reference_time: Option<i64>,
    events: Vec<Event<T>>,
}

impl<T> TimeSeries<T> {
    pub fn new(reference_time: Option<i64>, events: Vec<Event<T>>) -> Self {
        Self {
            reference_time,
            events,
        }
    }

    pub fn reference_time(&self) -> Option<i64> {
        self.reference_time
    }

    pub fn events(&self) -> &[Event<T>] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Maps each event value, dropping events for which `mapper` returns `None`.
    pub fn filter_map<U>(&self, mut mapper: impl FnMut(&T) -> Option<U>) -> TimeSeries<U> {
        TimeSeries {
            reference_time: self.reference_time,
            events: self
                .events
                .iter()
                .filter_map(|event| {
                    mapper(&event.value).map(|value| Event::new(event.valid_time, value))
                })
                .collect(),
        }
    }
}

/// Identifies missing values: anything non-finite, plus an optional declared sentinel.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MissingValues {
    pub sentinel: Option<f64>,
}

impl MissingValues {
    pub fn with_sentinel(sentinel: f64) -> Self {
        Self {
            sentinel: Some(sentinel),
        }
    }

    pub fn is_missing(&self, value: f64) -> bool {
        !value.is_finite() || self.sentinel.is_some_and(|sentinel| value == sentinel)
    }

    pub fn is_admissible(&self, value: f64) -> bool {
        !self.is_missing(value)
    }
}

/// Built-in ensemble summaries used to derive single-valued pairs.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EnsembleAverageType {
    #[default]
    Mean,
    Median,
}

impl EnsembleAverageType {
    /// Summarizes `members`; NaN for an empty slice.
    pub fn summarize(self, members: &[f64]) -> f64 {
        if members.is_empty() {
            return f64::NAN;
        }

        match self {
            Self::Mean => members.iter().sum::<f64>() / members.len() as f64,
            Self::Median => {
                let mut sorted = members.to_vec();
                sorted.sort_by(f64::total_cmp);
                let mid = sorted.len() / 2;
                if sorted.len() % 2 == 0 {
                    (sorted[mid - 1] + sorted[mid]) / 2.0
                } else {
                    sorted[mid]
                }
            }
        }
    }
}
