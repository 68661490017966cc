// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::error::VerifError;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Absolute tolerance for [`ThresholdOperator::Equal`].
pub const EQUAL_TOLERANCE: f64 = 1e-8;

/// Comparison applied by [`Threshold::test`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ThresholdOperator {
    Greater,
    Less,
    GreaterEqual,
    LessEqual,
    Equal,
    /// Half-open interval `[lower, upper)`.
    Between,
}

impl ThresholdOperator {
    fn symbol(self) -> &'static str {
        match self {
            Self::Greater => ">",
            Self::Less => "<",
            Self::GreaterEqual => ">=",
            Self::LessEqual => "<=",
            Self::Equal => "==",
            Self::Between => "in",
        }
    }
}

/// What a threshold is declared in terms of.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ThresholdType {
    Value,
    /// Climatological probability, resolved to a quantile before use.
    Probability,
    /// Decision threshold applied to forecast probabilities.
    ProbabilityClassifier,
}

/// Which side(s) of a pair a threshold condition is applied to.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ThresholdOrientation {
    #[default]
    Left,
    Right,
    LeftAndRight,
    AnyRight,
    LeftAndAnyRight,
    RightMean,
    LeftAndRightMean,
}

/// One bound, or a `(lower, upper)` pair for [`ThresholdOperator::Between`].
///
/// Equality and ordering are bitwise/total so NaN placeholders are comparable.
#[derive(Clone, Copy, Debug)]
pub enum Bounds {
    One(f64),
    Two(f64, f64),
}

impl Bounds {
    pub fn first(self) -> f64 {
        match self {
            Self::One(value) | Self::Two(value, _) => value,
        }
    }

    pub fn second(self) -> Option<f64> {
        match self {
            Self::One(_) => None,
            Self::Two(_, upper) => Some(upper),
        }
    }

    pub fn is_two(self) -> bool {
        matches!(self, Self::Two(..))
    }

    pub fn map(self, mut f: impl FnMut(f64) -> f64) -> Self {
        match self {
            Self::One(value) => Self::One(f(value)),
            Self::Two(lower, upper) => Self::Two(f(lower), f(upper)),
        }
    }

    /// Applies a fallible mapping to each bound.
    pub fn try_map(
        self,
        mut f: impl FnMut(f64) -> Result<f64, VerifError>,
    ) -> Result<Self, VerifError> {
        Ok(match self {
            Self::One(value) => Self::One(f(value)?),
            Self::Two(lower, upper) => Self::Two(f(lower)?, f(upper)?),
        })
    }

    pub fn to_vec(self) -> Vec<f64> {
        match self {
            Self::One(value) => vec![value],
            Self::Two(lower, upper) => vec![lower, upper],
        }
    }

    pub fn from_slice(values: &[f64]) -> Result<Self, VerifError> {
        match values {
            [value] => Ok(Self::One(*value)),
            [lower, upper] => Ok(Self::Two(*lower, *upper)),
            other => Err(VerifError::threshold(format!(
                "threshold bounds must hold one or two values; got {}",
                other.len()
            ))),
        }
    }

    fn key(self) -> (u8, u64, u64) {
        match self {
            Self::One(value) => (0, value.to_bits(), 0),
            Self::Two(lower, upper) => (1, lower.to_bits(), upper.to_bits()),
        }
    }
}

impl PartialEq for Bounds {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Bounds {}

impl Hash for Bounds {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl PartialOrd for Bounds {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Bounds {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::One(a), Self::One(b)) => a.total_cmp(b),
            (Self::Two(a0, a1), Self::Two(b0, b1)) => {
                a0.total_cmp(b0).then_with(|| a1.total_cmp(b1))
            }
            (Self::One(_), Self::Two(..)) => Ordering::Less,
            (Self::Two(..), Self::One(_)) => Ordering::Greater,
        }
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::One(value) => write!(f, "{value}"),
            Self::Two(lower, upper) => write!(f, "[{lower}, {upper})"),
        }
    }
}

/// A condition on pair values. Immutable once built.
///
/// Quantile thresholds carry both the declared probabilities and the resolved values; the
/// values are what [`Threshold::test`] compares against.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Threshold {
    values: Option<Bounds>,
    probabilities: Option<Bounds>,
    operator: ThresholdOperator,
    orientation: ThresholdOrientation,
    threshold_type: ThresholdType,
    label: Option<Arc<str>>,
    units: Option<Arc<str>>,
}

impl Threshold {
    pub fn builder(operator: ThresholdOperator) -> ThresholdBuilder {
        ThresholdBuilder::new(operator)
    }

    /// Real-valued threshold.
    pub fn value(
        operator: ThresholdOperator,
        bounds: Bounds,
        orientation: ThresholdOrientation,
    ) -> Result<Self, VerifError> {
        Self::builder(operator)
            .values(bounds)
            .orientation(orientation)
            .build()
    }

    /// Climatological probability threshold.
    pub fn probability(
        operator: ThresholdOperator,
        bounds: Bounds,
        orientation: ThresholdOrientation,
    ) -> Result<Self, VerifError> {
        Self::builder(operator)
            .probabilities(bounds)
            .threshold_type(ThresholdType::Probability)
            .orientation(orientation)
            .build()
    }

    /// Decision threshold on forecast probabilities.
    pub fn classifier(operator: ThresholdOperator, bounds: Bounds) -> Result<Self, VerifError> {
        Self::builder(operator)
            .probabilities(bounds)
            .threshold_type(ThresholdType::ProbabilityClassifier)
            .orientation(ThresholdOrientation::LeftAndRight)
            .build()
    }

    /// The unconditional threshold: every finite value passes.
    pub fn all_data() -> Self {
        Self {
            values: Some(Bounds::One(f64::NEG_INFINITY)),
            probabilities: None,
            operator: ThresholdOperator::Greater,
            orientation: ThresholdOrientation::LeftAndRight,
            threshold_type: ThresholdType::Value,
            label: None,
            units: None,
        }
    }

    pub fn is_all_data(&self) -> bool {
        *self == Self::all_data()
    }

    pub fn with_label(mut self, label: impl Into<Arc<str>>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_units(mut self, units: impl Into<Arc<str>>) -> Self {
        self.units = Some(units.into());
        self
    }

    /// Returns a copy with resolved real values; probabilities, if any, are retained.
    pub fn with_values(&self, values: Bounds) -> Result<Self, VerifError> {
        check_arity(self.operator, values, "values")?;
        let mut resolved = self.clone();
        resolved.values = Some(values);
        Ok(resolved)
    }

    /// Copy with the probabilities removed, or `None` when there are no values to keep.
    pub fn without_probabilities(&self) -> Option<Self> {
        self.values.map(|_| Self {
            probabilities: None,
            ..self.clone()
        })
    }

    pub fn values(&self) -> Option<Bounds> {
        self.values
    }

    pub fn probabilities(&self) -> Option<Bounds> {
        self.probabilities
    }

    pub fn operator(&self) -> ThresholdOperator {
        self.operator
    }

    pub fn orientation(&self) -> ThresholdOrientation {
        self.orientation
    }

    pub fn threshold_type(&self) -> ThresholdType {
        self.threshold_type
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn units(&self) -> Option<&str> {
        self.units.as_deref()
    }

    pub fn has_values(&self) -> bool {
        self.values.is_some()
    }

    pub fn has_probabilities(&self) -> bool {
        self.probabilities.is_some()
    }

    /// Probability threshold whose values have been resolved from a climatology.
    pub fn is_quantile(&self) -> bool {
        self.values.is_some() && self.probabilities.is_some()
    }

    /// Applies the condition to `x`, using values when present and probabilities otherwise.
    pub fn test(&self, x: f64) -> bool {
        let Some(bounds) = self.values.or(self.probabilities) else {
            return false;
        };
        let lower = bounds.first();
        match self.operator {
            ThresholdOperator::Greater => x > lower,
            ThresholdOperator::Less => x < lower,
            ThresholdOperator::GreaterEqual => x >= lower,
            ThresholdOperator::LessEqual => x <= lower,
            ThresholdOperator::Equal => (x - lower).abs() < EQUAL_TOLERANCE,
            ThresholdOperator::Between => bounds.second().is_some_and(|upper| x >= lower && x < upper),
        }
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_all_data() {
            return f.write_str("all data");
        }
        let symbol = self.operator.symbol();
        match (self.values, self.probabilities) {
            (Some(values), Some(probabilities)) => {
                write!(f, "{symbol} {values} (Pr {symbol} {probabilities})")?
            }
            (Some(values), None) => write!(f, "{symbol} {values}")?,
            (None, Some(probabilities)) => write!(f, "Pr {symbol} {probabilities}")?,
            (None, None) => f.write_str("undefined")?,
        }
        if let Some(units) = &self.units {
            write!(f, " {units}")?;
        }
        if let Some(label) = &self.label {
            write!(f, " ({label})")?;
        }
        Ok(())
    }
}

fn check_arity(operator: ThresholdOperator, bounds: Bounds, what: &str) -> Result<(), VerifError> {
    let between = operator == ThresholdOperator::Between;
    if between != bounds.is_two() {
        return Err(VerifError::threshold(format!(
            "threshold {what} must hold {} bound(s) for operator {operator:?}; got {bounds}",
            if between { 2 } else { 1 }
        )));
    }
    if let Bounds::Two(lower, upper) = bounds {
        if lower > upper {
            return Err(VerifError::threshold(format!(
                "threshold {what} lower bound must not exceed upper bound; got {bounds}"
            )));
        }
    }
    Ok(())
}

/// Validating builder for [`Threshold`].
#[derive(Clone, Debug)]
pub struct ThresholdBuilder {
    operator: ThresholdOperator,
    values: Option<Bounds>,
    probabilities: Option<Bounds>,
    orientation: ThresholdOrientation,
    threshold_type: Option<ThresholdType>,
    label: Option<Arc<str>>,
    units: Option<Arc<str>>,
}

impl ThresholdBuilder {
    pub fn new(operator: ThresholdOperator) -> Self {
        Self {
            operator,
            values: None,
            probabilities: None,
            orientation: ThresholdOrientation::default(),
            threshold_type: None,
            label: None,
            units: None,
        }
    }

    pub fn values(mut self, values: Bounds) -> Self {
        self.values = Some(values);
        self
    }

    pub fn probabilities(mut self, probabilities: Bounds) -> Self {
        self.probabilities = Some(probabilities);
        self
    }

    pub fn orientation(mut self, orientation: ThresholdOrientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn threshold_type(mut self, threshold_type: ThresholdType) -> Self {
        self.threshold_type = Some(threshold_type);
        self
    }

    pub fn label(mut self, label: impl Into<Arc<str>>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn units(mut self, units: impl Into<Arc<str>>) -> Self {
        self.units = Some(units.into());
        self
    }

    pub fn build(self) -> Result<Threshold, VerifError> {
        if self.values.is_none() && self.probabilities.is_none() {
            return Err(VerifError::threshold(
                "threshold must declare values, probabilities, or both",
            ));
        }
        if let Some(values) = self.values {
            check_arity(self.operator, values, "values")?;
        }
        if let Some(probabilities) = self.probabilities {
            check_arity(self.operator, probabilities, "probabilities")?;
            for p in probabilities.to_vec() {
                if !p.is_nan() && !(0.0..=1.0).contains(&p) {
                    return Err(VerifError::threshold(format!(
                        "threshold probabilities must lie in [0, 1]; got {p}"
                    )));
                }
            }
        }

        let threshold_type = match self.threshold_type {
            Some(ThresholdType::Value) if self.values.is_none() => {
                return Err(VerifError::threshold(
                    "value threshold must declare values",
                ));
            }
            Some(kind @ (ThresholdType::Probability | ThresholdType::ProbabilityClassifier))
                if self.probabilities.is_none() =>
            {
                return Err(VerifError::threshold(format!(
                    "{kind:?} threshold must declare probabilities"
                )));
            }
            Some(kind) => kind,
            None if self.values.is_some() => ThresholdType::Value,
            None => ThresholdType::Probability,
        };

        Ok(Threshold {
            values: self.values,
            probabilities: self.probabilities,
            operator: self.operator,
            orientation: self.orientation,
            threshold_type,
            label: self.label,
            units: self.units,
        })
    }
}

/// An event threshold plus an optional decision threshold (probability classifier).
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OneOrTwoThresholds {
    event: Threshold,
    decision: Option<Threshold>,
}

impl OneOrTwoThresholds {
    pub fn one(event: Threshold) -> Self {
        Self {
            event,
            decision: None,
        }
    }

    pub fn two(event: Threshold, decision: Threshold) -> Self {
        Self {
            event,
            decision: Some(decision),
        }
    }

    pub fn event(&self) -> &Threshold {
        &self.event
    }

    pub fn decision(&self) -> Option<&Threshold> {
        self.decision.as_ref()
    }
}

impl fmt::Display for OneOrTwoThresholds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.decision {
            Some(decision) => write!(f, "{} AND {}", self.event, decision),
            None => write!(f, "{}", self.event),
        }
    }
}

#[cfg(feature = "serde")]
mod wire {
    use super::{Bounds, Threshold, ThresholdOperator, ThresholdOrientation, ThresholdType};
    use crate::error::VerifError;

    #[derive(serde::Serialize, serde::Deserialize)]
    pub(super) struct ThresholdWire {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        values: Option<Vec<f64>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        probabilities: Option<Vec<f64>>,
        operator: ThresholdOperator,
        #[serde(default)]
        orientation: ThresholdOrientation,
        #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
        threshold_type: Option<ThresholdType>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        units: Option<String>,
    }

    impl TryFrom<ThresholdWire> for Threshold {
        type Error = VerifError;

        fn try_from(wire: ThresholdWire) -> Result<Self, Self::Error> {
            let mut builder = Threshold::builder(wire.operator).orientation(wire.orientation);
            if let Some(values) = wire.values.as_deref() {
                builder = builder.values(Bounds::from_slice(values)?);
            }
            if let Some(probabilities) = wire.probabilities.as_deref() {
                builder = builder.probabilities(Bounds::from_slice(probabilities)?);
            }
            if let Some(threshold_type) = wire.threshold_type {
                builder = builder.threshold_type(threshold_type);
            }
            if let Some(label) = wire.label {
                builder = builder.label(label);
            }
            if let Some(units) = wire.units {
                builder = builder.units(units);
            }
            builder.build()
        }
    }

    impl From<Threshold> for ThresholdWire {
        fn from(threshold: Threshold) -> Self {
            Self {
                values: threshold.values.map(Bounds::to_vec),
                probabilities: threshold.probabilities.map(Bounds::to_vec),
                operator: threshold.operator,
                orientation: threshold.orientation,
                threshold_type: Some(threshold.threshold_type),
                label: threshold.label.as_deref().map(str::to_owned),
                units: threshold.units.as_deref().map(str::to_owned),
            }
        }
    }

    impl serde::Serialize for Threshold {
        fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            ThresholdWire::from(self.clone()).serialize(serializer)
        }
    }

    impl<'de> serde::Deserialize<'de> for Threshold {
        fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            let wire = ThresholdWire::deserialize(deserializer)?;
            Threshold::try_from(wire).map_err(serde::de::Error::custom)
        }
    }
}
