// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::error::VerifError;
use crate::pairs::EnsembleAverageType;
use crate::threshold::OneOrTwoThresholds;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Opaque geographic feature key.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Feature(Arc<str>);

impl Feature {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Feature {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// A named set of features pooled together.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeatureGroup {
    name: Option<Arc<str>>,
    features: BTreeSet<Feature>,
}

impl FeatureGroup {
    pub fn new(name: Option<&str>, features: impl IntoIterator<Item = Feature>) -> Self {
        Self {
            name: name.map(Arc::from),
            features: features.into_iter().collect(),
        }
    }

    pub fn single(feature: Feature) -> Self {
        Self::new(None, [feature])
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn features(&self) -> &BTreeSet<Feature> {
        &self.features
    }

    pub fn contains(&self, feature: &Feature) -> bool {
        self.features.contains(feature)
    }
}

impl fmt::Display for FeatureGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => f.write_str(name),
            None => {
                let names: Vec<&str> = self.features.iter().map(Feature::name).collect();
                f.write_str(&names.join("-"))
            }
        }
    }
}

/// Inclusive valid-time window in epoch seconds.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeWindow {
    pub earliest: i64,
    pub latest: i64,
}

/// Describes what a pool contains. Immutable: every `with_*` returns a new value.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PoolMetadata {
    feature_group: FeatureGroup,
    time_window: Option<TimeWindow>,
    thresholds: Option<OneOrTwoThresholds>,
    is_baseline_pool: bool,
    ensemble_average: Option<EnsembleAverageType>,
}

impl PoolMetadata {
    pub fn new(feature_group: FeatureGroup) -> Self {
        Self {
            feature_group,
            time_window: None,
            thresholds: None,
            is_baseline_pool: false,
            ensemble_average: None,
        }
    }

    pub fn with_feature_group(&self, feature_group: FeatureGroup) -> Self {
        Self {
            feature_group,
            ..self.clone()
        }
    }

    pub fn with_time_window(&self, time_window: TimeWindow) -> Self {
        Self {
            time_window: Some(time_window),
            ..self.clone()
        }
    }

    pub fn with_thresholds(&self, thresholds: OneOrTwoThresholds) -> Self {
        Self {
            thresholds: Some(thresholds),
            ..self.clone()
        }
    }

    pub fn with_ensemble_average(&self, average: EnsembleAverageType) -> Self {
        Self {
            ensemble_average: Some(average),
            ..self.clone()
        }
    }

    pub fn as_baseline(&self, is_baseline_pool: bool) -> Self {
        Self {
            is_baseline_pool,
            ..self.clone()
        }
    }

    pub fn feature_group(&self) -> &FeatureGroup {
        &self.feature_group
    }

    pub fn time_window(&self) -> Option<TimeWindow> {
        self.time_window
    }

    pub fn thresholds(&self) -> Option<&OneOrTwoThresholds> {
        self.thresholds.as_ref()
    }

    pub fn is_baseline_pool(&self) -> bool {
        self.is_baseline_pool
    }

    pub fn ensemble_average(&self) -> Option<EnsembleAverageType> {
        self.ensemble_average
    }
}

/// Climatological sample used to resolve probability thresholds into quantiles.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Climatology(Arc<[f64]>);

impl Climatology {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values.into())
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Non-NaN values in ascending order.
    pub fn sorted(&self) -> Vec<f64> {
        let mut sorted: Vec<f64> = self.0.iter().copied().filter(|v| !v.is_nan()).collect();
        sorted.sort_by(f64::total_cmp);
        sorted
    }
}

#[derive(Debug)]
struct PoolInner<T> {
    metadata: PoolMetadata,
    data: Vec<T>,
    climatology: Option<Climatology>,
    baseline: Option<Pool<T>>,
    mini_pools: Vec<Pool<T>>,
}

/// An immutable, shareable collection of pairs with metadata, an optional baseline pool, and
/// an optional climatology. A pool assembled from per-feature pools remembers them as its
/// mini pools, in insertion order.
#[derive(Debug)]
pub struct Pool<T> {
    inner: Arc<PoolInner<T>>,
}

impl<T> Clone for Pool<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Pool<T> {
    pub fn builder() -> PoolBuilder<T> {
        PoolBuilder::new()
    }

    pub fn metadata(&self) -> &PoolMetadata {
        &self.inner.metadata
    }

    pub fn data(&self) -> &[T] {
        &self.inner.data
    }

    pub fn len(&self) -> usize {
        self.inner.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.data.is_empty()
    }

    pub fn climatology(&self) -> Option<&Climatology> {
        self.inner.climatology.as_ref()
    }

    pub fn baseline(&self) -> Option<&Pool<T>> {
        self.inner.baseline.as_ref()
    }

    pub fn has_baseline(&self) -> bool {
        self.inner.baseline.is_some()
    }

    /// The per-feature pools this pool was assembled from, or the pool itself when it was
    /// built directly from data.
    pub fn mini_pools(&self) -> Vec<Pool<T>> {
        if self.inner.mini_pools.is_empty() {
            vec![self.clone()]
        } else {
            self.inner.mini_pools.clone()
        }
    }
}

/// Assembles a [`Pool`].
#[derive(Debug)]
pub struct PoolBuilder<T> {
    metadata: Option<PoolMetadata>,
    baseline_metadata: Option<PoolMetadata>,
    data: Vec<T>,
    baseline_data: Vec<T>,
    climatology: Vec<f64>,
    has_climatology: bool,
    mini_pools: Vec<Pool<T>>,
    baseline_mini_pools: Vec<Pool<T>>,
}

impl<T> Default for PoolBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PoolBuilder<T> {
    pub fn new() -> Self {
        Self {
            metadata: None,
            baseline_metadata: None,
            data: Vec::new(),
            baseline_data: Vec::new(),
            climatology: Vec::new(),
            has_climatology: false,
            mini_pools: Vec::new(),
            baseline_mini_pools: Vec::new(),
        }
    }

    pub fn metadata(mut self, metadata: PoolMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn baseline_metadata(mut self, metadata: PoolMetadata) -> Self {
        self.baseline_metadata = Some(metadata);
        self
    }

    pub fn add_data(mut self, data: impl IntoIterator<Item = T>) -> Self {
        self.data.extend(data);
        self
    }

    pub fn add_baseline_data(mut self, data: impl IntoIterator<Item = T>) -> Self {
        self.baseline_data.extend(data);
        self
    }

    pub fn climatology(mut self, climatology: &Climatology) -> Self {
        self.climatology.extend_from_slice(climatology.values());
        self.has_climatology = true;
        self
    }

    /// Number of main-data elements added so far.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<T: Clone> PoolBuilder<T> {
    /// Appends a per-feature pool: its data, baseline data, and climatology are concatenated
    /// onto this pool and it is recorded as a mini pool.
    pub fn add_pool(mut self, pool: &Pool<T>) -> Self {
        self.data.extend_from_slice(pool.data());
        if let Some(climatology) = pool.climatology() {
            self.climatology.extend_from_slice(climatology.values());
            self.has_climatology = true;
        }
        if let Some(baseline) = pool.baseline() {
            self.baseline_data.extend_from_slice(baseline.data());
            self.baseline_mini_pools.push(baseline.clone());
        }
        self.mini_pools.push(pool.clone());
        self
    }

    pub fn build(self) -> Result<Pool<T>, VerifError> {
        let metadata = self
            .metadata
            .ok_or_else(|| VerifError::pool("cannot build a pool without metadata"))?;
        let has_baseline = !self.baseline_data.is_empty() || !self.baseline_mini_pools.is_empty();
        let climatology = self
            .has_climatology
            .then(|| Climatology::new(self.climatology));

        let baseline = match (self.baseline_metadata, has_baseline) {
            (Some(baseline_metadata), _) => Some(Pool {
                inner: Arc::new(PoolInner {
                    metadata: baseline_metadata,
                    data: self.baseline_data,
                    climatology: climatology.clone(),
                    baseline: None,
                    mini_pools: self.baseline_mini_pools,
                }),
            }),
            (None, true) => {
                return Err(VerifError::pool(format!(
                    "pool for '{}' has baseline data but no baseline metadata",
                    metadata.feature_group()
                )));
            }
            (None, false) => None,
        };

        Ok(Pool {
            inner: Arc::new(PoolInner {
                metadata,
                data: self.data,
                climatology,
                baseline,
                mini_pools: self.mini_pools,
            }),
        })
    }
}
