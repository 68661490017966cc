// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fmt::Debug;
use tracing::debug;
use verif_core::{Feature, Pool, PoolBuilder, PoolMetadata, TimeSeries, VerifError};

/// The single feature described by a per-feature pool's metadata.
pub fn feature_key(metadata: &PoolMetadata) -> Result<Feature, VerifError> {
    let features = metadata.feature_group().features();
    match (features.len(), features.iter().next()) {
        (1, Some(feature)) => Ok(feature.clone()),
        (n, _) => Err(VerifError::pool(format!(
            "expected a pool with exactly one feature; feature group '{}' has {n}",
            metadata.feature_group()
        ))),
    }
}

/// Splits a pool into its mini pools keyed by `key_fn`. Keys must be unique.
pub fn decompose<T, K, F>(pool: &Pool<T>, key_fn: F) -> Result<BTreeMap<K, Pool<T>>, VerifError>
where
    K: Ord + Debug,
    F: Fn(&PoolMetadata) -> Result<K, VerifError>,
{
    let mut decomposed = BTreeMap::new();
    for mini in pool.mini_pools() {
        let key = key_fn(mini.metadata())?;
        if decomposed.contains_key(&key) {
            return Err(VerifError::pool(format!(
                "pool for '{}' contains more than one mini pool with key {key:?}",
                pool.metadata().feature_group()
            )));
        }
        decomposed.insert(key, mini);
    }
    Ok(decomposed)
}

/// Applies `mapper` to the main and baseline data of one mini pool, keeping its climatology.
fn transform_one<T, U, F>(
    mini: &Pool<T>,
    mapper: &F,
    meta_fn: &impl Fn(&PoolMetadata) -> PoolMetadata,
) -> Result<Pool<U>, VerifError>
where
    U: Clone,
    F: Fn(&T) -> Option<U>,
{
    let mut builder = PoolBuilder::new()
        .metadata(meta_fn(mini.metadata()))
        .add_data(mini.data().iter().filter_map(mapper));
    if let Some(climatology) = mini.climatology() {
        builder = builder.climatology(climatology);
    }
    if let Some(baseline) = mini.baseline() {
        builder = builder
            .baseline_metadata(meta_fn(baseline.metadata()))
            .add_baseline_data(baseline.data().iter().filter_map(mapper));
    }
    builder.build()
}

/// Transforms each keyed sub-pool with its own mapper and reassembles them.
///
/// `None` from a mapper drops the element. Keys with no mapper are skipped; it is an error
/// for every key to lack one. `meta_fn` is applied to the parent, baseline, and every mini
/// pool's metadata. Element order within each sub-pool is preserved.
pub fn transform<K, T, U, F>(
    pools: &BTreeMap<K, Pool<T>>,
    mappers: &BTreeMap<K, F>,
    parent: &PoolMetadata,
    baseline: Option<&PoolMetadata>,
    meta_fn: impl Fn(&PoolMetadata) -> PoolMetadata,
) -> Result<Pool<U>, VerifError>
where
    K: Ord + Debug,
    U: Clone,
    F: Fn(&T) -> Option<U>,
{
    let mut builder = PoolBuilder::new().metadata(meta_fn(parent));
    if let Some(baseline) = baseline {
        builder = builder.baseline_metadata(meta_fn(baseline));
    }

    let mut skipped = Vec::new();
    for (key, mini) in pools {
        let Some(mapper) = mappers.get(key) else {
            skipped.push(key);
            continue;
        };
        builder = builder.add_pool(&transform_one(mini, mapper, &meta_fn)?);
    }

    if !skipped.is_empty() {
        if skipped.len() == pools.len() {
            return Err(VerifError::pool(format!(
                "no slicing function was supplied for any of the {} sub-pools of '{}'",
                pools.len(),
                parent.feature_group()
            )));
        }
        debug!(
            target: "verif.pools",
            feature_group = %parent.feature_group(),
            skipped = ?skipped,
            "sub-pools without a slicing function were left out"
        );
    }

    builder.build()
}

/// [`transform`] with per-key predicates: elements failing their predicate are dropped.
pub fn filter<K, T, P>(
    pools: &BTreeMap<K, Pool<T>>,
    filters: &BTreeMap<K, P>,
    parent: &PoolMetadata,
    baseline: Option<&PoolMetadata>,
    meta_fn: impl Fn(&PoolMetadata) -> PoolMetadata,
) -> Result<Pool<T>, VerifError>
where
    K: Ord + Debug + Clone,
    T: Clone,
    P: Fn(&T) -> bool,
{
    let mappers: BTreeMap<K, _> = filters
        .iter()
        .map(|(key, keep)| {
            (key.clone(), move |element: &T| {
                keep(element).then(|| element.clone())
            })
        })
        .collect();
    transform(pools, &mappers, parent, baseline, meta_fn)
}

/// Decomposes `pool` by feature and filters each feature with its own predicate.
pub fn filter_by_feature<T, P>(
    pool: &Pool<T>,
    filters: &BTreeMap<Feature, P>,
    meta_fn: impl Fn(&PoolMetadata) -> PoolMetadata,
) -> Result<Pool<T>, VerifError>
where
    T: Clone,
    P: Fn(&T) -> bool,
{
    let pools = decompose(pool, feature_key)?;
    filter(
        &pools,
        filters,
        pool.metadata(),
        pool.baseline().map(Pool::metadata),
        meta_fn,
    )
}

/// Decomposes `pool` by feature and transforms each feature with its own mapper.
pub fn transform_by_feature<T, U, F>(
    pool: &Pool<T>,
    mappers: &BTreeMap<Feature, F>,
    meta_fn: impl Fn(&PoolMetadata) -> PoolMetadata,
) -> Result<Pool<U>, VerifError>
where
    U: Clone,
    F: Fn(&T) -> Option<U>,
{
    let pools = decompose(pool, feature_key)?;
    transform(
        &pools,
        mappers,
        pool.metadata(),
        pool.baseline().map(Pool::metadata),
        meta_fn,
    )
}

/// Applies one mapper to every mini pool, preserving the pool's structure.
pub fn map<T, U, F>(
    pool: &Pool<T>,
    mapper: F,
    meta_fn: impl Fn(&PoolMetadata) -> PoolMetadata,
) -> Result<Pool<U>, VerifError>
where
    U: Clone,
    F: Fn(&T) -> Option<U>,
{
    let mut builder = PoolBuilder::new().metadata(meta_fn(pool.metadata()));
    if let Some(baseline) = pool.baseline() {
        builder = builder.baseline_metadata(meta_fn(baseline.metadata()));
    }
    for mini in pool.mini_pools() {
        builder = builder.add_pool(&transform_one(&mini, &mapper, &meta_fn)?);
    }
    builder.build()
}

/// Flattens a pool of time-series into a pool of their event values.
pub fn unpack<T: Clone>(pool: &Pool<TimeSeries<T>>) -> Result<Pool<T>, VerifError> {
    let mut builder = PoolBuilder::new().metadata(pool.metadata().clone());
    if let Some(baseline) = pool.baseline() {
        builder = builder.baseline_metadata(baseline.metadata().clone());
    }
    for mini in pool.mini_pools() {
        let mut unpacked = PoolBuilder::new()
            .metadata(mini.metadata().clone())
            .add_data(flatten(mini.data()));
        if let Some(climatology) = mini.climatology() {
            unpacked = unpacked.climatology(climatology);
        }
        if let Some(baseline) = mini.baseline() {
            unpacked = unpacked
                .baseline_metadata(baseline.metadata().clone())
                .add_baseline_data(flatten(baseline.data()));
        }
        builder = builder.add_pool(&unpacked.build()?);
    }
    builder.build()
}

fn flatten<T: Clone>(series: &[TimeSeries<T>]) -> impl Iterator<Item = T> + '_ {
    series
        .iter()
        .flat_map(|one| one.events().iter().map(|event| event.value.clone()))
}
