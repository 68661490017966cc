// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::catalogue::MetricCatalogue;
use crate::category::Category;
use crate::deferred::Deferred;
use crate::executor::Executors;
use crate::policy::{SampleSizePolicy, SlicePlan};
use crate::store::{StatisticsBatch, StatisticsStoreBuilder};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, trace};
use verif_core::{
    Feature, MetricTable, Pool, StatisticType, Statistics, ThresholdGroup, ThresholdsByFeature,
    VerifError,
};
use verif_slice::{pools, thresholds};

/// Runs one category's pipeline over a pool: resolve thresholds, then hand each threshold
/// group to the slicing pool. Each slicing task applies the sample-size policy to its slices
/// and submits the surviving metrics to the metric pool, so the dispatch loop itself never
/// waits on workers.
pub(crate) struct Dispatcher<'a> {
    pub(crate) metrics: &'a MetricTable,
    pub(crate) thresholds: &'a ThresholdsByFeature,
    pub(crate) policy: SampleSizePolicy,
    pub(crate) executors: &'a Executors,
    pub(crate) catalogue: &'a Arc<dyn MetricCatalogue>,
}

impl Dispatcher<'_> {
    pub(crate) fn run<C: Category>(
        &self,
        category: C,
        pool: &Pool<C::Input>,
        store: &StatisticsStoreBuilder,
    ) -> Result<(), VerifError> {
        let group = category.group();
        let kinds: Vec<StatisticType> = category
            .statistic_types()
            .iter()
            .copied()
            .filter(|kind| self.metrics.has(group, *kind))
            .collect();
        if kinds.is_empty() {
            trace!(target: "verif.dispatch", ?group, "no metrics requested for category");
            return Ok(());
        }

        let groups = self.resolve(&category, pool)?;
        let by_feature = Arc::new(pools::decompose(pool, pools::feature_key)?);
        debug!(
            target: "verif.dispatch",
            ?group,
            feature_group = %pool.metadata().feature_group(),
            threshold_groups = groups.len(),
            kinds = ?kinds,
            "dispatching category"
        );

        let job = SliceJob {
            category: Arc::new(category),
            by_feature,
            parent: pool.clone(),
            kinds: kinds.into(),
            metrics: Arc::new(self.metrics.clone()),
            policy: self.policy,
            executors: self.executors.clone(),
            catalogue: Arc::clone(self.catalogue),
        };
        for threshold_group in groups {
            if !threshold_group
                .keys()
                .any(|feature| job.by_feature.contains_key(feature))
            {
                trace!(
                    target: "verif.dispatch",
                    ?group,
                    "threshold group covers no feature with pairs"
                );
                continue;
            }
            let job = job.clone();
            store.add_batch(
                self.executors
                    .spawn_slicing(move || job.slice_and_submit(&threshold_group)),
            );
        }
        Ok(())
    }

    /// Selects, resolves and aligns the thresholds for the features of `pool`.
    fn resolve<C: Category>(
        &self,
        category: &C,
        pool: &Pool<C::Input>,
    ) -> Result<Vec<ThresholdGroup>, VerifError> {
        let feature_group = pool.metadata().feature_group();
        let selected = thresholds::select(
            self.thresholds,
            feature_group.features(),
            category.threshold_types(),
            category.includes_all_data(),
        );
        if selected.values().all(|declared| declared.is_empty()) {
            return Err(VerifError::declaration(format!(
                "could not find any thresholds for the features of feature group '{feature_group}' \
                 while computing {:?} statistics",
                category.group()
            )));
        }
        let resolved = thresholds::add_quantiles(&selected, pool)?;
        Ok(thresholds::decompose(&thresholds::deduplicate_all(&resolved)))
    }
}

/// Everything a slicing task needs, owned so it can run on the slicing pool.
struct SliceJob<C: Category> {
    category: Arc<C>,
    by_feature: Arc<BTreeMap<Feature, Pool<C::Input>>>,
    parent: Pool<C::Input>,
    kinds: Arc<[StatisticType]>,
    metrics: Arc<MetricTable>,
    policy: SampleSizePolicy,
    executors: Executors,
    catalogue: Arc<dyn MetricCatalogue>,
}

impl<C: Category> Clone for SliceJob<C> {
    fn clone(&self) -> Self {
        Self {
            category: Arc::clone(&self.category),
            by_feature: Arc::clone(&self.by_feature),
            parent: self.parent.clone(),
            kinds: Arc::clone(&self.kinds),
            metrics: Arc::clone(&self.metrics),
            policy: self.policy,
            executors: self.executors.clone(),
            catalogue: Arc::clone(&self.catalogue),
        }
    }
}

impl<C: Category> SliceJob<C> {
    fn slice_and_submit(
        &self,
        thresholds: &ThresholdGroup,
    ) -> Result<StatisticsBatch, VerifError> {
        let slices = self.category.slice(&self.by_feature, &self.parent, thresholds)?;
        let mut batch = Vec::with_capacity(slices.len() * self.kinds.len());
        for slice in slices {
            for &kind in self.kinds.iter() {
                if let Some(deferred) = self.submit(kind, slice.clone()) {
                    batch.push((kind, deferred));
                }
            }
        }
        Ok(batch)
    }

    fn submit(
        &self,
        kind: StatisticType,
        slice: Pool<C::Sliced>,
    ) -> Option<Deferred<Statistics>> {
        let requested = self.category.restrict(
            kind,
            &slice,
            self.metrics.select(self.category.group(), kind),
        );
        match self.policy.plan(&slice, &requested) {
            SlicePlan::Skip => None,
            SlicePlan::Elided => Some(Deferred::ready(Statistics::empty(kind))),
            SlicePlan::Compute(metrics) => {
                let catalogue = Arc::clone(&self.catalogue);
                Some(self.executors.submit(move || {
                    C::compute(catalogue.as_ref(), kind, &slice, &metrics)
                }))
            }
        }
    }
}
