// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use proptest::prelude::*;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};
use verif_core::{
    DichotomousPair, Feature, FeatureGroup, MetricFlags, MetricName, MetricSet, Pair, Pool,
    PoolMetadata, SingleValuedPair,
};
use verif_engine::{EffectiveSampleSize, SampleSizePolicy, SlicePlan};

const MIN_PROPTEST_CASES: u32 = 256;

fn proptest_cases() -> u32 {
    std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|raw| raw.parse::<u32>().ok())
        .map(|parsed| parsed.max(MIN_PROPTEST_CASES))
        .unwrap_or(MIN_PROPTEST_CASES)
}

fn config() -> ProptestConfig {
    ProptestConfig {
        cases: proptest_cases(),
        failure_persistence: Some(Box::new(FileFailurePersistence::Off)),
        ..ProptestConfig::default()
    }
}

fn flags() -> impl Strategy<Value = MetricFlags> {
    (any::<bool>(), any::<bool>(), any::<bool>()).prop_map(
        |(skill, threshold_tolerant, explicit_baseline_required)| MetricFlags {
            skill,
            threshold_tolerant,
            explicit_baseline_required,
        },
    )
}

fn metric_set() -> impl Strategy<Value = MetricSet> {
    prop::collection::vec(flags(), 0..6).prop_map(|all| {
        let mut set = MetricSet::new();
        for (i, flags) in all.into_iter().enumerate() {
            set.insert(MetricName::new(format!("M{i}")), flags);
        }
        set
    })
}

fn single_valued_pool(main: usize, baseline: Option<usize>) -> Pool<SingleValuedPair> {
    let metadata = PoolMetadata::new(FeatureGroup::single(Feature::new("A")));
    let pairs = |n: usize| (0..n).map(|i| Pair::new(i as f64, i as f64));
    let mut builder = Pool::builder().metadata(metadata.clone()).add_data(pairs(main));
    if let Some(baseline) = baseline {
        builder = builder
            .baseline_metadata(metadata)
            .add_baseline_data(pairs(baseline));
    }
    builder.build().expect("generated pool should build")
}

proptest! {
    #![proptest_config(config())]

    #[test]
    fn dichotomous_effective_size_is_at_most_half(occurrences in prop::collection::vec(any::<bool>(), 0..200)) {
        let pairs: Vec<DichotomousPair> = occurrences
            .iter()
            .map(|&occurred| Pair::new(occurred, occurred))
            .collect();
        let effective = DichotomousPair::effective_sample_size(&pairs);
        prop_assert!(effective <= pairs.len() / 2);
    }

    #[test]
    fn balanced_dichotomous_slices_use_half_their_size(half in 0usize..100) {
        let pairs: Vec<DichotomousPair> = (0..2 * half)
            .map(|i| Pair::new(i % 2 == 0, true))
            .collect();
        prop_assert_eq!(DichotomousPair::effective_sample_size(&pairs), half);
    }

    #[test]
    fn plans_never_add_metrics(
        metrics in metric_set(),
        main in 0usize..30,
        baseline in prop::option::of(0usize..30),
        minimum in 0usize..20,
    ) {
        let pool = single_valued_pool(main, baseline);
        match SampleSizePolicy::new(minimum).plan(&pool, &metrics) {
            SlicePlan::Skip => prop_assert_eq!(main, 0),
            SlicePlan::Elided => prop_assert!(main > 0),
            SlicePlan::Compute(planned) => {
                prop_assert!(!planned.is_empty());
                for (name, flags) in planned.iter() {
                    prop_assert_eq!(metrics.flags(name), Some(flags));
                    if baseline.is_none() {
                        prop_assert!(!flags.explicit_baseline_required);
                    }
                    if baseline.is_some_and(|size| size < minimum) {
                        prop_assert!(!flags.skill);
                    }
                }
            }
        }
    }
}
