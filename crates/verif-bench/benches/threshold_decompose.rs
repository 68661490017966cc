// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use verif_bench::declared_thresholds;
use verif_slice::thresholds::{compose, decompose, deduplicate_all};

const FEATURES: usize = 500;
const PER_FEATURE: usize = 40;

fn benchmark_threshold_alignment(c: &mut Criterion) {
    let declared = declared_thresholds(FEATURES, PER_FEATURE);
    let mut group = c.benchmark_group("threshold_alignment");

    group.bench_function("deduplicate_500x40", |b| {
        b.iter(|| deduplicate_all(black_box(&declared)))
    });

    group.bench_function("decompose_500x40", |b| {
        b.iter(|| decompose(black_box(&declared)))
    });

    let groups = decompose(&declared);
    group.bench_function("compose_all_groups_500x40", |b| {
        b.iter(|| {
            for members in black_box(&groups) {
                let _composed = compose(members.values()).expect("groups should compose");
            }
        })
    });

    group.finish();
}

criterion_group!(benches, benchmark_threshold_alignment);
criterion_main!(benches);
