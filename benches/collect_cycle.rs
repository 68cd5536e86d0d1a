use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use stable_refs::{ObjRef, StableRefRegistry};

/// Benchmark: safepoint drain cost with varying numbers of pending
/// references
///
/// `process_thread` pays one lock acquisition plus an O(pending) re-tag
/// walk; this measures how that scales with the amount a thread registered
/// since the last cycle.
fn bench_process_thread(c: &mut Criterion) {
    let mut group = c.benchmark_group("process_thread");

    for pending in [10, 100, 1_000, 10_000].iter() {
        group.bench_with_input(
            BenchmarkId::new("drain_n_pending", pending),
            pending,
            |b, &pending| {
                b.iter(|| {
                    let registry = StableRefRegistry::new();
                    let mut queue = registry.attach_thread();

                    for i in 0..pending {
                        let _token = registry
                            .register_stable_ref(&mut queue, ObjRef::from_raw((i + 1) as *mut ()));
                    }

                    registry.process_thread(&mut queue);
                    black_box(&registry);
                });
            },
        );
    }

    group.finish();
}

/// Benchmark: root-set scan with varying root counts
///
/// The collector walks the published sequence once per cycle under the
/// lock. Nodes were allocated at different times before being spliced in,
/// so this also reflects the poor locality of a linked root sequence.
fn bench_iterate_roots(c: &mut Criterion) {
    let mut group = c.benchmark_group("iterate_roots");

    for roots in [100, 1_000, 10_000].iter() {
        group.bench_with_input(BenchmarkId::new("scan", roots), roots, |b, &roots| {
            let registry = StableRefRegistry::new();
            let mut queue = registry.attach_thread();
            for i in 0..roots {
                let _token =
                    registry.register_stable_ref(&mut queue, ObjRef::from_raw((i + 1) as *mut ()));
            }
            registry.process_thread(&mut queue);

            b.iter(|| {
                let snapshot = registry.iter();
                let mut count = 0usize;
                for root in &snapshot {
                    black_box(root.as_raw());
                    count += 1;
                }
                assert_eq!(count, roots);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_process_thread, bench_iterate_roots);
criterion_main!(benches);
