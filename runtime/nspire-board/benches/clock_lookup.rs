//! Clock table lookups as drivers perform them when binding

use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

use nspire_board::{BoardRevision, ClockRegistrar};

fn bench_lookup(c: &mut Criterion) {
    for revision in [BoardRevision::Cx, BoardRevision::Classic] {
        let table = ClockRegistrar::new(revision.clock_sources(), revision.clock_bindings())
            .publish()
            .unwrap();

        c.bench_function(&format!("lookup_all_bindings_{:?}", revision), |b| {
            b.iter(|| {
                for binding in table.bindings() {
                    black_box(
                        table
                            .lookup(black_box(binding.device_id), binding.connection_id)
                            .unwrap(),
                    );
                }
            })
        });

        c.bench_function(&format!("lookup_miss_{:?}", revision), |b| {
            b.iter(|| black_box(table.lookup(black_box("nonexistent"), None).is_err()))
        });
    }
}

criterion_group!(benches, bench_lookup);
criterion_main!(benches);
