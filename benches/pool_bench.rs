use criterion::{black_box, criterion_group, criterion_main, Criterion};
use srvcore::pool::Pool;
use std::alloc::Layout;

fn bump_alloc(c: &mut Criterion) {
    c.bench_function("pool_alloc_u64", |b| {
        let pool = Pool::new(64 * 1024);
        let layout = Layout::new::<u64>();
        b.iter(|| {
            black_box(pool.alloc(layout));
        });
    });
}

fn bump_alloc_with_resets(c: &mut Criterion) {
    c.bench_function("pool_alloc_then_reset", |b| {
        let pool = Pool::new(4096);
        let layout = Layout::new::<[u8; 64]>();
        b.iter(|| {
            for _ in 0..64 {
                black_box(pool.alloc(layout));
            }
            pool.reset();
        });
    });
}

criterion_group!(benches, bump_alloc, bump_alloc_with_resets);
criterion_main!(benches);
