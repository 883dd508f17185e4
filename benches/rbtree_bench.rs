use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::prelude::*;
use srvcore::rbtree::RbTree;

fn insert_sequential(c: &mut Criterion) {
    c.bench_function("rbtree_insert_sequential_10k", |b| {
        b.iter(|| {
            let mut t: RbTree<u32, ()> = RbTree::new();
            for k in 0..10_000u32 {
                black_box(t.insert(k, ()));
            }
        });
    });
}

fn insert_random(c: &mut Criterion) {
    c.bench_function("rbtree_insert_random_10k", |b| {
        let mut rng = StdRng::seed_from_u64(7);
        let keys: Vec<u32> = (0..10_000).map(|_| rng.gen()).collect();
        b.iter(|| {
            let mut t: RbTree<u32, ()> = RbTree::new();
            for &k in &keys {
                black_box(t.insert(k, ()));
            }
        });
    });
}

criterion_group!(benches, insert_sequential, insert_random);
criterion_main!(benches);
