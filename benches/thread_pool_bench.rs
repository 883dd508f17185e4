use criterion::{criterion_group, criterion_main, Criterion};
use srvcore::threadpool::{CompletionDispatcher, PoolConfig, Task, ThreadPool};
use std::sync::Arc;

fn dispatch_round_trip(c: &mut Criterion) {
    let dispatcher = CompletionDispatcher::new(|| {});
    let pool: ThreadPool<usize> = ThreadPool::new("bench", PoolConfig::new(4), Arc::clone(&dispatcher)).unwrap();

    c.bench_function("thread_pool_dispatch", |b| {
        b.iter(|| {
            let task = Task::new(0usize, |ctx, _| *ctx += 1, |_ev| {});
            pool.post(task).ok();
            while dispatcher.drain() == 0 {
                std::thread::yield_now();
            }
        });
    });

    pool.shutdown();
}

criterion_group!(benches, dispatch_round_trip);
criterion_main!(benches);
