use srvcore::array::PoolArray;
use srvcore::list::PoolList;
use srvcore::pool::Pool;
use srvcore::queue::Queue;
use srvcore::rbtree::RbTree;
use srvcore::threadpool::{CompletionDispatcher, PoolConfig, Task, ThreadPool};
use srvcore::timer::TimerService;
use std::sync::{Arc, OnceLock};

static TRACING: OnceLock<()> = OnceLock::new();

/// Installs a stderr subscriber once so `tracing::debug!`/`warn!` calls
/// exercised by these tests are visible under `RUST_LOG`, instead of going
/// nowhere without a registered subscriber.
fn init_tracing() {
    TRACING.get_or_init(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

#[test]
fn array_and_list_share_a_pool_without_interfering() {
    init_tracing();
    let pool = Pool::new(4096);

    let mut arr: PoolArray<u32> = PoolArray::create(&pool, 2).unwrap();
    let mut list: PoolList<u32> = PoolList::create(&pool, 2).unwrap();

    for i in 0..6u32 {
        arr.push().unwrap().write(i);
        list.push().unwrap().write(i * 10);
    }

    assert_eq!(arr.as_slice(), &[0, 1, 2, 3, 4, 5]);
    assert_eq!(list.iter().copied().collect::<Vec<_>>(), vec![0, 10, 20, 30, 40, 50]);
}

#[test]
fn queue_split_and_append_round_trip() {
    let mut q: Queue<u32> = Queue::new();
    for v in 1..=6u32 {
        q.insert_tail(v);
    }
    let mid = q.middle().unwrap();
    let tail_half = q.split_after(mid);
    assert_eq!(q.len(), 4);
    assert_eq!(tail_half.len(), 2);

    q.append(tail_half);
    assert_eq!(q.len(), 6);
}

#[test]
fn rbtree_backs_a_priority_style_scan() {
    let mut t: RbTree<i32, &'static str> = RbTree::new();
    t.insert(30, "low");
    t.insert(10, "high");
    t.insert(20, "mid");
    let order: Vec<_> = t.in_order().into_iter().map(|h| *t.value(h)).collect();
    assert_eq!(order, vec!["high", "mid", "low"]);
}

#[test]
fn timer_service_expires_only_due_timers() {
    let mut svc: TimerService<&'static str> = TimerService::new();
    let soon = svc.register("soon", |_| {}, false);
    let later = svc.register("later", |_| {}, false);
    svc.add(soon, 10);
    svc.add(later, 1000);

    svc.current_msec += 10;
    svc.expire();

    assert!(!svc.event(soon).timer_set);
    assert!(svc.event(soon).timedout);
    assert!(svc.event(later).timer_set);
    assert!(!svc.event(later).timedout);
}

#[test]
fn thread_pool_completes_posted_work_end_to_end() {
    init_tracing();
    let dispatcher = CompletionDispatcher::new(|| {});
    let pool: ThreadPool<u32> = ThreadPool::new("integration", PoolConfig::new(2), Arc::clone(&dispatcher)).unwrap();

    let task = Task::new(0u32, |ctx, _| *ctx = 42, |ev| assert_eq!(ev.ctx, 42));
    pool.post(task).unwrap();

    let mut drained = 0;
    for _ in 0..200 {
        drained += dispatcher.drain();
        if drained > 0 {
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(5));
    }
    assert_eq!(drained, 1);

    pool.shutdown();
}
