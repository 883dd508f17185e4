//! Property-based invariant checks layered on top of the per-module unit
//! tests: these probe the structures across randomly generated inputs
//! rather than fixed small cases.

use proptest::prelude::*;
use srvcore::array::PoolArray;
use srvcore::pool::Pool;
use srvcore::rbtree::{RbTree, StandardOrder};
use srvcore::timer::TimerService;

proptest! {
    /// In-order traversal must be non-decreasing in key regardless of
    /// insertion order (`ngx_rbtree_insert_value`'s BST ordering invariant).
    #[test]
    fn rbtree_in_order_is_sorted_by_key(keys in prop::collection::vec(-1000i32..1000, 0..200)) {
        let mut tree: RbTree<i32, i32, StandardOrder<i32>> = RbTree::new();
        for &k in &keys {
            tree.insert(k, k);
        }
        let order: Vec<i32> = tree.in_order().into_iter().map(|h| *tree.key(h)).collect();
        prop_assert_eq!(order.len(), keys.len());
        for w in order.windows(2) {
            prop_assert!(w[0] <= w[1]);
        }
    }

    /// Repeated `push` must preserve insertion order and values no matter
    /// what initial capacity the array started with (tail-growth and
    /// reallocate-and-copy must agree on content).
    #[test]
    fn array_push_preserves_order_across_growth(
        initial_capacity in 1usize..8,
        values in prop::collection::vec(0u32..10_000, 0..300),
    ) {
        let pool = Pool::new(256);
        let mut arr: PoolArray<u32> = PoolArray::create(&pool, initial_capacity).unwrap();
        for &v in &values {
            arr.push().unwrap().write(v);
        }
        prop_assert_eq!(arr.as_slice(), values.as_slice());
    }

    /// Every armed, non-cancelable timer eventually fires and clears
    /// `timer_set`/sets `timedout`, even across a 32-bit millisecond clock
    /// wraparound — `find_next`/`expire` must never stall or skip one.
    #[test]
    fn timer_every_due_timer_eventually_fires(
        start in any::<u32>(),
        delays in prop::collection::vec(0u32..5000, 1..40),
    ) {
        let mut svc: TimerService<u32> = TimerService::new();
        svc.current_msec = start;
        let mut ids = vec![];
        for (i, &delay) in delays.iter().enumerate() {
            let id = svc.register(i as u32, |_| {}, false);
            svc.add(id, delay);
            ids.push(id);
        }

        let mut iterations = 0;
        while !svc.no_timers_left() {
            let wait = svc.find_next();
            prop_assert_ne!(wait, srvcore::timer::NO_TIMER);
            svc.current_msec = svc.current_msec.wrapping_add(wait.max(1) as u32);
            svc.expire();
            iterations += 1;
            prop_assert!(iterations <= ids.len() + 1);
        }

        for &id in &ids {
            prop_assert!(svc.event(id).timedout);
            prop_assert!(!svc.event(id).timer_set);
        }
    }
}
