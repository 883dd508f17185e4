//! Timer service: a red-black tree of pending deadlines keyed by wrap-safe
//! 32-bit millisecond timestamps, used only to find the earliest expiry
//! (`ngx_event_timer.c`). Duplicate keys are expected and harmless — the
//! tree never needs to disambiguate same-deadline timers, only find the
//! minimum.

use crate::rbtree::{Handle as TreeHandle, RbTree, WrappingU32Order};

pub type TimerId = usize;

pub struct TimerEvent<D> {
    pub data: D,
    pub handler: fn(&mut TimerEvent<D>),
    pub timer_set: bool,
    pub timedout: bool,
    pub cancelable: bool,
    key: u32,
    tree_handle: Option<TreeHandle>,
}

struct Slot<D> {
    event: TimerEvent<D>,
}

/// Sentinel return from `find_next` meaning there is nothing pending
/// (`NGX_TIMER_INFINITE`).
pub const NO_TIMER: i64 = -1;

/// `NGX_TIMER_LAZY_DELTA`: re-arming an already-armed timer whose new
/// deadline is within this many milliseconds of the old one is skipped —
/// the tree position is left alone rather than deleted and reinserted.
const TIMER_LAZY_DELTA: u32 = 300;

pub struct TimerService<D> {
    tree: RbTree<u32, TimerId, WrappingU32Order>,
    events: Vec<Option<Slot<D>>>,
    free: Vec<TimerId>,
    pub current_msec: u32,
}

impl<D> Default for TimerService<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> TimerService<D> {
    pub fn new() -> Self {
        TimerService { tree: RbTree::new(), events: Vec::new(), free: Vec::new(), current_msec: 0 }
    }

    /// Registers a new timer event, not yet armed. Call `add` to schedule it.
    pub fn register(&mut self, data: D, handler: fn(&mut TimerEvent<D>), cancelable: bool) -> TimerId {
        let event = TimerEvent { data, handler, timer_set: false, timedout: false, cancelable, key: 0, tree_handle: None };
        if let Some(id) = self.free.pop() {
            self.events[id] = Some(Slot { event });
            id
        } else {
            self.events.push(Some(Slot { event }));
            self.events.len() - 1
        }
    }

    pub fn event(&self, id: TimerId) -> &TimerEvent<D> {
        &self.events[id].as_ref().expect("stale timer id").event
    }

    pub fn event_mut(&mut self, id: TimerId) -> &mut TimerEvent<D> {
        &mut self.events[id].as_mut().expect("stale timer id").event
    }

    /// Arms (or re-arms) `id` to fire `delay_msec` after `current_msec`. If
    /// `id` is already armed and the new deadline is within
    /// `TIMER_LAZY_DELTA` of the current one, the tree entry is left alone
    /// rather than unlinked and reinserted.
    pub fn add(&mut self, id: TimerId, delay_msec: u32) {
        let deadline = self.current_msec.wrapping_add(delay_msec);
        let ev = self.events[id].as_ref().unwrap();
        if ev.event.timer_set {
            let diff = (deadline.wrapping_sub(ev.event.key)) as i32;
            if diff.unsigned_abs() < TIMER_LAZY_DELTA {
                return;
            }
            self.del(id);
        }
        let h = self.tree.insert(deadline, id);
        let ev = self.event_mut(id);
        ev.key = deadline;
        ev.tree_handle = Some(h);
        ev.timer_set = true;
        ev.timedout = false;
        tracing::debug!(id, deadline, "timer armed");
    }

    /// Unschedules `id` if currently armed; a no-op otherwise.
    pub fn del(&mut self, id: TimerId) {
        let handle = self.events[id].as_ref().unwrap().event.tree_handle.take();
        if let Some(h) = handle {
            self.tree.delete(h);
        }
        self.event_mut(id).timer_set = false;
    }

    /// Deregisters `id` entirely, unscheduling it first if armed.
    pub fn unregister(&mut self, id: TimerId) -> D {
        if self.events[id].as_ref().unwrap().event.timer_set {
            self.del(id);
        }
        let slot = self.events[id].take().expect("stale timer id");
        self.free.push(id);
        slot.event.data
    }

    /// Milliseconds until the earliest pending deadline, clamped to zero if
    /// already past, or `NO_TIMER` if nothing is scheduled
    /// (`ngx_event_find_timer`).
    pub fn find_next(&self) -> i64 {
        let min = self.tree.min_handle();
        if min == crate::rbtree::Handle::MAX {
            return NO_TIMER;
        }
        let key = *self.tree.key(min);
        let diff = key.wrapping_sub(self.current_msec) as i32;
        if diff > 0 { diff as i64 } else { 0 }
    }

    /// Fires every timer whose deadline is at or before `current_msec`, in
    /// non-decreasing deadline order, invoking each one's handler
    /// (`ngx_event_expire_timers`).
    pub fn expire(&mut self) {
        loop {
            let min = self.tree.min_handle();
            if min == crate::rbtree::Handle::MAX {
                return;
            }
            let key = *self.tree.key(min);
            let diff = key.wrapping_sub(self.current_msec) as i32;
            if diff > 0 {
                return;
            }
            let id = *self.tree.value(min);
            self.tree.delete(min);
            let ev = self.event_mut(id);
            ev.tree_handle = None;
            ev.timer_set = false;
            ev.timedout = true;
            let handler = ev.handler;
            tracing::debug!(id, key, "timer expired");
            handler(ev);
        }
    }

    /// `ngx_event_no_timers_left`: false iff any armed, non-cancelable timer
    /// remains.
    pub fn no_timers_left(&self) -> bool {
        if self.tree.is_empty() {
            return true;
        }
        let mut h = self.tree.min_handle();
        while h != crate::rbtree::Handle::MAX {
            let id = *self.tree.value(h);
            if !self.event(id).cancelable {
                return false;
            }
            h = self.tree.next(h);
        }
        true
    }
}
