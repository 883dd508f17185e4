//! Doubly-linked circular queue, reimplemented as a handle/index-based slab
//! rather than intrusive pointers embedded in a host struct (`ngx_queue_t`'s
//! approach doesn't translate to safe Rust — see Design Notes). The sentinel
//! is modeled as the `Queue` struct's own head/tail fields rather than a
//! slab slot.

pub type Handle = usize;

struct Slot<T> {
    prev: Handle,
    next: Handle,
    value: T,
}

const NIL: Handle = usize::MAX;

pub struct Queue<T> {
    slots: Vec<Option<Slot<T>>>,
    free: Vec<Handle>,
    head: Handle,
    tail: Handle,
    len: usize,
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Queue<T> {
    pub fn new() -> Self {
        Queue { slots: Vec::new(), free: Vec::new(), head: NIL, tail: NIL, len: 0 }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn head(&self) -> Option<Handle> {
        (self.head != NIL).then_some(self.head)
    }

    pub fn tail(&self) -> Option<Handle> {
        (self.tail != NIL).then_some(self.tail)
    }

    pub fn next(&self, h: Handle) -> Option<Handle> {
        let n = self.slot(h).next;
        (n != NIL).then_some(n)
    }

    pub fn prev(&self, h: Handle) -> Option<Handle> {
        let p = self.slot(h).prev;
        (p != NIL).then_some(p)
    }

    pub fn get(&self, h: Handle) -> &T {
        &self.slot(h).value
    }

    pub fn get_mut(&mut self, h: Handle) -> &mut T {
        &mut self.slot_mut(h).value
    }

    fn slot(&self, h: Handle) -> &Slot<T> {
        self.slots[h].as_ref().expect("stale queue handle")
    }

    fn slot_mut(&mut self, h: Handle) -> &mut Slot<T> {
        self.slots[h].as_mut().expect("stale queue handle")
    }

    fn alloc_slot(&mut self, slot: Slot<T>) -> Handle {
        if let Some(h) = self.free.pop() {
            self.slots[h] = Some(slot);
            h
        } else {
            self.slots.push(Some(slot));
            self.slots.len() - 1
        }
    }

    pub fn insert_head(&mut self, value: T) -> Handle {
        let h = self.alloc_slot(Slot { prev: NIL, next: self.head, value });
        if self.head != NIL {
            self.slot_mut(self.head).prev = h;
        } else {
            self.tail = h;
        }
        self.head = h;
        self.len += 1;
        h
    }

    pub fn insert_tail(&mut self, value: T) -> Handle {
        let h = self.alloc_slot(Slot { prev: self.tail, next: NIL, value });
        if self.tail != NIL {
            self.slot_mut(self.tail).next = h;
        } else {
            self.head = h;
        }
        self.tail = h;
        self.len += 1;
        h
    }

    pub fn insert_after(&mut self, at: Handle, value: T) -> Handle {
        let next = self.slot(at).next;
        let h = self.alloc_slot(Slot { prev: at, next, value });
        self.slot_mut(at).next = h;
        if next != NIL {
            self.slot_mut(next).prev = h;
        } else {
            self.tail = h;
        }
        self.len += 1;
        h
    }

    pub fn insert_before(&mut self, at: Handle, value: T) -> Handle {
        let prev = self.slot(at).prev;
        let h = self.alloc_slot(Slot { prev, next: at, value });
        self.slot_mut(at).prev = h;
        if prev != NIL {
            self.slot_mut(prev).next = h;
        } else {
            self.head = h;
        }
        self.len += 1;
        h
    }

    pub fn remove(&mut self, h: Handle) -> T {
        let Slot { prev, next, value } = self.slots[h].take().expect("stale queue handle");
        if prev != NIL {
            self.slot_mut(prev).next = next;
        } else {
            self.head = next;
        }
        if next != NIL {
            self.slot_mut(next).prev = prev;
        } else {
            self.tail = prev;
        }
        self.free.push(h);
        self.len -= 1;
        value
    }

    /// Splits the queue after `at`, returning a new queue holding everything
    /// from `at`'s successor to the tail. `at` stays in `self` as the new tail.
    pub fn split_after(&mut self, at: Handle) -> Queue<T>
    where
        T: Default,
    {
        let mut other = Queue::new();
        let mut cursor = self.slot(at).next;
        self.slot_mut(at).next = NIL;
        let old_tail = self.tail;
        self.tail = at;
        while cursor != NIL {
            let next = self.slot(cursor).next;
            let value = std::mem::take(&mut self.slot_mut(cursor).value);
            other.insert_tail(value);
            cursor = next;
        }
        let _ = old_tail;
        other
    }

    /// Appends `other` onto the end of `self`, consuming it.
    pub fn append(&mut self, mut other: Queue<T>)
    where
        T: Default,
    {
        while let Some(h) = other.head() {
            let v = other.remove(h);
            self.insert_tail(v);
        }
    }

    /// Two-cursor walk: returns the middle handle for an odd-length queue,
    /// or the first handle of the second half for an even-length one
    /// (`ngx_queue_middle`).
    pub fn middle(&self) -> Option<Handle> {
        let mut middle = self.head()?;
        let mut next = self.head()?;
        let last = self.tail()?;
        while next != last {
            middle = self.next(middle).unwrap();
            next = self.next(next).unwrap();
            if next == last {
                break;
            }
            next = self.next(next).unwrap();
        }
        Some(middle)
    }

    /// Stable insertion sort by unlink-and-backward-rescan (`ngx_queue_sort`).
    pub fn sort_by<F>(&mut self, mut cmp: F)
    where
        F: FnMut(&T, &T) -> std::cmp::Ordering,
    {
        use std::cmp::Ordering;
        if self.len < 2 {
            return;
        }
        let mut q = match self.next(self.head().unwrap()) {
            Some(h) => h,
            None => return,
        };
        loop {
            let next = self.next(q);
            let prev_h = self.prev(q).unwrap();
            // unlink q
            let next_of_q = self.slot(q).next;
            self.slot_mut(prev_h).next = next_of_q;
            if next_of_q != NIL {
                self.slot_mut(next_of_q).prev = prev_h;
            } else {
                self.tail = prev_h;
            }

            // Walk backward from q's old predecessor while it sorts after q.
            // `prev: None` means the walk ran off the front — q becomes the
            // new head, mirroring the circular list's sentinel termination.
            let mut prev: Option<Handle> = Some(prev_h);
            while let Some(p) = prev {
                if cmp(self.get(p), self.get(q)) != Ordering::Greater {
                    break;
                }
                prev = self.prev(p);
            }

            match prev {
                Some(p) => {
                    let after = self.slot(p).next;
                    self.slot_mut(q).prev = p;
                    self.slot_mut(q).next = after;
                    self.slot_mut(p).next = q;
                    if after != NIL {
                        self.slot_mut(after).prev = q;
                    } else {
                        self.tail = q;
                    }
                }
                None => {
                    let old_head = self.head;
                    self.slot_mut(q).prev = NIL;
                    self.slot_mut(q).next = old_head;
                    if old_head != NIL {
                        self.slot_mut(old_head).prev = q;
                    } else {
                        self.tail = q;
                    }
                    self.head = q;
                }
            }

            match next {
                Some(n) => q = n,
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_remove_preserve_order() {
        let mut q = Queue::new();
        q.insert_tail(1);
        q.insert_tail(2);
        q.insert_tail(3);
        let mut out = vec![];
        let mut h = q.head();
        while let Some(x) = h {
            out.push(*q.get(x));
            h = q.next(x);
        }
        assert_eq!(out, vec![1, 2, 3]);
    }

    #[test]
    fn middle_of_six_is_start_of_second_half() {
        let mut q = Queue::new();
        let handles: Vec<_> = (1..=6).map(|v| q.insert_tail(v)).collect();
        let mid = q.middle().unwrap();
        assert_eq!(*q.get(mid), *q.get(handles[3]));
    }

    #[test]
    fn sort_is_stable() {
        let mut q = Queue::new();
        for v in [3, 1, 2, 1, 2] {
            q.insert_tail(v);
        }
        q.sort_by(|a, b| a.cmp(b));
        let mut out = vec![];
        let mut h = q.head();
        while let Some(x) = h {
            out.push(*q.get(x));
            h = q.next(x);
        }
        assert_eq!(out, vec![1, 1, 2, 2, 3]);
    }
}
