//! Chunked append-only list over a `Pool`. Unlike `PoolArray`, growth never
//! copies existing elements, so their addresses stay stable for the life of
//! the list — `ngx_list_t`'s defining property.
//!
//! There is deliberately no index-based `get`: like `ngx_list.c`, this is a
//! part-at-a-time iteration structure, not a random-access one.

use crate::pool::Pool;
use std::mem::MaybeUninit;
use std::ptr::NonNull;

struct Part<T> {
    elements: NonNull<T>,
    count: usize,
}

pub struct PoolList<'p, T> {
    pool: &'p Pool,
    parts: Vec<Part<T>>,
    part_capacity: usize,
}

impl<'p, T> PoolList<'p, T> {
    pub fn create(pool: &'p Pool, part_capacity: usize) -> Option<Self> {
        let part_capacity = part_capacity.max(1);
        let first = Self::alloc_part(pool, part_capacity)?;
        Some(PoolList { pool, parts: vec![first], part_capacity })
    }

    fn alloc_part(pool: &'p Pool, capacity: usize) -> Option<Part<T>> {
        let layout = std::alloc::Layout::array::<T>(capacity).ok()?;
        let elements = pool.alloc(layout)?.cast::<T>();
        Some(Part { elements, count: 0 })
    }

    /// Reserves one uninitialized slot, starting a new part if the last one
    /// is full (`ngx_list_push`).
    pub fn push(&mut self) -> Option<&mut MaybeUninit<T>> {
        let need_new_part = self.parts.last().map_or(true, |p| p.count == self.part_capacity);
        if need_new_part {
            let part = Self::alloc_part(self.pool, self.part_capacity)?;
            self.parts.push(part);
        }
        let part = self.parts.last_mut().unwrap();
        let slot = unsafe { &mut *(part.elements.as_ptr().add(part.count) as *mut MaybeUninit<T>) };
        part.count += 1;
        Some(slot)
    }

    pub fn len(&self) -> usize {
        self.parts.iter().map(|p| p.count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Walks every part in order, then every element within a part — the
    /// same two-level iteration `ngx_list.h`'s header comment documents in
    /// place of a `next()` helper.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.parts.iter().flat_map(|p| unsafe { std::slice::from_raw_parts(p.elements.as_ptr(), p.count) }.iter())
    }
}
