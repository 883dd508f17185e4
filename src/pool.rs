//! Arena-style memory pool: bump-allocates from a chain of chunks, with an
//! oversize list for allocations too large to share a chunk. No per-object
//! free; memory is reclaimed in bulk via `reset` or `Drop`.

use std::alloc::{alloc, alloc_zeroed, dealloc, Layout};
use std::cell::{Cell, RefCell};
use std::ptr::NonNull;

struct Chunk {
    data: NonNull<u8>,
    layout: Layout,
    size: usize,
    last: Cell<usize>,
}

impl Chunk {
    fn new(size: usize) -> Option<Self> {
        let layout = Layout::from_size_align(size, 16).ok()?;
        let data = unsafe { alloc(layout) };
        let data = NonNull::new(data)?;
        Some(Chunk { data, layout, size, last: Cell::new(0) })
    }

    fn remaining(&self) -> usize {
        self.size - self.last.get()
    }

    /// Bumps the cursor for `layout`, returning the aligned start address.
    fn try_bump(&self, layout: Layout) -> Option<NonNull<u8>> {
        let base = self.data.as_ptr() as usize;
        let cur = base + self.last.get();
        let aligned = (cur + layout.align() - 1) & !(layout.align() - 1);
        let pad = aligned - cur;
        let end = aligned + layout.size();
        if end > base + self.size {
            return None;
        }
        self.last.set(end - base);
        let _ = pad;
        NonNull::new(aligned as *mut u8)
    }
}

impl Drop for Chunk {
    fn drop(&mut self) {
        unsafe { dealloc(self.data.as_ptr(), self.layout) }
    }
}

struct LargeAlloc {
    data: NonNull<u8>,
    layout: Layout,
}

/// A chunked bump allocator. Not `Sync`: an arena pool is loop-thread-only
/// unless a task explicitly owns a private one, so the internals use
/// `Cell`/`RefCell` rather than atomics.
pub struct Pool {
    chunks: RefCell<Vec<Chunk>>,
    /// Index of the chunk most recently bumped; used both as a forward-scan
    /// hint for `alloc` and as the tail the rollback/tail-extend helpers
    /// check against.
    current: Cell<usize>,
    large: RefCell<Vec<LargeAlloc>>,
    chunk_size: usize,
}

impl Pool {
    pub fn new(chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(64);
        tracing::debug!(chunk_size, "pool created");
        Pool {
            chunks: RefCell::new(Vec::new()),
            current: Cell::new(0),
            large: RefCell::new(Vec::new()),
            chunk_size,
        }
    }

    fn large_alloc(&self, layout: Layout) -> Option<NonNull<u8>> {
        let data = unsafe { alloc(layout) };
        let data = NonNull::new(data)?;
        self.large.borrow_mut().push(LargeAlloc { data, layout });
        Some(data)
    }

    /// Allocations at or above this size skip the chunk chain entirely and
    /// get their own block on the oversize list (`ngx_alloc.c`'s large-alloc
    /// split) — "large" is defined relative to this pool's own chunk size,
    /// not some fixed global constant, so a pool built with a bigger
    /// `chunk_size` keeps more allocations on the fast chunked path.
    fn large_alloc_threshold(&self) -> usize {
        self.chunk_size
    }

    /// Bump-allocates `layout`, growing the chunk chain if needed. Returns
    /// `None` only on underlying allocator failure (mirrors `ngx_palloc`
    /// returning `NULL`).
    pub fn alloc(&self, layout: Layout) -> Option<NonNull<u8>> {
        if layout.size() >= self.large_alloc_threshold() {
            return self.large_alloc(layout);
        }

        let mut chunks = self.chunks.borrow_mut();
        let mut idx = self.current.get();
        while idx < chunks.len() {
            if let Some(p) = chunks[idx].try_bump(layout) {
                self.current.set(idx);
                return Some(p);
            }
            // This chunk can't satisfy future requests of similar size either;
            // advance the hint so subsequent calls skip it.
            idx += 1;
        }
        self.current.set(idx.min(chunks.len()));

        let new_size = self.chunk_size.max(layout.size() + layout.align());
        let chunk = Chunk::new(new_size)?;
        let p = chunk.try_bump(layout)?;
        chunks.push(chunk);
        self.current.set(chunks.len() - 1);
        tracing::debug!(new_size, total_chunks = chunks.len(), "pool grew a chunk");
        Some(p)
    }

    pub fn alloc_unaligned(&self, size: usize) -> Option<NonNull<u8>> {
        self.alloc(Layout::from_size_align(size, 1).ok()?)
    }

    /// Zeroed allocation (`ngx_calloc`).
    pub fn calloc(&self, layout: Layout) -> Option<NonNull<u8>> {
        if layout.size() >= self.large_alloc_threshold() {
            let data = unsafe { alloc_zeroed(layout) };
            let data = NonNull::new(data)?;
            self.large.borrow_mut().push(LargeAlloc { data, layout });
            return Some(data);
        }
        let p = self.alloc(layout)?;
        unsafe { std::ptr::write_bytes(p.as_ptr(), 0, layout.size()) };
        Some(p)
    }

    /// Frees a single oversize allocation obtained via `alloc`/`calloc` once
    /// it crossed the pool's large-alloc threshold. Returns `false` if `ptr`
    /// isn't on the oversize list (e.g. it came from a chunk, which can't be
    /// freed individually).
    pub fn free_large(&self, ptr: NonNull<u8>) -> bool {
        let mut large = self.large.borrow_mut();
        if let Some(pos) = large.iter().position(|l| l.data == ptr) {
            let l = large.remove(pos);
            unsafe { dealloc(l.data.as_ptr(), l.layout) };
            true
        } else {
            false
        }
    }

    /// Best-effort reclamation: if `ptr..ptr+old_size` is the current
    /// chunk's tail, rolls the cursor back by `old_size` (used by
    /// `PoolArray`/`PoolList` destroy paths that mirror `ngx_array_destroy`'s
    /// two independent rollback checks).
    pub(crate) fn rollback_if_tail(&self, ptr: *mut u8, size: usize) -> bool {
        let chunks = self.chunks.borrow();
        let idx = self.current.get();
        let Some(chunk) = chunks.get(idx) else { return false };
        let end = unsafe { ptr.add(size) } as usize;
        let tail = chunk.data.as_ptr() as usize + chunk.last.get();
        if end == tail && (ptr as usize) >= chunk.data.as_ptr() as usize {
            chunk.last.set(chunk.last.get() - size);
            true
        } else {
            false
        }
    }

    /// Extends an existing tail allocation by `additional` bytes in place,
    /// without copying, iff it still sits at the current chunk's cursor and
    /// there's room. This is the array's "tail growth" fast path, exposed as
    /// an explicit pool API per the Design Notes rather than raw pointer
    /// comparison against pool internals.
    pub(crate) fn try_extend_in_place(&self, ptr: *mut u8, old_size: usize, additional: usize) -> bool {
        let chunks = self.chunks.borrow();
        let idx = self.current.get();
        let Some(chunk) = chunks.get(idx) else { return false };
        let end = unsafe { ptr.add(old_size) } as usize;
        let tail = chunk.data.as_ptr() as usize + chunk.last.get();
        if end == tail && chunk.remaining() >= additional {
            chunk.last.set(chunk.last.get() + additional);
            true
        } else {
            false
        }
    }

    /// Drops every chunk but the first and rewinds it, and frees all
    /// oversize allocations. All previously handed-out pointers become
    /// dangling; callers must not dereference anything allocated from this
    /// pool past a `reset`.
    pub fn reset(&self) {
        let mut chunks = self.chunks.borrow_mut();
        chunks.truncate(1);
        if let Some(first) = chunks.first() {
            first.last.set(0);
        }
        self.current.set(0);
        self.large.borrow_mut().clear();
        tracing::debug!("pool reset");
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bump_alloc_stays_in_one_chunk() {
        let pool = Pool::new(256);
        let layout = Layout::new::<u64>();
        let a = pool.alloc(layout).unwrap();
        let b = pool.alloc(layout).unwrap();
        assert_eq!(pool.chunk_count(), 1);
        assert_ne!(a, b);
    }

    #[test]
    fn grows_a_new_chunk_when_full() {
        let pool = Pool::new(64);
        let layout = Layout::new::<[u8; 48]>();
        let _a = pool.alloc(layout).unwrap();
        let _b = pool.alloc(layout).unwrap();
        assert!(pool.chunk_count() >= 2);
    }

    #[test]
    fn large_threshold_scales_with_chunk_size() {
        let pool = Pool::new(64 * 1024);
        let layout = Layout::from_size_align(2000, 8).unwrap();
        let _p = pool.alloc(layout).unwrap();
        // 2000 bytes easily fits a 64 KiB chunk, so it must stay on the
        // chunked path rather than the oversize list.
        assert_eq!(pool.chunk_count(), 1);
    }

    #[test]
    fn large_alloc_is_independently_freeable() {
        let pool = Pool::new(64);
        let layout = Layout::from_size_align(8192, 8).unwrap();
        let p = pool.alloc(layout).unwrap();
        assert_eq!(pool.chunk_count(), 0);
        assert!(pool.free_large(p));
        assert!(!pool.free_large(p));
    }

    #[test]
    fn tail_extend_in_place_avoids_move() {
        let pool = Pool::new(256);
        let layout = Layout::new::<[u8; 8]>();
        let p = pool.alloc(layout).unwrap();
        assert!(pool.try_extend_in_place(p.as_ptr(), 8, 8));
    }

    #[test]
    fn reset_reclaims_chunks() {
        let pool = Pool::new(64);
        let layout = Layout::new::<[u8; 48]>();
        let _ = pool.alloc(layout);
        let _ = pool.alloc(layout);
        let _ = pool.alloc(layout);
        assert!(pool.chunk_count() > 1);
        pool.reset();
        assert_eq!(pool.chunk_count(), 1);
    }
}
