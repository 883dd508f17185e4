//! Growable array over a `Pool`: grows in place while it sits at the pool's
//! allocation tail, otherwise reallocates and copies at double capacity.

use crate::pool::Pool;
use std::mem::MaybeUninit;
use std::ptr::NonNull;

pub struct PoolArray<'p, T> {
    pool: &'p Pool,
    ptr: NonNull<T>,
    count: usize,
    capacity: usize,
}

impl<'p, T> PoolArray<'p, T> {
    pub fn create(pool: &'p Pool, capacity: usize) -> Option<Self> {
        let capacity = capacity.max(1);
        let layout = std::alloc::Layout::array::<T>(capacity).ok()?;
        let ptr = pool.alloc(layout)?.cast::<T>();
        Some(PoolArray { pool, ptr, count: 0, capacity })
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn as_slice(&self) -> &[T] {
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.count) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.count) }
    }

    /// Reserves one uninitialized slot, growing if the array is at capacity,
    /// and returns it for the caller to initialize.
    pub fn push(&mut self) -> Option<&mut MaybeUninit<T>> {
        self.push_n(1).map(|s| &mut s[0])
    }

    /// Reserves `n` contiguous uninitialized slots at the end, growing if
    /// necessary (`ngx_array_push_n`).
    pub fn push_n(&mut self, n: usize) -> Option<&mut [MaybeUninit<T>]> {
        if self.count + n > self.capacity {
            self.grow_for(n)?;
        }
        let start = self.count;
        self.count += n;
        let slice = unsafe {
            std::slice::from_raw_parts_mut(self.ptr.as_ptr().add(start) as *mut MaybeUninit<T>, n)
        };
        Some(slice)
    }

    fn grow_for(&mut self, n: usize) -> Option<()> {
        let elem_size = std::mem::size_of::<T>();
        let needed = self.capacity + n - self.count;

        // Tail-growth fast path: if this array's element block is still the
        // pool's most recent allocation, extend it in place rather than
        // copying, mirroring `ngx_array_push`'s check against `p->d.last`.
        if elem_size > 0 {
            let extend_bytes = needed * elem_size;
            if self.pool.try_extend_in_place(self.ptr.as_ptr() as *mut u8, self.capacity * elem_size, extend_bytes) {
                self.capacity += needed;
                return Some(());
            }
        }

        let new_capacity = (2 * self.capacity).max(self.count + n);
        let layout = std::alloc::Layout::array::<T>(new_capacity).ok()?;
        let new_ptr = self.pool.alloc(layout)?.cast::<T>();
        unsafe {
            std::ptr::copy_nonoverlapping(self.ptr.as_ptr(), new_ptr.as_ptr(), self.count);
        }
        tracing::trace!(old = self.capacity, new = new_capacity, "array reallocated");
        self.ptr = new_ptr;
        self.capacity = new_capacity;
        Some(())
    }

    /// Rolls the pool cursor back over the element block and then the
    /// header, each independently, exactly as `ngx_array_destroy` does —
    /// not "iff both", since the header check only matters after the
    /// element-block check has already moved the cursor.
    pub fn destroy(self) {
        let elem_size = std::mem::size_of::<T>();
        if elem_size > 0 {
            self.pool.rollback_if_tail(self.ptr.as_ptr() as *mut u8, self.capacity * elem_size);
        }
        let header_size = std::mem::size_of::<Self>();
        self.pool.rollback_if_tail(&self as *const _ as *mut u8, header_size);
    }
}
