//! RAII handle over a pooled allocation: returns its region to the
//! allocator on drop, the way `worker_pool.rs`'s semaphore permit is forgotten
//! until the worker releases it back.

use super::allocator::{Allocation, Allocator};
use std::sync::Arc;

pub struct Buffer {
    allocator: Arc<dyn Allocator>,
    allocation: Allocation,
}

impl Buffer {
    pub(crate) fn new(allocator: Arc<dyn Allocator>, allocation: Allocation) -> Self {
        Buffer {
            allocator,
            allocation,
        }
    }

    pub fn len(&self) -> usize {
        self.allocation.size
    }

    pub fn is_empty(&self) -> bool {
        self.allocation.size == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: the allocation is held live by this `Buffer` until `Drop`,
        // at which point it is returned to the allocator and must not be
        // read through again.
        unsafe {
            let base = self.allocator.arena_ptr(self.allocation.block_id);
            std::slice::from_raw_parts(base.add(self.allocation.offset), self.allocation.size)
        }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: see `as_slice`; exclusive access is guaranteed by `&mut self`.
        unsafe {
            let base = self.allocator.arena_ptr(self.allocation.block_id);
            std::slice::from_raw_parts_mut(base.add(self.allocation.offset), self.allocation.size)
        }
    }

    /// Read `len` bytes starting at `offset` within this allocation.
    pub fn slice(&self, offset: usize, len: usize) -> &[u8] {
        &self.as_slice()[offset..offset + len]
    }

    /// Write `bytes` at `offset` within this allocation without requiring
    /// exclusive access, so a batch's requests can each write into their own
    /// disjoint region of a buffer shared (via `Arc`) across the whole
    /// batch. Callers are responsible for ensuring writers never overlap;
    /// the soft batcher upholds this by writing one request at a time and
    /// only ever advancing offsets forward.
    pub fn write_at(&self, offset: usize, bytes: &[u8]) {
        assert!(
            offset + bytes.len() <= self.allocation.size,
            "write of {} bytes at offset {offset} overruns a {}-byte buffer",
            bytes.len(),
            self.allocation.size
        );
        // SAFETY: see `as_slice`; the caller guarantees no other writer is
        // touching `[offset, offset + bytes.len())` concurrently.
        unsafe {
            let base = self.allocator.arena_ptr(self.allocation.block_id);
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), base.add(self.allocation.offset + offset), bytes.len());
        }
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("block_id", &self.allocation.block_id)
            .field("offset", &self.allocation.offset)
            .field("size", &self.allocation.size)
            .finish()
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        // `Drop` cannot propagate a `Result`; an allocator rejecting its own
        // previously-issued allocation is a bug in the allocator, not
        // something a caller here could act on, so it's logged instead.
        if let Err(e) = self.allocator.put(self.allocation) {
            log::error!("failed to release buffer: {e}");
        }
    }
}
