//! Pooled memory management for tensor payloads.
//!
//! A [`MemoryPool`] holds one [`Allocator`] per memory kind (currently only
//! `"cpu"`) and tries each registered kind in order when a caller asks for a
//! buffer without naming one, matching `MemoryPool::get`'s try-in-order
//! behavior in the original server.

mod allocator;
mod buffer;
mod host;

pub use allocator::{Allocation, Allocator};
pub use buffer::Buffer;
pub use host::{HostAllocator, DEFAULT_BLOCK_SIZE};

use crate::error::{Error, Result};
use std::sync::Arc;

pub struct MemoryPool {
    allocators: Vec<Arc<dyn Allocator>>,
}

impl MemoryPool {
    pub fn new() -> Self {
        MemoryPool {
            allocators: vec![Arc::new(HostAllocator::default())],
        }
    }

    pub fn with_allocators(allocators: Vec<Arc<dyn Allocator>>) -> Self {
        MemoryPool { allocators }
    }

    /// Allocate from the named kind, or try every registered allocator in
    /// registration order if `kind` is `None`.
    pub fn get(&self, kind: Option<&str>, size: usize) -> Result<Buffer> {
        match kind {
            Some(kind) => {
                let allocator = self
                    .allocators
                    .iter()
                    .find(|a| a.kind() == kind)
                    .ok_or_else(|| Error::invalid_argument(format!("unknown memory kind: {kind}")))?;
                let allocation = allocator.get(size)?;
                Ok(Buffer::new(allocator.clone(), allocation))
            }
            None => {
                let mut last_err = None;
                for allocator in &self.allocators {
                    match allocator.get(size) {
                        Ok(allocation) => return Ok(Buffer::new(allocator.clone(), allocation)),
                        Err(e) => last_err = Some(e),
                    }
                }
                Err(last_err.unwrap_or_else(|| Error::runtime("no allocators registered")))
            }
        }
    }
}

impl Default for MemoryPool {
    fn default() -> Self {
        MemoryPool::new()
    }
}
