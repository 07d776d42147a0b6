//! Best-fit host (CPU) allocator with same-arena coalescing.
//!
//! Grounded on `cpu_allocator.cpp`: a flat list of headers, each describing
//! a region of some arena as free or in-use. `get` scans for the
//! smallest free region that still fits the request (best fit, not first
//! fit), splitting off the remainder as a new free header when the match is
//! larger than needed. When nothing fits, a new arena is allocated and
//! pushed onto the arena list. `put` marks a region free and coalesces it
//! with free neighbors that share its `block_id` — regions from different
//! arenas are never merged, since they are not contiguous in memory.

use super::allocator::{Allocation, Allocator};
use crate::error::{Error, Result};
use parking_lot::Mutex;

/// Default arena size when growing the pool, matching `kDefaultCpuBlockSize`.
pub const DEFAULT_BLOCK_SIZE: usize = 1_048_576;

#[derive(Debug, Clone, Copy)]
struct Header {
    offset: usize,
    size: usize,
    free: bool,
    block_id: usize,
}

struct Inner {
    arenas: Vec<Vec<u8>>,
    headers: Vec<Header>,
}

pub struct HostAllocator {
    block_size: usize,
    inner: Mutex<Inner>,
}

impl HostAllocator {
    pub fn new(block_size: usize) -> Self {
        HostAllocator {
            block_size,
            inner: Mutex::new(Inner {
                arenas: Vec::new(),
                headers: Vec::new(),
            }),
        }
    }

    fn grow(inner: &mut Inner, min_size: usize, block_size: usize) {
        let arena_size = min_size.max(block_size);
        let block_id = inner.arenas.len();
        inner.arenas.push(vec![0u8; arena_size]);
        inner.headers.push(Header {
            offset: 0,
            size: arena_size,
            free: true,
            block_id,
        });
    }
}

impl Default for HostAllocator {
    fn default() -> Self {
        HostAllocator::new(DEFAULT_BLOCK_SIZE)
    }
}

impl Allocator for HostAllocator {
    fn kind(&self) -> &'static str {
        "cpu"
    }

    fn get(&self, size: usize) -> Result<Allocation> {
        if size == 0 {
            return Err(Error::invalid_argument("cannot allocate zero bytes"));
        }

        let mut inner = self.inner.lock();

        let mut best: Option<usize> = None;
        for (idx, header) in inner.headers.iter().enumerate() {
            if !header.free || header.size < size {
                continue;
            }
            match best {
                Some(b) if inner.headers[b].size <= header.size => {}
                _ => best = Some(idx),
            }
        }

        let chosen = match best {
            Some(idx) => idx,
            None => {
                Self::grow(&mut inner, size, self.block_size);
                inner.headers.len() - 1
            }
        };

        let header = inner.headers[chosen];
        inner.headers[chosen].free = false;

        if header.size > size {
            inner.headers[chosen].size = size;
            inner.headers.push(Header {
                offset: header.offset + size,
                size: header.size - size,
                free: true,
                block_id: header.block_id,
            });
        }

        Ok(Allocation {
            block_id: header.block_id,
            offset: header.offset,
            size,
        })
    }

    fn put(&self, allocation: Allocation) -> Result<()> {
        let mut inner = self.inner.lock();

        if let Some(idx) = inner.headers.iter().position(|h| {
            h.block_id == allocation.block_id && h.offset == allocation.offset && !h.free
        }) {
            inner.headers[idx].free = true;
        } else {
            return Err(Error::runtime("Address not found"));
        }

        loop {
            let merged = Self::try_coalesce_once(&mut inner.headers);
            if !merged {
                break;
            }
        }
        Ok(())
    }

    unsafe fn arena_ptr(&self, block_id: usize) -> *mut u8 {
        let mut inner = self.inner.lock();
        inner.arenas[block_id].as_mut_ptr()
    }
}

impl HostAllocator {
    /// Merge the first adjacent pair of free headers sharing a `block_id`,
    /// returning whether a merge happened. Called repeatedly until a full
    /// pass finds nothing left to merge.
    fn try_coalesce_once(headers: &mut Vec<Header>) -> bool {
        for i in 0..headers.len() {
            if !headers[i].free {
                continue;
            }
            for j in 0..headers.len() {
                if i == j || !headers[j].free {
                    continue;
                }
                if headers[i].block_id == headers[j].block_id
                    && headers[i].offset + headers[i].size == headers[j].offset
                {
                    headers[i].size += headers[j].size;
                    headers.remove(j);
                    return true;
                }
            }
        }
        false
    }
}
