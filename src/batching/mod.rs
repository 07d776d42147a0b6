//! Batch container and shared batching configuration.

pub mod soft;

use crate::memory::Buffer;
use crate::observation::Trace;
use crate::request::InferenceRequest;
use std::sync::Arc;
use std::time::Duration;

/// Tuning knobs for a batcher: the maximum number of requests to coalesce
/// and how long to wait after the first request before closing the batch
/// early, per the original's `batchSize`/`batchTimeout` worker parameters.
#[derive(Debug, Clone, Copy)]
pub struct BatcherConfig {
    pub batch_size: usize,
    pub timeout: Duration,
}

impl BatcherConfig {
    pub fn new(batch_size: usize, timeout_ms: u64) -> Self {
        BatcherConfig {
            batch_size: batch_size.max(1),
            timeout: Duration::from_millis(timeout_ms),
        }
    }
}

impl Default for BatcherConfig {
    fn default() -> Self {
        BatcherConfig::new(4, 50)
    }
}

/// Why a batch stopped accepting more requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Full,
    Timeout,
    Shutdown,
}

/// A closed group of materialized requests ready to hand to a worker.
///
/// `input_buffers` holds one buffer per input-tensor slot, shared across
/// every request in the batch: the batcher sizes each slot at
/// `batch_size * per_request_bytes` up front and every request's tensors are
/// written into a disjoint byte range of the same buffer, the way the
/// original's `Batch::inputBuffers_` packs several requests' inputs behind a
/// single pointer per input before a worker ever sees them.
#[derive(Debug)]
pub struct Batch {
    pub requests: Vec<InferenceRequest>,
    pub input_buffers: Vec<Arc<Buffer>>,
    pub traces: Vec<Option<Trace>>,
    pub close_reason: CloseReason,
}

impl Batch {
    pub fn new() -> Self {
        Batch {
            requests: Vec::new(),
            input_buffers: Vec::new(),
            traces: Vec::new(),
            close_reason: CloseReason::Timeout,
        }
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

impl Default for Batch {
    fn default() -> Self {
        Batch::new()
    }
}
