//! Lightweight observability primitives: atomic pipeline counters and a
//! per-request trace context.
//!
//! Grounded on `worker_pool.rs`'s `PoolStats` and `grpc/service.rs`'s
//! `ServerStats` — both plain structs of `Arc<AtomicU64>` fields bumped with
//! `SeqCst` ordering rather than a metrics-crate dependency, which matches
//! this crate's ambient-only observability scope (no external metrics
//! exporter, per spec non-goals).

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Running counters for one pipeline stage (adapter → batcher → worker).
#[derive(Debug, Default)]
pub struct PipelineCounters {
    pub requests_received: AtomicU64,
    pub requests_batched: AtomicU64,
    pub requests_completed: AtomicU64,
    pub requests_failed: AtomicU64,
    pub batches_closed_full: AtomicU64,
    pub batches_closed_timeout: AtomicU64,
}

impl PipelineCounters {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_received(&self) {
        self.requests_received.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_batched(&self, count: u64) {
        self.requests_batched.fetch_add(count, Ordering::SeqCst);
    }

    pub fn record_completed(&self) {
        self.requests_completed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_failed(&self) {
        self.requests_failed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_batch_closed(&self, reason: BatchCloseReason) {
        match reason {
            BatchCloseReason::Full => self.batches_closed_full.fetch_add(1, Ordering::SeqCst),
            BatchCloseReason::Timeout => self.batches_closed_timeout.fetch_add(1, Ordering::SeqCst),
        };
    }

    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            requests_received: self.requests_received.load(Ordering::SeqCst),
            requests_batched: self.requests_batched.load(Ordering::SeqCst),
            requests_completed: self.requests_completed.load(Ordering::SeqCst),
            requests_failed: self.requests_failed.load(Ordering::SeqCst),
            batches_closed_full: self.batches_closed_full.load(Ordering::SeqCst),
            batches_closed_timeout: self.batches_closed_timeout.load(Ordering::SeqCst),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum BatchCloseReason {
    Full,
    Timeout,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CountersSnapshot {
    pub requests_received: u64,
    pub requests_batched: u64,
    pub requests_completed: u64,
    pub requests_failed: u64,
    pub batches_closed_full: u64,
    pub batches_closed_timeout: u64,
}

/// Free-form key/value context carried alongside a request for correlating
/// log lines across adapter, batcher, and worker boundaries.
#[derive(Debug, Clone, Default)]
pub struct Trace {
    fields: BTreeMap<String, String>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.fields.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_and_snapshot() {
        let counters = PipelineCounters::new();
        counters.record_received();
        counters.record_received();
        counters.record_batched(2);
        counters.record_batch_closed(BatchCloseReason::Full);

        let snap = counters.snapshot();
        assert_eq!(snap.requests_received, 2);
        assert_eq!(snap.requests_batched, 2);
        assert_eq!(snap.batches_closed_full, 1);
        assert_eq!(snap.batches_closed_timeout, 0);
    }

    #[test]
    fn trace_fields_round_trip() {
        let trace = Trace::new().with_field("request_id", "abc-123");
        assert_eq!(trace.get("request_id"), Some("abc-123"));
        assert_eq!(trace.get("missing"), None);
    }
}
