//! Soft batcher: coalesce requests arriving over a channel into size- and
//! time-bounded batches.
//!
//! Grounded on `soft.cpp`'s `SoftBatcher::run`: block indefinitely for the
//! first request (a batcher with nothing queued should not spin), then loop
//! computing `remaining = timeout - elapsed` and waiting at most that long
//! for the next request. A request that fails to materialize does not count
//! against the batch — its adapter's error handler is invoked directly and
//! the loop continues waiting for the remaining budget. The batch closes
//! when it reaches `batch_size`, when the timeout elapses, or when the
//! channel is closed/a shutdown item arrives (the original's sentinel
//! value).
//!
//! Input buffers are allocated once per batch, sized off the first request:
//! `req->getInputSizes()` tells the batcher how many bytes each input slot
//! needs for one request, and `Batch::inputBuffers_` is sized
//! `batchSize * thatSize` so every request in the batch can write its
//! tensors into the same shared buffer at an advancing offset, instead of
//! each request owning its own allocation.
//!
//! Restructured in the idiom of `inference-grpc/src/batch_inference.rs`'s
//! `BatchCollector` (an mpsc channel drained with `tokio::time::timeout`
//! inside a loop) rather than the original's condition-variable queue.

use super::{Batch, BatcherConfig, CloseReason};
use crate::adapter::RequestAdapter;
use crate::error::{Error, Result};
use crate::memory::{Buffer, MemoryPool};
use crate::observation::{BatchCloseReason, PipelineCounters};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::time::timeout;

pub enum BatchItem {
    Submit(Arc<dyn RequestAdapter>),
    Shutdown,
}

pub struct SoftBatcher {
    config: BatcherConfig,
    pool: Arc<MemoryPool>,
    counters: Arc<PipelineCounters>,
    input: mpsc::Receiver<BatchItem>,
}

impl SoftBatcher {
    pub fn new(
        config: BatcherConfig,
        pool: Arc<MemoryPool>,
        counters: Arc<PipelineCounters>,
    ) -> (Self, mpsc::Sender<BatchItem>) {
        let (tx, rx) = mpsc::channel(config.batch_size * 4);
        (
            SoftBatcher {
                config,
                pool,
                counters,
                input: rx,
            },
            tx,
        )
    }

    /// Allocate one shared input buffer per tensor slot, each sized to hold
    /// `batch_size` requests' worth of bytes for that slot, per
    /// `per_request_sizes` (the first request's `input_sizes()`).
    fn allocate_input_buffers(&self, per_request_sizes: &[usize]) -> Result<Vec<Arc<Buffer>>> {
        per_request_sizes
            .iter()
            .map(|&size| {
                let batch_bytes = (size * self.config.batch_size).max(1);
                self.pool.get(Some("cpu"), batch_bytes).map(Arc::new)
            })
            .collect()
    }

    fn try_add(&self, batch: &mut Batch, input_offsets: &mut [usize], adapter: Arc<dyn RequestAdapter>) {
        match adapter.materialize(&batch.input_buffers, input_offsets, &[], &mut []) {
            Some(request) => {
                batch.requests.push(request);
                batch.traces.push(adapter.trace().cloned());
                self.counters.record_batched(1);
            }
            None => {
                let err = Error::runtime("request did not fit into the batch's input buffers");
                log::warn!("request failed to materialize into batch: {err}");
                adapter.error_handler(err);
                self.counters.record_failed();
            }
        }
    }

    /// Drive the batcher loop, sending each closed batch to `output` until
    /// the input channel is exhausted or a shutdown item is received.
    pub async fn run(mut self, output: mpsc::Sender<Batch>) {
        loop {
            let first = match self.input.recv().await {
                Some(BatchItem::Submit(adapter)) => adapter,
                Some(BatchItem::Shutdown) | None => return,
            };

            let mut batch = Batch::new();
            match self.allocate_input_buffers(&first.input_sizes()) {
                Ok(buffers) => batch.input_buffers = buffers,
                Err(e) => {
                    log::warn!("failed to allocate batch input buffers: {e}");
                    first.error_handler(e);
                    self.counters.record_failed();
                    continue;
                }
            }

            let mut input_offsets = vec![0usize; batch.input_buffers.len()];
            self.try_add(&mut batch, &mut input_offsets, first);
            let start = Instant::now();

            loop {
                if batch.len() >= self.config.batch_size {
                    batch.close_reason = CloseReason::Full;
                    break;
                }

                let elapsed = start.elapsed();
                if elapsed >= self.config.timeout {
                    batch.close_reason = CloseReason::Timeout;
                    break;
                }
                let remaining = self.config.timeout - elapsed;

                match timeout(remaining, self.input.recv()).await {
                    Ok(Some(BatchItem::Submit(adapter))) => {
                        self.try_add(&mut batch, &mut input_offsets, adapter)
                    }
                    Ok(Some(BatchItem::Shutdown)) | Ok(None) => {
                        batch.close_reason = CloseReason::Shutdown;
                        break;
                    }
                    Err(_elapsed) => {
                        batch.close_reason = CloseReason::Timeout;
                        break;
                    }
                }
            }

            self.counters.record_batch_closed(match batch.close_reason {
                CloseReason::Full => BatchCloseReason::Full,
                _ => BatchCloseReason::Timeout,
            });

            let shutting_down = batch.close_reason == CloseReason::Shutdown;

            if !batch.is_empty() && output.send(batch).await.is_err() {
                return;
            }

            if shutting_down || self.input.is_closed() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::NativeAdapter;
    use crate::request::InferenceRequest;
    use crate::tensor::{InferenceTensor, TensorData};
    use crate::types::DataType;

    fn config(batch_size: usize, timeout_ms: u64) -> BatcherConfig {
        BatcherConfig::new(batch_size, timeout_ms)
    }

    fn request_with_input(id: &str, value: i32) -> InferenceRequest {
        let mut request = InferenceRequest::new(id, "echo");
        request.add_input_tensor(InferenceTensor::new(
            "input",
            vec![1],
            DataType::I32,
            TensorData::Owned(value.to_le_bytes().to_vec()),
        ));
        request
    }

    #[tokio::test]
    async fn closes_batch_when_full_before_timeout() {
        let pool = Arc::new(MemoryPool::new());
        let counters = PipelineCounters::new();
        let (batcher, tx) = SoftBatcher::new(config(2, 5_000), pool, counters);
        let (out_tx, mut out_rx) = mpsc::channel(1);

        tokio::spawn(batcher.run(out_tx));

        tx.send(BatchItem::Submit(Arc::new(NativeAdapter::new(request_with_input("a", 1)))))
            .await
            .unwrap();
        tx.send(BatchItem::Submit(Arc::new(NativeAdapter::new(request_with_input("b", 2)))))
            .await
            .unwrap();

        let batch = out_rx.recv().await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.close_reason, CloseReason::Full);
    }

    #[tokio::test]
    async fn two_requests_in_one_batch_share_one_input_buffer() {
        let pool = Arc::new(MemoryPool::new());
        let counters = PipelineCounters::new();
        let (batcher, tx) = SoftBatcher::new(config(2, 5_000), pool, counters);
        let (out_tx, mut out_rx) = mpsc::channel(1);

        tokio::spawn(batcher.run(out_tx));

        tx.send(BatchItem::Submit(Arc::new(NativeAdapter::new(request_with_input("a", 10)))))
            .await
            .unwrap();
        tx.send(BatchItem::Submit(Arc::new(NativeAdapter::new(request_with_input("b", 20)))))
            .await
            .unwrap();

        let batch = out_rx.recv().await.unwrap();
        assert_eq!(batch.input_buffers.len(), 1);
        assert_eq!(batch.input_buffers[0].len(), 8, "sized for 2 requests x 4 bytes");

        let TensorData::Pooled { buffer: buf_a, offset: off_a, .. } = &batch.requests[0].inputs[0].data else {
            panic!("expected a pooled tensor");
        };
        let TensorData::Pooled { buffer: buf_b, offset: off_b, .. } = &batch.requests[1].inputs[0].data else {
            panic!("expected a pooled tensor");
        };
        assert!(Arc::ptr_eq(buf_a, buf_b), "both requests must write into the same batch buffer");
        assert_eq!((*off_a, *off_b), (0, 4));
    }

    #[tokio::test]
    async fn closes_batch_on_timeout_with_leftover_requests() {
        let pool = Arc::new(MemoryPool::new());
        let counters = PipelineCounters::new();
        let (batcher, tx) = SoftBatcher::new(config(4, 30), pool, counters);
        let (out_tx, mut out_rx) = mpsc::channel(1);

        tokio::spawn(batcher.run(out_tx));

        tx.send(BatchItem::Submit(Arc::new(NativeAdapter::new(request_with_input("a", 1)))))
            .await
            .unwrap();

        let batch = out_rx.recv().await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.close_reason, CloseReason::Timeout);
    }

    #[tokio::test]
    async fn shutdown_flushes_partial_batch() {
        let pool = Arc::new(MemoryPool::new());
        let counters = PipelineCounters::new();
        let (batcher, tx) = SoftBatcher::new(config(4, 5_000), pool, counters);
        let (out_tx, mut out_rx) = mpsc::channel(1);

        let handle = tokio::spawn(batcher.run(out_tx));

        tx.send(BatchItem::Submit(Arc::new(NativeAdapter::new(request_with_input("a", 1)))))
            .await
            .unwrap();
        tx.send(BatchItem::Shutdown).await.unwrap();

        let batch = out_rx.recv().await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.close_reason, CloseReason::Shutdown);

        handle.await.unwrap();
    }
}
