//! Protocol-agnostic request adapter contract.
//!
//! The batcher never speaks REST, gRPC, or any other wire format directly —
//! it only calls into a `RequestAdapter`, the same role `Interface`/
//! `InterfacePtr` plays in `soft.cpp` (`req->getInputSizes()`,
//! `req->getRequest(input_buffers, input_offset, output_buffers,
//! output_offset)`, `req->errorHandler(...)`). Wire protocols are external
//! collaborators per the spec's scope; this module is the seam they plug
//! into.

use crate::error::Error;
use crate::memory::Buffer;
use crate::observation::Trace;
use crate::request::InferenceRequest;
use std::sync::Arc;

pub trait RequestAdapter: Send + Sync {
    /// Byte size this adapter's request will contribute to each input
    /// tensor slot, in input-tensor order. Queried once per batch, against
    /// the batch's first request, so the batcher knows how large to make
    /// the batch's shared input buffers before any `materialize` call.
    fn input_sizes(&self) -> Vec<usize>;

    /// Write this adapter's request directly into the batch's shared
    /// buffers: for input slot `i`, bytes go into `input_buffers[i]`
    /// starting at `input_offsets[i]`, which is then advanced by the number
    /// of bytes written. Output buffers are plumbed through for symmetry
    /// with the wire contract, but are typically empty — per spec, the
    /// worker is the one that allocates output storage, not the batcher.
    ///
    /// Returns `None` if the request doesn't fit (batch full, wrong tensor
    /// count, already materialized, etc.); on `None` no offset may have been
    /// advanced, so the caller can safely retry the request later as-is.
    fn materialize(
        &self,
        input_buffers: &[Arc<Buffer>],
        input_offsets: &mut [usize],
        output_buffers: &[Arc<Buffer>],
        output_offsets: &mut [usize],
    ) -> Option<InferenceRequest>;

    /// Report a failure that happened before or during materialization,
    /// bypassing the normal response callback (which only exists once a
    /// request has successfully joined a batch).
    fn error_handler(&self, error: Error);

    /// Optional tracing context to propagate into the batch.
    fn trace(&self) -> Option<&Trace> {
        None
    }
}
