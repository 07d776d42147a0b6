//! In-process request adapter: wraps an already-built [`InferenceRequest`]
//! so tests and embedders can submit requests without going through any
//! wire protocol at all.

use crate::adapter::RequestAdapter;
use crate::error::Error;
use crate::memory::Buffer;
use crate::observation::Trace;
use crate::request::InferenceRequest;
use crate::tensor::TensorData;
use parking_lot::Mutex;
use std::sync::Arc;

pub struct NativeAdapter {
    request: Mutex<Option<InferenceRequest>>,
    trace: Option<Trace>,
}

impl NativeAdapter {
    pub fn new(request: InferenceRequest) -> Self {
        NativeAdapter {
            request: Mutex::new(Some(request)),
            trace: None,
        }
    }

    pub fn with_trace(mut self, trace: Trace) -> Self {
        self.trace = Some(trace);
        self
    }
}

impl RequestAdapter for NativeAdapter {
    fn input_sizes(&self) -> Vec<usize> {
        self.request
            .lock()
            .as_ref()
            .map(|r| r.inputs.iter().map(|t| t.data.len()).collect())
            .unwrap_or_default()
    }

    fn materialize(
        &self,
        input_buffers: &[Arc<Buffer>],
        input_offsets: &mut [usize],
        _output_buffers: &[Arc<Buffer>],
        _output_offsets: &mut [usize],
    ) -> Option<InferenceRequest> {
        let mut guard = self.request.lock();
        let mut new_inputs = Vec::new();
        {
            let request = guard.as_ref()?;
            if request.inputs.len() > input_buffers.len() {
                return None;
            }
            for (i, tensor) in request.inputs.iter().enumerate() {
                let bytes = tensor.data.as_bytes();
                if input_offsets[i] + bytes.len() > input_buffers[i].len() {
                    return None;
                }
            }
            for (i, tensor) in request.inputs.iter().enumerate() {
                let bytes = tensor.data.as_bytes();
                let offset = input_offsets[i];
                input_buffers[i].write_at(offset, bytes);
                let mut materialized = tensor.clone();
                materialized.data = TensorData::Pooled {
                    buffer: input_buffers[i].clone(),
                    offset,
                    len: bytes.len(),
                };
                new_inputs.push(materialized);
                input_offsets[i] += bytes.len();
            }
        }

        let mut request = guard.take()?;
        request.inputs = new_inputs;
        Some(request)
    }

    fn error_handler(&self, error: Error) {
        log::error!("native adapter request failed before batching: {error}");
    }

    fn trace(&self) -> Option<&Trace> {
        self.trace.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryPool;
    use crate::request::InferenceRequest;
    use crate::tensor::InferenceTensor;
    use crate::types::DataType;

    #[test]
    fn materializes_exactly_once() {
        let mut request = InferenceRequest::new("req-1", "echo");
        request.add_input_tensor(InferenceTensor::new(
            "input",
            vec![1],
            DataType::I32,
            TensorData::Owned(4i32.to_le_bytes().to_vec()),
        ));
        let adapter = NativeAdapter::new(request);
        let pool = MemoryPool::new();
        let input_buffers = vec![Arc::new(pool.get(Some("cpu"), 4).unwrap())];
        let mut input_offsets = vec![0usize];

        assert!(adapter
            .materialize(&input_buffers, &mut input_offsets, &[], &mut [])
            .is_some());
        assert!(adapter
            .materialize(&input_buffers, &mut input_offsets, &[], &mut [])
            .is_none());
    }

    #[test]
    fn two_requests_share_one_input_buffer() {
        let pool = MemoryPool::new();
        let input_buffers = vec![Arc::new(pool.get(Some("cpu"), 8).unwrap())];
        let mut input_offsets = vec![0usize];

        let mut first = InferenceRequest::new("a", "echo");
        first.add_input_tensor(InferenceTensor::new(
            "input",
            vec![1],
            DataType::I32,
            TensorData::Owned(1i32.to_le_bytes().to_vec()),
        ));
        let adapter_a = NativeAdapter::new(first);
        let materialized_a = adapter_a
            .materialize(&input_buffers, &mut input_offsets, &[], &mut [])
            .unwrap();
        assert_eq!(materialized_a.inputs[0].data.as_bytes(), 1i32.to_le_bytes());

        let mut second = InferenceRequest::new("b", "echo");
        second.add_input_tensor(InferenceTensor::new(
            "input",
            vec![1],
            DataType::I32,
            TensorData::Owned(2i32.to_le_bytes().to_vec()),
        ));
        let adapter_b = NativeAdapter::new(second);
        let materialized_b = adapter_b
            .materialize(&input_buffers, &mut input_offsets, &[], &mut [])
            .unwrap();
        assert_eq!(materialized_b.inputs[0].data.as_bytes(), 2i32.to_le_bytes());

        // Both requests' tensors point into the same underlying buffer,
        // packed one after another.
        assert_eq!(input_offsets[0], 8);
        assert_eq!(input_buffers[0].slice(0, 4), 1i32.to_le_bytes());
        assert_eq!(input_buffers[0].slice(4, 4), 2i32.to_le_bytes());
    }

    #[test]
    fn request_that_overruns_the_buffer_is_not_materialized() {
        let pool = MemoryPool::new();
        let input_buffers = vec![Arc::new(pool.get(Some("cpu"), 4).unwrap())];
        let mut input_offsets = vec![2usize];

        let mut request = InferenceRequest::new("too-big", "echo");
        request.add_input_tensor(InferenceTensor::new(
            "input",
            vec![1],
            DataType::I32,
            TensorData::Owned(4i32.to_le_bytes().to_vec()),
        ));
        let adapter = NativeAdapter::new(request);
        assert!(adapter
            .materialize(&input_buffers, &mut input_offsets, &[], &mut [])
            .is_none());
        assert_eq!(input_offsets[0], 2, "offset must be left untouched on failure");
    }
}
