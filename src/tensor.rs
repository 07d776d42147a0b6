//! Tensor payloads attached to requests and responses.
//!
//! A tensor's bytes either live in a pooled [`crate::memory::Buffer`]
//! (`TensorData::Pooled`) or are owned directly (`TensorData::Owned`),
//! mirroring the original's split between `sharedData_` (a pool-backed
//! pointer) and `data_` (an owned `std::vector<uint8_t>`), per
//! `InferenceRequestInput`/`InferenceRequestOutput`.

use crate::memory::Buffer;
use crate::parameters::ParameterMap;
use crate::types::DataType;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum TensorData {
    /// A byte range within a pooled allocation, kept alive for the tensor's
    /// lifetime via the shared buffer handle. The range lets several
    /// requests' tensors share one batch-wide buffer instead of each
    /// requiring its own allocation (see `batching::soft`).
    Pooled {
        buffer: Arc<Buffer>,
        offset: usize,
        len: usize,
    },
    /// Bytes owned directly by this tensor (e.g. materialized from JSON).
    Owned(Vec<u8>),
}

impl TensorData {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            TensorData::Pooled { buffer, offset, len } => buffer.slice(*offset, *len),
            TensorData::Owned(bytes) => bytes.as_slice(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TensorData::Pooled { len, .. } => *len,
            TensorData::Owned(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
pub struct InferenceTensor {
    pub name: String,
    pub shape: Vec<i64>,
    pub datatype: DataType,
    pub parameters: ParameterMap,
    pub data: TensorData,
}

impl InferenceTensor {
    pub fn new(name: impl Into<String>, shape: Vec<i64>, datatype: DataType, data: TensorData) -> Self {
        InferenceTensor {
            name: name.into(),
            shape,
            datatype,
            parameters: ParameterMap::new(),
            data,
        }
    }

    /// Number of elements implied by `shape` (product of all dimensions).
    pub fn element_count(&self) -> i64 {
        self.shape.iter().product()
    }

    /// Expected byte length for a fixed-size datatype, `shape.product() *
    /// datatype.size()`. Variable-length `String` tensors have no fixed
    /// expected size and always return `None`.
    pub fn expected_byte_len(&self) -> Option<usize> {
        if !self.datatype.is_fixed_size() {
            return None;
        }
        let count = self.element_count();
        if count < 0 {
            return None;
        }
        Some(count as usize * self.datatype.size())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owned_tensor_reports_expected_byte_len() {
        let tensor = InferenceTensor::new(
            "input",
            vec![2, 3],
            DataType::F32,
            TensorData::Owned(vec![0u8; 24]),
        );
        assert_eq!(tensor.element_count(), 6);
        assert_eq!(tensor.expected_byte_len(), Some(24));
        assert_eq!(tensor.data.len(), 24);
    }

    #[test]
    fn string_tensor_has_no_fixed_expected_len() {
        let tensor = InferenceTensor::new(
            "text",
            vec![1],
            DataType::String,
            TensorData::Owned(b"hello".to_vec()),
        );
        assert_eq!(tensor.expected_byte_len(), None);
    }
}
