//! Request/response envelopes and model metadata.
//!
//! Grounded on `predict_api.cpp`'s `InferenceRequest`/`InferenceResponse`/
//! `ModelMetadata`. The completion callback is `Option`-wrapped so it can be
//! taken and invoked exactly once, matching `InferenceRequest::runCallbackOnce`
//! (calling it twice there is a logic error; here it silently becomes a
//! no-op past the first call, since a request can be handed to exactly one
//! batch).

use crate::error::Result as InferResult;
use crate::observation::Trace;
use crate::parameters::ParameterMap;
use crate::tensor::InferenceTensor;
use crate::types::DataType;

/// A name for an output tensor the caller wants back, with its own
/// per-output parameters (mirrors `InferenceRequestOutput`, which carries no
/// data of its own on the request side — only a name and parameters).
#[derive(Debug, Clone, Default)]
pub struct RequestedOutput {
    pub name: String,
    pub parameters: ParameterMap,
}

pub type CompletionCallback = Box<dyn FnOnce(InferResult<InferenceResponse>) + Send>;

pub struct InferenceRequest {
    pub id: String,
    pub model: String,
    pub inputs: Vec<InferenceTensor>,
    pub requested_outputs: Vec<RequestedOutput>,
    pub parameters: ParameterMap,
    callback: Option<CompletionCallback>,
}

impl InferenceRequest {
    pub fn new(id: impl Into<String>, model: impl Into<String>) -> Self {
        InferenceRequest {
            id: id.into(),
            model: model.into(),
            inputs: Vec::new(),
            requested_outputs: Vec::new(),
            parameters: ParameterMap::new(),
            callback: None,
        }
    }

    pub fn with_callback(mut self, callback: CompletionCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn add_input_tensor(&mut self, tensor: InferenceTensor) {
        self.inputs.push(tensor);
    }

    pub fn add_requested_output(&mut self, name: impl Into<String>) {
        self.requested_outputs.push(RequestedOutput {
            name: name.into(),
            parameters: ParameterMap::new(),
        });
    }

    /// Invoke the completion callback with the final result, if one was
    /// attached and hasn't fired yet. Subsequent calls are no-ops.
    pub fn run_callback_once(&mut self, result: InferResult<InferenceResponse>) {
        if let Some(callback) = self.callback.take() {
            callback(result);
        }
    }

    pub fn has_callback(&self) -> bool {
        self.callback.is_some()
    }
}

impl std::fmt::Debug for InferenceRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceRequest")
            .field("id", &self.id)
            .field("model", &self.model)
            .field("inputs", &self.inputs)
            .field("requested_outputs", &self.requested_outputs)
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct InferenceResponse {
    pub id: String,
    pub model: String,
    pub outputs: Vec<InferenceTensor>,
    pub parameters: ParameterMap,
    /// Trace context propagated from the request's batch, if any, set by the
    /// worker dispatch loop right before the completion callback fires.
    pub trace: Option<Trace>,
}

impl InferenceResponse {
    pub fn new(id: impl Into<String>, model: impl Into<String>) -> Self {
        InferenceResponse {
            id: id.into(),
            model: model.into(),
            outputs: Vec::new(),
            parameters: ParameterMap::new(),
            trace: None,
        }
    }

    pub fn add_output(&mut self, tensor: InferenceTensor) {
        self.outputs.push(tensor);
    }
}

#[derive(Debug, Clone)]
pub struct ModelMetadataTensor {
    pub name: String,
    pub datatype: DataType,
    pub shape: Vec<i64>,
}

impl ModelMetadataTensor {
    pub fn new(name: impl Into<String>, datatype: DataType, shape: Vec<i64>) -> Self {
        ModelMetadataTensor {
            name: name.into(),
            datatype,
            shape,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelMetadata {
    pub name: String,
    pub platform: String,
    pub versions: Vec<String>,
    pub inputs: Vec<ModelMetadataTensor>,
    pub outputs: Vec<ModelMetadataTensor>,
    pub ready: bool,
}

impl ModelMetadata {
    pub fn new(name: impl Into<String>, platform: impl Into<String>) -> Self {
        ModelMetadata {
            name: name.into(),
            platform: platform.into(),
            versions: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            ready: false,
        }
    }

    pub fn add_input_tensor(&mut self, tensor: ModelMetadataTensor) {
        self.inputs.push(tensor);
    }

    pub fn add_output_tensor(&mut self, tensor: ModelMetadataTensor) {
        self.outputs.push(tensor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::TensorData;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn callback_fires_exactly_once() {
        let fired = Arc::new(AtomicBool::new(false));
        let fired_clone = fired.clone();
        let mut request = InferenceRequest::new("req-1", "echo").with_callback(Box::new(move |_| {
            fired_clone.store(true, Ordering::SeqCst);
        }));

        let response = InferenceResponse::new("req-1", "echo");
        request.run_callback_once(Ok(response));
        assert!(fired.load(Ordering::SeqCst));

        // Second call must be a silent no-op, not a panic or double fire.
        request.run_callback_once(Ok(InferenceResponse::new("req-1", "echo")));
    }

    #[test]
    fn metadata_accumulates_tensors() {
        let mut meta = ModelMetadata::new("echo", "native");
        meta.add_input_tensor(ModelMetadataTensor::new("in", DataType::F32, vec![1, 3]));
        meta.add_output_tensor(ModelMetadataTensor::new("out", DataType::F32, vec![1, 3]));
        assert_eq!(meta.inputs.len(), 1);
        assert_eq!(meta.outputs.len(), 1);
    }

    #[test]
    fn request_carries_owned_tensor_input() {
        let mut request = InferenceRequest::new("req-2", "echo");
        request.add_input_tensor(InferenceTensor::new(
            "in",
            vec![1],
            DataType::I32,
            TensorData::Owned(vec![1, 0, 0, 0]),
        ));
        request.add_requested_output("out");
        assert_eq!(request.inputs.len(), 1);
        assert_eq!(request.requested_outputs.len(), 1);
    }
}
