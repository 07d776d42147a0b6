//! A trivial worker that echoes its inputs back as outputs, unmodified.
//! Used by tests and as the reference worker-kind loaded when no dynamic
//! library is configured.

use super::Worker;
use crate::error::Result;
use crate::parameters::ParameterMap;
use crate::request::{InferenceResponse, ModelMetadata, ModelMetadataTensor};
use crate::batching::Batch;

#[derive(Default)]
pub struct EchoWorker {
    ready: bool,
}

impl EchoWorker {
    pub fn new() -> Self {
        EchoWorker::default()
    }
}

impl Worker for EchoWorker {
    fn do_init(&mut self, _parameters: &ParameterMap) -> Result<()> {
        Ok(())
    }

    fn do_acquire(&mut self, _parameters: &ParameterMap) -> Result<ModelMetadata> {
        self.ready = true;
        let mut metadata = ModelMetadata::new("echo", "native");
        metadata.ready = true;
        metadata.add_input_tensor(ModelMetadataTensor::new("input", crate::types::DataType::F32, vec![-1]));
        metadata.add_output_tensor(ModelMetadataTensor::new("output", crate::types::DataType::F32, vec![-1]));
        Ok(metadata)
    }

    fn do_run(&mut self, batch: &Batch) -> Result<Vec<InferenceResponse>> {
        let mut responses = Vec::with_capacity(batch.len());
        for request in &batch.requests {
            let mut response = InferenceResponse::new(request.id.clone(), request.model.clone());
            for tensor in &request.inputs {
                response.add_output(tensor.clone());
            }
            responses.push(response);
        }
        Ok(responses)
    }

    fn do_release(&mut self) -> Result<()> {
        self.ready = false;
        Ok(())
    }

    fn do_destroy(&mut self) -> Result<()> {
        Ok(())
    }
}
