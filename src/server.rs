//! Ties the endpoint registry, memory pool, and configuration together into
//! the single value an embedder (or `main.rs`) holds.
//!
//! Wiring style follows `grpc/service.rs`'s `InferenceService` constructor
//! pattern: fields built up behind `Arc`s so the value can be cloned cheaply
//! across tasks.

use crate::adapters::NativeAdapter;
use crate::config::ServerConfig;
use crate::endpoint::Manager;
use crate::error::{Error, Result};
use crate::observation::PipelineCounters;
use crate::repository::Repository;
use crate::request::{InferenceRequest, InferenceResponse};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::oneshot;

pub struct Server {
    config: ServerConfig,
    manager: Arc<Manager>,
    counters: Arc<PipelineCounters>,
}

impl Server {
    pub fn new(config: ServerConfig, runtime: Handle) -> Self {
        let manager = Manager::new(runtime, config.worker_library_dir.clone());
        Server {
            config,
            manager,
            counters: PipelineCounters::new(),
        }
    }

    pub fn manager(&self) -> &Arc<Manager> {
        &self.manager
    }

    pub fn counters(&self) -> &Arc<PipelineCounters> {
        &self.counters
    }

    /// Discover every model under the configured repository root and load
    /// an endpoint for each, returning the endpoint names actually created
    /// (deduped pairs reuse an existing one and are not repeated here).
    pub fn load_repository(&self) -> Result<Vec<String>> {
        let repository = Repository::new(self.config.model_repository.clone());
        let mut endpoints = Vec::new();
        for model in repository.discover()? {
            let batcher = crate::batching::BatcherConfig::new(
                if model.batch_size > 0 {
                    model.batch_size
                } else {
                    self.config.default_batch_size
                },
                if model.timeout_ms > 0 {
                    model.timeout_ms
                } else {
                    self.config.default_batch_timeout_ms
                },
            );
            let endpoint = self
                .manager
                .load_endpoint(&model.worker_kind, model.parameters, batcher, true);
            endpoints.push(endpoint);
        }
        Ok(endpoints)
    }

    /// Load an endpoint for `kind` with default parameters. `share=false`
    /// adds another worker to an existing `(kind, parameters)` group instead
    /// of reusing it as a single-worker no-op.
    pub fn load_endpoint(&self, kind: &str, share: bool) -> String {
        self.manager.load_endpoint(
            kind,
            crate::parameters::ParameterMap::new(),
            self.config.default_batcher(),
            share,
        )
    }

    /// Submit a request to `endpoint` and await its response. This is the
    /// in-process path every `RequestAdapter` ultimately feeds into; REST/
    /// gRPC adapters would call the equivalent of this from their own
    /// handler after decoding the wire request.
    pub async fn infer(&self, endpoint: &str, request: InferenceRequest) -> Result<InferenceResponse> {
        self.counters.record_received();

        let (tx, rx) = oneshot::channel();
        let original_id = request.id.clone();
        let tx = std::sync::Mutex::new(Some(tx));
        let request = request.with_callback(Box::new(move |result| {
            if let Some(tx) = tx.lock().unwrap().take() {
                let _ = tx.send(result);
            }
        }));

        let adapter: Arc<dyn crate::adapter::RequestAdapter> = Arc::new(NativeAdapter::new(request));
        if !self.manager.submit(endpoint, adapter).await {
            self.counters.record_failed();
            return Err(Error::invalid_argument(format!("unknown endpoint: {endpoint}")));
        }

        match rx.await {
            Ok(Ok(response)) => {
                self.counters.record_completed();
                Ok(response)
            }
            Ok(Err(e)) => {
                self.counters.record_failed();
                Err(e)
            }
            Err(_) => {
                self.counters.record_failed();
                Err(Error::runtime(format!("request {original_id} was dropped before completion")))
            }
        }
    }

    pub fn unload_endpoint(&self, endpoint: &str) {
        self.manager.unload_endpoint(endpoint);
    }
}
