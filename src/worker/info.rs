//! `WorkerInfo`-equivalent: the running instances of one worker kind plus
//! the shared batch to dispatch to them.
//!
//! Grounded on `worker_info.cpp`: `addAndStartWorker` spawns another worker
//! thread sharing the group's input queue; `unload` asks every worker to
//! stop and then polls until all of them have actually gone inactive before
//! returning, since a worker mid-`doRun` cannot be torn down safely.
//! `unload_one` is the `share=false` counterpart — it tears down a single
//! worker from the group and leaves the rest running.

use super::loader::WorkerLoader;
use super::{WorkerHandle, WorkerStatus};
use crate::batching::Batch;
use crate::error::{Error, Result};
use crate::parameters::ParameterMap;
use crate::request::ModelMetadata;
use parking_lot::Mutex as SyncMutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;

pub struct WorkerInfo {
    kind: String,
    parameters: ParameterMap,
    batch_rx: Arc<Mutex<mpsc::Receiver<Batch>>>,
    metadata: Arc<SyncMutex<Option<ModelMetadata>>>,
    active_count: Arc<AtomicUsize>,
    handles: Vec<JoinHandle<()>>,
    /// One cancellation signal per running worker, in lockstep with
    /// `handles`, so [`WorkerInfo::unload_one`] can stop exactly one worker
    /// in a multi-worker group instead of the whole group.
    stop_senders: Vec<oneshot::Sender<()>>,
}

impl WorkerInfo {
    pub fn new(kind: impl Into<String>, parameters: ParameterMap, batch_rx: mpsc::Receiver<Batch>) -> Self {
        WorkerInfo {
            kind: kind.into(),
            parameters,
            batch_rx: Arc::new(Mutex::new(batch_rx)),
            metadata: Arc::new(SyncMutex::new(None)),
            active_count: Arc::new(AtomicUsize::new(0)),
            handles: Vec::new(),
            stop_senders: Vec::new(),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn worker_count(&self) -> usize {
        self.handles.len()
    }

    /// Load another instance of this group's worker kind and start its run
    /// loop against the group's shared batch receiver.
    pub fn add_and_start_worker(&mut self, loader: &mut WorkerLoader) -> Result<()> {
        let worker = loader.load(&self.kind)?;
        let mut handle = WorkerHandle::new(worker);
        handle.init(&self.parameters)?;
        handle.acquire(&self.parameters)?;

        if let Some(metadata) = handle.metadata().cloned() {
            *self.metadata.lock() = Some(metadata);
        }

        self.active_count.fetch_add(1, Ordering::SeqCst);
        let batch_rx = self.batch_rx.clone();
        let active_count = self.active_count.clone();
        let (stop_tx, mut stop_rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            loop {
                let batch = {
                    let mut guard = batch_rx.lock().await;
                    tokio::select! {
                        biased;
                        _ = &mut stop_rx => None,
                        b = guard.recv() => b,
                    }
                };
                let Some(batch) = batch else { break };

                // `run` advances Acquire/Run -> Run the first time and stays
                // in Run on every subsequent batch (`WorkerStatus` allows
                // Run -> Run directly); only the final shutdown below moves
                // it to Inactive, since Inactive has no way back to Run.
                match handle.run(&batch) {
                    Ok(responses) => {
                        let mut requests = batch.requests;
                        let traces = batch.traces;
                        for ((request, mut response), trace) in requests.iter_mut().zip(responses).zip(traces) {
                            response.trace = trace;
                            request.run_callback_once(Ok(response));
                        }
                    }
                    Err(e) => {
                        log::error!("worker run failed: {e}");
                        let mut requests = batch.requests;
                        for request in requests.iter_mut() {
                            request.run_callback_once(Err(crate::error::Error::runtime(e.to_string())));
                        }
                    }
                }
            }
            let _ = handle.deactivate();
            let _ = handle.release();
            let _ = handle.destroy();
            active_count.fetch_sub(1, Ordering::SeqCst);
        });

        self.handles.push(task);
        self.stop_senders.push(stop_tx);
        Ok(())
    }

    pub fn metadata(&self) -> Option<ModelMetadata> {
        self.metadata.lock().clone()
    }

    /// Signal every worker in the group to stop, then poll until all of them
    /// have actually wound down. Mirrors `unload`'s busy-poll over
    /// `WorkerStatus::Inactive`.
    pub async fn unload(mut self) {
        for stop in self.stop_senders.drain(..) {
            let _ = stop.send(());
        }
        for handle in self.handles.drain(..) {
            let _ = handle.await;
        }
        while self.active_count.load(Ordering::SeqCst) > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Stop exactly one worker in the group — the `share=false` unload path,
    /// where the endpoint must remain resolvable to whichever workers are
    /// left. Which worker is picked is unspecified, same as the original's
    /// "identify an Inactive thread after enqueuing a sentinel" approach.
    pub async fn unload_one(&mut self) -> Result<()> {
        let stop = self
            .stop_senders
            .pop()
            .ok_or_else(|| Error::runtime("no worker left to unload in this group"))?;
        let handle = self.handles.pop().expect("stop_senders and handles stay in lockstep");
        let _ = stop.send(());
        let _ = handle.await;
        Ok(())
    }

    /// Whether every worker in the group has been unloaded.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn status_summary(&self) -> WorkerStatus {
        if self.active_count.load(Ordering::SeqCst) > 0 {
            WorkerStatus::Run
        } else {
            WorkerStatus::Dead
        }
    }
}
