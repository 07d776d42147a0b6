//! Worker trait and lifecycle state machine.
//!
//! Grounded on `worker.hpp`: a `Worker` base wraps five pure-virtual steps
//! (`doInit`, `doAcquire`, `doRun`, `doRelease`, `doDestroy`) with public
//! methods that enforce the state machine around them, so a worker
//! implementation can never be run before it's acquired or released after
//! it's destroyed. We keep the same separation — `Worker` is the user-facing
//! trait with the five `do_*` hooks, and [`WorkerHandle`] is the wrapper that
//! drives `WorkerStatus` transitions.

pub mod echo;
pub mod info;
pub mod loader;

use crate::batching::Batch;
use crate::error::{Error, Result};
use crate::parameters::ParameterMap;
use crate::request::{InferenceResponse, ModelMetadata};

/// Mirrors the original's `WorkerStatus` enum: `New -> Init -> Acquire ->
/// Run -> Inactive -> Release -> Destroy -> Dead`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    New,
    Init,
    Acquire,
    Run,
    Inactive,
    Release,
    Destroy,
    Dead,
}

impl WorkerStatus {
    fn can_advance_to(self, next: WorkerStatus) -> bool {
        use WorkerStatus::*;
        matches!(
            (self, next),
            (New, Init)
                | (Init, Acquire)
                | (Acquire, Run)
                | (Run, Run)
                | (Run, Inactive)
                | (Inactive, Release)
                | (Release, Destroy)
                | (Destroy, Dead)
        )
    }
}

/// A model backend: one instance per worker-kind, constructed by
/// [`loader::load_worker`] and driven exclusively through [`WorkerHandle`].
pub trait Worker: Send {
    fn do_init(&mut self, parameters: &ParameterMap) -> Result<()>;
    fn do_acquire(&mut self, parameters: &ParameterMap) -> Result<ModelMetadata>;
    fn do_run(&mut self, batch: &Batch) -> Result<Vec<InferenceResponse>>;
    fn do_release(&mut self) -> Result<()>;
    fn do_destroy(&mut self) -> Result<()>;
}

/// Enforces `Worker`'s state machine around the raw `do_*` hooks.
pub struct WorkerHandle {
    worker: Box<dyn Worker>,
    status: WorkerStatus,
    metadata: Option<ModelMetadata>,
}

impl WorkerHandle {
    pub fn new(worker: Box<dyn Worker>) -> Self {
        WorkerHandle {
            worker,
            status: WorkerStatus::New,
            metadata: None,
        }
    }

    pub fn status(&self) -> WorkerStatus {
        self.status
    }

    fn transition(&mut self, next: WorkerStatus) -> Result<()> {
        if !self.status.can_advance_to(next) {
            return Err(Error::runtime(format!(
                "invalid worker transition {:?} -> {:?}",
                self.status, next
            )));
        }
        self.status = next;
        Ok(())
    }

    pub fn init(&mut self, parameters: &ParameterMap) -> Result<()> {
        self.transition(WorkerStatus::Init)?;
        self.worker.do_init(parameters)
    }

    pub fn acquire(&mut self, parameters: &ParameterMap) -> Result<()> {
        self.transition(WorkerStatus::Acquire)?;
        self.metadata = Some(self.worker.do_acquire(parameters)?);
        Ok(())
    }

    pub fn run(&mut self, batch: &Batch) -> Result<Vec<InferenceResponse>> {
        self.transition(WorkerStatus::Run)?;
        self.worker.do_run(batch)
    }

    pub fn deactivate(&mut self) -> Result<()> {
        self.transition(WorkerStatus::Inactive)
    }

    pub fn release(&mut self) -> Result<()> {
        self.transition(WorkerStatus::Release)?;
        self.worker.do_release()
    }

    pub fn destroy(&mut self) -> Result<()> {
        self.transition(WorkerStatus::Destroy)?;
        self.worker.do_destroy()?;
        self.status = WorkerStatus::Dead;
        Ok(())
    }

    pub fn metadata(&self) -> Option<&ModelMetadata> {
        self.metadata.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::echo::EchoWorker;

    #[test]
    fn rejects_out_of_order_transitions() {
        let mut handle = WorkerHandle::new(Box::new(EchoWorker::new()));
        let params = ParameterMap::new();
        // Cannot acquire before init.
        assert!(handle.acquire(&params).is_err());
        assert!(handle.init(&params).is_ok());
        assert!(handle.acquire(&params).is_ok());
    }

    #[test]
    fn full_lifecycle_reaches_dead() {
        let mut handle = WorkerHandle::new(Box::new(EchoWorker::new()));
        let params = ParameterMap::new();
        handle.init(&params).unwrap();
        handle.acquire(&params).unwrap();
        let batch = Batch::new();
        handle.run(&batch).unwrap();
        handle.deactivate().unwrap();
        handle.release().unwrap();
        handle.destroy().unwrap();
        assert_eq!(handle.status(), WorkerStatus::Dead);
    }
}
