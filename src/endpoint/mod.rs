//! Endpoint registry: the public name clients submit requests to, mapped to
//! a `(worker kind, parameters)` pair and the running worker group behind
//! it.
//!
//! Grounded on `manager.hpp`'s `Endpoints` helper (three maps: worker kind
//! → `parameters → endpoint name`, worker kind → next auto-name index,
//! endpoint name → its parameters) and `Manager`'s single update thread
//! draining a command queue of `UpdateCommand`s. The original is a process
//! singleton reached through a raw pointer; here it's an `Arc` any caller
//! can hold, which is the idiomatic substitute.

use crate::batching::{BatcherConfig, SoftBatcher};
use crate::memory::MemoryPool;
use crate::parameters::ParameterMap;
use crate::request::ModelMetadata;
use crate::worker::info::WorkerInfo;
use crate::worker::loader::WorkerLoader;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::thread::JoinHandle as StdJoinHandle;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

/// What kind of change an [`UpdateCommand`] asks the manager to make.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateCommandType {
    Load,
    Unload,
}

#[derive(Debug, Clone)]
pub struct UpdateCommand {
    pub command_type: UpdateCommandType,
    pub endpoint: String,
    pub kind: String,
    pub parameters: ParameterMap,
    pub batcher: BatcherConfig,
}

/// Endpoint name bookkeeping: dedupes worker instances by `(kind,
/// parameters)` so two requests to load the same worker with identical
/// parameters reuse one endpoint instead of spawning a second copy.
#[derive(Default)]
struct Endpoints {
    by_kind_and_params: HashMap<String, BTreeMap<ParameterMap, String>>,
    next_index: HashMap<String, usize>,
    params_by_endpoint: HashMap<String, (String, ParameterMap)>,
}

impl Endpoints {
    fn existing(&self, kind: &str, parameters: &ParameterMap) -> Option<String> {
        self.by_kind_and_params
            .get(kind)
            .and_then(|m| m.get(parameters))
            .cloned()
    }

    /// Allocate (or reuse) an endpoint name for `(kind, parameters)`.
    /// Returns `(name, is_new)`.
    fn reserve(&mut self, kind: &str, parameters: &ParameterMap) -> (String, bool) {
        if let Some(existing) = self.existing(kind, parameters) {
            return (existing, false);
        }
        let index = self.next_index.entry(kind.to_string()).or_insert(0);
        let name = if *index == 0 {
            kind.to_string()
        } else {
            format!("{kind}-{index}")
        };
        *index += 1;

        self.by_kind_and_params
            .entry(kind.to_string())
            .or_default()
            .insert(parameters.clone(), name.clone());
        self.params_by_endpoint
            .insert(name.clone(), (kind.to_string(), parameters.clone()));

        (name, true)
    }

    fn remove(&mut self, endpoint: &str) {
        if let Some((kind, parameters)) = self.params_by_endpoint.remove(endpoint) {
            if let Some(m) = self.by_kind_and_params.get_mut(&kind) {
                m.remove(&parameters);
            }
        }
    }
}

/// A running worker group plus the batcher feeding it: what `Server::submit`
/// actually pushes requests into.
struct EndpointHandle {
    group: WorkerInfo,
    submit_tx: mpsc::Sender<crate::batching::soft::BatchItem>,
}

/// Public handle to the registry and its running worker groups.
pub struct Manager {
    endpoints: Arc<RwLock<Endpoints>>,
    groups: Arc<RwLock<HashMap<String, EndpointHandle>>>,
    pool: Arc<MemoryPool>,
    command_tx: std_mpsc::Sender<UpdateCommand>,
    _update_thread: StdJoinHandle<()>,
}

impl Manager {
    pub fn new(runtime: Handle, worker_search_dir: impl Into<std::path::PathBuf>) -> Arc<Self> {
        let endpoints = Arc::new(RwLock::new(Endpoints::default()));
        let groups: Arc<RwLock<HashMap<String, EndpointHandle>>> = Arc::new(RwLock::new(HashMap::new()));
        let pool = Arc::new(MemoryPool::new());
        let search_dir = worker_search_dir.into();

        let (command_tx, command_rx) = std_mpsc::channel::<UpdateCommand>();

        let thread_groups = groups.clone();
        let thread_endpoints = endpoints.clone();
        let thread_runtime = runtime.clone();
        let thread_pool = pool.clone();
        let update_thread = std::thread::spawn(move || {
            let mut loader = WorkerLoader::new(search_dir);
            while let Ok(command) = command_rx.recv() {
                match command.command_type {
                    UpdateCommandType::Load => {
                        // An existing group for this endpoint means a
                        // `share=false` caller wants one more worker added to
                        // it, not a second group under a different name.
                        let added_to_existing = {
                            let mut groups = thread_groups.write();
                            match groups.get_mut(&command.endpoint) {
                                Some(existing) => {
                                    if let Err(e) = existing.group.add_and_start_worker(&mut loader) {
                                        log::error!("failed to add worker '{}': {e}", command.kind);
                                    }
                                    true
                                }
                                None => false,
                            }
                        };
                        if added_to_existing {
                            continue;
                        }

                        let (batch_tx, batch_rx) = mpsc::channel(command.batcher.batch_size * 4);
                        let mut group =
                            WorkerInfo::new(command.kind.clone(), command.parameters.clone(), batch_rx);
                        if let Err(e) = group.add_and_start_worker(&mut loader) {
                            log::error!("failed to start worker '{}': {e}", command.kind);
                            continue;
                        }

                        let counters = crate::observation::PipelineCounters::new();
                        let (batcher, submit_tx) =
                            SoftBatcher::new(command.batcher, thread_pool.clone(), counters);
                        thread_runtime.spawn(batcher.run(batch_tx));

                        thread_groups
                            .write()
                            .insert(command.endpoint, EndpointHandle { group, submit_tx });
                    }
                    UpdateCommandType::Unload => {
                        // Take the whole group out of the map while we stop
                        // one worker, then either drop it (the group is now
                        // empty) or put it back so the endpoint keeps
                        // resolving to whichever workers remain.
                        let entry = thread_groups.write().remove(&command.endpoint);
                        if let Some(mut handle) = entry {
                            thread_runtime.block_on(async {
                                if let Err(e) = handle.group.unload_one().await {
                                    log::error!("failed to unload a worker from '{}': {e}", command.endpoint);
                                }
                            });
                            if handle.group.is_empty() {
                                thread_endpoints.write().remove(&command.endpoint);
                            } else {
                                thread_groups.write().insert(command.endpoint.clone(), handle);
                            }
                        }
                    }
                }
            }
        });

        Arc::new(Manager {
            endpoints,
            groups,
            pool,
            command_tx,
            _update_thread: update_thread,
        })
    }

    pub fn memory_pool(&self) -> &Arc<MemoryPool> {
        &self.pool
    }

    /// Submit an adapter-wrapped request to the endpoint's batcher. Returns
    /// `false` if the endpoint isn't loaded (yet, or anymore).
    pub async fn submit(&self, endpoint: &str, adapter: Arc<dyn crate::adapter::RequestAdapter>) -> bool {
        let submit_tx = {
            let groups = self.groups.read();
            match groups.get(endpoint) {
                Some(handle) => handle.submit_tx.clone(),
                None => return false,
            }
        };
        submit_tx
            .send(crate::batching::soft::BatchItem::Submit(adapter))
            .await
            .is_ok()
    }

    /// Resolve an endpoint name to its `(kind, parameters)` pair, reusing an
    /// existing endpoint if one already serves this exact pair. A load
    /// command is enqueued when a new worker group is needed (`is_new`), or
    /// when the caller passes `share=false`, in which case one more worker
    /// is added to whatever group already serves this `(kind, parameters)`.
    pub fn load_endpoint(&self, kind: &str, parameters: ParameterMap, batcher: BatcherConfig, share: bool) -> String {
        let (name, is_new) = self.endpoints.write().reserve(kind, &parameters);
        if is_new || !share {
            let _ = self.command_tx.send(UpdateCommand {
                command_type: UpdateCommandType::Load,
                endpoint: name.clone(),
                kind: kind.to_string(),
                parameters,
                batcher,
            });
        }
        name
    }

    /// Unload exactly one worker from the endpoint's group. The endpoint's
    /// name mapping is only dropped once the update thread confirms the
    /// group has no workers left, so a `share=false` group with several
    /// workers stays resolvable after one is removed.
    pub fn unload_endpoint(&self, endpoint: &str) {
        let _ = self.command_tx.send(UpdateCommand {
            command_type: UpdateCommandType::Unload,
            endpoint: endpoint.to_string(),
            kind: String::new(),
            parameters: ParameterMap::new(),
            batcher: BatcherConfig::default(),
        });
    }

    pub fn has_endpoint(&self, endpoint: &str) -> bool {
        self.groups.read().contains_key(endpoint)
    }

    pub fn endpoint_metadata(&self, endpoint: &str) -> Option<ModelMetadata> {
        self.groups.read().get(endpoint).and_then(|h| h.group.metadata())
    }

    pub fn endpoint_count(&self) -> usize {
        self.groups.read().len()
    }
}
