//! End-to-end pipeline tests: adapter -> soft batcher -> worker -> callback,
//! wired by hand the way `endpoint::Manager`'s update thread wires them
//! internally, but without a dynamically loaded worker library (there is no
//! real `.so` plugin in this workspace to load, only the in-tree
//! `EchoWorker`).

use inferd::adapter::RequestAdapter;
use inferd::adapters::NativeAdapter;
use inferd::batching::soft::{BatchItem, SoftBatcher};
use inferd::batching::BatcherConfig;
use inferd::memory::MemoryPool;
use inferd::observation::PipelineCounters;
use inferd::parameters::ParameterMap;
use inferd::request::InferenceRequest;
use inferd::tensor::{InferenceTensor, TensorData};
use inferd::types::DataType;
use inferd::worker::echo::EchoWorker;
use inferd::worker::WorkerHandle;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

fn make_request(id: &str, value: i32) -> InferenceRequest {
    let mut request = InferenceRequest::new(id, "echo");
    request.add_input_tensor(InferenceTensor::new(
        "input",
        vec![1],
        DataType::I32,
        TensorData::Owned(value.to_le_bytes().to_vec()),
    ));
    request
}

async fn run_one_round(requests: Vec<InferenceRequest>, config: BatcherConfig) -> Vec<inferd::request::InferenceResponse> {
    let pool = Arc::new(MemoryPool::new());
    let counters = PipelineCounters::new();
    let (batcher, submit_tx) = SoftBatcher::new(config, pool, counters);
    let (batch_tx, mut batch_rx) = mpsc::channel(1);

    let mut receivers = Vec::new();
    for request in requests {
        let (tx, rx) = oneshot::channel();
        let tx = std::sync::Mutex::new(Some(tx));
        let request = request.with_callback(Box::new(move |result| {
            if let Some(tx) = tx.lock().unwrap().take() {
                let _ = tx.send(result);
            }
        }));
        receivers.push(rx);
        let adapter: Arc<dyn RequestAdapter> = Arc::new(NativeAdapter::new(request));
        submit_tx.send(BatchItem::Submit(adapter)).await.unwrap();
    }
    submit_tx.send(BatchItem::Shutdown).await.unwrap();

    tokio::spawn(batcher.run(batch_tx));

    let mut worker = WorkerHandle::new(Box::new(EchoWorker::new()));
    worker.init(&ParameterMap::new()).unwrap();
    worker.acquire(&ParameterMap::new()).unwrap();

    let batch = batch_rx.recv().await.unwrap();
    let responses = worker.run(&batch).unwrap();
    let mut requests = batch.requests;
    let traces = batch.traces;
    for ((request, mut response), trace) in requests.iter_mut().zip(responses).zip(traces) {
        response.trace = trace;
        request.run_callback_once(Ok(response));
    }

    let mut out = Vec::new();
    for rx in receivers {
        out.push(rx.await.unwrap().unwrap());
    }
    out
}

#[tokio::test]
async fn batch_of_two_echoes_inputs_as_outputs() {
    let responses = run_one_round(
        vec![make_request("a", 1), make_request("b", 2)],
        BatcherConfig::new(2, 5_000),
    )
    .await;

    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0].outputs[0].data.as_bytes(), 1i32.to_le_bytes());
    assert_eq!(responses[1].outputs[0].data.as_bytes(), 2i32.to_le_bytes());
}

#[tokio::test]
async fn leftover_single_request_still_completes_on_shutdown() {
    let responses = run_one_round(vec![make_request("solo", 42)], BatcherConfig::new(4, 5_000)).await;
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].id, "solo");
}

#[tokio::test]
async fn worker_lifecycle_rejects_run_before_acquire() {
    let mut worker = WorkerHandle::new(Box::new(EchoWorker::new()));
    let batch = inferd::batching::Batch::new();
    assert!(worker.run(&batch).is_err());
}

#[tokio::test]
async fn native_adapter_materializes_into_a_batch_shared_buffer() {
    let pool = MemoryPool::new();
    let input_buffers = vec![Arc::new(pool.get(Some("cpu"), 4).unwrap())];
    let mut input_offsets = vec![0usize];

    let mut request = InferenceRequest::new("req", "echo");
    request.add_input_tensor(InferenceTensor::new(
        "input",
        vec![1],
        DataType::I32,
        TensorData::Owned(7i32.to_le_bytes().to_vec()),
    ));

    let adapter = NativeAdapter::new(request);
    let materialized = adapter
        .materialize(&input_buffers, &mut input_offsets, &[], &mut [])
        .unwrap();
    assert_eq!(materialized.inputs[0].data.as_bytes(), 7i32.to_le_bytes());
    assert!(matches!(materialized.inputs[0].data, TensorData::Pooled { .. }));
}
