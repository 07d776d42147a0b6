//! Inference server core: endpoint registry, dynamic soft batcher, pooled
//! memory allocator, worker lifecycle state machine, and a protocol-agnostic
//! request/response model compatible with the KServe v2 data shape.
//!
//! Wire protocols (REST, gRPC, WebSocket) are external collaborators — this
//! crate exposes the [`adapter::RequestAdapter`] seam they plug into, plus a
//! fully-worked [`adapters::native::NativeAdapter`] for in-process use and
//! [`adapters::json`] for the KServe v2 JSON schema itself.

pub mod adapter;
pub mod adapters;
pub mod batching;
pub mod cli;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod memory;
pub mod observation;
pub mod parameters;
pub mod repository;
pub mod request;
pub mod server;
pub mod tensor;
pub mod types;
pub mod worker;

pub use error::{Error, Result};
pub use server::Server;
