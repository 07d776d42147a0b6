//! Server configuration: environment-variable defaults overridable by CLI
//! flags, the same layering `continuum-core/src/main.rs` uses for its model
//! path and device settings.

use crate::batching::BatcherConfig;
use crate::error::{Error, Result};
use std::path::PathBuf;

/// Default HTTP port, matching the original's `kDefaultHttpPort`.
pub const DEFAULT_HTTP_PORT: u16 = 8998;
/// Default gRPC port, matching the original's `kDefaultGrpcPort`.
pub const DEFAULT_GRPC_PORT: u16 = 50051;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub model_repository: PathBuf,
    pub worker_library_dir: PathBuf,
    pub default_batch_size: usize,
    pub default_batch_timeout_ms: u64,
    pub log_level: String,
    pub log_dir: PathBuf,
    pub http_port: u16,
    pub grpc_port: u16,
    pub enable_repository_watcher: bool,
    pub use_polling_watcher: bool,
}

impl ServerConfig {
    pub fn default_batcher(&self) -> BatcherConfig {
        BatcherConfig::new(self.default_batch_size, self.default_batch_timeout_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            model_repository: PathBuf::from("./models"),
            worker_library_dir: PathBuf::from("./workers"),
            default_batch_size: 4,
            default_batch_timeout_ms: 50,
            log_level: "info".to_string(),
            log_dir: default_log_dir(),
            http_port: DEFAULT_HTTP_PORT,
            grpc_port: DEFAULT_GRPC_PORT,
            enable_repository_watcher: false,
            use_polling_watcher: false,
        }
    }
}

/// `$HOME/.inferd/log`, falling back to `./logs` when `HOME` isn't set —
/// mirrors `model.rs`'s `load_default_model` reading its own env var with a
/// relative-path fallback rather than pulling in a directories crate.
fn default_log_dir() -> PathBuf {
    match std::env::var("HOME") {
        Ok(home) if !home.is_empty() => PathBuf::from(home).join(".inferd").join("log"),
        _ => PathBuf::from("./logs"),
    }
}

impl ServerConfig {
    /// Build a config from environment variables, falling back to
    /// [`ServerConfig::default`] for anything unset.
    pub fn from_env() -> Self {
        let mut config = ServerConfig::default();

        if let Ok(root) = std::env::var("INFERD_MODEL_REPOSITORY") {
            config.model_repository = PathBuf::from(root);
        }
        if let Ok(dir) = std::env::var("INFERD_WORKER_DIR") {
            config.worker_library_dir = PathBuf::from(dir);
        }
        if let Ok(size) = std::env::var("INFERD_BATCH_SIZE") {
            if let Ok(size) = size.parse() {
                config.default_batch_size = size;
            }
        }
        if let Ok(timeout) = std::env::var("INFERD_BATCH_TIMEOUT_MS") {
            if let Ok(timeout) = timeout.parse() {
                config.default_batch_timeout_ms = timeout;
            }
        }
        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = level;
        }
        if let Ok(port) = std::env::var("INFERD_HTTP_PORT") {
            if let Ok(port) = port.parse() {
                config.http_port = port;
            }
        }
        if let Ok(port) = std::env::var("INFERD_GRPC_PORT") {
            if let Ok(port) = port.parse() {
                config.grpc_port = port;
            }
        }

        config
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_batch_size == 0 {
            return Err(Error::invalid_argument("batch size must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(ServerConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let mut config = ServerConfig::default();
        config.default_batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn defaults_match_the_original_server_ports() {
        let config = ServerConfig::default();
        assert_eq!(config.http_port, 8998);
        assert_eq!(config.grpc_port, 50051);
    }
}
