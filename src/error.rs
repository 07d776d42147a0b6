//! Error taxonomy for the inference pipeline.
//!
//! These are kinds, not wrapped foreign error types: every fallible
//! operation in the core maps its failure onto one of these variants so
//! protocol adapters can translate them into wire-level statuses (HTTP
//! codes, gRPC statuses) without needing to understand the internals of
//! whichever component raised the error.

use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("external error: {0}")]
    External(String),

    #[error("runtime error: {0}")]
    Runtime(String),

    #[error("connection error: {0}")]
    ConnectionError(String),

    #[error("bad status: {0}")]
    BadStatus(String),

    #[error("environment variable not set: {0}")]
    EnvironmentNotSet(String),
}

impl Error {
    pub fn invalid_argument(msg: impl fmt::Display) -> Self {
        Error::InvalidArgument(msg.to_string())
    }

    pub fn runtime(msg: impl fmt::Display) -> Self {
        Error::Runtime(msg.to_string())
    }

    pub fn external(msg: impl fmt::Display) -> Self {
        Error::External(msg.to_string())
    }

    pub fn file_not_found(msg: impl fmt::Display) -> Self {
        Error::FileNotFound(msg.to_string())
    }

    /// The HTTP status a REST adapter should map this error onto (§7).
    pub fn http_status(&self) -> u16 {
        match self {
            Error::InvalidArgument(_) => 400,
            Error::FileNotFound(_) => 404,
            Error::External(_) | Error::Runtime(_) => 500,
            Error::ConnectionError(_) => 502,
            Error::BadStatus(_) => 500,
            Error::EnvironmentNotSet(_) => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
