//! Error type definitions for errors that can occur during RPC interactions.
use std::result;
use std::sync::Arc;
use std::time::Duration;

use prost;
use thiserror;

/// Call-time errors. They travel through a [`Call`](super::call::Call) to every waiter, so
/// the type is cheap to clone.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("execution error: {0}")]
    ExecutionError(Arc<anyhow::Error>),

    #[error("Decode error: {0}")]
    DecodeError(#[from] prost::DecodeError),

    #[error("Encode error: {0}")]
    EncodeError(#[from] prost::EncodeError),

    #[error("method not found: {0}")]
    MethodNotFound(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Cancelled")]
    Cancelled,

    #[error("Shutdown")]
    Shutdown,
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Error::ExecutionError(Arc::new(e))
    }
}

impl Error {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout(_))
    }
}

pub type Result<T> = result::Result<T, Error>;

/// Startup-time wiring defects: a broken descriptor blob or an implementation that does not
/// match its service contract. Nothing is served while one of these is outstanding; see
/// [`expect_startup`](crate::expect_startup).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to uncompress descriptor: {0}")]
    Decompress(#[from] std::io::Error),

    #[error("unmarshal FileDescriptorProto failed: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("malformed descriptor in {file}: {reason}")]
    MalformedDescriptor { file: String, reason: String },

    #[error("method {service}.{method} is streaming, streaming methods are not supported")]
    StreamingMethod { service: String, method: String },

    #[error("method {service}.{method} has a wrong signature: {reason}")]
    SignatureMismatch {
        service: String,
        method: String,
        reason: String,
    },

    #[error("method {service}.{method} is exposed more than once")]
    DuplicateHandler { service: String, method: String },

    #[error("service {service} declares {declared} methods but {bound} are bound, missing: {missing:?}")]
    MethodCountMismatch {
        service: String,
        declared: usize,
        bound: usize,
        missing: Vec<String>,
    },

    #[error("unknown service descriptor: {0}")]
    UnknownService(String),

    #[error("methods register rejected service {service}: {source}")]
    RegisterRejected { service: String, source: Error },
}
