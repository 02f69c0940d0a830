//! Controller-specific error types.
//!
//! Errors returned from a reconcile are handed to the watcher's error policy,
//! which requeues the object with a per-object Fibonacci backoff.

use crate::store::StoreError;
use kube::Error as KubeError;
use strand_infra::InfraError;
use thiserror::Error;

/// Errors that can occur in the Strand controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes client setup error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Object store read or write failed
    #[error("Object store error: {0}")]
    Store(#[from] StoreError),

    /// Database, broker or migration failure
    #[error("Infrastructure error: {0}")]
    Infra(#[from] InfraError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Status or object could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),

    /// Metrics or health server failed
    #[error("HTTP server error: {0}")]
    Server(String),
}

impl ControllerError {
    /// Short label for the error, used in metrics and logs.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Kube(_) => "kube",
            Self::Store(_) => "store",
            Self::Infra(_) => "infra",
            Self::InvalidConfig(_) => "config",
            Self::Serialization(_) => "serialization",
            Self::Watch(_) => "watch",
            Self::Server(_) => "server",
        }
    }
}
