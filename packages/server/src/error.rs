//! Error types for the server runtime.

use thiserror::Error;

use crate::LifecycleState;

/// Failures reported by a network layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    /// The layer could not start listening.
    #[error("failed to start: {0}")]
    Start(String),

    /// Polling for jobs failed.
    #[error("failed to poll: {0}")]
    Poll(String),

    /// Stopping the layer failed.
    #[error("failed to stop: {0}")]
    Stop(String),

    /// The layer no longer accepts work.
    #[error("network layer closed")]
    Closed,
}

/// Problems with a server configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The configuration parsed but is not usable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors returned by the server runtime.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("address space error: {0}")]
    AddressSpace(#[from] uaserver_address_space::Error),

    #[error("scheduler error: {0}")]
    Scheduler(#[from] uaserver_scheduler::SchedulerError),

    /// A network layer failed to start; the others were unwound.
    #[error("network layer {url} failed to start: {error}")]
    AdapterStart { url: String, error: NetworkError },

    /// The operation is not allowed in the current lifecycle state.
    #[error("cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: LifecycleState,
    },
}
