//! Error types for client and pool operations.

use std::time::Duration;

use thiserror::Error;

/// Errors produced by clients, pools and transports.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// No reply before the deadline, or the worker exhausted its overflow tolerance.
    #[error("timed out after {after:?}")]
    Timeout {
        /// The budget that was exceeded.
        after: Duration,
    },
    /// The broker had no worker available to service the job.
    #[error("no worker available")]
    NoWorker,
    /// The worker ran the job and reported a failure.
    #[error("execution failed: {0}")]
    Execution(String),
    /// The transport failed to connect, send, receive or wait.
    #[error("transport error: {0}")]
    Transport(String),
    /// The broker sent a reply that could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(String),
    /// The client was used after `close`.
    #[error("client is closed")]
    Closed,
    /// The pool was used after `close`.
    #[error("pool is closed")]
    PoolClosed,
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ClientError {
    /// Whether this error is a timeout, including tolerance-forced timeouts.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
