//! Centralized error types for podrelay using thiserror.
//!
//! One enum per domain; cancellation is always a dedicated variant so that
//! shutdown paths are never reported as failures.

use thiserror::Error;

/// Errors related to configuration loading and validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load config file: {0}")]
    LoadError(String),
    #[error("invalid configuration: {0}")]
    ValidationError(String),
    #[error("invalid regex pattern in {field}: {message}")]
    InvalidRegex { field: String, message: String },
}

/// Errors related to pod discovery against the Kubernetes API.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("failed to build kubernetes client: {0}")]
    ClientBuild(String),
    #[error("failed to list pods: {0}")]
    ListFailed(String),
}

/// Errors related to a single pod log stream.
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("failed to open log stream: {0}")]
    OpenFailed(String),
    #[error("log stream read failed: {0}")]
    Read(String),
    #[error("invalid UTF-8 in log stream: {0}")]
    Utf8(String),
}

/// Errors related to the delivery queue.
#[derive(Error, Debug)]
pub enum QueueError {
    /// Cancellation was observed; the queue no longer accepts messages.
    #[error("delivery queue is shutting down")]
    ShuttingDown,
    /// The consumer side is gone.
    #[error("delivery queue closed")]
    Closed,
}

/// Errors related to Telegram message delivery.
#[derive(Error, Debug)]
pub enum DeliverError {
    #[error("failed to send message: {0}")]
    SendFailed(String),
    #[error("telegram rejected message: HTTP {status}")]
    Rejected { status: u16 },
}

/// Top-level relay errors surfaced from the supervisor.
#[derive(Error, Debug)]
pub enum RelayError {
    /// No target pattern matched any pod; there is nothing to monitor.
    #[error("no targets resolved to a running pod")]
    NoSources,
    #[error("discovery error: {0}")]
    Discovery(#[from] DiscoveryError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}
