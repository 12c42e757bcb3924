// src/lib.rs
//! Podrelay - Relay Kubernetes pod logs to Telegram.

pub mod cli;
pub mod config;
pub mod discovery;
pub mod error;
pub mod kube;
pub mod metrics;
pub mod notify;
pub mod shutdown;
pub mod stream_buffer;
pub mod supervisor;
pub mod transform;
pub mod worker;

// Re-export commonly used types
pub use cli::LogFormat;
pub use discovery::{ResolvedSource, resolve_sources};
pub use kube::{KubeLogSource, LogSource, LogStream};
pub use metrics::{MetricsServer, register_metric_descriptions};
pub use notify::{
    ChatNotifier, DEFAULT_QUEUE_CAPACITY, DeliveryQueue, Dispatcher, OutboundMessage,
    TelegramNotifier,
};
pub use shutdown::ShutdownOrchestrator;
pub use stream_buffer::StreamBuffer;
pub use supervisor::RelaySupervisor;
pub use transform::TransformPipeline;
pub use worker::StreamWorker;
