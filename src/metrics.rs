//! Prometheus metrics exposition server.
//!
//! Exposes podrelay metrics in Prometheus format on a configurable port.
//! The server is optional; counters and gauges are recorded through the
//! `metrics` facade regardless and simply go nowhere when no recorder is
//! installed.

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Register descriptions for all podrelay metrics.
///
/// Called once after the recorder is installed; descriptions become HELP
/// text in the Prometheus output.
pub fn register_metric_descriptions() {
    use metrics::{describe_counter, describe_gauge};

    describe_counter!(
        "podrelay_lines_total",
        "Total log lines read from pod streams, per container"
    );
    describe_counter!(
        "podrelay_lines_relayed_total",
        "Total log lines that passed filtering and were enqueued, per container"
    );
    describe_counter!(
        "podrelay_messages_sent_total",
        "Total messages successfully delivered to Telegram"
    );
    describe_counter!(
        "podrelay_delivery_errors_total",
        "Total messages dropped after a delivery failure"
    );
    describe_counter!(
        "podrelay_reconnections_total",
        "Total log stream reconnect attempts, per container"
    );
    describe_counter!(
        "podrelay_worker_panics_total",
        "Total stream worker panics"
    );
    describe_gauge!(
        "podrelay_queue_depth",
        "Current number of messages waiting in the delivery queue"
    );
}

/// Metrics server for Prometheus exposition.
pub struct MetricsServer {
    port: u16,
}

impl MetricsServer {
    /// Create a server bound to the given port.
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    /// Returns the configured port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Install the global recorder and serve `/metrics` until cancelled.
    ///
    /// # Errors
    ///
    /// Returns an error if the exporter fails to install (the recorder can
    /// only be installed once per process) or the listener cannot bind.
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let addr: SocketAddr = ([0, 0, 0, 0], self.port).into();

        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .map_err(|e| anyhow::anyhow!("failed to install Prometheus exporter: {}", e))?;

        register_metric_descriptions();

        info!(port = self.port, "metrics server started on /metrics");

        cancel.cancelled().await;

        info!("metrics server shutting down");
        Ok(())
    }
}

impl std::fmt::Debug for MetricsServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsServer")
            .field("port", &self.port)
            .finish()
    }
}
