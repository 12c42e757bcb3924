//! Podrelay - Relay Kubernetes pod logs to Telegram.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use podrelay::cli::{Cli, LogFormat};
use podrelay::config::{Config, RuntimeConfig};
use podrelay::{
    Dispatcher, KubeLogSource, MetricsServer, RelaySupervisor, ShutdownOrchestrator,
    TelegramNotifier, TransformPipeline,
};

/// Initialize the tracing subscriber with the specified log format.
fn init_logging(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());

    match format {
        LogFormat::Text => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_env_filter(filter)
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .json()
                .with_current_span(true)
                .with_span_list(false)
                .flatten_event(true)
                .with_env_filter(filter)
                .init();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.log_format);

    info!(config_path = %cli.config.display(), "Loading configuration");

    let config = match Config::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, path = %cli.config.display(), "Failed to load configuration");
            std::process::exit(1);
        }
    };

    // Fail-fast: report every configuration problem before connecting.
    info!("Validating configuration");
    if let Err(errors) = config.validate() {
        for e in &errors {
            error!(error = %e, "Configuration validation error");
        }
        error!(
            error_count = errors.len(),
            "Configuration validation failed"
        );
        std::process::exit(1);
    }

    // Validate mode: display summary and exit
    if cli.validate {
        println!("Configuration is valid: {}", cli.config.display());
        println!("  Namespace: {}", config.kube.namespace);
        println!("  Targets: {}", config.kube.target.len());
        println!(
            "  Filters: {} ({})",
            config.kube.filter.len(),
            if config.kube.filter.is_empty() {
                "forwarding everything"
            } else {
                "match-to-forward"
            }
        );
        println!("  Replacements: {}", config.kube.replacements.len());
        println!(
            "  Dispatch rate: {}/min (queue capacity {})",
            config.relay.rate_per_minute, config.relay.queue_capacity
        );
        println!(
            "  Metrics: {} (port {})",
            if config.metrics.enabled {
                "enabled"
            } else {
                "disabled"
            },
            config.metrics.port
        );
        return Ok(());
    }

    let runtime_config = config.compile()?;

    info!(config_path = %cli.config.display(), "podrelay starting");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(run(runtime_config))
}

/// Main async entry point.
async fn run(runtime_config: RuntimeConfig) -> Result<()> {
    // Shared HTTP client for connection pooling
    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;

    let shutdown = ShutdownOrchestrator::new(runtime_config.relay.shutdown_grace);
    let cancel = shutdown.cancel_token();
    shutdown.spawn_signal_listener();

    // Start metrics server if enabled
    let metrics_handle = if runtime_config.metrics.enabled {
        let server = MetricsServer::new(runtime_config.metrics.port);
        let cancel_metrics = cancel.clone();
        info!(port = runtime_config.metrics.port, "Starting metrics server");
        Some(tokio::spawn(async move {
            if let Err(e) = server.run(cancel_metrics).await {
                error!(error = %e, "Metrics server error");
            }
        }))
    } else {
        info!("Metrics server disabled");
        None
    };

    // Delivery queue and dispatcher
    let (queue, queue_rx) =
        podrelay::DeliveryQueue::new(runtime_config.relay.queue_capacity, cancel.clone());
    let notifier = Arc::new(TelegramNotifier::new(
        &runtime_config.telegram.token,
        http_client,
    ));
    let dispatcher = Dispatcher::new(
        queue_rx,
        notifier,
        runtime_config.relay.dispatch_period(),
    );
    let dispatcher_cancel = cancel.clone();
    let dispatcher_handle = tokio::spawn(async move {
        dispatcher.run(dispatcher_cancel).await;
    });

    // Kubernetes log source (fatal if the cluster is unreachable)
    let logs = KubeLogSource::connect(
        runtime_config.kube.config_path.as_deref(),
        &runtime_config.kube.namespace,
    )
    .await?;

    let pipeline = Arc::new(TransformPipeline::new(
        runtime_config.filters,
        runtime_config.replacements,
    ));

    let supervisor = RelaySupervisor::new(
        Arc::new(logs),
        pipeline,
        queue,
        runtime_config.kube.targets,
        runtime_config.telegram.chat,
        runtime_config.telegram.topics,
        runtime_config.relay.stagger_delay,
        runtime_config.relay.reconnect_delay,
    );

    // Run the supervisor until cancelled
    let supervisor_result = supervisor.run(cancel.clone()).await;

    // A startup failure must still release the dispatcher.
    if supervisor_result.is_err() {
        shutdown.trigger();
    }

    info!("Waiting for delivery queue to drain...");
    let _ = tokio::time::timeout(shutdown.grace(), dispatcher_handle).await;

    if let Some(handle) = metrics_handle {
        let _ = tokio::time::timeout(Duration::from_secs(2), handle).await;
    }

    match supervisor_result {
        Ok(()) => {
            info!("podrelay shutdown complete");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Relay error");
            Err(anyhow::anyhow!("Relay error: {}", e))
        }
    }
}
