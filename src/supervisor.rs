//! Relay supervisor: resolve targets once, fan out one worker per source.
//!
//! ```text
//! supervisor
//!     |
//!     +-- list pods --> resolve targets --> [ResolvedSource; N]
//!     |
//!     +-- spawn --> StreamWorker(pod-a/app)    (staggered)
//!     +-- spawn --> StreamWorker(pod-a/sidecar)
//!     +-- spawn --> StreamWorker(pod-b/app)
//!     |
//!     +-- join all (workers exit only on cancellation)
//! ```
//!
//! Resolution is a startup snapshot; pods appearing later are not picked up.
//! Worker launches are staggered to avoid a connection burst against the API
//! server.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::CompiledTarget;
use crate::discovery::resolve_sources;
use crate::error::RelayError;
use crate::kube::LogSource;
use crate::notify::DeliveryQueue;
use crate::transform::TransformPipeline;
use crate::worker::StreamWorker;

/// Supervises one stream worker per resolved source.
pub struct RelaySupervisor {
    logs: Arc<dyn LogSource>,
    pipeline: Arc<TransformPipeline>,
    queue: DeliveryQueue,
    targets: Vec<CompiledTarget>,
    chat_id: i64,
    topics: Arc<HashMap<String, i64>>,
    stagger_delay: Duration,
    reconnect_delay: Duration,
}

impl RelaySupervisor {
    /// Create a supervisor.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        logs: Arc<dyn LogSource>,
        pipeline: Arc<TransformPipeline>,
        queue: DeliveryQueue,
        targets: Vec<CompiledTarget>,
        chat_id: i64,
        topics: HashMap<String, i64>,
        stagger_delay: Duration,
        reconnect_delay: Duration,
    ) -> Self {
        Self {
            logs,
            pipeline,
            queue,
            targets,
            chat_id,
            topics: Arc::new(topics),
            stagger_delay,
            reconnect_delay,
        }
    }

    /// Resolve targets and run all workers until cancellation.
    ///
    /// Blocks until every worker has exited. Workers do not exit on their
    /// own under normal operation; only cancellation terminates them.
    ///
    /// # Errors
    ///
    /// - `RelayError::Discovery` if the pod list cannot be fetched.
    /// - `RelayError::NoSources` if no target matched any pod - with
    ///   nothing to monitor, running would silently do nothing.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), RelayError> {
        let pods = self.logs.list_workloads().await?;
        let sources = resolve_sources(&self.targets, &pods);

        if sources.is_empty() {
            return Err(RelayError::NoSources);
        }

        info!(
            source_count = sources.len(),
            pod_count = pods.len(),
            "resolved log sources"
        );

        let mut workers: JoinSet<()> = JoinSet::new();
        for (i, source) in sources.into_iter().enumerate() {
            if i > 0 {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.stagger_delay) => {}
                }
            }
            if cancel.is_cancelled() {
                break;
            }

            debug!(source = %source, "launching stream worker");
            let worker = StreamWorker::new(
                source,
                Arc::clone(&self.logs),
                Arc::clone(&self.pipeline),
                self.queue.clone(),
                self.chat_id,
                Arc::clone(&self.topics),
                self.reconnect_delay,
            );
            workers.spawn(worker.run(cancel.clone()));
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(()) => {}
                Err(e) if e.is_panic() => {
                    // A panic means a bug, not stream weather; the source is
                    // lost until restart.
                    error!(error = %e, "stream worker panicked - CRITICAL");
                    metrics::counter!("podrelay_worker_panics_total").increment(1);
                }
                Err(e) => {
                    warn!(error = %e, "stream worker task aborted");
                }
            }
        }

        info!("all stream workers stopped");
        Ok(())
    }
}

impl std::fmt::Debug for RelaySupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelaySupervisor")
            .field("target_count", &self.targets.len())
            .finish()
    }
}
