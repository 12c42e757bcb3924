//! Per-source stream worker.
//!
//! One worker owns the log stream of one (pod, container) pair and drives a
//! small state machine:
//!
//! ```text
//! Connecting --ok--> Streaming --read error / stream end--> Backoff
//!     ^                  |                                     |
//!     +----- fixed reconnect delay ---------------------------+
//!
//! cancellation from any state --> Stopped
//! ```
//!
//! Workers are fully isolated: one container's stream failure never affects
//! another source, and retry continues indefinitely because log streams are
//! inherently flaky (pod churn, API hiccups). Enqueueing into a full
//! delivery queue blocks the worker - deliberate backpressure that slows a
//! noisy source down instead of dropping output or growing memory.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::discovery::ResolvedSource;
use crate::kube::{LogSource, LogStream};
use crate::notify::{DeliveryQueue, OutboundMessage};
use crate::stream_buffer::StreamBuffer;
use crate::transform::TransformPipeline;

/// Worker state; `Streaming` owns the live connection.
enum WorkerState {
    Connecting,
    Streaming(LogStream),
    Backoff,
    Stopped,
}

/// Long-lived task tailing one (pod, container) pair.
pub struct StreamWorker {
    source: ResolvedSource,
    logs: Arc<dyn LogSource>,
    pipeline: Arc<TransformPipeline>,
    queue: DeliveryQueue,
    chat_id: i64,
    topics: Arc<HashMap<String, i64>>,
    reconnect_delay: Duration,
    buffer: StreamBuffer,
}

impl StreamWorker {
    /// Create a worker for one resolved source.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: ResolvedSource,
        logs: Arc<dyn LogSource>,
        pipeline: Arc<TransformPipeline>,
        queue: DeliveryQueue,
        chat_id: i64,
        topics: Arc<HashMap<String, i64>>,
        reconnect_delay: Duration,
    ) -> Self {
        Self {
            source,
            logs,
            pipeline,
            queue,
            chat_id,
            topics,
            reconnect_delay,
            buffer: StreamBuffer::new(),
        }
    }

    /// Run until the cancellation token fires.
    ///
    /// Never returns an error: every stream failure is contained here and
    /// answered with a reconnect.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(source = %self.source, "stream worker started");

        let mut state = WorkerState::Connecting;
        loop {
            state = match state {
                WorkerState::Connecting => self.connect(&cancel).await,
                WorkerState::Streaming(stream) => self.stream(stream, &cancel).await,
                WorkerState::Backoff => self.backoff(&cancel).await,
                WorkerState::Stopped => break,
            };
        }

        info!(source = %self.source, "stream worker stopped");
    }

    /// Open a fresh log stream, racing against cancellation.
    async fn connect(&mut self, cancel: &CancellationToken) -> WorkerState {
        // A partial line left over from the previous connection must not
        // prefix the new stream.
        self.buffer.clear();

        tokio::select! {
            _ = cancel.cancelled() => WorkerState::Stopped,
            opened = self.logs.open_stream(&self.source) => match opened {
                Ok(stream) => {
                    info!(source = %self.source, "log stream opened");
                    WorkerState::Streaming(stream)
                }
                Err(e) => {
                    warn!(source = %self.source, error = %e, "failed to open log stream");
                    WorkerState::Backoff
                }
            },
        }
    }

    /// Consume the stream chunk by chunk until it fails, ends, or
    /// cancellation is observed.
    async fn stream(&mut self, mut stream: LogStream, cancel: &CancellationToken) -> WorkerState {
        loop {
            let chunk = tokio::select! {
                _ = cancel.cancelled() => return WorkerState::Stopped,
                chunk = stream.next() => chunk,
            };

            match chunk {
                Some(Ok(bytes)) => {
                    self.buffer.push(&bytes);
                    let lines = match self.buffer.drain_complete_lines() {
                        Ok(lines) => lines,
                        Err(e) => {
                            warn!(source = %self.source, error = %e, "dropping undecodable stream data");
                            self.buffer.clear();
                            continue;
                        }
                    };

                    for line in lines {
                        metrics::counter!(
                            "podrelay_lines_total",
                            "container" => self.source.container.clone()
                        )
                        .increment(1);

                        if let Some(text) = self.pipeline.apply_line(&line)
                            && !self.relay(text).await
                        {
                            // Enqueue only fails on shutdown.
                            return WorkerState::Stopped;
                        }
                    }
                }
                Some(Err(e)) => {
                    warn!(source = %self.source, error = %e, "log stream read failed");
                    return WorkerState::Backoff;
                }
                None => {
                    debug!(source = %self.source, "log stream ended");
                    return WorkerState::Backoff;
                }
            }
        }
    }

    /// Enqueue one rendered line. Returns `false` once the queue is
    /// shutting down.
    async fn relay(&self, text: String) -> bool {
        let message = OutboundMessage {
            chat_id: self.chat_id,
            text,
            message_thread_id: self.topics.get(&self.source.container).copied(),
            container: self.source.container.clone(),
        };

        if self.queue.enqueue(message).await.is_err() {
            return false;
        }

        metrics::counter!(
            "podrelay_lines_relayed_total",
            "container" => self.source.container.clone()
        )
        .increment(1);
        true
    }

    /// Sleep the fixed reconnect delay; cancellation cuts the sleep short.
    async fn backoff(&self, cancel: &CancellationToken) -> WorkerState {
        metrics::counter!(
            "podrelay_reconnections_total",
            "container" => self.source.container.clone()
        )
        .increment(1);

        debug!(
            source = %self.source,
            delay_ms = self.reconnect_delay.as_millis() as u64,
            "backing off before reconnect"
        );

        tokio::select! {
            _ = cancel.cancelled() => WorkerState::Stopped,
            _ = tokio::time::sleep(self.reconnect_delay) => WorkerState::Connecting,
        }
    }
}

impl std::fmt::Debug for StreamWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamWorker")
            .field("source", &self.source)
            .finish()
    }
}
