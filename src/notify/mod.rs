//! Bounded delivery queue and paced dispatch to Telegram.
//!
//! The queue is the backpressure boundary between many stream workers and
//! one rate-limited sink:
//!
//! ```text
//! workers --enqueue--> bounded mpsc --recv--> pacer tick --> ChatNotifier
//! ```
//!
//! - **Bounded, blocking**: `enqueue` waits when the buffer is full instead
//!   of dropping or growing; a noisy container slows itself down.
//! - **Fail-fast on shutdown**: once the cancellation token fires, `enqueue`
//!   returns immediately and the dispatcher drains whatever is already
//!   buffered, still at the paced rate.
//! - **Best-effort**: a failed delivery is logged and dropped; there is no
//!   retry and no redelivery.

pub mod telegram;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{DeliverError, QueueError};

pub use telegram::TelegramNotifier;

/// Default delivery queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// One rendered message bound for Telegram.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    /// Destination chat id.
    pub chat_id: i64,
    /// Rendered message body (already code-fenced).
    pub text: String,
    /// Forum topic the message is routed to, if the source container is
    /// mapped; `None` goes to the main chat.
    pub message_thread_id: Option<i64>,
    /// Source container name, for logging and metrics.
    pub container: String,
}

/// Sink for outbound chat messages.
///
/// Implementations must be `Send + Sync`; the dispatcher calls `deliver`
/// once per message and drops the message on failure.
#[async_trait]
pub trait ChatNotifier: Send + Sync {
    /// Name of the notifier, for logging.
    fn name(&self) -> &str;

    /// Deliver one message.
    async fn deliver(&self, message: &OutboundMessage) -> Result<(), DeliverError>;
}

/// Producer handle for the bounded delivery queue.
///
/// Cheap to clone; every stream worker holds one.
#[derive(Debug, Clone)]
pub struct DeliveryQueue {
    tx: mpsc::Sender<OutboundMessage>,
    cancel: CancellationToken,
}

impl DeliveryQueue {
    /// Create a queue with the given capacity.
    ///
    /// Returns the producer handle and the receiver the [`Dispatcher`]
    /// consumes.
    pub fn new(
        capacity: usize,
        cancel: CancellationToken,
    ) -> (Self, mpsc::Receiver<OutboundMessage>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx, cancel }, rx)
    }

    /// Enqueue a message, waiting for buffer space if necessary.
    ///
    /// Blocks while the queue is at capacity and unblocks as soon as the
    /// dispatcher consumes a message, or the cancellation token fires.
    ///
    /// # Errors
    ///
    /// - `QueueError::ShuttingDown` once cancellation has been observed;
    ///   callers should stop producing.
    /// - `QueueError::Closed` if the dispatcher is gone.
    pub async fn enqueue(&self, message: OutboundMessage) -> Result<(), QueueError> {
        if self.cancel.is_cancelled() {
            return Err(QueueError::ShuttingDown);
        }

        tokio::select! {
            _ = self.cancel.cancelled() => Err(QueueError::ShuttingDown),
            sent = self.tx.send(message) => {
                sent.map_err(|_| QueueError::Closed)?;
                metrics::gauge!("podrelay_queue_depth")
                    .set((self.tx.max_capacity() - self.tx.capacity()) as f64);
                Ok(())
            }
        }
    }
}

/// Single consumer that drains the queue at a fixed rate.
pub struct Dispatcher {
    rx: mpsc::Receiver<OutboundMessage>,
    notifier: Arc<dyn ChatNotifier>,
    period: Duration,
}

impl Dispatcher {
    /// Create a dispatcher.
    ///
    /// # Arguments
    ///
    /// * `rx` - Receiver half returned by [`DeliveryQueue::new`].
    /// * `notifier` - Sink the messages are delivered to.
    /// * `period` - Minimum interval between two deliveries.
    pub fn new(
        rx: mpsc::Receiver<OutboundMessage>,
        notifier: Arc<dyn ChatNotifier>,
        period: Duration,
    ) -> Self {
        Self {
            rx,
            notifier,
            period,
        }
    }

    /// Run the dispatch loop until cancelled and drained.
    ///
    /// Each message waits for a pacer tick before delivery, capping the
    /// global dispatch rate. On cancellation the loop switches to draining:
    /// producers already fail fast, so the backlog is finite; it is sent at
    /// the same paced rate and then the loop returns. The shutdown watchdog
    /// bounds how long that drain may take.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(period_ms = self.period.as_millis() as u64, "dispatcher started");

        let mut pacer = tokio::time::interval(self.period);
        pacer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                received = self.rx.recv() => {
                    match received {
                        Some(message) => {
                            pacer.tick().await;
                            self.dispatch(message).await;
                        }
                        None => {
                            info!("delivery queue closed");
                            return;
                        }
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }

        self.drain(&mut pacer).await;
    }

    /// Send the remaining backlog after cancellation.
    async fn drain(&mut self, pacer: &mut tokio::time::Interval) {
        let mut drained = 0usize;

        while let Ok(message) = self.rx.try_recv() {
            pacer.tick().await;
            self.dispatch(message).await;
            drained += 1;
        }

        if drained > 0 {
            info!(drained, "delivery queue drained");
        }
    }

    async fn dispatch(&self, message: OutboundMessage) {
        match self.notifier.deliver(&message).await {
            Ok(()) => {
                debug!(
                    container = %message.container,
                    notifier = %self.notifier.name(),
                    "message delivered"
                );
                metrics::counter!("podrelay_messages_sent_total").increment(1);
            }
            Err(e) => {
                // Best-effort contract: the message is gone.
                warn!(
                    container = %message.container,
                    notifier = %self.notifier.name(),
                    error = %e,
                    "delivery failed, message dropped"
                );
                metrics::counter!("podrelay_delivery_errors_total").increment(1);
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("period", &self.period)
            .finish()
    }
}
