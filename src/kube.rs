//! Kubernetes log source.
//!
//! [`LogSource`] is the seam between the relay core and the cluster: listing
//! the pods a namespace currently runs, and opening a follow-mode log stream
//! for one (pod, container) pair. The production implementation
//! [`KubeLogSource`] talks to the API server through the `kube` crate; tests
//! substitute their own implementations.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, ListParams, LogParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tokio::sync::{mpsc, oneshot};
use tokio_util::compat::FuturesAsyncReadCompatExt;
use tokio_util::io::ReaderStream;
use tracing::info;

use crate::discovery::ResolvedSource;
use crate::error::{DiscoveryError, StreamError};

/// Byte stream of one container's log output.
pub type LogStream = BoxStream<'static, Result<Bytes, StreamError>>;

/// Chunks buffered between the API reader and the consuming worker. A
/// worker blocked on queue backpressure stalls the HTTP read once this
/// fills, rather than buffering the stream in memory.
const FORWARD_BUFFER: usize = 16;

/// Access to the cluster's pods and their log streams.
#[async_trait]
pub trait LogSource: Send + Sync {
    /// List the names of pods currently running in the namespace.
    async fn list_workloads(&self) -> Result<Vec<String>, DiscoveryError>;

    /// Open a follow-mode log stream for one source, starting from now.
    ///
    /// History is never replayed: lines logged before the stream opens (or
    /// between a disconnect and the reconnect) are not delivered.
    async fn open_stream(&self, source: &ResolvedSource) -> Result<LogStream, StreamError>;
}

/// [`LogSource`] backed by the Kubernetes API server.
pub struct KubeLogSource {
    pods: Api<Pod>,
}

impl KubeLogSource {
    /// Connect to the cluster and scope to one namespace.
    ///
    /// With `kubeconfig_path` set, credentials come from that file;
    /// otherwise the standard resolution applies (KUBECONFIG env var,
    /// then in-cluster service account).
    ///
    /// # Errors
    ///
    /// Returns `DiscoveryError::ClientBuild` if no usable client
    /// configuration can be constructed.
    pub async fn connect(
        kubeconfig_path: Option<&str>,
        namespace: &str,
    ) -> Result<Self, DiscoveryError> {
        let client = match kubeconfig_path {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path)
                    .map_err(|e| DiscoveryError::ClientBuild(e.to_string()))?;
                let config =
                    Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                        .await
                        .map_err(|e| DiscoveryError::ClientBuild(e.to_string()))?;
                Client::try_from(config)
                    .map_err(|e| DiscoveryError::ClientBuild(e.to_string()))?
            }
            None => Client::try_default()
                .await
                .map_err(|e| DiscoveryError::ClientBuild(e.to_string()))?,
        };

        info!(namespace = %namespace, "connected to kubernetes");

        Ok(Self {
            pods: Api::namespaced(client, namespace),
        })
    }
}

#[async_trait]
impl LogSource for KubeLogSource {
    async fn list_workloads(&self) -> Result<Vec<String>, DiscoveryError> {
        let pods = self
            .pods
            .list(&ListParams::default())
            .await
            .map_err(|e| DiscoveryError::ListFailed(e.to_string()))?;

        Ok(pods
            .items
            .into_iter()
            .filter_map(|pod| pod.metadata.name)
            .collect())
    }

    async fn open_stream(&self, source: &ResolvedSource) -> Result<LogStream, StreamError> {
        let pods = self.pods.clone();
        let source = source.clone();
        let (chunk_tx, chunk_rx) = mpsc::channel::<Result<Bytes, StreamError>>(FORWARD_BUFFER);
        let (opened_tx, opened_rx) = oneshot::channel::<Result<(), StreamError>>();

        // The API reader borrows its Api handle, so it lives inside a task
        // that owns one; chunks are forwarded through a bounded channel.
        tokio::spawn(async move {
            let params = LogParams {
                container: Some(source.container.clone()),
                follow: true,
                since_time: Some(Utc::now()),
                ..LogParams::default()
            };

            let reader = match pods.log_stream(&source.pod, &params).await {
                Ok(reader) => reader,
                Err(e) => {
                    let _ = opened_tx.send(Err(StreamError::OpenFailed(e.to_string())));
                    return;
                }
            };
            if opened_tx.send(Ok(())).is_err() {
                return;
            }

            // log_stream hands back a futures-io reader; adapt it for tokio.
            let chunks = ReaderStream::new(reader.compat());
            tokio::pin!(chunks);
            while let Some(chunk) = chunks.next().await {
                let item = chunk.map_err(|e| StreamError::Read(e.to_string()));
                let failed = item.is_err();
                if chunk_tx.send(item).await.is_err() || failed {
                    // Receiver dropped (worker stopped) or the read failed;
                    // either way this connection is done.
                    return;
                }
            }
        });

        opened_rx
            .await
            .map_err(|_| StreamError::OpenFailed("log stream task aborted".to_string()))??;

        Ok(receiver_stream(chunk_rx).boxed())
    }
}

/// Adapt a channel receiver into a `Stream` of its items.
fn receiver_stream<T: Send + 'static>(
    rx: mpsc::Receiver<T>,
) -> impl futures_util::Stream<Item = T> + Send {
    futures_util::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    })
}

impl std::fmt::Debug for KubeLogSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeLogSource").finish()
    }
}
