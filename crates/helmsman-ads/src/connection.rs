//! Per-stream connection state.
//!
//! One [`Connection`] exists per live discovery stream. It owns the outbound
//! sink and the sender sides of the per-connection channels; the stream loop
//! owns the receiver sides. The connection holds its [`Proxy`] once the first
//! request has been parsed; other subsystems locate a connection through the
//! server's registry by connection id, never through the proxy.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use tokio::sync::{mpsc, watch};
use tokio::time;
use tonic::Status;
use tracing::info;

use helmsman_model::{Proxy, PushRequest, WatchedResource};
use helmsman_wire::{DiscoveryRequest, DiscoveryResponse, ResponseSink, TypeUrl};

use crate::config::AdsConfig;

/// Counter behind connection ids, incremented for every new stream.
static CONNECTION_NUMBER: AtomicU64 = AtomicU64::new(0);

/// Build a connection id from the proxy id and the global stream counter.
pub(crate) fn connection_id(node_id: &str) -> String {
    let id = CONNECTION_NUMBER.fetch_add(1, Ordering::Relaxed) + 1;
    format!("{node_id}-{id}")
}

/// Whether a watched type is synced and whether the client is keeping up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStatus {
    /// The most recent response was ACKed (or NACKed, which also settles it).
    pub synced: bool,
    /// The last response has been outstanding longer than the flow-control
    /// window.
    pub flow_controlled: bool,
}

/// A live discovery stream.
pub struct Connection {
    /// Address of the peer, `0.0.0.0` when the transport did not report one.
    peer_addr: String,
    /// When the stream was accepted.
    connected_at: Instant,
    /// Connection id, set when the first request initializes the stream.
    con_id: OnceLock<String>,
    /// The proxy behind this stream, set at initialization.
    proxy: OnceLock<Arc<Proxy>>,
    /// Outbound half of the stream.
    sink: Box<dyn ResponseSink>,
    /// Sending on this channel results in a push handled by the stream loop.
    push_tx: mpsc::Sender<PushRequest>,
    /// Manual termination, used by debug surfaces and tests.
    stop_tx: mpsc::Sender<()>,
}

/// Receiver sides owned by the stream's main task.
pub(crate) struct ConnectionReceivers {
    pub req_rx: mpsc::Receiver<DiscoveryRequest>,
    pub push_rx: mpsc::Receiver<PushRequest>,
    pub stop_rx: mpsc::Receiver<()>,
    pub err_rx: mpsc::Receiver<Status>,
    pub initialized_rx: watch::Receiver<bool>,
}

/// Sender sides owned by the stream's receive task.
pub(crate) struct ReceiveHandles {
    pub req_tx: mpsc::Sender<DiscoveryRequest>,
    pub err_tx: mpsc::Sender<Status>,
    pub initialized_tx: watch::Sender<bool>,
}

impl Connection {
    /// Create a connection and the channel ends for its two tasks.
    pub(crate) fn new(
        peer_addr: String,
        sink: Box<dyn ResponseSink>,
        config: &AdsConfig,
    ) -> (Arc<Self>, ConnectionReceivers, ReceiveHandles) {
        let (req_tx, req_rx) = mpsc::channel(config.request_buffer_size);
        let (push_tx, push_rx) = mpsc::channel(1);
        let (stop_tx, stop_rx) = mpsc::channel(1);
        let (err_tx, err_rx) = mpsc::channel(1);
        let (initialized_tx, initialized_rx) = watch::channel(false);

        let con = Arc::new(Self {
            peer_addr,
            connected_at: Instant::now(),
            con_id: OnceLock::new(),
            proxy: OnceLock::new(),
            sink,
            push_tx,
            stop_tx,
        });

        (
            con,
            ConnectionReceivers {
                req_rx,
                push_rx,
                stop_rx,
                err_rx,
                initialized_rx,
            },
            ReceiveHandles {
                req_tx,
                err_tx,
                initialized_tx,
            },
        )
    }

    /// The peer address recorded at accept time.
    #[inline]
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }

    /// When the stream was accepted.
    #[inline]
    pub fn connected_at(&self) -> Instant {
        self.connected_at
    }

    /// The connection id, empty until the stream is initialized.
    pub fn con_id(&self) -> &str {
        self.con_id.get().map(String::as_str).unwrap_or("")
    }

    /// The proxy behind this stream, if initialized.
    pub fn proxy(&self) -> Option<&Arc<Proxy>> {
        self.proxy.get()
    }

    /// Bind identity at initialization. Only the receive task calls this, and
    /// only once.
    pub(crate) fn set_identity(&self, con_id: String, proxy: Arc<Proxy>) {
        let _ = self.con_id.set(con_id);
        let _ = self.proxy.set(proxy);
    }

    /// Enqueue a push event for this connection. Returns `false` when the
    /// stream loop is gone.
    pub(crate) async fn push(&self, request: PushRequest) -> bool {
        self.push_tx.send(request).await.is_ok()
    }

    /// Ask the stream loop to terminate with a clean result.
    pub async fn stop(&self) {
        let _ = self.stop_tx.send(()).await;
    }

    /// Snapshot the watch for a type URL.
    pub fn watched(&self, type_url: &str) -> Option<WatchedResource> {
        self.proxy()?.watched(type_url)
    }

    /// Whether the most recent response for a type was settled by the client,
    /// and whether the connection looks flow-controlled.
    pub fn synced(&self, type_url: &str, config: &AdsConfig) -> SyncStatus {
        let Some(watched) = self.watched(type_url) else {
            return SyncStatus::default();
        };
        let nacked = !watched.nonce_nacked.is_empty();
        SyncStatus {
            synced: nacked || watched.nonce_acked == watched.nonce_sent,
            flow_controlled: watched
                .last_sent
                .map(|sent| sent.elapsed() > config.flow_control_window)
                .unwrap_or(false),
        }
    }

    /// Send one response with the configured timeout, then update the watch
    /// bookkeeping. Debug-typed responses skip bookkeeping; an unsolicited
    /// push for an unwatched type creates its watch here.
    pub(crate) async fn send(
        &self,
        response: DiscoveryResponse,
        config: &AdsConfig,
    ) -> Result<(), Status> {
        let size: usize = response.resources.iter().map(|r| r.value.len()).sum();
        let type_url = response.type_url.clone();
        let nonce = response.nonce.clone();
        let version = response.version_info.clone();

        match time::timeout(config.send_timeout, self.sink.send(response)).await {
            Err(_) => {
                info!(con = %self.con_id(), "timeout writing response");
                Err(Status::deadline_exceeded("timed out sending response"))
            }
            Ok(Err(status)) => Err(status),
            Ok(Ok(())) => {
                if !nonce.is_empty() && !type_url.starts_with(TypeUrl::DEBUG_PREFIX) {
                    if let Some(proxy) = self.proxy() {
                        proxy.update_or_insert_watched(&type_url, move |w| {
                            w.nonce_sent = nonce;
                            w.version_sent = version;
                            w.last_sent = Some(Instant::now());
                            w.last_size = size;
                        });
                    }
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helmsman_wire::{Any, ChannelResponseSink, Node};
    use std::time::Duration;

    fn test_connection() -> (Arc<Connection>, tokio::sync::mpsc::Receiver<DiscoveryResponse>) {
        let config = AdsConfig::default();
        let (sink, rx) = ChannelResponseSink::new(4);
        let (con, _receivers, _handles) =
            Connection::new("0.0.0.0".into(), Box::new(sink), &config);
        let proxy = Proxy::from_node(&Node {
            id: "router-1".into(),
            ..Default::default()
        })
        .unwrap();
        con.set_identity(connection_id("router-1"), Arc::new(proxy));
        (con, rx)
    }

    fn response(type_url: &str, nonce: &str) -> DiscoveryResponse {
        DiscoveryResponse {
            type_url: type_url.into(),
            version_info: nonce.into(),
            nonce: nonce.into(),
            resources: vec![Any {
                type_url: type_url.into(),
                value: vec![0u8; 8],
            }],
            ..Default::default()
        }
    }

    #[test]
    fn connection_ids_are_unique_per_stream() {
        let a = connection_id("router-1");
        let b = connection_id("router-1");
        assert!(a.starts_with("router-1-"));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn send_updates_bookkeeping() {
        let (con, mut rx) = test_connection();
        let config = AdsConfig::default();

        con.send(response("T", "n1"), &config).await.unwrap();
        assert!(rx.recv().await.is_some());

        let w = con.watched("T").expect("watch created by send");
        assert_eq!(w.nonce_sent, "n1");
        assert_eq!(w.version_sent, "n1");
        assert_eq!(w.last_size, 8);
        assert!(w.last_sent.is_some());
    }

    #[tokio::test]
    async fn debug_types_skip_bookkeeping() {
        let (con, mut rx) = test_connection();
        let config = AdsConfig::default();

        let url = format!("{}/connections", TypeUrl::DEBUG_PREFIX);
        con.send(response(&url, "n1"), &config).await.unwrap();
        assert!(rx.recv().await.is_some());
        assert!(con.watched(&url).is_none());
    }

    #[tokio::test]
    async fn send_times_out_when_sink_is_full() {
        let (con, _rx) = test_connection();
        let config = AdsConfig::default().with_send_timeout(Duration::from_millis(20));

        // Fill the sink buffer; nobody is reading.
        for _ in 0..4 {
            con.send(response("T", "n1"), &config).await.unwrap();
        }

        let err = con.send(response("T", "n2"), &config).await.unwrap_err();
        assert_eq!(err.code(), tonic::Code::DeadlineExceeded);

        // Bookkeeping still reflects the last successful send.
        assert_eq!(con.watched("T").unwrap().nonce_sent, "n1");
    }

    #[tokio::test]
    async fn synced_reflects_ack_state() {
        let (con, mut rx) = test_connection();
        let config = AdsConfig::default();

        // Nothing sent yet: vacuously synced.
        assert!(!con.synced("T", &config).flow_controlled);

        con.send(response("T", "n1"), &config).await.unwrap();
        rx.recv().await.unwrap();
        assert!(!con.synced("T", &config).synced);

        con.proxy().unwrap().update_watched("T", |w| {
            w.nonce_acked = "n1".into();
        });
        assert!(con.synced("T", &config).synced);
    }

    #[tokio::test]
    async fn nack_counts_as_settled() {
        let (con, mut rx) = test_connection();
        let config = AdsConfig::default();

        con.send(response("T", "n1"), &config).await.unwrap();
        rx.recv().await.unwrap();

        con.proxy().unwrap().update_watched("T", |w| {
            w.nonce_nacked = "n1".into();
        });
        assert!(con.synced("T", &config).synced);
    }
}
