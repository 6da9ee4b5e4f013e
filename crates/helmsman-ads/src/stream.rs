//! The per-stream bidirectional event loop.
//!
//! Every stream runs exactly two cooperating tasks. The receive task blocks
//! in `recv`, performs initialization on the first request, and forwards
//! everything else to the request channel. The main task waits for the init
//! barrier, then selects over requests, push events, and the stop signal; it
//! is the only writer of the stream.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use tonic::Status;
use tracing::{error, info, warn};

use helmsman_model::{Proxy, PushRequest, ReasonStats, TriggerReason};
use helmsman_wire::{DiscoveryRequest, Node, RequestStream, ResponseSink, TypeUrl};

use crate::connection::{connection_id, Connection, ReceiveHandles};
use crate::error::{is_expected_termination, AdsError};
use crate::server::DiscoveryServer;

impl DiscoveryServer {
    /// Serve one aggregated discovery stream until the client disconnects,
    /// the transport fails, or a fatal error occurs. The error becomes the
    /// RPC result.
    pub async fn stream<R, S>(
        self: Arc<Self>,
        requests: R,
        sink: S,
        peer_addr: Option<SocketAddr>,
    ) -> Result<(), Status>
    where
        R: RequestStream,
        S: ResponseSink,
    {
        let peer_addr = peer_addr
            .map(|addr| addr.to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        let (con, mut receivers, handles) =
            Connection::new(peer_addr, Box::new(sink), self.config());

        // recv blocks, so reading happens on its own task. The push channel
        // is never closed here; it goes away with the connection.
        tokio::spawn(Arc::clone(&self).receive(requests, Arc::clone(&con), handles));

        // Nothing may touch the proxy until initialization completes. The
        // receive task opens the barrier even when it fails early.
        let mut initialized = receivers.initialized_rx;
        while !*initialized.borrow() {
            if initialized.changed().await.is_err() {
                break;
            }
        }

        loop {
            tokio::select! {
                request = receivers.req_rx.recv() => match request {
                    Some(request) => {
                        if let Err(err) = self.process_request(request, &con).await {
                            return Err(err.into());
                        }
                    }
                    // Remote side closed the stream or the receive task hit
                    // an error worth surfacing.
                    None => {
                        return match receivers.err_rx.recv().await {
                            Some(status) => Err(status),
                            None => Ok(()),
                        };
                    }
                },
                push = receivers.push_rx.recv() => {
                    if let Some(request) = push {
                        if let Err(err) = self.push_connection(&con, request).await {
                            return Err(err.into());
                        }
                    }
                },
                _ = receivers.stop_rx.recv() => return Ok(()),
            }
        }
    }

    /// The receive half: loop on `recv`, initialize on the first request,
    /// forward the rest.
    async fn receive<R>(self: Arc<Self>, mut requests: R, con: Arc<Connection>, handles: ReceiveHandles)
    where
        R: RequestStream,
    {
        let ReceiveHandles {
            req_tx,
            err_tx,
            initialized_tx,
        } = handles;

        let mut first_request = true;
        let mut registered = false;
        loop {
            let request = match requests.recv().await {
                Ok(Some(request)) => request,
                Ok(None) => {
                    info!(peer = con.peer_addr(), con = con.con_id(), "peer closed the stream");
                    break;
                }
                Err(status) => {
                    if is_expected_termination(&status) {
                        info!(
                            peer = con.peer_addr(),
                            con = con.con_id(),
                            %status,
                            "stream terminated",
                        );
                    } else {
                        error!(
                            peer = con.peer_addr(),
                            con = con.con_id(),
                            %status,
                            "stream terminated with error",
                        );
                        let _ = err_tx.send(status).await;
                    }
                    break;
                }
            };

            if first_request {
                // Probes can arrive before the first real request; they do
                // not carry an identity and must not consume the slot.
                if request.type_url == TypeUrl::HEALTH_PROBE {
                    warn!(
                        peer = con.peer_addr(),
                        "health probe received before first discovery request",
                    );
                    continue;
                }
                first_request = false;
                match self.init_connection(request.node.as_ref(), &con) {
                    Ok(()) => {
                        registered = true;
                        // The barrier opens only after the registry knows the
                        // connection, so a snapshot installed right now still
                        // reaches this proxy.
                        let _ = initialized_tx.send(true);
                        info!(con = con.con_id(), "new connection");
                    }
                    Err(err) => {
                        let _ = err_tx.send(err.into()).await;
                        break;
                    }
                }
            }

            if req_tx.send(request).await.is_err() {
                // Main task is gone.
                break;
            }
        }

        if registered {
            self.remove_connection(&con);
        }
        // Dropping the senders closes the request and error channels; the
        // barrier opens unconditionally so the main task can never hang on it.
        drop(req_tx);
        drop(err_tx);
        let _ = initialized_tx.send(true);
    }

    /// Parse identity off the first request, assign a connection id, and
    /// register for pushes.
    fn init_connection(&self, node: Option<&Node>, con: &Arc<Connection>) -> Result<(), AdsError> {
        let node = node.filter(|n| !n.id.is_empty()).ok_or(AdsError::MissingNode)?;
        let proxy = Arc::new(Proxy::from_node(node)?);
        let con_id = connection_id(proxy.id());
        con.set_identity(con_id.clone(), Arc::clone(&proxy));
        self.add_connection(con_id, Arc::clone(con));
        Ok(())
    }

    /// Handle one inbound request on the main task. A request that needs a
    /// response triggers a full push for its type from the current context.
    pub(crate) async fn process_request(
        &self,
        request: DiscoveryRequest,
        con: &Arc<Connection>,
    ) -> Result<(), AdsError> {
        self.metrics().record_request(&request.type_url);

        if !self.should_respond(con, &request) {
            return Ok(());
        }

        let push = self.global_push_context();
        let push_request = PushRequest {
            full: true,
            push: Some(Arc::clone(&push)),
            start: Some(Instant::now()),
            reason: ReasonStats::of(TriggerReason::ProxyRequest),
            ..Default::default()
        };
        self.push_xds(con, &push, con.watched(&request.type_url), &push_request)
            .await
    }
}
