//! Transport surface for discovery streams.
//!
//! The discovery server is written against two narrow traits rather than the
//! gRPC types directly: [`RequestStream`] for the inbound half and
//! [`ResponseSink`] for the outbound half. The tonic stream and a plain
//! channel pair both implement them, so the same stream loop serves real
//! connections and in-memory ones.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tonic::{Status, Streaming};

use crate::discovery::{DiscoveryRequest, DiscoveryResponse};

/// Receiving half of a discovery stream.
#[async_trait]
pub trait RequestStream: Send + 'static {
    /// Receive the next request.
    ///
    /// Returns `Ok(None)` when the peer closed the stream cleanly and an
    /// error for transport failures.
    async fn recv(&mut self) -> Result<Option<DiscoveryRequest>, Status>;
}

/// Sending half of a discovery stream.
///
/// Sends are awaited by the single stream-owning task; implementations only
/// need `&self` so the sink can be shared with queries.
#[async_trait]
pub trait ResponseSink: Send + Sync + 'static {
    /// Send one response to the peer. Blocks while the transport applies
    /// backpressure.
    async fn send(&self, response: DiscoveryResponse) -> Result<(), Status>;
}

#[async_trait]
impl RequestStream for Streaming<DiscoveryRequest> {
    async fn recv(&mut self) -> Result<Option<DiscoveryRequest>, Status> {
        self.message().await
    }
}

/// Outbound half of a gRPC stream: responses are queued onto the channel
/// backing the RPC's response stream.
#[derive(Debug, Clone)]
pub struct GrpcResponseSink {
    tx: mpsc::Sender<Result<DiscoveryResponse, Status>>,
}

impl GrpcResponseSink {
    /// Wrap the sender side of an RPC response channel.
    pub fn new(tx: mpsc::Sender<Result<DiscoveryResponse, Status>>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl ResponseSink for GrpcResponseSink {
    async fn send(&self, response: DiscoveryResponse) -> Result<(), Status> {
        self.tx
            .send(Ok(response))
            .await
            .map_err(|_| Status::unavailable("client disconnected"))
    }
}

/// Channel-backed request stream, for embedding and tests.
#[derive(Debug)]
pub struct ChannelRequestStream {
    rx: mpsc::Receiver<Result<DiscoveryRequest, Status>>,
}

impl ChannelRequestStream {
    /// Create a request stream plus the sender used to drive it. Dropping the
    /// sender ends the stream cleanly.
    pub fn new(buffer: usize) -> (mpsc::Sender<Result<DiscoveryRequest, Status>>, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (tx, Self { rx })
    }
}

#[async_trait]
impl RequestStream for ChannelRequestStream {
    async fn recv(&mut self) -> Result<Option<DiscoveryRequest>, Status> {
        match self.rx.recv().await {
            Some(Ok(req)) => Ok(Some(req)),
            Some(Err(status)) => Err(status),
            None => Ok(None),
        }
    }
}

/// Channel-backed response sink, for embedding and tests.
#[derive(Debug, Clone)]
pub struct ChannelResponseSink {
    tx: mpsc::Sender<DiscoveryResponse>,
}

impl ChannelResponseSink {
    /// Create a response sink plus the receiver observing sent responses.
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<DiscoveryResponse>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ResponseSink for ChannelResponseSink {
    async fn send(&self, response: DiscoveryResponse) -> Result<(), Status> {
        self.tx
            .send(response)
            .await
            .map_err(|_| Status::unavailable("client disconnected"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_stream_forwards_requests() {
        let (tx, mut stream) = ChannelRequestStream::new(4);

        tx.send(Ok(DiscoveryRequest {
            type_url: "t".into(),
            ..Default::default()
        }))
        .await
        .unwrap();

        let req = stream.recv().await.unwrap().unwrap();
        assert_eq!(req.type_url, "t");
    }

    #[tokio::test]
    async fn channel_stream_ends_when_sender_drops() {
        let (tx, mut stream) = ChannelRequestStream::new(1);
        drop(tx);
        assert!(stream.recv().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn channel_stream_surfaces_errors() {
        let (tx, mut stream) = ChannelRequestStream::new(1);
        tx.send(Err(Status::cancelled("context canceled")))
            .await
            .unwrap();
        assert!(stream.recv().await.is_err());
    }

    #[tokio::test]
    async fn channel_sink_fails_after_receiver_drops() {
        let (sink, rx) = ChannelResponseSink::new(1);
        drop(rx);
        let err = sink.send(DiscoveryResponse::default()).await.unwrap_err();
        assert_eq!(err.code(), tonic::Code::Unavailable);
    }
}
