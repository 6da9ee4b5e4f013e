//! The gRPC face of the discovery server.
//!
//! [`AdsService`] implements the aggregated discovery service and hands each
//! accepted stream to [`DiscoveryServer::stream`]. The hosting process owns
//! the transport; it registers the service against its own router.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status, Streaming};
use tracing::debug;

use helmsman_wire::discovery::aggregated_discovery_service_server::{
    AggregatedDiscoveryService, AggregatedDiscoveryServiceServer,
};
use helmsman_wire::{
    DeltaDiscoveryRequest, DeltaDiscoveryResponse, DiscoveryRequest, DiscoveryResponse,
    GrpcResponseSink,
};

use crate::server::DiscoveryServer;

/// Aggregated discovery service backed by a [`DiscoveryServer`].
#[derive(Clone)]
pub struct AdsService {
    server: Arc<DiscoveryServer>,
}

impl AdsService {
    /// Wrap a discovery server.
    pub fn new(server: Arc<DiscoveryServer>) -> Self {
        Self { server }
    }

    /// The wrapped server.
    pub fn server(&self) -> &Arc<DiscoveryServer> {
        &self.server
    }

    /// Convert into a tonic service for registration with a gRPC router.
    pub fn into_service(self) -> AggregatedDiscoveryServiceServer<AdsService> {
        AggregatedDiscoveryServiceServer::new(self)
    }
}

/// Response stream type for the aggregated endpoint.
pub type AdsResponseStream = ReceiverStream<Result<DiscoveryResponse, Status>>;

/// Response stream type for the delta endpoint.
pub type AdsDeltaResponseStream = ReceiverStream<Result<DeltaDiscoveryResponse, Status>>;

#[async_trait]
impl AggregatedDiscoveryService for AdsService {
    type StreamAggregatedResourcesStream = AdsResponseStream;

    async fn stream_aggregated_resources(
        &self,
        request: Request<Streaming<DiscoveryRequest>>,
    ) -> Result<Response<Self::StreamAggregatedResourcesStream>, Status> {
        let peer_addr = request.remote_addr();
        let inbound = request.into_inner();

        let (tx, rx) = mpsc::channel(self.server.config().response_buffer_size);
        let sink = GrpcResponseSink::new(tx.clone());
        let server = Arc::clone(&self.server);

        tokio::spawn(async move {
            // The stream result is the RPC result: surface it as the final
            // item of the response stream.
            if let Err(status) = server.stream(inbound, sink, peer_addr).await {
                debug!(%status, "stream finished with error");
                let _ = tx.send(Err(status)).await;
            }
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }

    type DeltaAggregatedResourcesStream = AdsDeltaResponseStream;

    async fn delta_aggregated_resources(
        &self,
        _request: Request<Streaming<DeltaDiscoveryRequest>>,
    ) -> Result<Response<Self::DeltaAggregatedResourcesStream>, Status> {
        Err(Status::unimplemented("delta ads is not supported"))
    }
}
