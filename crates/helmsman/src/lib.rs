//! # helmsman
//!
//! A generic xDS aggregated discovery server for Rust control planes.
//!
//! Helmsman implements the server side of the aggregated discovery (ADS)
//! protocol: long-lived bidirectional streams, per-proxy subscription and
//! ACK/NACK tracking, and a push engine that fans configuration changes out
//! to every connected client. What the resources *are* is up to you: plug in
//! a [`ResourceGenerator`](prelude::ResourceGenerator) per type URL and feed
//! change events through
//! [`DiscoveryServer::config_update`](prelude::DiscoveryServer::config_update).
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use helmsman::prelude::*;
//!
//! let env = Arc::new(Environment::new());
//! let server = Arc::new(DiscoveryServer::new(env));
//! server.register_generator(TypeUrl::CLUSTER, Arc::new(MyClusterGenerator));
//!
//! // Run the push engine.
//! let (stop_tx, stop_rx) = tokio::sync::oneshot::channel();
//! tokio::spawn({
//!     let server = Arc::clone(&server);
//!     async move { server.run(stop_rx).await }
//! });
//!
//! // Register against the hosting gRPC router.
//! let service = AdsService::new(Arc::clone(&server)).into_service();
//!
//! // Announce config changes; connected proxies get pushed.
//! server.config_update(PushRequest::full(TriggerReason::ConfigUpdate)).await;
//! ```
//!
//! ## Architecture
//!
//! The library is organized into three crates:
//!
//! - `helmsman-wire` - xDS wire records, gRPC glue, and the transport traits
//! - `helmsman-model` - proxy state, push-request algebra, generator contract
//! - `helmsman-ads` - the stream loop, request state machine, and push engine
//!
//! This crate re-exports all public APIs for convenience.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub use helmsman_ads as ads;
pub use helmsman_model as model;
pub use helmsman_wire as wire;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use helmsman::prelude::*;
/// ```
pub mod prelude {
    // Wire types
    pub use helmsman_wire::{
        ChannelRequestStream, ChannelResponseSink, DiscoveryRequest, DiscoveryResponse, Node,
        RequestStream, Resource, ResponseSink, TypeUrl,
    };

    // Model types
    pub use helmsman_model::{
        ConfigKey, Environment, GeneratedResources, Proxy, PushContext, PushRequest, ReasonStats,
        ResourceGenerator, TriggerReason, WatchedResource,
    };

    // Server types
    pub use helmsman_ads::{
        AdsConfig, AdsService, Connection, DiscoveryServer, SyncStatus,
    };
}

/// Version information for this crate.
pub mod version {
    /// Crate version.
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");

    /// Minimum supported Rust version.
    pub const MSRV: &str = "1.75";

    /// Get version info as a string.
    pub fn version_string() -> String {
        format!("helmsman {} (MSRV {})", VERSION, MSRV)
    }
}

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use std::sync::Arc;

    #[test]
    fn prelude_imports_work() {
        let env = Arc::new(Environment::new());
        env.set_push_context(Arc::new(PushContext::new("v1")));

        let server = DiscoveryServer::new(Arc::clone(&env));
        assert_eq!(server.client_count(), 0);
        assert_eq!(server.global_push_context().push_version, "v1");
    }

    #[test]
    fn version_info() {
        let version = super::version::version_string();
        assert!(version.contains("helmsman"));
    }
}
