//! # helmsman-ads
//!
//! The aggregated discovery server core.
//!
//! This crate implements the hard parts of an xDS control plane:
//!
//! - The per-stream bidirectional event loop: a receive task feeding a
//!   single owning task that multiplexes client requests and server pushes
//! - The ACK/NACK request state machine over per-proxy
//!   [`WatchedResource`](helmsman_model::WatchedResource) state
//! - The push engine: a global queue whose consumer stamps every event with
//!   a monotonic push version and fans it out to all live connections
//! - Generator dispatch by type URL with a configurable push order
//! - The thread-safe connection registry
//!
//! Configuration ingestion, snapshot construction, and generator
//! implementations live outside; they meet this crate at
//! [`DiscoveryServer::config_update`] and the
//! [`ResourceGenerator`](helmsman_model::ResourceGenerator) trait.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use helmsman_ads::{AdsService, DiscoveryServer};
//! use helmsman_model::Environment;
//!
//! let env = Arc::new(Environment::new());
//! let server = Arc::new(DiscoveryServer::new(env));
//!
//! // Run the push engine.
//! let (stop_tx, stop_rx) = tokio::sync::oneshot::channel();
//! tokio::spawn({
//!     let server = Arc::clone(&server);
//!     async move { server.run(stop_rx).await }
//! });
//!
//! // Register the gRPC service with the hosting process's router.
//! let service = AdsService::new(server).into_service();
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod connection;
mod error;
mod metrics;
mod push;
mod respond;
mod server;
mod service;
mod stream;


pub use config::AdsConfig;
pub use connection::{Connection, SyncStatus};
pub use error::{is_expected_termination, AdsError};
pub use metrics::AdsMetrics;
pub use server::{DiscoveryServer, ProxyNeedsPush};
pub use service::{AdsDeltaResponseStream, AdsResponseStream, AdsService};
