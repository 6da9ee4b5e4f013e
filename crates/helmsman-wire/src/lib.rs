//! # helmsman-wire
//!
//! Wire types and transport surface for the helmsman discovery server.
//!
//! This crate carries:
//!
//! - Hand-maintained mirrors of the xDS discovery records
//!   ([`DiscoveryRequest`], [`DiscoveryResponse`] and the delta variants),
//!   tag-compatible with `envoy.service.discovery.v3`
//! - The gRPC service glue for the aggregated discovery service
//! - [`TypeUrl`] constants and helpers, including the reserved health-probe
//!   and debug URLs
//! - The [`RequestStream`] / [`ResponseSink`] transport traits with tonic and
//!   in-memory channel implementations

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod discovery;
pub mod node;
pub mod rpc;
mod transport;
mod type_url;

pub use discovery::{
    DeltaDiscoveryRequest, DeltaDiscoveryResponse, DiscoveryRequest, DiscoveryResponse, Resource,
};
pub use node::{Locality, Node};
pub use transport::{
    ChannelRequestStream, ChannelResponseSink, GrpcResponseSink, RequestStream, ResponseSink,
};
pub use type_url::{short_name, TypeUrl};

// Re-export prost types used in the public API.
pub use prost_types::{Any, Struct};
