//! # helmsman-model
//!
//! Proxy-facing state for the helmsman discovery server:
//!
//! - [`Proxy`] and its [`WatchedResource`] table: per-client subscription and
//!   acknowledgement state
//! - [`PushRequest`] with its merge algebra, [`PushContext`] snapshots, and
//!   the shared [`Environment`]
//! - The [`ResourceGenerator`] contract implemented by per-type payload
//!   producers

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod generator;
mod proxy;
mod push;

pub use generator::{
    resources_to_any, BoxError, GeneratedResources, ResourceGenerator, XdsLogDetails,
};
pub use proxy::{
    NodeError, Proxy, WatchedResource, METADATA_GENERATOR, METADATA_NAMESPACE,
};
pub use push::{
    ConfigKey, Environment, PushContext, PushRequest, ReasonStats, ResourceDelta, TriggerReason,
};
