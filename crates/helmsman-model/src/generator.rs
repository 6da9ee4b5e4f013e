//! The generator contract: pluggable per-type producers of resource
//! payloads.
//!
//! One generator serves one resource family. The server resolves a generator
//! by the proxy's bound generator name or the type URL, invokes it with the
//! current push context, and streams whatever it returns. A generator that
//! returns `Ok(None)` has decided nothing changed and the type is skipped
//! silently.

use helmsman_wire::{Any, Resource};

use crate::proxy::{Proxy, WatchedResource};
use crate::push::{PushContext, PushRequest};

/// Boxed error returned by generators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Extra detail a generator attaches to the push log line.
#[derive(Debug, Clone, Default)]
pub struct XdsLogDetails {
    /// Whether the generator produced an incremental payload.
    pub incremental: bool,
    /// Free-form detail appended to the log line.
    pub additional_info: String,
}

/// Output of one generator invocation.
#[derive(Debug, Clone, Default)]
pub struct GeneratedResources {
    /// The resources to send.
    pub resources: Vec<Resource>,
    /// Detail for logging.
    pub log_details: XdsLogDetails,
}

impl GeneratedResources {
    /// Wrap a plain resource list with empty log detail.
    pub fn from_resources(resources: Vec<Resource>) -> Self {
        Self {
            resources,
            ..Default::default()
        }
    }
}

/// A producer of resource payloads for one resource family.
pub trait ResourceGenerator: Send + Sync {
    /// Compute the payload for `proxy` under the given snapshot.
    ///
    /// Returns `Ok(None)` to skip the type without a response, or an error to
    /// abort the push attempt.
    fn generate(
        &self,
        proxy: &Proxy,
        push: &PushContext,
        watched: &WatchedResource,
        request: &PushRequest,
    ) -> Result<Option<GeneratedResources>, BoxError>;
}

/// Unwrap generated resources into the `Any` payloads a response carries.
pub fn resources_to_any(resources: Vec<Resource>) -> Vec<Any> {
    resources
        .into_iter()
        .filter_map(|r| r.resource)
        .collect()
}
