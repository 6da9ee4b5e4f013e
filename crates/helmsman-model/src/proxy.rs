//! Per-proxy state: identity, metadata, and the watched-resource table.
//!
//! A [`Proxy`] is created from the `Node` on the first request of a stream
//! and lives until the stream terminates. It owns one [`WatchedResource`] per
//! subscribed type URL, guarded by a reader-writer lock; the request state
//! machine and the response emitter are the only writers.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Instant;

use helmsman_wire::{DiscoveryRequest, Node};

/// Metadata key selecting the generator bound to a proxy.
pub const METADATA_GENERATOR: &str = "GENERATOR";

/// Metadata key carrying the proxy's configuration namespace.
pub const METADATA_NAMESPACE: &str = "NAMESPACE";

/// Subscription and acknowledgement state for one (proxy, type URL) pair.
///
/// After a response is sent, `nonce_sent` and `version_sent` both hold the
/// push version it was built from; the connection is synced for the type once
/// the client echoes that nonce back (`nonce_acked == nonce_sent`).
#[derive(Debug, Clone, Default)]
pub struct WatchedResource {
    /// Type URL of the watched resource family.
    pub type_url: String,
    /// Resource names the proxy subscribes to. Order carries no meaning;
    /// comparisons treat this as a multiset.
    pub resource_names: Vec<String>,
    /// Version of the last response sent for this type.
    pub version_sent: String,
    /// Version of the last response the client ACKed.
    pub version_acked: String,
    /// Nonce of the last response sent for this type.
    pub nonce_sent: String,
    /// Nonce of the last response the client ACKed.
    pub nonce_acked: String,
    /// Nonce of the most recent NACK, empty if the last response was not
    /// rejected.
    pub nonce_nacked: String,
    /// The most recent inbound request for this type.
    pub last_request: Option<DiscoveryRequest>,
    /// When the last response was sent.
    pub last_sent: Option<Instant>,
    /// Payload size of the last response, in bytes.
    pub last_size: usize,
}

impl WatchedResource {
    /// Create a watch holding just the type URL. Used when a response is
    /// pushed for a type the proxy never asked about.
    pub fn new(type_url: impl Into<String>) -> Self {
        Self {
            type_url: type_url.into(),
            ..Default::default()
        }
    }

    /// Create a watch from the request that opened the subscription.
    pub fn from_request(request: &DiscoveryRequest) -> Self {
        Self {
            type_url: request.type_url.clone(),
            resource_names: request.resource_names.clone(),
            last_request: Some(request.clone()),
            ..Default::default()
        }
    }
}

/// Error parsing a `Node` into proxy identity.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// The node carried no id.
    #[error("missing node information")]
    MissingId,

    /// A well-known metadata key held a value of the wrong kind.
    #[error("invalid node metadata {key}: {reason}")]
    InvalidMetadata {
        /// The offending metadata key.
        key: String,
        /// Why the value was rejected.
        reason: String,
    },
}

/// A connected proxy: identity parsed from the first request plus the
/// watched-resource table.
#[derive(Debug)]
pub struct Proxy {
    /// Node identifier.
    id: String,
    /// Cluster the node reported.
    cluster: String,
    /// Configuration namespace, from metadata.
    namespace: String,
    /// Generator bound to this proxy for the lifetime of the stream, if the
    /// node metadata named one.
    generator: Option<String>,
    /// Watched resources by type URL. At most one entry per type.
    watched: RwLock<HashMap<String, WatchedResource>>,
}

impl Proxy {
    /// Parse proxy identity and metadata from a node record.
    pub fn from_node(node: &Node) -> Result<Self, NodeError> {
        if node.id.is_empty() {
            return Err(NodeError::MissingId);
        }

        let generator = metadata_string(node, METADATA_GENERATOR)?;
        let namespace = metadata_string(node, METADATA_NAMESPACE)?.unwrap_or_default();

        Ok(Self {
            id: node.id.clone(),
            cluster: node.cluster.clone(),
            namespace,
            generator,
            watched: RwLock::new(HashMap::new()),
        })
    }

    /// The node identifier.
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The cluster the node reported.
    #[inline]
    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    /// The configuration namespace, empty if the node did not report one.
    #[inline]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The generator bound to this proxy, if any.
    #[inline]
    pub fn generator(&self) -> Option<&str> {
        self.generator.as_deref()
    }

    /// Snapshot the watch for a type URL.
    pub fn watched(&self, type_url: &str) -> Option<WatchedResource> {
        self.watched
            .read()
            .expect("proxy lock poisoned")
            .get(type_url)
            .cloned()
    }

    /// Number of watched types.
    pub fn watched_count(&self) -> usize {
        self.watched.read().expect("proxy lock poisoned").len()
    }

    /// Snapshot all watches, in no particular order.
    pub fn watched_snapshot(&self) -> Vec<WatchedResource> {
        self.watched
            .read()
            .expect("proxy lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    /// Replace (or create) the watch for a type URL.
    pub fn insert_watched(&self, watched: WatchedResource) {
        self.watched
            .write()
            .expect("proxy lock poisoned")
            .insert(watched.type_url.clone(), watched);
    }

    /// Delete the watch for a type URL.
    pub fn remove_watched(&self, type_url: &str) {
        self.watched
            .write()
            .expect("proxy lock poisoned")
            .remove(type_url);
    }

    /// Mutate the watch for a type URL in place. Returns `false` if the type
    /// is not watched.
    pub fn update_watched<F>(&self, type_url: &str, f: F) -> bool
    where
        F: FnOnce(&mut WatchedResource),
    {
        let mut watched = self.watched.write().expect("proxy lock poisoned");
        match watched.get_mut(type_url) {
            Some(w) => {
                f(w);
                true
            }
            None => false,
        }
    }

    /// Mutate the watch for a type URL, creating a bare one first if the type
    /// is not watched yet.
    pub fn update_or_insert_watched<F>(&self, type_url: &str, f: F)
    where
        F: FnOnce(&mut WatchedResource),
    {
        let mut watched = self.watched.write().expect("proxy lock poisoned");
        let w = watched
            .entry(type_url.to_string())
            .or_insert_with(|| WatchedResource::new(type_url));
        f(w);
    }
}

/// Read a string field out of the node metadata. `Ok(None)` when the key is
/// absent, an error when it holds a non-string value.
fn metadata_string(node: &Node, key: &str) -> Result<Option<String>, NodeError> {
    let Some(metadata) = node.metadata.as_ref() else {
        return Ok(None);
    };
    let Some(value) = metadata.fields.get(key) else {
        return Ok(None);
    };
    match value.kind.as_ref() {
        Some(prost_types::value::Kind::StringValue(s)) => Ok(Some(s.clone())),
        _ => Err(NodeError::InvalidMetadata {
            key: key.to_string(),
            reason: "expected a string value".to_string(),
        }),
    }
}
