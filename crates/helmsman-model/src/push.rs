//! Push requests and the global push context.
//!
//! A [`PushRequest`] describes one pending fan-out event: whether it is a
//! full push, which configs changed, why it was triggered, and which
//! [`PushContext`] snapshot responses should be built from. Requests merge
//! associatively so an upstream debouncer can collapse bursts.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Instant;

/// Identity of one configuration object, used to scope incremental pushes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigKey {
    /// Kind of the configuration object.
    pub kind: String,
    /// Object name.
    pub name: String,
    /// Object namespace.
    pub namespace: String,
}

impl ConfigKey {
    /// Create a config key.
    pub fn new(
        kind: impl Into<String>,
        name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            namespace: namespace.into(),
        }
    }
}

/// Why a push was requested. A fixed set of values so trigger metrics stay
/// low-cardinality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerReason {
    /// A configuration object changed.
    ConfigUpdate,
    /// Endpoints of a service changed.
    EndpointUpdate,
    /// The proxy itself requested resources.
    ProxyRequest,
    /// A single proxy needs an update.
    ProxyUpdate,
    /// Something changed that affects the whole mesh.
    GlobalUpdate,
}

impl TriggerReason {
    /// Stable label for metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerReason::ConfigUpdate => "config",
            TriggerReason::EndpointUpdate => "endpoint",
            TriggerReason::ProxyRequest => "proxyrequest",
            TriggerReason::ProxyUpdate => "proxyupdate",
            TriggerReason::GlobalUpdate => "global",
        }
    }
}

/// Multiset of trigger reasons. Counts are kept rather than deduplicated
/// because they feed per-trigger histograms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReasonStats(HashMap<TriggerReason, u64>);

impl ReasonStats {
    /// A multiset holding one occurrence of `reason`.
    pub fn of(reason: TriggerReason) -> Self {
        let mut stats = Self::default();
        stats.add(reason);
        stats
    }

    /// Record one occurrence of `reason`.
    pub fn add(&mut self, reason: TriggerReason) {
        *self.0.entry(reason).or_insert(0) += 1;
    }

    /// Fold another multiset into this one.
    pub fn merge(&mut self, other: &ReasonStats) {
        for (reason, count) in &other.0 {
            *self.0.entry(*reason).or_insert(0) += count;
        }
    }

    /// Whether `reason` occurs at least once.
    pub fn has(&self, reason: TriggerReason) -> bool {
        self.0.contains_key(&reason)
    }

    /// Total occurrences across all reasons.
    pub fn count(&self) -> u64 {
        self.0.values().sum()
    }

    /// Number of distinct reasons.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no reason was recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over (reason, count) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&TriggerReason, &u64)> {
        self.0.iter()
    }
}

/// Subscription change carried by a client request, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceDelta {
    /// Resources newly subscribed to.
    pub subscribed: Vec<String>,
    /// Resources no longer subscribed to.
    pub unsubscribed: Vec<String>,
}

impl ResourceDelta {
    /// Whether the delta changes nothing.
    pub fn is_empty(&self) -> bool {
        self.subscribed.is_empty() && self.unsubscribed.is_empty()
    }
}

/// Immutable snapshot of the configuration state at one point in time.
///
/// `push_version` is globally unique and monotonic; it doubles as both the
/// version and the nonce of every response built from this snapshot, so an
/// ACK always names the snapshot it acknowledges.
#[derive(Debug, Clone, Default)]
pub struct PushContext {
    /// Version stamp assigned when the snapshot was installed.
    pub push_version: String,
}

impl PushContext {
    /// Create a snapshot carrying the given version stamp.
    pub fn new(push_version: impl Into<String>) -> Self {
        Self {
            push_version: push_version.into(),
        }
    }
}

/// One pending push event.
#[derive(Debug, Clone, Default)]
pub struct PushRequest {
    /// Whether a full push is required. Incremental pushes skip context
    /// recomputation and standard push metrics.
    pub full: bool,
    /// Configs that changed. Empty means the update affects every proxy; with
    /// `full` set that is a global full push, without it an incremental push
    /// to everyone.
    pub configs_updated: HashSet<ConfigKey>,
    /// Snapshot responses should be built from. Attached by the push engine;
    /// may be unset while the request waits in the queue.
    pub push: Option<Arc<PushContext>>,
    /// When the push entered the queue.
    pub start: Option<Instant>,
    /// Why the push was requested.
    pub reason: ReasonStats,
    /// Subscription change that triggered the push, if it came from a client
    /// request.
    pub delta: ResourceDelta,
}

impl PushRequest {
    /// A full push for everything, with the given trigger reason.
    pub fn full(reason: TriggerReason) -> Self {
        Self {
            full: true,
            reason: ReasonStats::of(reason),
            ..Default::default()
        }
    }

    /// Merge two optional requests, preserving either when the other is
    /// absent. Usage follows `a = PushRequest::merge(a, b)`.
    pub fn merge(pr: Option<PushRequest>, other: Option<PushRequest>) -> Option<PushRequest> {
        match (pr, other) {
            (None, other) => other,
            (pr, None) => pr,
            (Some(pr), Some(other)) => Some(pr.merge_with(other)),
        }
    }

    /// Merge another request into this one.
    ///
    /// The combined request is full if either side was; the newer push
    /// context wins; the older start time wins; reasons accumulate without
    /// deduplication; and the changed-config sets union unless either side
    /// already affected everyone.
    pub fn merge_with(mut self, other: PushRequest) -> PushRequest {
        // If either is full we need a full push
        self.full = self.full || other.full;

        // The other push context is presumed to be later and more up to date
        if other.push.is_some() {
            self.push = other.push;
        }

        // Keep the first (older) start time
        if self.start.is_none() {
            self.start = other.start;
        }

        self.reason.merge(&other.reason);

        // Do not merge when either side affects everyone
        if self.configs_updated.is_empty() || other.configs_updated.is_empty() {
            self.configs_updated = HashSet::new();
        } else {
            self.configs_updated.extend(other.configs_updated);
        }

        self
    }

    /// Whether this push exists only because a proxy asked for resources.
    pub fn is_request(&self) -> bool {
        self.reason.len() == 1 && self.reason.has(TriggerReason::ProxyRequest)
    }

    /// Suffix for log lines distinguishing request-driven pushes.
    pub fn push_reason(&self) -> &'static str {
        if self.is_request() {
            " request"
        } else {
            ""
        }
    }
}

/// Shared environment: the currently installed push context behind a
/// reader-writer guard. The push engine is the only writer; new snapshots
/// replace the pointer atomically.
#[derive(Debug, Default)]
pub struct Environment {
    push_context: RwLock<Arc<PushContext>>,
}

impl Environment {
    /// Create an environment with an empty initial snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// The currently installed snapshot.
    pub fn push_context(&self) -> Arc<PushContext> {
        Arc::clone(&self.push_context.read().expect("environment lock poisoned"))
    }

    /// Install a new snapshot.
    pub fn set_push_context(&self, push: Arc<PushContext>) {
        *self.push_context.write().expect("environment lock poisoned") = push;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyed(names: &[&str]) -> HashSet<ConfigKey> {
        names
            .iter()
            .map(|n| ConfigKey::new("service", *n, "default"))
            .collect()
    }

    #[test]
    fn merge_none_is_identity() {
        let req = PushRequest::full(TriggerReason::ConfigUpdate);
        let merged = PushRequest::merge(None, Some(req.clone())).unwrap();
        assert!(merged.full);

        let merged = PushRequest::merge(Some(req), None).unwrap();
        assert!(merged.full);

        assert!(PushRequest::merge(None, None).is_none());
    }

    #[test]
    fn merge_full_is_or() {
        let a = PushRequest {
            full: false,
            configs_updated: keyed(&["a"]),
            ..Default::default()
        };
        let b = PushRequest {
            full: true,
            configs_updated: keyed(&["b"]),
            ..Default::default()
        };
        assert!(a.merge_with(b).full);
    }

    #[test]
    fn merge_unions_configs() {
        let a = PushRequest {
            configs_updated: keyed(&["a"]),
            ..Default::default()
        };
        let b = PushRequest {
            configs_updated: keyed(&["b"]),
            ..Default::default()
        };
        let merged = a.merge_with(b);
        assert_eq!(merged.configs_updated.len(), 2);
    }

    #[test]
    fn merge_empty_configs_absorbs() {
        let a = PushRequest {
            configs_updated: keyed(&["a"]),
            ..Default::default()
        };
        let b = PushRequest::default();
        let merged = a.merge_with(b);
        assert!(merged.configs_updated.is_empty());
    }

    #[test]
    fn merge_newer_push_context_wins() {
        let a = PushRequest {
            push: Some(Arc::new(PushContext::new("v1"))),
            ..Default::default()
        };
        let b = PushRequest {
            push: Some(Arc::new(PushContext::new("v2"))),
            ..Default::default()
        };
        let merged = a.merge_with(b);
        assert_eq!(merged.push.unwrap().push_version, "v2");
    }

    #[test]
    fn merge_keeps_older_start() {
        let early = Instant::now();
        let a = PushRequest {
            start: Some(early),
            ..Default::default()
        };
        let b = PushRequest {
            start: Some(Instant::now()),
            ..Default::default()
        };
        assert_eq!(a.merge_with(b).start, Some(early));
    }

    #[test]
    fn merge_accumulates_reasons() {
        let a = PushRequest::full(TriggerReason::ConfigUpdate);
        let b = PushRequest::full(TriggerReason::ConfigUpdate);
        let merged = a.merge_with(b);
        assert_eq!(merged.reason.count(), 2);
    }

    #[test]
    fn merge_is_associative() {
        let a = PushRequest {
            configs_updated: keyed(&["a"]),
            reason: ReasonStats::of(TriggerReason::ConfigUpdate),
            ..Default::default()
        };
        let b = PushRequest {
            full: true,
            configs_updated: keyed(&["b"]),
            reason: ReasonStats::of(TriggerReason::EndpointUpdate),
            ..Default::default()
        };
        let c = PushRequest {
            configs_updated: keyed(&["c"]),
            reason: ReasonStats::of(TriggerReason::ConfigUpdate),
            ..Default::default()
        };

        let left = a.clone().merge_with(b.clone()).merge_with(c.clone());
        let right = a.merge_with(b.merge_with(c));

        assert_eq!(left.full, right.full);
        assert_eq!(left.configs_updated, right.configs_updated);
        assert_eq!(left.reason, right.reason);
    }

    #[test]
    fn is_request_only_for_lone_proxy_request() {
        let req = PushRequest {
            reason: ReasonStats::of(TriggerReason::ProxyRequest),
            ..Default::default()
        };
        assert!(req.is_request());
        assert_eq!(req.push_reason(), " request");

        let mut mixed = req.clone();
        mixed.reason.add(TriggerReason::ConfigUpdate);
        assert!(!mixed.is_request());
    }

    #[test]
    fn environment_swaps_snapshots() {
        let env = Environment::new();
        assert!(env.push_context().push_version.is_empty());

        env.set_push_context(Arc::new(PushContext::new("2024-01-01T00:00:00Z/1")));
        assert_eq!(env.push_context().push_version, "2024-01-01T00:00:00Z/1");
    }
}
