//! Type URL handling for xDS resources.
//!
//! Type URLs identify the resource family a request or response belongs to.
//! This module provides the well-known constants plus the reserved health
//! probe and debug URLs the server treats specially.

use std::fmt;

/// Type URL wrapper for xDS resource types.
///
/// # Example
///
/// ```rust
/// use helmsman_wire::TypeUrl;
///
/// let cluster_type = TypeUrl::new(TypeUrl::CLUSTER);
/// assert_eq!(cluster_type.short_name(), "Cluster");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypeUrl(String);

impl TypeUrl {
    /// Type URL for Cluster (CDS).
    pub const CLUSTER: &'static str = "type.googleapis.com/envoy.config.cluster.v3.Cluster";

    /// Type URL for ClusterLoadAssignment (EDS).
    pub const ENDPOINT: &'static str =
        "type.googleapis.com/envoy.config.endpoint.v3.ClusterLoadAssignment";

    /// Type URL for Listener (LDS).
    pub const LISTENER: &'static str = "type.googleapis.com/envoy.config.listener.v3.Listener";

    /// Type URL for RouteConfiguration (RDS).
    pub const ROUTE: &'static str =
        "type.googleapis.com/envoy.config.route.v3.RouteConfiguration";

    /// Type URL for Secret (SDS).
    pub const SECRET: &'static str =
        "type.googleapis.com/envoy.extensions.transport_sockets.tls.v3.Secret";

    /// Reserved type URL for health probes. A first request carrying this URL
    /// is tolerated and ignored; it does not count as the first xDS request.
    pub const HEALTH_PROBE: &'static str =
        "type.googleapis.com/helmsman.health.v1.HealthInformation";

    /// Prefix reserved for debug resources. Responses under this prefix skip
    /// subscription bookkeeping.
    pub const DEBUG_PREFIX: &'static str = "helmsman.dev/debug";

    /// Create a new type URL from a string.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    /// Get the type URL as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Extract the short name from the type URL.
    ///
    /// For example, `type.googleapis.com/envoy.config.cluster.v3.Cluster`
    /// returns `Cluster`.
    #[must_use]
    pub fn short_name(&self) -> &str {
        short_name(&self.0)
    }

    /// Check whether this URL is under the reserved debug prefix.
    #[must_use]
    pub fn is_debug(&self) -> bool {
        self.0.starts_with(Self::DEBUG_PREFIX)
    }

    /// Consume and return the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Extract the short name from a type URL string.
#[must_use]
pub fn short_name(type_url: &str) -> &str {
    type_url
        .rsplit('/')
        .next()
        .and_then(|s| s.rsplit('.').next())
        .unwrap_or(type_url)
}

impl fmt::Display for TypeUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TypeUrl {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TypeUrl {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<TypeUrl> for String {
    fn from(t: TypeUrl) -> Self {
        t.0
    }
}

impl AsRef<str> for TypeUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_name() {
        let t = TypeUrl::new(TypeUrl::CLUSTER);
        assert_eq!(t.short_name(), "Cluster");

        let t = TypeUrl::new(TypeUrl::ENDPOINT);
        assert_eq!(t.short_name(), "ClusterLoadAssignment");
    }

    #[test]
    fn test_debug_prefix() {
        let t = TypeUrl::new(format!("{}/connections", TypeUrl::DEBUG_PREFIX));
        assert!(t.is_debug());

        let t = TypeUrl::new(TypeUrl::SECRET);
        assert!(!t.is_debug());
    }

    #[test]
    fn test_short_name_on_bare_string() {
        assert_eq!(short_name("no-separators"), "no-separators");
    }
}
