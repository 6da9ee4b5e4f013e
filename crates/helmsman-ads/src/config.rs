//! Server configuration.

use std::collections::HashSet;
use std::time::Duration;

use helmsman_wire::TypeUrl;

/// Configuration for the aggregated discovery server.
#[derive(Debug, Clone)]
pub struct AdsConfig {
    /// Capacity of the global push queue.
    pub push_buffer_size: usize,
    /// Capacity of the per-stream inbound request buffer.
    pub request_buffer_size: usize,
    /// Capacity of the per-stream outbound response buffer.
    pub response_buffer_size: usize,
    /// How long one response send may block before the stream is failed with
    /// deadline-exceeded.
    pub send_timeout: Duration,
    /// How long an un-ACKed response may be outstanding before the
    /// connection counts as flow-controlled.
    pub flow_control_window: Duration,
    /// Type URLs that must be pushed first, in order. Any type not listed
    /// here is pushed afterwards in table order.
    pub push_order: Vec<String>,
    /// Type URLs whose push position is fixed by `push_order`.
    pub known_ordered_type_urls: HashSet<String>,
    /// Type URLs with wildcard semantics: an empty resource list means "all
    /// resources" rather than an unsubscribe.
    pub wildcard_type_urls: HashSet<String>,
}

impl Default for AdsConfig {
    fn default() -> Self {
        let push_order = vec![TypeUrl::SECRET.to_string()];
        let known_ordered_type_urls = push_order.iter().cloned().collect();
        Self {
            push_buffer_size: 10,
            request_buffer_size: 1,
            response_buffer_size: 16,
            send_timeout: Duration::from_secs(5),
            flow_control_window: Duration::from_secs(15),
            push_order,
            known_ordered_type_urls,
            wildcard_type_urls: [
                TypeUrl::CLUSTER,
                TypeUrl::ENDPOINT,
                TypeUrl::LISTENER,
                TypeUrl::ROUTE,
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

impl AdsConfig {
    /// Set the send timeout.
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Replace the wildcard type set.
    pub fn with_wildcard_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.wildcard_type_urls = types.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the push order. The known-ordered set follows it.
    pub fn with_push_order<I, S>(mut self, order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push_order = order.into_iter().map(Into::into).collect();
        self.known_ordered_type_urls = self.push_order.iter().cloned().collect();
        self
    }

    /// Whether an empty resource list means "everything" for this type.
    pub fn is_wildcard(&self, type_url: &str) -> bool {
        self.wildcard_type_urls.contains(type_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_treat_secrets_as_explicit() {
        let config = AdsConfig::default();
        assert!(config.is_wildcard(TypeUrl::CLUSTER));
        assert!(config.is_wildcard(TypeUrl::LISTENER));
        assert!(!config.is_wildcard(TypeUrl::SECRET));
    }

    #[test]
    fn secrets_are_pushed_first_by_default() {
        let config = AdsConfig::default();
        assert_eq!(config.push_order, vec![TypeUrl::SECRET.to_string()]);
        assert!(config.known_ordered_type_urls.contains(TypeUrl::SECRET));
    }

    #[test]
    fn push_order_override_updates_known_set() {
        let config = AdsConfig::default().with_push_order([TypeUrl::CLUSTER, TypeUrl::LISTENER]);
        assert!(config.known_ordered_type_urls.contains(TypeUrl::CLUSTER));
        assert!(!config.known_ordered_type_urls.contains(TypeUrl::SECRET));
    }
}
