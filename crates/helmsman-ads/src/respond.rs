//! The ACK/NACK request state machine.
//!
//! `should_respond` classifies every inbound request against the proxy's
//! watch for its type URL and decides whether a response is owed, applying
//! the protocol's ack/nack rules: the previous watch state is the server
//! side of the handshake, the request is the client side.

use std::collections::HashMap;

use tracing::{debug, warn};

use helmsman_model::WatchedResource;
use helmsman_wire::{short_name, DiscoveryRequest};

use crate::connection::Connection;
use crate::server::DiscoveryServer;

impl DiscoveryServer {
    /// Decide whether `request` needs a response, updating the proxy's watch
    /// table on the way.
    ///
    /// The classification depends only on the request, the previous watch
    /// state, and the configured wildcard set.
    pub(crate) fn should_respond(&self, con: &Connection, request: &DiscoveryRequest) -> bool {
        let Some(proxy) = con.proxy() else {
            return false;
        };
        let stype = short_name(&request.type_url);

        // An error detail means the previous response was rejected. Nothing
        // to send; the request's version info can no longer be trusted.
        if let Some(detail) = request.error_detail.as_ref() {
            warn!(
                type_url = stype,
                con = con.con_id(),
                code = detail.code,
                message = %detail.message,
                "client rejected configuration",
            );
            self.metrics().record_nack(&request.type_url);
            proxy.update_watched(&request.type_url, |w| {
                w.nonce_nacked = request.response_nonce.clone();
            });
            return false;
        }

        if self.should_unsubscribe(request) {
            debug!(
                type_url = stype,
                con = con.con_id(),
                version = %request.version_info,
                nonce = %request.response_nonce,
                "unsubscribe",
            );
            proxy.remove_watched(&request.type_url);
            return false;
        }

        // First request for this type on the stream.
        if request.response_nonce.is_empty() {
            debug!(
                type_url = stype,
                con = con.con_id(),
                version = %request.version_info,
                "init",
            );
            proxy.insert_watched(WatchedResource::from_request(request));
            return true;
        }

        // A nonce with no watch on record: the client reconnected (or the
        // server restarted). Respond with the current state.
        let Some(previous) = proxy.watched(&request.type_url) else {
            debug!(
                type_url = stype,
                con = con.con_id(),
                version = %request.version_info,
                nonce = %request.response_nonce,
                "reconnect",
            );
            proxy.insert_watched(WatchedResource::from_request(request));
            return true;
        };

        // A nonce becomes stale once a newer one has been sent.
        if request.response_nonce != previous.nonce_sent {
            debug!(
                type_url = stype,
                con = con.con_id(),
                received = %request.response_nonce,
                sent = %previous.nonce_sent,
                "expired nonce",
            );
            proxy.update_watched(&request.type_url, |w| {
                w.nonce_nacked.clear();
                w.last_request = Some(request.clone());
            });
            return false;
        }

        // Nonce match: an ACK. Record it, and respond only when the client
        // changed its resource subscription in the same breath.
        let previous_names = previous.resource_names;
        proxy.update_watched(&request.type_url, |w| {
            w.version_acked = request.version_info.clone();
            w.nonce_acked = request.response_nonce.clone();
            w.nonce_nacked.clear();
            w.resource_names = request.resource_names.clone();
            w.last_request = Some(request.clone());
        });

        if list_equal_unordered(&previous_names, &request.resource_names) {
            debug!(
                type_url = stype,
                con = con.con_id(),
                version = %request.version_info,
                nonce = %request.response_nonce,
                "ack",
            );
            return false;
        }
        debug!(
            type_url = stype,
            con = con.con_id(),
            previous = ?previous_names,
            new = ?request.resource_names,
            "resource change",
        );
        true
    }

    /// An empty resource list on a non-wildcard type drops the subscription.
    /// This also covers initial requests: a type nobody needs is never added
    /// to the watch table.
    fn should_unsubscribe(&self, request: &DiscoveryRequest) -> bool {
        request.resource_names.is_empty() && !self.config().is_wildcard(&request.type_url)
    }
}

/// Multiset equality over resource names: same names, same multiplicities,
/// any order.
pub(crate) fn list_equal_unordered(a: &[String], b: &[String]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut counts: HashMap<&str, i64> = HashMap::with_capacity(a.len());
    for name in a {
        *counts.entry(name.as_str()).or_insert(0) += 1;
    }
    for name in b {
        match counts.get_mut(name.as_str()) {
            Some(count) => {
                *count -= 1;
                if *count < 0 {
                    return false;
                }
            }
            None => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use helmsman_model::{Environment, Proxy};
    use helmsman_wire::{rpc, ChannelResponseSink, Node, TypeUrl};

    use crate::connection::connection_id;
    use crate::AdsConfig;

    fn server() -> DiscoveryServer {
        DiscoveryServer::new(Arc::new(Environment::new()))
    }

    fn connection(config: &AdsConfig) -> Arc<Connection> {
        let (sink, _rx) = ChannelResponseSink::new(4);
        let (con, _receivers, _handles) =
            Connection::new("0.0.0.0".into(), Box::new(sink), config);
        let proxy = Proxy::from_node(&Node {
            id: "router-1".into(),
            ..Default::default()
        })
        .unwrap();
        con.set_identity(connection_id("router-1"), Arc::new(proxy));
        con
    }

    fn request(type_url: &str, names: &[&str], nonce: &str) -> DiscoveryRequest {
        DiscoveryRequest {
            type_url: type_url.into(),
            resource_names: names.iter().map(|s| s.to_string()).collect(),
            response_nonce: nonce.into(),
            ..Default::default()
        }
    }

    fn mark_sent(con: &Connection, type_url: &str, nonce: &str) {
        con.proxy().unwrap().update_or_insert_watched(type_url, |w| {
            w.nonce_sent = nonce.into();
            w.version_sent = nonce.into();
        });
    }

    #[test]
    fn init_creates_watch_and_responds() {
        let server = server();
        let con = connection(server.config());

        let responds = server.should_respond(&con, &request(TypeUrl::CLUSTER, &["a", "b"], ""));
        assert!(responds);

        let w = con.watched(TypeUrl::CLUSTER).unwrap();
        assert_eq!(w.resource_names, vec!["a", "b"]);
        assert!(w.last_request.is_some());
    }

    #[test]
    fn nack_records_nonce_without_response() {
        let server = server();
        let con = connection(server.config());

        assert!(server.should_respond(&con, &request(TypeUrl::CLUSTER, &["a"], "")));
        mark_sent(&con, TypeUrl::CLUSTER, "n1");

        let mut nack = request(TypeUrl::CLUSTER, &["a"], "n1");
        nack.error_detail = Some(rpc::Status {
            code: 3,
            message: "bad".into(),
            details: vec![],
        });

        assert!(!server.should_respond(&con, &nack));
        assert_eq!(con.watched(TypeUrl::CLUSTER).unwrap().nonce_nacked, "n1");
    }

    #[test]
    fn nack_for_unwatched_type_is_ignored() {
        let server = server();
        let con = connection(server.config());

        let mut nack = request(TypeUrl::CLUSTER, &["a"], "n1");
        nack.error_detail = Some(rpc::Status::default());

        assert!(!server.should_respond(&con, &nack));
        assert!(con.watched(TypeUrl::CLUSTER).is_none());
    }

    #[test]
    fn empty_names_on_wildcard_type_is_not_unsubscribe() {
        let server = server();
        let con = connection(server.config());

        // Wildcard init with no names still subscribes and responds.
        assert!(server.should_respond(&con, &request(TypeUrl::CLUSTER, &[], "")));
        assert!(con.watched(TypeUrl::CLUSTER).is_some());
    }

    #[test]
    fn empty_names_on_explicit_type_unsubscribes() {
        let server = server();
        let con = connection(server.config());

        assert!(server.should_respond(&con, &request(TypeUrl::SECRET, &["s1"], "")));
        mark_sent(&con, TypeUrl::SECRET, "n1");

        assert!(!server.should_respond(&con, &request(TypeUrl::SECRET, &[], "n1")));
        assert!(con.watched(TypeUrl::SECRET).is_none());
    }

    #[test]
    fn nonce_with_no_watch_is_a_reconnect() {
        let server = server();
        let con = connection(server.config());

        let responds =
            server.should_respond(&con, &request(TypeUrl::CLUSTER, &["a"], "old-nonce"));
        assert!(responds);
        assert_eq!(
            con.watched(TypeUrl::CLUSTER).unwrap().resource_names,
            vec!["a"]
        );
    }

    #[test]
    fn stale_nonce_never_responds() {
        let server = server();
        let con = connection(server.config());

        assert!(server.should_respond(&con, &request(TypeUrl::CLUSTER, &["a"], "")));
        mark_sent(&con, TypeUrl::CLUSTER, "n2");
        con.proxy().unwrap().update_watched(TypeUrl::CLUSTER, |w| {
            w.nonce_nacked = "n1".into();
        });

        let stale = request(TypeUrl::CLUSTER, &["a"], "n1");
        assert!(!server.should_respond(&con, &stale));

        let w = con.watched(TypeUrl::CLUSTER).unwrap();
        assert!(w.nonce_nacked.is_empty(), "stale request clears the nack");
        assert_eq!(w.last_request.unwrap().response_nonce, "n1");
    }

    #[test]
    fn matching_ack_records_and_stays_silent() {
        let server = server();
        let con = connection(server.config());

        assert!(server.should_respond(&con, &request(TypeUrl::CLUSTER, &["a", "b"], "")));
        mark_sent(&con, TypeUrl::CLUSTER, "n1");

        let mut ack = request(TypeUrl::CLUSTER, &["b", "a"], "n1");
        ack.version_info = "n1".into();
        assert!(!server.should_respond(&con, &ack));

        let w = con.watched(TypeUrl::CLUSTER).unwrap();
        assert_eq!(w.nonce_acked, "n1");
        assert_eq!(w.version_acked, "n1");

        // Re-sending the identical ACK changes nothing and stays silent.
        let mut repeat = request(TypeUrl::CLUSTER, &["a", "b"], "n1");
        repeat.version_info = "n1".into();
        assert!(!server.should_respond(&con, &repeat));
        assert_eq!(con.watched(TypeUrl::CLUSTER).unwrap().nonce_acked, "n1");
    }

    #[test]
    fn resource_change_on_ack_responds() {
        let server = server();
        let con = connection(server.config());

        assert!(server.should_respond(&con, &request(TypeUrl::CLUSTER, &["a", "b"], "")));
        mark_sent(&con, TypeUrl::CLUSTER, "n1");

        let responds = server.should_respond(&con, &request(TypeUrl::CLUSTER, &["a", "b", "c"], "n1"));
        assert!(responds);
        assert_eq!(
            con.watched(TypeUrl::CLUSTER).unwrap().resource_names,
            vec!["a", "b", "c"]
        );
    }

    #[test]
    fn classification_is_deterministic() {
        // Same request against the same prior state classifies the same way.
        for _ in 0..2 {
            let server = server();
            let con = connection(server.config());
            assert!(server.should_respond(&con, &request(TypeUrl::CLUSTER, &["a"], "")));
            mark_sent(&con, TypeUrl::CLUSTER, "n1");
            assert!(!server.should_respond(&con, &request(TypeUrl::CLUSTER, &["a"], "n1")));
        }
    }

    #[test]
    fn multiset_comparison_ignores_order_not_multiplicity() {
        let a = vec!["a".to_string(), "b".to_string()];
        let b = vec!["b".to_string(), "a".to_string()];
        assert!(list_equal_unordered(&a, &b));

        let doubled = vec!["a".to_string(), "a".to_string()];
        let mixed = vec!["a".to_string(), "b".to_string()];
        assert!(!list_equal_unordered(&doubled, &mixed));
        assert!(!list_equal_unordered(&a, &a[..1].to_vec()));
    }
}
