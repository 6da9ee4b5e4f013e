//! Per-connection push handling and response emission.
//!
//! `push_connection` runs on the stream's main task when a push event lands
//! on the connection's channel; `push_xds` dispatches one watched type to its
//! generator and sends the result with the version/nonce discipline: both
//! fields carry the snapshot's push version, so an ACK names the snapshot it
//! acknowledges.

use std::collections::HashMap;
use std::sync::Arc;

use tonic::Code;
use tracing::{debug, info, warn};

use helmsman_model::{resources_to_any, PushContext, PushRequest, WatchedResource};
use helmsman_wire::{short_name, DiscoveryResponse};

use crate::connection::Connection;
use crate::error::AdsError;
use crate::server::DiscoveryServer;

impl DiscoveryServer {
    /// Compute and send the new configuration for one connection.
    ///
    /// The skip predicate runs once per connection; generators then decide
    /// per type whether anything needs to go out.
    pub(crate) async fn push_connection(
        &self,
        con: &Arc<Connection>,
        request: PushRequest,
    ) -> Result<(), AdsError> {
        let Some(proxy) = con.proxy() else {
            return Ok(());
        };
        if !self.proxy_needs_push(proxy, &request) {
            debug!(con = con.con_id(), "skipping push, no updates required");
            return Ok(());
        }

        let push = match request.push.as_ref() {
            Some(push) => Arc::clone(push),
            None => self.global_push_context(),
        };
        for watched in self.order_watched_resources(proxy.watched_snapshot()) {
            self.push_xds(con, &push, Some(watched), &request).await?;
        }
        Ok(())
    }

    /// Order watches by the configured push order; types without a fixed
    /// position follow in table order.
    fn order_watched_resources(&self, resources: Vec<WatchedResource>) -> Vec<WatchedResource> {
        let mut by_type: HashMap<String, WatchedResource> = resources
            .into_iter()
            .map(|w| (w.type_url.clone(), w))
            .collect();

        let mut ordered = Vec::with_capacity(by_type.len());
        for type_url in &self.config().push_order {
            if let Some(watched) = by_type.remove(type_url) {
                ordered.push(watched);
            }
        }
        for (type_url, watched) in by_type {
            if !self.config().known_ordered_type_urls.contains(&type_url) {
                ordered.push(watched);
            }
        }
        ordered
    }

    /// Push one resource type for the given connection. The generator may
    /// send a partial payload or nothing at all.
    pub(crate) async fn push_xds(
        &self,
        con: &Arc<Connection>,
        push: &Arc<PushContext>,
        watched: Option<WatchedResource>,
        request: &PushRequest,
    ) -> Result<(), AdsError> {
        let Some(watched) = watched else {
            return Ok(());
        };
        let Some(proxy) = con.proxy() else {
            return Ok(());
        };
        let Some(generator) = self.find_generator(proxy, &watched.type_url) else {
            info!(type_url = %watched.type_url, "no generator for resource type");
            return Ok(());
        };

        let generated = generator
            .generate(proxy, push, &watched, request)
            .map_err(|source| AdsError::Generator {
                type_url: watched.type_url.clone(),
                source,
            })?;
        let Some(generated) = generated else {
            // The generator decided nothing changed.
            return Ok(());
        };

        let resource_count = generated.resources.len();
        let detail = generated.log_details.additional_info;
        let response = DiscoveryResponse {
            type_url: watched.type_url.clone(),
            version_info: push.push_version.clone(),
            nonce: push.push_version.clone(),
            resources: resources_to_any(generated.resources),
            ..Default::default()
        };

        if let Err(status) = con.send(response, self.config()).await {
            warn!(
                type_url = short_name(&watched.type_url),
                con = con.con_id(),
                resources = resource_count,
                detail = %detail,
                %status,
                "send failure",
            );
            if status.code() == Code::DeadlineExceeded {
                self.metrics().record_send_timeout(&watched.type_url);
            }
            return Err(AdsError::Transport(status));
        }

        self.metrics()
            .record_push(&watched.type_url, request.start.map(|start| start.elapsed()));
        debug!(
            type_url = short_name(&watched.type_url),
            reason = request.push_reason(),
            con = con.con_id(),
            resources = resource_count,
            detail = %detail,
            "pushed",
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helmsman_model::Environment;
    use helmsman_wire::TypeUrl;

    #[test]
    fn secrets_are_ordered_first() {
        let server = DiscoveryServer::new(Arc::new(Environment::new()));
        let resources = vec![
            WatchedResource::new(TypeUrl::CLUSTER),
            WatchedResource::new(TypeUrl::SECRET),
            WatchedResource::new(TypeUrl::LISTENER),
        ];

        let ordered = server.order_watched_resources(resources);
        assert_eq!(ordered.len(), 3);
        assert_eq!(ordered[0].type_url, TypeUrl::SECRET);
    }

    #[test]
    fn unknown_types_keep_table_order_membership() {
        let server = DiscoveryServer::new(Arc::new(Environment::new()));
        let ordered = server.order_watched_resources(vec![
            WatchedResource::new("custom/type"),
            WatchedResource::new(TypeUrl::SECRET),
        ]);

        assert_eq!(ordered[0].type_url, TypeUrl::SECRET);
        assert_eq!(ordered[1].type_url, "custom/type");
    }

    #[test]
    fn ordering_without_watches_is_empty() {
        let server = DiscoveryServer::new(Arc::new(Environment::new()));
        assert!(server.order_watched_resources(Vec::new()).is_empty());
    }
}
