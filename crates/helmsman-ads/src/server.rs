//! The discovery server: generator registry, connection registry, and the
//! push engine.
//!
//! One [`DiscoveryServer`] serves many streams. Config changes arrive through
//! [`DiscoveryServer::config_update`], get stamped with a fresh push version
//! by the engine task, and fan out to every registered connection's push
//! channel; the per-stream loops do the actual sending.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

use chrono::{SecondsFormat, Utc};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use helmsman_model::{Environment, Proxy, PushContext, PushRequest, ResourceGenerator};

use crate::config::AdsConfig;
use crate::connection::Connection;
use crate::metrics::AdsMetrics;

/// Predicate deciding whether a push event concerns a proxy at all.
pub type ProxyNeedsPush = Box<dyn Fn(&Proxy, &PushRequest) -> bool + Send + Sync>;

/// A generic aggregated discovery server.
///
/// Generators customize the generated config per resource type; clients with
/// a generator named in their node metadata are bound to it for the lifetime
/// of their stream.
pub struct DiscoveryServer {
    /// Shared environment holding the current push context.
    env: Arc<Environment>,
    /// Server configuration.
    config: AdsConfig,
    /// Metrics recorder.
    metrics: AdsMetrics,
    /// Generators by generator name or type URL.
    generators: RwLock<HashMap<String, Arc<dyn ResourceGenerator>>>,
    /// Determines whether a push can be skipped entirely for a proxy.
    /// Individual generators may still decide to send nothing.
    proxy_needs_push: ProxyNeedsPush,
    /// Producer side of the global push queue.
    push_tx: mpsc::Sender<PushRequest>,
    /// Consumer side, taken by the engine task on startup.
    push_rx: Mutex<Option<mpsc::Receiver<PushRequest>>>,
    /// Live connections by connection id.
    clients: RwLock<HashMap<String, Arc<Connection>>>,
}

impl DiscoveryServer {
    /// Create a server with default configuration.
    pub fn new(env: Arc<Environment>) -> Self {
        Self::with_config(env, AdsConfig::default())
    }

    /// Create a server with the given configuration.
    pub fn with_config(env: Arc<Environment>, config: AdsConfig) -> Self {
        let (push_tx, push_rx) = mpsc::channel(config.push_buffer_size);
        Self {
            env,
            config,
            metrics: AdsMetrics::new(),
            generators: RwLock::new(HashMap::new()),
            proxy_needs_push: Box::new(|_, _| true),
            push_tx,
            push_rx: Mutex::new(Some(push_rx)),
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// The server configuration.
    #[inline]
    pub fn config(&self) -> &AdsConfig {
        &self.config
    }

    /// The shared environment.
    #[inline]
    pub fn environment(&self) -> &Arc<Environment> {
        &self.env
    }

    /// The metrics recorder.
    #[inline]
    pub(crate) fn metrics(&self) -> &AdsMetrics {
        &self.metrics
    }

    /// Replace the push-skip predicate.
    pub fn set_proxy_needs_push<F>(&mut self, f: F)
    where
        F: Fn(&Proxy, &PushRequest) -> bool + Send + Sync + 'static,
    {
        self.proxy_needs_push = Box::new(f);
    }

    /// Register a generator under a generator name or a type URL.
    pub fn register_generator(
        &self,
        key: impl Into<String>,
        generator: Arc<dyn ResourceGenerator>,
    ) {
        self.generators
            .write()
            .expect("generator lock poisoned")
            .insert(key.into(), generator);
    }

    /// Resolve the generator for a proxy and type URL: the proxy's bound
    /// generator wins, then the per-type registration.
    pub(crate) fn find_generator(
        &self,
        proxy: &Proxy,
        type_url: &str,
    ) -> Option<Arc<dyn ResourceGenerator>> {
        let generators = self.generators.read().expect("generator lock poisoned");
        if let Some(name) = proxy.generator() {
            if let Some(generator) = generators.get(name) {
                return Some(Arc::clone(generator));
            }
        }
        generators.get(type_url).cloned()
    }

    /// The currently installed push context.
    pub fn global_push_context(&self) -> Arc<PushContext> {
        self.env.push_context()
    }

    /// Whether a push event concerns the given proxy.
    pub(crate) fn proxy_needs_push(&self, proxy: &Proxy, request: &PushRequest) -> bool {
        (self.proxy_needs_push)(proxy, request)
    }

    /// Request a push. May block while the push queue is full; callers are
    /// expected to debounce upstream.
    pub async fn config_update(&self, request: PushRequest) {
        if self.push_tx.send(request).await.is_err() {
            warn!("push queue closed, dropping config update");
        }
    }

    /// Run the push engine until `stop` fires: stamp each queued request with
    /// a fresh push version, install the new context, and fan out.
    pub async fn run(&self, mut stop: oneshot::Receiver<()>) {
        let taken = self
            .push_rx
            .lock()
            .expect("push queue lock poisoned")
            .take();
        let Some(mut push_rx) = taken else {
            warn!("push engine already running");
            return;
        };

        let mut version_num: u64 = 0;
        loop {
            tokio::select! {
                request = push_rx.recv() => {
                    let Some(mut request) = request else { return };
                    version_num += 1;
                    let version = format!(
                        "{}/{}",
                        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
                        version_num,
                    );
                    let push = Arc::new(PushContext::new(version.clone()));
                    self.env.set_push_context(Arc::clone(&push));
                    request.push = Some(push);
                    self.push_all(&version, request).await;
                }
                _ = &mut stop => return,
            }
        }
    }

    /// Fan one stamped push request out to every connection.
    async fn push_all(&self, version: &str, request: PushRequest) {
        if !request.full {
            info!(
                connected = self.client_count(),
                version, "incremental push",
            );
        } else {
            debug!(
                connected = self.client_count(),
                version, "full push",
            );
        }
        self.metrics.record_push_triggers(&request.reason);
        self.start_push(request).await;
    }

    /// Deliver a push request onto each connection's push channel. The
    /// registry snapshot is taken under the read guard; delivery happens
    /// outside it so one slow connection cannot hold up registration.
    async fn start_push(&self, mut request: PushRequest) {
        request.start = Some(Instant::now());
        for con in self.all_clients() {
            if !con.push(request.clone()).await {
                debug!(con = con.con_id(), "connection closed before push delivery");
            }
        }
    }

    /// Register a connection. Called by the receive task before the stream's
    /// init barrier opens.
    pub(crate) fn add_connection(&self, con_id: String, con: Arc<Connection>) {
        self.clients
            .write()
            .expect("client registry lock poisoned")
            .insert(con_id, con);
        self.metrics.connection_opened();
    }

    /// Remove a connection. A no-op for streams that never initialized.
    pub(crate) fn remove_connection(&self, con: &Connection) {
        if con.con_id().is_empty() {
            return;
        }
        self.clients
            .write()
            .expect("client registry lock poisoned")
            .remove(con.con_id());
        self.metrics.connection_closed();
    }

    /// Snapshot all connected clients. The returned list is freshly
    /// allocated; concurrent registrations do not invalidate it.
    pub fn all_clients(&self) -> Vec<Arc<Connection>> {
        self.clients
            .read()
            .expect("client registry lock poisoned")
            .values()
            .map(Arc::clone)
            .collect()
    }

    /// Number of connected clients.
    pub fn client_count(&self) -> usize {
        self.clients
            .read()
            .expect("client registry lock poisoned")
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helmsman_model::{GeneratedResources, TriggerReason, WatchedResource};
    use helmsman_wire::{ChannelResponseSink, Node, TypeUrl};

    use crate::connection::connection_id;

    struct NoopGenerator;

    impl ResourceGenerator for NoopGenerator {
        fn generate(
            &self,
            _proxy: &Proxy,
            _push: &PushContext,
            _watched: &WatchedResource,
            _request: &PushRequest,
        ) -> Result<Option<GeneratedResources>, helmsman_model::BoxError> {
            Ok(None)
        }
    }

    fn registered_connection(server: &DiscoveryServer, node_id: &str) -> Arc<Connection> {
        let (sink, _rx) = ChannelResponseSink::new(4);
        let (con, _receivers, _handles) =
            Connection::new("0.0.0.0".into(), Box::new(sink), server.config());
        let proxy = Proxy::from_node(&Node {
            id: node_id.into(),
            ..Default::default()
        })
        .unwrap();
        let con_id = connection_id(node_id);
        con.set_identity(con_id.clone(), Arc::new(proxy));
        server.add_connection(con_id, Arc::clone(&con));
        con
    }

    #[test]
    fn registry_add_remove_snapshot() {
        let server = DiscoveryServer::new(Arc::new(Environment::new()));
        assert_eq!(server.client_count(), 0);

        let con1 = registered_connection(&server, "router-1");
        let _con2 = registered_connection(&server, "router-2");
        assert_eq!(server.client_count(), 2);

        let snapshot = server.all_clients();
        server.remove_connection(&con1);
        assert_eq!(server.client_count(), 1);
        // The snapshot taken before removal is untouched.
        assert_eq!(snapshot.len(), 2);
    }

    #[test]
    fn remove_unregistered_connection_is_noop() {
        let server = DiscoveryServer::new(Arc::new(Environment::new()));
        let (sink, _rx) = ChannelResponseSink::new(4);
        let (con, _receivers, _handles) =
            Connection::new("0.0.0.0".into(), Box::new(sink), server.config());
        server.remove_connection(&con);
        assert_eq!(server.client_count(), 0);
    }

    #[test]
    fn proxy_generator_takes_precedence() {
        let server = DiscoveryServer::new(Arc::new(Environment::new()));
        server.register_generator("custom", Arc::new(NoopGenerator));
        server.register_generator(TypeUrl::CLUSTER, Arc::new(NoopGenerator));

        let node = Node {
            id: "router-1".into(),
            metadata: Some(prost_types::Struct {
                fields: [(
                    "GENERATOR".to_string(),
                    prost_types::Value {
                        kind: Some(prost_types::value::Kind::StringValue("custom".into())),
                    },
                )]
                .into_iter()
                .collect(),
            }),
            ..Default::default()
        };
        let bound = Proxy::from_node(&node).unwrap();
        assert!(server.find_generator(&bound, TypeUrl::CLUSTER).is_some());

        let plain = Proxy::from_node(&Node {
            id: "router-2".into(),
            ..Default::default()
        })
        .unwrap();
        assert!(server.find_generator(&plain, TypeUrl::CLUSTER).is_some());
        assert!(server.find_generator(&plain, TypeUrl::SECRET).is_none());
    }

    #[tokio::test]
    async fn engine_stamps_monotonic_versions() {
        let env = Arc::new(Environment::new());
        let server = Arc::new(DiscoveryServer::new(Arc::clone(&env)));
        let (stop_tx, stop_rx) = oneshot::channel();
        let engine = tokio::spawn({
            let server = Arc::clone(&server);
            async move { server.run(stop_rx).await }
        });

        server
            .config_update(PushRequest::full(TriggerReason::ConfigUpdate))
            .await;

        // Wait for the engine to install the stamped context.
        let deadline = Instant::now() + std::time::Duration::from_secs(1);
        while env.push_context().push_version.is_empty() {
            assert!(Instant::now() < deadline, "engine never stamped a version");
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }

        let version = env.push_context().push_version.clone();
        assert!(version.ends_with("/1"), "unexpected version {version}");

        stop_tx.send(()).unwrap();
        engine.await.unwrap();
    }
}
