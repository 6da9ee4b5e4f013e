//! Metrics for the discovery server.
//!
//! Counters and histograms are emitted through the `metrics` facade; wire an
//! exporter in the hosting process to expose them. Labels stay
//! low-cardinality: short type names and the fixed trigger-reason set.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use helmsman_model::ReasonStats;
use helmsman_wire::short_name;
use metrics::{counter, gauge, histogram};

/// Metrics recorder for the discovery server.
#[derive(Debug, Clone, Default)]
pub struct AdsMetrics {
    inner: Arc<AdsMetricsInner>,
}

#[derive(Debug, Default)]
struct AdsMetricsInner {
    /// Currently registered connections.
    active_connections: AtomicU64,
}

impl AdsMetrics {
    /// Create a new metrics recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a connection entering the registry.
    pub fn connection_opened(&self) {
        let count = self.inner.active_connections.fetch_add(1, Ordering::Relaxed) + 1;
        counter!("ads_connections_opened_total").increment(1);
        gauge!("ads_active_connections").set(count as f64);
    }

    /// Record a connection leaving the registry.
    pub fn connection_closed(&self) {
        let count = self.inner.active_connections.fetch_sub(1, Ordering::Relaxed) - 1;
        counter!("ads_connections_closed_total").increment(1);
        gauge!("ads_active_connections").set(count as f64);
    }

    /// Record an inbound discovery request.
    pub fn record_request(&self, type_url: &str) {
        counter!("ads_requests_total", "type" => short_name(type_url).to_string()).increment(1);
    }

    /// Record a NACK from a client.
    pub fn record_nack(&self, type_url: &str) {
        counter!("ads_nacks_total", "type" => short_name(type_url).to_string()).increment(1);
    }

    /// Record a response pushed to a client, with the time it spent in the
    /// push pipeline when known.
    pub fn record_push(&self, type_url: &str, latency: Option<Duration>) {
        counter!("ads_pushes_total", "type" => short_name(type_url).to_string()).increment(1);
        if let Some(latency) = latency {
            histogram!("ads_push_latency_seconds", "type" => short_name(type_url).to_string())
                .record(latency.as_secs_f64());
        }
    }

    /// Record the trigger reasons of a push event. Counts are per occurrence,
    /// not per distinct reason.
    pub fn record_push_triggers(&self, reasons: &ReasonStats) {
        for (reason, count) in reasons.iter() {
            counter!("ads_push_triggers_total", "reason" => reason.as_str()).increment(*count);
        }
    }

    /// Record a response send that hit the send timeout.
    pub fn record_send_timeout(&self, type_url: &str) {
        counter!("ads_send_timeouts_total", "type" => short_name(type_url).to_string())
            .increment(1);
    }

    /// Currently registered connections.
    pub fn active_connections(&self) -> u64 {
        self.inner.active_connections.load(Ordering::Relaxed)
    }
}
