//! Prometheus metrics collection.
//!
//! Provides observability via Prometheus metrics exposed on a dedicated HTTP
//! endpoint. Tracks connected clients, presence churn, event fan-out, and API
//! errors.

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Counters (monotonic increasing)
// ========================================================================

/// Total domain events published through the broadcaster, by kind.
pub static EVENTS_PUBLISHED: OnceLock<IntCounterVec> = OnceLock::new();

/// Events dropped because a connection's send queue was full or closed.
pub static EVENTS_DROPPED: OnceLock<IntCounter> = OnceLock::new();

/// Presence records evicted by the lazy sweep.
pub static PRESENCE_EVICTIONS: OnceLock<IntCounter> = OnceLock::new();

/// API errors by error code.
pub static API_ERRORS: OnceLock<IntCounterVec> = OnceLock::new();

// ========================================================================
// Gauges (can increase/decrease)
// ========================================================================

/// Currently connected WebSocket clients.
pub static CONNECTED_CLIENTS: OnceLock<IntGauge> = OnceLock::new();

/// Presence records currently held (includes not-yet-swept stale entries).
pub static PRESENCE_RECORDS: OnceLock<IntGauge> = OnceLock::new();

// ========================================================================
// Histograms
// ========================================================================

/// Event fan-out: how many recipients per published event.
pub static EVENT_FANOUT: OnceLock<Histogram> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Must be called once at server startup before any metrics are recorded.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            let m = $init.expect(concat!(stringify!($metric), " creation failed"));
            if let Err(e) = r.register(Box::new(m.clone())) {
                tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
            }
            let _ = $metric.set(m);
        };
    }

    register!(
        EVENTS_PUBLISHED,
        IntCounterVec::new(
            Opts::new("kiezwache_events_published_total", "Domain events published"),
            &["kind"]
        )
    );
    register!(
        EVENTS_DROPPED,
        IntCounter::new(
            "kiezwache_events_dropped_total",
            "Events dropped due to full or closed send queues"
        )
    );
    register!(
        PRESENCE_EVICTIONS,
        IntCounter::new(
            "kiezwache_presence_evictions_total",
            "Presence records evicted as stale"
        )
    );
    register!(
        API_ERRORS,
        IntCounterVec::new(
            Opts::new("kiezwache_api_errors_total", "API errors by code"),
            &["code"]
        )
    );
    register!(
        CONNECTED_CLIENTS,
        IntGauge::new(
            "kiezwache_connected_clients",
            "Currently connected WebSocket clients"
        )
    );
    register!(
        PRESENCE_RECORDS,
        IntGauge::new(
            "kiezwache_presence_records",
            "Presence records currently held"
        )
    );
    register!(
        EVENT_FANOUT,
        Histogram::with_opts(
            HistogramOpts::new("kiezwache_event_fanout", "Recipients per published event")
                .buckets(vec![0.0, 1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0])
        )
    );
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

// ============================================================================
// Helper functions
// ============================================================================

/// Record a published event and its fan-out.
#[inline]
pub fn event_published(kind: &str, recipients: usize) {
    if let Some(c) = EVENTS_PUBLISHED.get() {
        c.with_label_values(&[kind]).inc();
    }
    if let Some(h) = EVENT_FANOUT.get() {
        h.observe(recipients as f64);
    }
}

/// Record an event dropped for one connection.
#[inline]
pub fn event_dropped() {
    if let Some(c) = EVENTS_DROPPED.get() {
        c.inc();
    }
}

/// Record presence evictions from a sweep.
#[inline]
pub fn presence_evicted(count: usize) {
    if let Some(c) = PRESENCE_EVICTIONS.get() {
        c.inc_by(count as u64);
    }
}

/// Update the presence record gauge.
#[inline]
pub fn set_presence_records(count: i64) {
    if let Some(g) = PRESENCE_RECORDS.get() {
        g.set(count);
    }
}

/// Record an API error by code.
#[inline]
pub fn api_error(code: &str) {
    if let Some(c) = API_ERRORS.get() {
        c.with_label_values(&[code]).inc();
    }
}

/// Adjust the connected client gauge.
#[inline]
pub fn client_connected() {
    if let Some(g) = CONNECTED_CLIENTS.get() {
        g.inc();
    }
}

#[inline]
pub fn client_disconnected() {
    if let Some(g) = CONNECTED_CLIENTS.get() {
        g.dec();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_lifecycle() {
        init();

        event_published("new_message", 3);
        event_dropped();
        presence_evicted(2);
        api_error("unauthorized");
        client_connected();
        client_disconnected();

        let output = gather_metrics();
        assert!(output.contains("kiezwache_events_published_total"));
        assert!(output.contains("kiezwache_events_dropped_total"));
    }
}
