//! Metrics module for gate-service.
//! HTTP metrics come from the `metrics` facade (rendered by the Prometheus
//! recorder); gate and workflow metrics live in the default prometheus registry.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;
use prometheus::{
    histogram_opts, opts, register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec,
    IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Database query duration histogram
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        histogram_opts!("gate_db_query_duration_seconds", "Database query duration"),
        &["operation"]
    )
    .expect("Failed to register DB_QUERY_DURATION")
});

/// Gate decisions by route class and outcome
pub static GATE_DECISIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        opts!(
            "gate_decisions_total",
            "Request gate decisions by route class and decision"
        ),
        &["route_class", "decision"]
    )
    .expect("Failed to register GATE_DECISIONS_TOTAL")
});

/// Requests let through because the entitlement lookup failed
pub static GATE_FAIL_OPEN_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        opts!(
            "gate_fail_open_total",
            "Payment checks bypassed because the entitlement store failed"
        ),
        &["route_class", "reason"]
    )
    .expect("Failed to register GATE_FAIL_OPEN_TOTAL")
});

/// Entitlement lookup latency, including timeouts
pub static ENTITLEMENT_FETCH_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        histogram_opts!(
            "gate_entitlement_fetch_duration_seconds",
            "Entitlement snapshot lookup duration"
        ),
        &["outcome"]
    )
    .expect("Failed to register ENTITLEMENT_FETCH_DURATION")
});

/// Access request submissions and reviews
pub static ACCESS_REQUEST_OPERATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        opts!(
            "access_request_operations_total",
            "Access request operations by type and outcome"
        ),
        &["operation", "outcome"]
    )
    .expect("Failed to register ACCESS_REQUEST_OPERATIONS_TOTAL")
});

/// Install the Prometheus recorder for the `metrics` facade and register the
/// service collectors. Safe to call more than once.
pub fn init_metrics() {
    if METRICS_HANDLE.get().is_none() {
        match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => {
                let _ = METRICS_HANDLE.set(handle);
            }
            Err(e) => tracing::warn!(error = %e, "Prometheus recorder not installed"),
        }
    }

    Lazy::force(&DB_QUERY_DURATION);
    Lazy::force(&GATE_DECISIONS_TOTAL);
    Lazy::force(&GATE_FAIL_OPEN_TOTAL);
    Lazy::force(&ENTITLEMENT_FETCH_DURATION);
    Lazy::force(&ACCESS_REQUEST_OPERATIONS_TOTAL);
}

/// Render all metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let mut output = METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_default();

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
    }
    output.push_str(&String::from_utf8_lossy(&buffer));

    output
}

pub fn record_gate_decision(route_class: &str, decision: &str) {
    GATE_DECISIONS_TOTAL
        .with_label_values(&[route_class, decision])
        .inc();
}

pub fn record_fail_open(route_class: &str, reason: &str) {
    GATE_FAIL_OPEN_TOTAL
        .with_label_values(&[route_class, reason])
        .inc();
}

pub fn record_access_request_operation(operation: &str, outcome: &str) {
    ACCESS_REQUEST_OPERATIONS_TOTAL
        .with_label_values(&[operation, outcome])
        .inc();
}
