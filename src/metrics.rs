//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use std::sync::Once;
use std::time::Duration;

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, IntCounterVec, IntGaugeVec, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("momentdesk_http_requests_total", "Total number of HTTP requests"),
        &["method", "status"]
    ).expect("metric can be created");

    // Backend Metrics
    pub static ref BACKEND_CALLS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("momentdesk_backend_calls_total", "Total number of backend calls"),
        &["operation", "status"]
    ).expect("metric can be created");
    pub static ref BACKEND_CALL_DURATION_SECONDS: prometheus::HistogramVec = prometheus::HistogramVec::new(
        HistogramOpts::new(
            "momentdesk_backend_call_duration_seconds",
            "Backend call duration in seconds"
        ).buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0]),
        &["operation"]
    ).expect("metric can be created");

    // Live listener Metrics
    pub static ref LISTENER_INSTALLS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("momentdesk_listener_installs_total", "Total number of live listener installs"),
        &["view"]
    ).expect("metric can be created");
    pub static ref LISTENERS_ACTIVE: IntGaugeVec = IntGaugeVec::new(
        Opts::new("momentdesk_listeners_active", "Current number of active live listeners"),
        &["view"]
    ).expect("metric can be created");
    pub static ref STALE_SNAPSHOTS_DROPPED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("momentdesk_stale_snapshots_dropped_total", "Snapshots dropped because their listener generation was superseded"),
        &["view"]
    ).expect("metric can be created");

    // Dashboard Metrics
    pub static ref MUTATIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("momentdesk_mutations_total", "Total number of dashboard mutations"),
        &["operation", "status"]
    ).expect("metric can be created");
    pub static ref DASHBOARDS_ACTIVE: prometheus::IntGauge = prometheus::IntGauge::new(
        "momentdesk_dashboards_active",
        "Current number of running dashboard controllers"
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("momentdesk_errors_total", "Total number of errors"),
        &["error_type"]
    ).expect("metric can be created");
}

static INIT: Once = Once::new();

/// Initialize metrics registry. Later calls are no-ops.
pub fn init_metrics() {
    INIT.call_once(register_all);
}

fn register_all() {
    REGISTRY
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .expect("HTTP_REQUESTS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(BACKEND_CALLS_TOTAL.clone()))
        .expect("BACKEND_CALLS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(BACKEND_CALL_DURATION_SECONDS.clone()))
        .expect("BACKEND_CALL_DURATION_SECONDS can be registered");
    REGISTRY
        .register(Box::new(LISTENER_INSTALLS_TOTAL.clone()))
        .expect("LISTENER_INSTALLS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(LISTENERS_ACTIVE.clone()))
        .expect("LISTENERS_ACTIVE can be registered");
    REGISTRY
        .register(Box::new(STALE_SNAPSHOTS_DROPPED_TOTAL.clone()))
        .expect("STALE_SNAPSHOTS_DROPPED_TOTAL can be registered");
    REGISTRY
        .register(Box::new(MUTATIONS_TOTAL.clone()))
        .expect("MUTATIONS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(DASHBOARDS_ACTIVE.clone()))
        .expect("DASHBOARDS_ACTIVE can be registered");
    REGISTRY
        .register(Box::new(ERRORS_TOTAL.clone()))
        .expect("ERRORS_TOTAL can be registered");

    tracing::info!("Metrics registry initialized");
}

/// Record the outcome and latency of one backend call.
pub fn observe_backend_call(operation: &str, status: &str, elapsed: Duration) {
    BACKEND_CALLS_TOTAL
        .with_label_values(&[operation, status])
        .inc();
    BACKEND_CALL_DURATION_SECONDS
        .with_label_values(&[operation])
        .observe(elapsed.as_secs_f64());
}

/// Record a dashboard mutation outcome.
pub fn record_mutation(operation: &str, status: &str) {
    MUTATIONS_TOTAL
        .with_label_values(&[operation, status])
        .inc();
}
