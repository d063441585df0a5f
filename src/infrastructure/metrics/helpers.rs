//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use super::{
    DISPATCH_FAILURES_TOTAL, DISPATCH_TOTAL, GATEWAY_LATENCY, RETRY_TOTAL, STORE_ERRORS_TOTAL,
    STORE_OPERATION_LATENCY,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording dispatch metrics
pub struct DispatchMetrics;

impl DispatchMetrics {
    /// Record one audited dispatch attempt
    pub fn record_attempt(message_type: &str, status: &str) {
        DISPATCH_TOTAL
            .with_label_values(&[message_type, status])
            .inc();
    }

    /// Record a failure by kind
    pub fn record_failure(kind: &str) {
        DISPATCH_FAILURES_TOTAL.with_label_values(&[kind]).inc();
    }

    /// Record gateway round-trip latency
    pub fn record_gateway_latency(latency_secs: f64) {
        GATEWAY_LATENCY.observe(latency_secs);
    }
}

/// Helper struct for recording retry metrics
pub struct RetryMetrics;

impl RetryMetrics {
    pub fn record(outcome: &str) {
        RETRY_TOTAL.with_label_values(&[outcome]).inc();
    }
}

/// Helper struct for recording audit store metrics
pub struct StoreMetrics;

impl StoreMetrics {
    /// Record operation latency
    pub fn record_latency(backend: &str, operation: &str, latency_secs: f64) {
        STORE_OPERATION_LATENCY
            .with_label_values(&[backend, operation])
            .observe(latency_secs);
    }

    /// Record an operation error
    pub fn record_error(backend: &str, operation: &str) {
        STORE_ERRORS_TOTAL
            .with_label_values(&[backend, operation])
            .inc();
    }
}
