//! Prometheus metrics for the notification service.
//!
//! - Dispatch metrics (attempts by message type and outcome, failures by kind)
//! - Gateway latency
//! - Retry metrics
//! - Audit store latency and errors

mod helpers;

pub use helpers::{encode_metrics, DispatchMetrics, RetryMetrics, StoreMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter_vec, register_int_gauge,
    Histogram, HistogramVec, IntCounterVec, IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "edugrow_notify";

lazy_static! {
    // ============================================================================
    // Dispatch Metrics
    // ============================================================================

    /// Dispatch attempts by message type and recorded status
    pub static ref DISPATCH_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_dispatch_total", METRIC_PREFIX),
        "Total dispatch attempts recorded in the audit log",
        &["message_type", "status"]
    ).unwrap();

    /// Failed dispatches by failure kind
    pub static ref DISPATCH_FAILURES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_dispatch_failures_total", METRIC_PREFIX),
        "Total failed dispatch attempts by failure kind",
        &["kind"]
    ).unwrap();

    /// Gateway round-trip latency
    pub static ref GATEWAY_LATENCY: Histogram = register_histogram!(
        format!("{}_gateway_latency_seconds", METRIC_PREFIX),
        "Messaging gateway call latency in seconds",
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    ).unwrap();

    // ============================================================================
    // Retry Metrics
    // ============================================================================

    /// Retry requests by outcome ("dispatched", "not_found", "invalid_state", "skipped")
    pub static ref RETRY_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_retry_total", METRIC_PREFIX),
        "Total retry requests by outcome",
        &["outcome"]
    ).unwrap();

    // ============================================================================
    // Audit Store Metrics
    // ============================================================================

    /// Audit store operation latency
    pub static ref STORE_OPERATION_LATENCY: HistogramVec = register_histogram_vec!(
        format!("{}_store_operation_latency_seconds", METRIC_PREFIX),
        "Audit store operation latency in seconds",
        &["backend", "operation"],
        vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]
    ).unwrap();

    /// Audit store errors
    pub static ref STORE_ERRORS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_store_errors_total", METRIC_PREFIX),
        "Total audit store operation errors",
        &["backend", "operation"]
    ).unwrap();

    /// Number of audit records (refreshed on scrape)
    pub static ref AUDIT_RECORDS_TOTAL: IntGauge = register_int_gauge!(
        format!("{}_audit_records_total", METRIC_PREFIX),
        "Number of records in the audit log"
    ).unwrap();
}
