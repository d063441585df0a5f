//! Prometheus metrics endpoint.

use axum::{extract::State, http::header, response::IntoResponse};

use crate::error::{AppError, Result};
use crate::metrics;
use crate::server::AppState;

/// GET /metrics - Prometheus text exposition
pub async fn prometheus_metrics(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let records = state.store.count().await?;
    metrics::AUDIT_RECORDS_TOTAL.set(records as i64);

    let output = metrics::encode_metrics().map_err(|e| AppError::Internal(e.to_string()))?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        output,
    ))
}
