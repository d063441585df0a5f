//! Health check endpoint.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::notification::DispatcherStatsSnapshot;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub store: StoreHealthResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postgres: Option<PostgresHealthResponse>,
    pub dispatcher: DispatcherStatsSnapshot,
}

#[derive(Debug, Serialize)]
pub struct StoreHealthResponse {
    pub backend: String,
    pub available: bool,
    /// `None` when the store could not be counted
    pub records: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct PostgresHealthResponse {
    pub connected: bool,
    pub pool_size: u32,
    pub idle_connections: u32,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let records = match state.store.count().await {
        Ok(count) => Some(count),
        Err(e) => {
            tracing::warn!(error = %e, "Audit store count failed during health check");
            None
        }
    };

    let postgres = match state.postgres_pool {
        Some(ref pool) => {
            let inner = pool.pool();
            Some(PostgresHealthResponse {
                connected: pool.ping().await,
                pool_size: inner.size(),
                idle_connections: inner.num_idle() as u32,
            })
        }
        None => None,
    };

    let available = records.is_some();
    let status = if available { "healthy" } else { "degraded" };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        store: StoreHealthResponse {
            backend: state.store.backend_type().to_string(),
            available,
            records,
        },
        postgres,
        dispatcher: state.dispatcher.stats(),
    })
}
