//! Append-only audit log of dispatch attempts.
//!
//! # Backends
//!
//! - `MemoryAuditStore`: DashMap with an atomic id counter (default)
//! - `PostgresAuditStore`: `notification_logs` table
//!
//! Use `create_audit_store()` to pick one from configuration.

mod backend;
mod memory_backend;
mod models;
mod postgres_backend;

use std::sync::Arc;

use crate::config::StoreConfig;
use crate::postgres::PostgresPool;

pub use backend::{AuditLogStore, AuditStoreError};
pub use memory_backend::MemoryAuditStore;
pub use models::{
    DeliveryStatus, FailureKind, NewNotificationRecord, NotificationRecord, NotificationSummary,
    Outcome, TeacherStats, CONTENT_UNAVAILABLE, DUPLICATE_DETAIL, INVALID_PHONE_DETAIL,
    UNKNOWN_RECIPIENT,
};
pub use postgres_backend::PostgresAuditStore;

/// Create an audit store based on configuration.
///
/// - `"postgres"`: `PostgresAuditStore` on the given pool
/// - `"memory"` (default): `MemoryAuditStore`
///
/// A postgres selection without a pool, or an unknown backend name, is an
/// error: records kept in memory do not survive a restart.
pub fn create_audit_store(
    settings: &StoreConfig,
    postgres_pool: Option<&PostgresPool>,
) -> Result<Arc<dyn AuditLogStore>, AuditStoreError> {
    match settings.backend.as_str() {
        "postgres" => {
            let pool = postgres_pool.ok_or_else(|| {
                AuditStoreError::Unavailable(
                    "store.backend is postgres but no database pool is configured".to_string(),
                )
            })?;
            tracing::info!(
                backend = "postgres",
                url = %pool.database_url_masked(),
                "Creating PostgreSQL audit store"
            );
            Ok(Arc::new(PostgresAuditStore::new(pool.pool().clone())))
        }
        "memory" => {
            tracing::warn!(
                backend = "memory",
                "Creating memory audit store, records are lost on restart"
            );
            Ok(Arc::new(MemoryAuditStore::new()))
        }
        other => Err(AuditStoreError::Unavailable(format!(
            "unknown store backend {:?}",
            other
        ))),
    }
}
