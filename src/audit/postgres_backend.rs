//! PostgreSQL-based audit log backend.
//!
//! Rows live in `notification_logs` (see `migrations/`). Inserts only; the
//! table is never updated by this service.

use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::metrics::StoreMetrics;
use crate::notification::{MessageType, UnknownMessageType};

use super::backend::{AuditLogStore, AuditStoreError};
use super::models::{
    DeliveryStatus, FailureKind, NewNotificationRecord, NotificationRecord, Outcome, TeacherStats,
};

const BACKEND: &str = "postgres";

const COLUMNS: &str = "id, recipient_phone, message_content, message_status, external_message_id, \
     message_type, failure_kind, error_message, student_id, teacher_id, retry_of, metadata, sent_at";

/// Raw row as stored; status, type and kind are kept as text columns.
#[derive(Debug, sqlx::FromRow)]
struct LogRow {
    id: i64,
    recipient_phone: String,
    message_content: String,
    message_status: String,
    external_message_id: Option<String>,
    message_type: String,
    failure_kind: Option<String>,
    error_message: Option<String>,
    student_id: Option<i64>,
    teacher_id: Option<i64>,
    retry_of: Option<i64>,
    metadata: Option<serde_json::Value>,
    sent_at: DateTime<Utc>,
}

impl TryFrom<LogRow> for NotificationRecord {
    type Error = AuditStoreError;

    fn try_from(row: LogRow) -> Result<Self, Self::Error> {
        let id = row.id;
        let corrupt = move |reason: String| AuditStoreError::CorruptRow { id, reason };

        let status: DeliveryStatus = row.message_status.parse().map_err(corrupt)?;
        let message_type: MessageType = row
            .message_type
            .parse()
            .map_err(|e: UnknownMessageType| corrupt(e.to_string()))?;
        let failure_kind = row
            .failure_kind
            .as_deref()
            .map(str::parse::<FailureKind>)
            .transpose()
            .map_err(corrupt)?;

        Ok(NotificationRecord {
            id: row.id,
            recipient_phone: row.recipient_phone,
            message_type,
            message_content: row.message_content,
            status,
            external_message_id: row.external_message_id,
            error_detail: row.error_message,
            failure_kind,
            related_student: row.student_id,
            related_teacher: row.teacher_id,
            retry_of: row.retry_of,
            metadata: row.metadata,
            sent_at: row.sent_at,
        })
    }
}

/// PostgreSQL audit log backend.
pub struct PostgresAuditStore {
    pool: PgPool,
}

impl PostgresAuditStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record latency and errors for one operation, converting the sqlx error.
    fn track<T>(
        &self,
        operation: &str,
        started: Instant,
        result: Result<T, sqlx::Error>,
    ) -> Result<T, AuditStoreError> {
        StoreMetrics::record_latency(BACKEND, operation, started.elapsed().as_secs_f64());
        result.map_err(|e| {
            StoreMetrics::record_error(BACKEND, operation);
            tracing::error!(operation = %operation, error = %e, "Audit store query failed");
            AuditStoreError::Postgres(e)
        })
    }

    async fn fetch_records(
        &self,
        operation: &str,
        query: sqlx::query::QueryAs<'_, sqlx::Postgres, LogRow, sqlx::postgres::PgArguments>,
    ) -> Result<Vec<NotificationRecord>, AuditStoreError> {
        let started = Instant::now();
        let rows = self.track(operation, started, query.fetch_all(&self.pool).await)?;
        rows.into_iter().map(NotificationRecord::try_from).collect()
    }

    async fn fetch_record(
        &self,
        operation: &str,
        query: sqlx::query::QueryAs<'_, sqlx::Postgres, LogRow, sqlx::postgres::PgArguments>,
    ) -> Result<Option<NotificationRecord>, AuditStoreError> {
        let started = Instant::now();
        let row = self.track(operation, started, query.fetch_optional(&self.pool).await)?;
        row.map(NotificationRecord::try_from).transpose()
    }
}

#[async_trait]
impl AuditLogStore for PostgresAuditStore {
    async fn insert(
        &self,
        record: NewNotificationRecord,
    ) -> Result<NotificationRecord, AuditStoreError> {
        let status = record.status();
        let (external_message_id, failure_kind, error_message) = match &record.outcome {
            Outcome::Sent {
                external_message_id,
            } => (Some(external_message_id.as_str()), None, None),
            Outcome::Failed { kind, detail } => (None, Some(kind.as_str()), Some(detail.as_str())),
        };

        let sql = format!(
            r#"
            INSERT INTO notification_logs (
                recipient_phone, message_content, message_status, external_message_id,
                message_type, failure_kind, error_message, student_id, teacher_id,
                retry_of, metadata, sent_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, NOW())
            RETURNING {}
            "#,
            COLUMNS
        );

        let started = Instant::now();
        let row = sqlx::query_as::<_, LogRow>(&sql)
            .bind(&record.recipient_phone)
            .bind(&record.message_content)
            .bind(status.as_str())
            .bind(external_message_id)
            .bind(record.message_type.as_str())
            .bind(failure_kind)
            .bind(error_message)
            .bind(record.related_student)
            .bind(record.related_teacher)
            .bind(record.retry_of)
            .bind(&record.metadata)
            .fetch_one(&self.pool)
            .await;
        let row = self.track("insert", started, row)?;

        tracing::trace!(id = row.id, status = %status, "Audit record stored in PostgreSQL");
        NotificationRecord::try_from(row)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<NotificationRecord>, AuditStoreError> {
        let sql = format!("SELECT {} FROM notification_logs WHERE id = $1", COLUMNS);
        self.fetch_record("get_by_id", sqlx::query_as(&sql).bind(id))
            .await
    }

    async fn find_recent(
        &self,
        phone: &str,
        message_type: MessageType,
        since: DateTime<Utc>,
    ) -> Result<Vec<NotificationRecord>, AuditStoreError> {
        let sql = format!(
            r#"
            SELECT {} FROM notification_logs
            WHERE recipient_phone = $1 AND message_type = $2 AND sent_at >= $3
            ORDER BY sent_at DESC, id DESC
            "#,
            COLUMNS
        );
        self.fetch_records(
            "find_recent",
            sqlx::query_as(&sql)
                .bind(phone)
                .bind(message_type.as_str())
                .bind(since),
        )
        .await
    }

    async fn find_failed_since(
        &self,
        since: DateTime<Utc>,
        teacher: Option<i64>,
    ) -> Result<Vec<NotificationRecord>, AuditStoreError> {
        let sql = format!(
            r#"
            SELECT {} FROM notification_logs
            WHERE message_status = 'FAILED' AND sent_at >= $1
              AND ($2::BIGINT IS NULL OR teacher_id = $2)
            ORDER BY sent_at DESC, id DESC
            "#,
            COLUMNS
        );
        self.fetch_records(
            "find_failed_since",
            sqlx::query_as(&sql).bind(since).bind(teacher),
        )
        .await
    }

    async fn list_by_student(
        &self,
        student_id: i64,
    ) -> Result<Vec<NotificationRecord>, AuditStoreError> {
        let sql = format!(
            "SELECT {} FROM notification_logs WHERE student_id = $1 ORDER BY sent_at DESC, id DESC",
            COLUMNS
        );
        self.fetch_records("list_by_student", sqlx::query_as(&sql).bind(student_id))
            .await
    }

    async fn list_by_teacher(
        &self,
        teacher_id: i64,
    ) -> Result<Vec<NotificationRecord>, AuditStoreError> {
        let sql = format!(
            "SELECT {} FROM notification_logs WHERE teacher_id = $1 ORDER BY sent_at DESC, id DESC",
            COLUMNS
        );
        self.fetch_records("list_by_teacher", sqlx::query_as(&sql).bind(teacher_id))
            .await
    }

    async fn find_by_external_id(
        &self,
        external_message_id: &str,
    ) -> Result<Option<NotificationRecord>, AuditStoreError> {
        let sql = format!(
            "SELECT {} FROM notification_logs WHERE external_message_id = $1",
            COLUMNS
        );
        self.fetch_record(
            "find_by_external_id",
            sqlx::query_as(&sql).bind(external_message_id),
        )
        .await
    }

    async fn find_retries_of(
        &self,
        original_id: i64,
    ) -> Result<Vec<NotificationRecord>, AuditStoreError> {
        let sql = format!(
            "SELECT {} FROM notification_logs WHERE retry_of = $1 ORDER BY sent_at ASC, id ASC",
            COLUMNS
        );
        self.fetch_records("find_retries_of", sqlx::query_as(&sql).bind(original_id))
            .await
    }

    async fn teacher_stats(&self, teacher_id: i64) -> Result<TeacherStats, AuditStoreError> {
        let started = Instant::now();
        let by_status: Result<Vec<(String, i64)>, sqlx::Error> = sqlx::query_as(
            r#"
            SELECT message_status, COUNT(*) FROM notification_logs
            WHERE teacher_id = $1
            GROUP BY message_status
            "#,
        )
        .bind(teacher_id)
        .fetch_all(&self.pool)
        .await;
        let by_status = self.track("teacher_stats", started, by_status)?;

        let started = Instant::now();
        let by_type: Result<Vec<(String, i64)>, sqlx::Error> = sqlx::query_as(
            r#"
            SELECT message_type, COUNT(*) FROM notification_logs
            WHERE teacher_id = $1
            GROUP BY message_type
            "#,
        )
        .bind(teacher_id)
        .fetch_all(&self.pool)
        .await;
        let by_type = self.track("teacher_stats", started, by_type)?;

        let mut stats = TeacherStats::new(teacher_id);
        for (status, count) in by_status {
            stats.total += count as u64;
            stats.by_status.insert(status, count as u64);
        }
        for (message_type, count) in by_type {
            stats.by_type.insert(message_type, count as u64);
        }
        Ok(stats)
    }

    async fn count(&self) -> Result<u64, AuditStoreError> {
        let started = Instant::now();
        let result: Result<i64, sqlx::Error> =
            sqlx::query_scalar("SELECT COUNT(*) FROM notification_logs")
                .fetch_one(&self.pool)
                .await;
        let count = self.track("count", started, result)?;
        Ok(count as u64)
    }

    fn backend_type(&self) -> &'static str {
        BACKEND
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: &str, message_type: &str, failure_kind: Option<&str>) -> LogRow {
        LogRow {
            id: 9,
            recipient_phone: "+919876543210".to_string(),
            message_content: "text".to_string(),
            message_status: status.to_string(),
            external_message_id: None,
            message_type: message_type.to_string(),
            failure_kind: failure_kind.map(str::to_string),
            error_message: Some("HTTP 500".to_string()),
            student_id: Some(1),
            teacher_id: None,
            retry_of: None,
            metadata: None,
            sent_at: Utc::now(),
        }
    }

    #[test]
    fn test_row_maps_to_record() {
        let record =
            NotificationRecord::try_from(row("FAILED", "TEST_RESULT_RETRY", Some("GatewayError")))
                .unwrap();
        assert_eq!(record.status, DeliveryStatus::Failed);
        assert_eq!(record.message_type, MessageType::TestResultRetry);
        assert_eq!(record.failure_kind, Some(FailureKind::GatewayError));
        assert_eq!(record.related_student, Some(1));
    }

    #[test]
    fn test_legacy_statuses_are_readable() {
        let record = NotificationRecord::try_from(row("DELIVERED", "REMINDER", None)).unwrap();
        assert!(record.is_successful());
    }

    #[test]
    fn test_unknown_values_are_corrupt_rows() {
        let err = NotificationRecord::try_from(row("BOUNCED", "REMINDER", None)).unwrap_err();
        assert!(matches!(err, AuditStoreError::CorruptRow { id: 9, .. }));

        let err = NotificationRecord::try_from(row("SENT", "SMS", None)).unwrap_err();
        assert!(matches!(err, AuditStoreError::CorruptRow { id: 9, .. }));
    }
}
