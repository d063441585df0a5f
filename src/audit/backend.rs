//! Backend trait for audit log storage.
//!
//! The audit log is append-only: backends insert and read, never update or
//! delete. Memory and PostgreSQL implementations are interchangeable.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::notification::MessageType;

use super::models::{NewNotificationRecord, NotificationRecord, TeacherStats};

/// Errors that can occur during audit store operations.
#[derive(Debug, Error)]
pub enum AuditStoreError {
    /// PostgreSQL operation failed
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A stored row could not be mapped back to a record
    #[error("Corrupt audit row {id}: {reason}")]
    CorruptRow { id: i64, reason: String },

    /// Backend cannot be used as configured
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait AuditLogStore: Send + Sync {
    /// Append one record, returning it with its assigned id and timestamp.
    async fn insert(&self, record: NewNotificationRecord)
        -> Result<NotificationRecord, AuditStoreError>;

    async fn get_by_id(&self, id: i64) -> Result<Option<NotificationRecord>, AuditStoreError>;

    /// Records of any status for `(phone, message_type)` created at or after `since`,
    /// newest first.
    async fn find_recent(
        &self,
        phone: &str,
        message_type: MessageType,
        since: DateTime<Utc>,
    ) -> Result<Vec<NotificationRecord>, AuditStoreError>;

    /// Failed records created at or after `since`, newest first, optionally for one teacher.
    async fn find_failed_since(
        &self,
        since: DateTime<Utc>,
        teacher: Option<i64>,
    ) -> Result<Vec<NotificationRecord>, AuditStoreError>;

    /// All records for a student, newest first.
    async fn list_by_student(
        &self,
        student_id: i64,
    ) -> Result<Vec<NotificationRecord>, AuditStoreError>;

    /// All records for a teacher, newest first.
    async fn list_by_teacher(
        &self,
        teacher_id: i64,
    ) -> Result<Vec<NotificationRecord>, AuditStoreError>;

    async fn find_by_external_id(
        &self,
        external_message_id: &str,
    ) -> Result<Option<NotificationRecord>, AuditStoreError>;

    /// Records that retry `original_id`, oldest first.
    async fn find_retries_of(
        &self,
        original_id: i64,
    ) -> Result<Vec<NotificationRecord>, AuditStoreError>;

    async fn teacher_stats(&self, teacher_id: i64) -> Result<TeacherStats, AuditStoreError>;

    async fn count(&self) -> Result<u64, AuditStoreError>;

    /// Backend type identifier
    fn backend_type(&self) -> &'static str;
}
