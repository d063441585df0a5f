//! In-memory audit log backend using DashMap.
//!
//! Records live only as long as the process. Used by default and in tests.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::metrics::StoreMetrics;
use crate::notification::MessageType;

use super::backend::{AuditLogStore, AuditStoreError};
use super::models::{DeliveryStatus, NewNotificationRecord, NotificationRecord, TeacherStats};

const BACKEND: &str = "memory";

/// In-memory audit log.
///
/// Ids come from an atomic counter starting at 1, so concurrent inserts never collide.
pub struct MemoryAuditStore {
    records: DashMap<i64, NotificationRecord>,
    next_id: AtomicI64,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    /// Insert with an explicit timestamp, for seeding historical records.
    pub fn insert_at(&self, record: NewNotificationRecord, sent_at: DateTime<Utc>) -> NotificationRecord {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let stored = NotificationRecord::from_new(id, record, sent_at);
        self.records.insert(id, stored.clone());
        stored
    }

    /// Matching records, newest first (id breaks timestamp ties).
    fn select<F>(&self, predicate: F) -> Vec<NotificationRecord>
    where
        F: Fn(&NotificationRecord) -> bool,
    {
        let mut matched: Vec<NotificationRecord> = self
            .records
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        matched.sort_by(|a, b| b.sent_at.cmp(&a.sent_at).then(b.id.cmp(&a.id)));
        matched
    }
}

impl Default for MemoryAuditStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuditLogStore for MemoryAuditStore {
    async fn insert(
        &self,
        record: NewNotificationRecord,
    ) -> Result<NotificationRecord, AuditStoreError> {
        let started = Instant::now();
        let stored = self.insert_at(record, Utc::now());
        StoreMetrics::record_latency(BACKEND, "insert", started.elapsed().as_secs_f64());

        tracing::trace!(
            id = stored.id,
            message_type = %stored.message_type,
            status = %stored.status,
            "Audit record stored in memory"
        );

        Ok(stored)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<NotificationRecord>, AuditStoreError> {
        Ok(self.records.get(&id).map(|r| r.value().clone()))
    }

    async fn find_recent(
        &self,
        phone: &str,
        message_type: MessageType,
        since: DateTime<Utc>,
    ) -> Result<Vec<NotificationRecord>, AuditStoreError> {
        Ok(self.select(|r| {
            r.recipient_phone == phone && r.message_type == message_type && r.sent_at >= since
        }))
    }

    async fn find_failed_since(
        &self,
        since: DateTime<Utc>,
        teacher: Option<i64>,
    ) -> Result<Vec<NotificationRecord>, AuditStoreError> {
        Ok(self.select(|r| {
            r.status == DeliveryStatus::Failed
                && r.sent_at >= since
                && teacher.map_or(true, |t| r.related_teacher == Some(t))
        }))
    }

    async fn list_by_student(
        &self,
        student_id: i64,
    ) -> Result<Vec<NotificationRecord>, AuditStoreError> {
        Ok(self.select(|r| r.related_student == Some(student_id)))
    }

    async fn list_by_teacher(
        &self,
        teacher_id: i64,
    ) -> Result<Vec<NotificationRecord>, AuditStoreError> {
        Ok(self.select(|r| r.related_teacher == Some(teacher_id)))
    }

    async fn find_by_external_id(
        &self,
        external_message_id: &str,
    ) -> Result<Option<NotificationRecord>, AuditStoreError> {
        Ok(self
            .records
            .iter()
            .find(|entry| entry.external_message_id.as_deref() == Some(external_message_id))
            .map(|entry| entry.value().clone()))
    }

    async fn find_retries_of(
        &self,
        original_id: i64,
    ) -> Result<Vec<NotificationRecord>, AuditStoreError> {
        let mut retries = self.select(|r| r.retry_of == Some(original_id));
        retries.reverse();
        Ok(retries)
    }

    async fn teacher_stats(&self, teacher_id: i64) -> Result<TeacherStats, AuditStoreError> {
        let mut stats = TeacherStats::new(teacher_id);
        for entry in self.records.iter() {
            let record = entry.value();
            if record.related_teacher != Some(teacher_id) {
                continue;
            }
            stats.total += 1;
            *stats
                .by_status
                .entry(record.status.as_str().to_string())
                .or_default() += 1;
            *stats
                .by_type
                .entry(record.message_type.as_str().to_string())
                .or_default() += 1;
        }
        Ok(stats)
    }

    async fn count(&self) -> Result<u64, AuditStoreError> {
        Ok(self.records.len() as u64)
    }

    fn backend_type(&self) -> &'static str {
        BACKEND
    }
}
