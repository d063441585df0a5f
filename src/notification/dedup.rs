//! Time-windowed duplicate suppression.
//!
//! A dispatch is a duplicate when the audit log already holds a record of any
//! status for the same canonical phone and message type inside the window.
//! The check is a plain read with no locking: two concurrent dispatches can
//! both pass and both send. The audit log still gets one record per attempt.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::audit::{AuditLogStore, AuditStoreError};

use super::MessageType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupDecision {
    Fresh,
    Duplicate { previous_id: i64 },
}

pub struct DedupGuard {
    store: Arc<dyn AuditLogStore>,
    window: Duration,
}

impl DedupGuard {
    /// A zero window disables suppression.
    pub fn new(store: Arc<dyn AuditLogStore>, window: Duration) -> Self {
        Self { store, window }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub async fn check(
        &self,
        phone: &str,
        message_type: MessageType,
    ) -> Result<DedupDecision, AuditStoreError> {
        if self.window.is_zero() {
            return Ok(DedupDecision::Fresh);
        }

        let window = chrono::Duration::from_std(self.window).unwrap_or(chrono::Duration::MAX);
        let since = Utc::now()
            .checked_sub_signed(window)
            .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC);

        let recent = self.store.find_recent(phone, message_type, since).await?;
        Ok(match recent.first() {
            Some(previous) => DedupDecision::Duplicate {
                previous_id: previous.id,
            },
            None => DedupDecision::Fresh,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{FailureKind, MemoryAuditStore, NewNotificationRecord};

    fn guard(store: Arc<MemoryAuditStore>, secs: u64) -> DedupGuard {
        DedupGuard::new(store, Duration::from_secs(secs))
    }

    #[tokio::test]
    async fn test_failed_records_also_count() {
        let store = Arc::new(MemoryAuditStore::new());
        let failed = store.insert_at(
            NewNotificationRecord::failed(
                "+919876543210",
                MessageType::TestResult,
                "text",
                FailureKind::GatewayError,
                "HTTP 503",
            ),
            Utc::now(),
        );

        let decision = guard(store, 300)
            .check("+919876543210", MessageType::TestResult)
            .await
            .unwrap();
        assert_eq!(
            decision,
            DedupDecision::Duplicate {
                previous_id: failed.id
            }
        );
    }

    #[tokio::test]
    async fn test_records_outside_window_are_ignored() {
        let store = Arc::new(MemoryAuditStore::new());
        store.insert_at(
            NewNotificationRecord::sent("+919876543210", MessageType::TestResult, "text", "SM1"),
            Utc::now() - chrono::Duration::minutes(6),
        );

        let decision = guard(store, 300)
            .check("+919876543210", MessageType::TestResult)
            .await
            .unwrap();
        assert_eq!(decision, DedupDecision::Fresh);
    }

    #[tokio::test]
    async fn test_zero_window_disables_check() {
        let store = Arc::new(MemoryAuditStore::new());
        store.insert_at(
            NewNotificationRecord::sent("+919876543210", MessageType::Reminder, "text", "SM1"),
            Utc::now(),
        );

        let decision = guard(store, 0)
            .check("+919876543210", MessageType::Reminder)
            .await
            .unwrap();
        assert_eq!(decision, DedupDecision::Fresh);
    }
}
