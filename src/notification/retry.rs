//! Operator-triggered retries of failed attempts.
//!
//! A retry is a brand new dispatch linked to the failed record through
//! `retry_of`. The original record is never touched.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::audit::{
    AuditLogStore, AuditStoreError, DeliveryStatus, FailureKind, NotificationRecord,
};
use crate::metrics::RetryMetrics;
use crate::template::MessageParams;

use super::dispatcher::{DispatchError, NotificationDispatcher};
use super::types::{DispatchRequest, MessageBody};

#[derive(Debug, Error)]
pub enum RetryError {
    #[error("Notification record {0} not found")]
    NotFound(i64),

    #[error("Notification record {id} is {status}, only FAILED records can be retried")]
    InvalidState { id: i64, status: DeliveryStatus },

    /// Neither the text nor the parameters of the original were kept
    #[error("Notification record {0} has no content to resend")]
    ContentUnavailable(i64),

    #[error("Audit store error: {0}")]
    Store(#[from] AuditStoreError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Outcome counts of a batch retry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchRetryReport {
    pub attempted: usize,
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Ids of the new records created by this batch
    pub retry_ids: Vec<i64>,
}

pub struct RetryCoordinator {
    store: Arc<dyn AuditLogStore>,
    dispatcher: Arc<NotificationDispatcher>,
}

impl RetryCoordinator {
    pub fn new(dispatcher: Arc<NotificationDispatcher>) -> Self {
        Self {
            store: dispatcher.store().clone(),
            dispatcher,
        }
    }

    /// Re-send a failed attempt as a new linked dispatch.
    #[tracing::instrument(name = "retry.retry", skip(self))]
    pub async fn retry(&self, record_id: i64) -> Result<NotificationRecord, RetryError> {
        let original = match self.store.get_by_id(record_id).await? {
            Some(record) => record,
            None => {
                RetryMetrics::record("not_found");
                return Err(RetryError::NotFound(record_id));
            }
        };

        if original.status != DeliveryStatus::Failed {
            RetryMetrics::record("invalid_state");
            return Err(RetryError::InvalidState {
                id: record_id,
                status: original.status,
            });
        }

        let request = retry_request(&original)?;
        let record = self.dispatcher.dispatch(request).await?;
        RetryMetrics::record("dispatched");

        tracing::info!(
            original_id = record_id,
            retry_id = record.id,
            status = %record.status,
            "Retry dispatched"
        );

        Ok(record)
    }

    /// Failed records created within `lookback`, newest first.
    pub async fn list_failed(
        &self,
        lookback: Duration,
        teacher: Option<i64>,
    ) -> Result<Vec<NotificationRecord>, RetryError> {
        let since = Utc::now() - lookback;
        Ok(self.store.find_failed_since(since, teacher).await?)
    }

    /// Retry every failed record within `lookback`.
    ///
    /// Skips invalid-phone failures, records that already have a retry, and
    /// records with nothing left to resend. Store errors abort the batch.
    #[tracing::instrument(name = "retry.batch", skip(self))]
    pub async fn retry_failed_since(
        &self,
        lookback: Duration,
        teacher: Option<i64>,
    ) -> Result<BatchRetryReport, RetryError> {
        let mut report = BatchRetryReport::default();
        let mut failed = self.list_failed(lookback, teacher).await?;
        failed.reverse();

        for original in failed {
            if original.failure_kind == Some(FailureKind::InvalidPhoneFormat)
                || !self.store.find_retries_of(original.id).await?.is_empty()
            {
                report.skipped += 1;
                RetryMetrics::record("skipped");
                continue;
            }

            let request = match retry_request(&original) {
                Ok(request) => request,
                Err(_) => {
                    report.skipped += 1;
                    RetryMetrics::record("skipped");
                    continue;
                }
            };

            let record = match self.dispatcher.dispatch(request).await {
                Ok(record) => record,
                Err(DispatchError::Misuse(reason)) => {
                    tracing::warn!(id = original.id, reason = %reason, "Stored record cannot be resent");
                    report.skipped += 1;
                    RetryMetrics::record("skipped");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            report.attempted += 1;
            RetryMetrics::record("dispatched");

            if record.is_successful() {
                report.sent += 1;
            } else {
                report.failed += 1;
            }
            report.retry_ids.push(record.id);
        }

        tracing::info!(
            attempted = report.attempted,
            sent = report.sent,
            failed = report.failed,
            skipped = report.skipped,
            "Batch retry finished"
        );

        Ok(report)
    }
}

/// Dispatch request re-issuing `original` under its retry type.
fn retry_request(original: &NotificationRecord) -> Result<DispatchRequest, RetryError> {
    let body = if original.has_content() {
        MessageBody::Rendered(original.message_content.clone())
    } else {
        match original.metadata.as_ref().and_then(MessageParams::from_metadata) {
            Some(params) => MessageBody::Params(params),
            None => return Err(RetryError::ContentUnavailable(original.id)),
        }
    };

    Ok(DispatchRequest {
        raw_phone: original.recipient_phone.clone(),
        message_type: original.message_type.retry_variant(),
        body,
        related_student: original.related_student,
        related_teacher: original.related_teacher,
        retry_of: Some(original.id),
        metadata: original.metadata.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{NewNotificationRecord, CONTENT_UNAVAILABLE, DUPLICATE_DETAIL};
    use crate::notification::MessageType;

    fn failed_record(content: &str, metadata: Option<serde_json::Value>) -> NotificationRecord {
        NotificationRecord::from_new(
            4,
            NewNotificationRecord::failed(
                "+919876543210",
                MessageType::ReminderRetry,
                content,
                FailureKind::DuplicateSuppressed,
                DUPLICATE_DETAIL,
            )
            .related(Some(1), Some(2))
            .metadata(metadata),
            Utc::now(),
        )
    }

    #[test]
    fn test_retry_request_reuses_content() {
        let request = retry_request(&failed_record("hello", None)).unwrap();
        assert_eq!(request.message_type, MessageType::ReminderRetry);
        assert_eq!(request.retry_of(), Some(4));
        assert_eq!(request.related_teacher, Some(2));
        assert!(matches!(request.body, MessageBody::Rendered(ref t) if t == "hello"));
    }

    #[test]
    fn test_retry_request_recomposes_from_metadata() {
        let params = MessageParams::Reminder {
            student_name: "Asha".to_string(),
            date: chrono::NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            time: "4:30 PM".to_string(),
            note: None,
        };
        let record = failed_record(CONTENT_UNAVAILABLE, Some(params.to_metadata()));

        let request = retry_request(&record).unwrap();
        assert!(matches!(request.body, MessageBody::Params(ref p) if *p == params));
    }

    #[test]
    fn test_retry_request_without_content_or_metadata() {
        let err = retry_request(&failed_record(CONTENT_UNAVAILABLE, None)).unwrap_err();
        assert!(matches!(err, RetryError::ContentUnavailable(4)));
    }
}
