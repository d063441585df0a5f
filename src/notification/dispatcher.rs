use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;

use crate::audit::{
    AuditLogStore, AuditStoreError, FailureKind, NewNotificationRecord, NotificationRecord,
    Outcome, CONTENT_UNAVAILABLE, DUPLICATE_DETAIL, INVALID_PHONE_DETAIL, UNKNOWN_RECIPIENT,
};
use crate::config::Settings;
use crate::gateway::{GatewayBody, GatewayError, MessagingGateway, OutboundMessage};
use crate::metrics::DispatchMetrics;
use crate::phone::{mask_phone, PhoneNormalizer};
use crate::template::{compose, ComposeError, MessageParams};

use super::dedup::{DedupDecision, DedupGuard};
use super::types::{DispatchRequest, MessageBody, Recipient, TestScore};

/// Errors returned by `dispatch`.
///
/// Bad phones, duplicates and gateway failures are not errors: they are
/// recorded as failed attempts and returned as records.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Request is malformed; nothing was recorded
    #[error("Invalid dispatch request: {0}")]
    Misuse(String),

    /// The audit log could not be read or written
    #[error("Audit store error: {0}")]
    Store(#[from] AuditStoreError),
}

impl From<ComposeError> for DispatchError {
    fn from(e: ComposeError) -> Self {
        DispatchError::Misuse(e.to_string())
    }
}

/// Dispatcher configuration, built once from settings.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Sender identity handed to the gateway
    pub sender: String,
    pub default_country_code: String,
    pub suppression_window: Duration,
    pub gateway_timeout: Duration,
    /// Approved content template per message type name, upper case
    pub content_sids: HashMap<String, String>,
}

impl DispatcherConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            sender: settings.gateway.from.clone(),
            default_country_code: settings.dispatch.default_country_code.clone(),
            suppression_window: Duration::from_secs(settings.dispatch.suppression_window_seconds),
            gateway_timeout: Duration::from_secs(settings.gateway.timeout_seconds),
            // Config sources lower-case map keys; message type names are upper case
            content_sids: settings
                .gateway
                .content_sids
                .iter()
                .map(|(name, sid)| (name.to_ascii_uppercase(), sid.clone()))
                .collect(),
        }
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            sender: String::new(),
            default_country_code: "91".to_string(),
            suppression_window: Duration::from_secs(300),
            gateway_timeout: Duration::from_secs(10),
            content_sids: HashMap::new(),
        }
    }
}

/// Statistics for the notification dispatcher
#[derive(Debug, Default)]
pub struct DispatcherStats {
    pub total_dispatched: AtomicU64,
    pub total_sent: AtomicU64,
    pub total_failed: AtomicU64,
    pub invalid_phone: AtomicU64,
    pub duplicates_suppressed: AtomicU64,
    pub gateway_errors: AtomicU64,
}

impl DispatcherStats {
    pub fn snapshot(&self) -> DispatcherStatsSnapshot {
        DispatcherStatsSnapshot {
            total_dispatched: self.total_dispatched.load(Ordering::Relaxed),
            total_sent: self.total_sent.load(Ordering::Relaxed),
            total_failed: self.total_failed.load(Ordering::Relaxed),
            invalid_phone: self.invalid_phone.load(Ordering::Relaxed),
            duplicates_suppressed: self.duplicates_suppressed.load(Ordering::Relaxed),
            gateway_errors: self.gateway_errors.load(Ordering::Relaxed),
        }
    }

    fn observe(&self, record: &NotificationRecord) {
        self.total_dispatched.fetch_add(1, Ordering::Relaxed);
        match record.failure_kind {
            None => {
                self.total_sent.fetch_add(1, Ordering::Relaxed);
            }
            Some(kind) => {
                self.total_failed.fetch_add(1, Ordering::Relaxed);
                let counter = match kind {
                    FailureKind::InvalidPhoneFormat => &self.invalid_phone,
                    FailureKind::DuplicateSuppressed => &self.duplicates_suppressed,
                    FailureKind::GatewayError => &self.gateway_errors,
                };
                counter.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// Snapshot of dispatcher statistics
#[derive(Debug, Clone, Serialize)]
pub struct DispatcherStatsSnapshot {
    pub total_dispatched: u64,
    pub total_sent: u64,
    pub total_failed: u64,
    pub invalid_phone: u64,
    pub duplicates_suppressed: u64,
    pub gateway_errors: u64,
}

/// Sends notifications through the gateway and records every attempt.
///
/// Each non-misuse call to `dispatch` writes exactly one audit record.
pub struct NotificationDispatcher {
    store: Arc<dyn AuditLogStore>,
    gateway: Arc<dyn MessagingGateway>,
    normalizer: PhoneNormalizer,
    dedup: DedupGuard,
    config: DispatcherConfig,
    stats: DispatcherStats,
}

impl NotificationDispatcher {
    pub fn new(
        store: Arc<dyn AuditLogStore>,
        gateway: Arc<dyn MessagingGateway>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            normalizer: PhoneNormalizer::new(config.default_country_code.clone()),
            dedup: DedupGuard::new(store.clone(), config.suppression_window),
            store,
            gateway,
            config,
            stats: DispatcherStats::default(),
        }
    }

    pub fn store(&self) -> &Arc<dyn AuditLogStore> {
        &self.store
    }

    pub fn stats(&self) -> DispatcherStatsSnapshot {
        self.stats.snapshot()
    }

    /// Dispatch one notification and record the attempt.
    #[tracing::instrument(
        name = "dispatcher.dispatch",
        skip(self, request),
        fields(message_type = %request.message_type, retry_of = ?request.retry_of)
    )]
    pub async fn dispatch(
        &self,
        request: DispatchRequest,
    ) -> Result<NotificationRecord, DispatchError> {
        let (text, body) = self.prepare(&request)?;
        let metadata = request.metadata_snapshot();

        let phone = match self.normalizer.normalize(&request.raw_phone) {
            Ok(phone) => phone,
            Err(_) => {
                tracing::warn!(
                    raw_phone = %mask_phone(&request.raw_phone),
                    "Phone number could not be normalized"
                );
                let record = NewNotificationRecord::failed(
                    UNKNOWN_RECIPIENT,
                    request.message_type,
                    CONTENT_UNAVAILABLE,
                    FailureKind::InvalidPhoneFormat,
                    INVALID_PHONE_DETAIL,
                );
                return self.record(record, &request, metadata).await;
            }
        };

        if let DedupDecision::Duplicate { previous_id } =
            self.dedup.check(&phone, request.message_type).await?
        {
            tracing::info!(
                recipient = %mask_phone(&phone),
                previous_id = previous_id,
                window_secs = self.dedup.window().as_secs(),
                "Duplicate notification suppressed"
            );
            let record = NewNotificationRecord::failed(
                phone,
                request.message_type,
                CONTENT_UNAVAILABLE,
                FailureKind::DuplicateSuppressed,
                DUPLICATE_DETAIL,
            );
            return self.record(record, &request, metadata).await;
        }

        let outbound = OutboundMessage {
            to: phone.clone(),
            from: self.config.sender.clone(),
            body,
        };

        let record = match self.send(&outbound).await {
            Ok(external_id) => {
                NewNotificationRecord::sent(phone, request.message_type, text, external_id)
            }
            Err(e) => {
                tracing::warn!(
                    recipient = %mask_phone(&phone),
                    gateway = self.gateway.name(),
                    error = %e,
                    "Gateway send failed"
                );
                NewNotificationRecord::failed(
                    phone,
                    request.message_type,
                    text,
                    FailureKind::GatewayError,
                    e.to_string(),
                )
            }
        };

        self.record(record, &request, metadata).await
    }

    /// Validate the request and build the recorded text and gateway body.
    ///
    /// Malformed requests are rejected here, before anything is recorded.
    fn prepare(&self, request: &DispatchRequest) -> Result<(String, GatewayBody), DispatchError> {
        match &request.body {
            MessageBody::Params(params) => {
                if params.message_type() != request.message_type.base() {
                    return Err(DispatchError::Misuse(format!(
                        "parameters for {} cannot be sent as {}",
                        params.message_type(),
                        request.message_type
                    )));
                }

                let composed = compose(params)?;
                let template = self
                    .config
                    .content_sids
                    .get(request.message_type.base().as_str());
                Ok(match template {
                    Some(content_sid) => (
                        composed.text,
                        GatewayBody::Template {
                            content_sid: content_sid.clone(),
                            variables: composed.variables,
                        },
                    ),
                    None => (composed.text.clone(), GatewayBody::Text(composed.text)),
                })
            }
            MessageBody::Rendered(text) => {
                if text.trim().is_empty() {
                    return Err(DispatchError::Misuse(
                        "rendered message text is empty".to_string(),
                    ));
                }
                Ok((text.clone(), GatewayBody::Text(text.clone())))
            }
        }
    }

    /// Gateway call bounded by the configured timeout.
    async fn send(&self, message: &OutboundMessage) -> Result<String, GatewayError> {
        let timeout = self.config.gateway_timeout;
        match tokio::time::timeout(timeout, self.gateway.send(message)).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout(timeout)),
        }
    }

    async fn record(
        &self,
        record: NewNotificationRecord,
        request: &DispatchRequest,
        metadata: Option<serde_json::Value>,
    ) -> Result<NotificationRecord, DispatchError> {
        let record = record
            .related(request.related_student, request.related_teacher)
            .retry_of(request.retry_of)
            .metadata(metadata);

        if let Outcome::Failed { kind, .. } = &record.outcome {
            DispatchMetrics::record_failure(kind.as_str());
        }

        let stored = self.store.insert(record).await?;
        DispatchMetrics::record_attempt(stored.message_type.as_str(), stored.status.as_str());
        self.stats.observe(&stored);

        tracing::info!(
            id = stored.id,
            recipient = %stored.masked_recipient_phone(),
            message_type = %stored.message_type,
            status = %stored.status,
            external_id = ?stored.external_message_id,
            "Notification attempt recorded"
        );

        Ok(stored)
    }

    // ------------------------------------------------------------------
    // Convenience senders
    // ------------------------------------------------------------------

    pub async fn send_test_result(
        &self,
        recipient: &Recipient,
        student_name: &str,
        subject: &str,
        score: &TestScore,
    ) -> Result<NotificationRecord, DispatchError> {
        let params = MessageParams::TestResult {
            student_name: student_name.to_string(),
            subject: subject.to_string(),
            score: score.score,
            max_score: score.max_score,
            percentage: score.percentage,
            grade: score.grade.clone(),
        };
        self.dispatch(request_for(recipient, params)).await
    }

    /// Enrollment confirmation dated today (UTC).
    pub async fn send_enrollment_confirmation(
        &self,
        recipient: &Recipient,
        student_name: &str,
        teacher_name: &str,
    ) -> Result<NotificationRecord, DispatchError> {
        let params = MessageParams::Enrollment {
            student_name: student_name.to_string(),
            teacher_name: teacher_name.to_string(),
            date: Utc::now().date_naive(),
        };
        self.dispatch(request_for(recipient, params)).await
    }

    pub async fn send_reminder(
        &self,
        recipient: &Recipient,
        student_name: &str,
        date: chrono::NaiveDate,
        time: &str,
        note: Option<&str>,
    ) -> Result<NotificationRecord, DispatchError> {
        let params = MessageParams::Reminder {
            student_name: student_name.to_string(),
            date,
            time: time.to_string(),
            note: note.map(str::to_string),
        };
        self.dispatch(request_for(recipient, params)).await
    }

    pub async fn send_announcement(
        &self,
        recipient: &Recipient,
        recipient_name: &str,
        title: &str,
        body: &str,
    ) -> Result<NotificationRecord, DispatchError> {
        let params = MessageParams::Announcement {
            recipient_name: recipient_name.to_string(),
            title: title.to_string(),
            body: body.to_string(),
        };
        self.dispatch(request_for(recipient, params)).await
    }
}

fn request_for(recipient: &Recipient, params: MessageParams) -> DispatchRequest {
    let mut request = DispatchRequest::new(recipient.phone.clone(), params);
    request.related_student = recipient.student;
    request.related_teacher = recipient.teacher;
    request
}
