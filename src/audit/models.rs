//! Audit record model.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::notification::MessageType;
use crate::phone::mask_phone;

/// Recipient recorded when the phone could not be normalized
pub const UNKNOWN_RECIPIENT: &str = "UNKNOWN";

/// Content recorded when the message was never composed
pub const CONTENT_UNAVAILABLE: &str = "Message content not available";

pub const INVALID_PHONE_DETAIL: &str = "InvalidPhoneFormat";

pub const DUPLICATE_DETAIL: &str = "duplicate suppressed";

/// Delivery status of an attempt.
///
/// Dispatch only ever records `Sent` or `Failed`. `Pending` and `Delivered`
/// are accepted when reading rows written by other systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Delivered,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "PENDING",
            DeliveryStatus::Sent => "SENT",
            DeliveryStatus::Delivered => "DELIVERED",
            DeliveryStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(DeliveryStatus::Pending),
            "SENT" => Ok(DeliveryStatus::Sent),
            "DELIVERED" => Ok(DeliveryStatus::Delivered),
            "FAILED" => Ok(DeliveryStatus::Failed),
            other => Err(format!("Unknown delivery status: {}", other)),
        }
    }
}

/// Why an attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// Phone could not be normalized; not retryable until corrected
    InvalidPhoneFormat,
    /// Same phone and type inside the suppression window
    DuplicateSuppressed,
    /// Vendor rejected the message, or transport failure or timeout
    GatewayError,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::InvalidPhoneFormat => "InvalidPhoneFormat",
            FailureKind::DuplicateSuppressed => "DuplicateSuppressed",
            FailureKind::GatewayError => "GatewayError",
        }
    }

    pub fn is_retryable(&self) -> bool {
        !matches!(self, FailureKind::InvalidPhoneFormat)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailureKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "InvalidPhoneFormat" => Ok(FailureKind::InvalidPhoneFormat),
            "DuplicateSuppressed" => Ok(FailureKind::DuplicateSuppressed),
            "GatewayError" => Ok(FailureKind::GatewayError),
            other => Err(format!("Unknown failure kind: {}", other)),
        }
    }
}

/// Outcome fields of an attempt.
///
/// Keeps the external id and error detail tied to the status that requires them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Sent {
        external_message_id: String,
    },
    Failed {
        kind: FailureKind,
        detail: String,
    },
}

/// One dispatch attempt, as persisted in the audit log. Never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: i64,
    pub recipient_phone: String,
    pub message_type: MessageType,
    pub message_content: String,
    pub status: DeliveryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<FailureKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_student: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_teacher: Option<i64>,
    /// Failed record this attempt retries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_of: Option<i64>,
    /// Structured parameters snapshot
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub sent_at: DateTime<Utc>,
}

impl NotificationRecord {
    /// Build a stored record from an insert request.
    pub fn from_new(id: i64, new: NewNotificationRecord, sent_at: DateTime<Utc>) -> Self {
        let (status, external_message_id, failure_kind, error_detail) = match new.outcome {
            Outcome::Sent {
                external_message_id,
            } => (DeliveryStatus::Sent, Some(external_message_id), None, None),
            Outcome::Failed { kind, detail } => {
                (DeliveryStatus::Failed, None, Some(kind), Some(detail))
            }
        };

        Self {
            id,
            recipient_phone: new.recipient_phone,
            message_type: new.message_type,
            message_content: new.message_content,
            status,
            external_message_id,
            error_detail,
            failure_kind,
            related_student: new.related_student,
            related_teacher: new.related_teacher,
            retry_of: new.retry_of,
            metadata: new.metadata,
            sent_at,
        }
    }

    pub fn is_successful(&self) -> bool {
        matches!(self.status, DeliveryStatus::Sent | DeliveryStatus::Delivered)
    }

    pub fn is_failed(&self) -> bool {
        self.status == DeliveryStatus::Failed
    }

    /// Whether the text was composed and can be re-sent verbatim
    pub fn has_content(&self) -> bool {
        self.message_content != CONTENT_UNAVAILABLE
    }

    pub fn masked_recipient_phone(&self) -> String {
        mask_phone(&self.recipient_phone)
    }

    /// Display-safe view for logs and UI
    pub fn summary(&self) -> NotificationSummary {
        NotificationSummary {
            id: self.id,
            recipient: self.masked_recipient_phone(),
            message_type: self.message_type,
            status: self.status,
            failure_kind: self.failure_kind,
            error_detail: self.error_detail.clone(),
            retry_of: self.retry_of,
            sent_at: self.sent_at,
        }
    }
}

/// Insert request for the audit log. The store assigns `id` and `sent_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotificationRecord {
    pub recipient_phone: String,
    pub message_type: MessageType,
    pub message_content: String,
    pub outcome: Outcome,
    pub related_student: Option<i64>,
    pub related_teacher: Option<i64>,
    pub retry_of: Option<i64>,
    pub metadata: Option<serde_json::Value>,
}

impl NewNotificationRecord {
    pub fn sent(
        recipient_phone: impl Into<String>,
        message_type: MessageType,
        message_content: impl Into<String>,
        external_message_id: impl Into<String>,
    ) -> Self {
        Self::with_outcome(
            recipient_phone.into(),
            message_type,
            message_content.into(),
            Outcome::Sent {
                external_message_id: external_message_id.into(),
            },
        )
    }

    pub fn failed(
        recipient_phone: impl Into<String>,
        message_type: MessageType,
        message_content: impl Into<String>,
        kind: FailureKind,
        detail: impl Into<String>,
    ) -> Self {
        Self::with_outcome(
            recipient_phone.into(),
            message_type,
            message_content.into(),
            Outcome::Failed {
                kind,
                detail: detail.into(),
            },
        )
    }

    fn with_outcome(
        recipient_phone: String,
        message_type: MessageType,
        message_content: String,
        outcome: Outcome,
    ) -> Self {
        Self {
            recipient_phone,
            message_type,
            message_content,
            outcome,
            related_student: None,
            related_teacher: None,
            retry_of: None,
            metadata: None,
        }
    }

    pub fn related(mut self, student: Option<i64>, teacher: Option<i64>) -> Self {
        self.related_student = student;
        self.related_teacher = teacher;
        self
    }

    pub fn retry_of(mut self, original: Option<i64>) -> Self {
        self.retry_of = original;
        self
    }

    pub fn metadata(mut self, metadata: Option<serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn status(&self) -> DeliveryStatus {
        match self.outcome {
            Outcome::Sent { .. } => DeliveryStatus::Sent,
            Outcome::Failed { .. } => DeliveryStatus::Failed,
        }
    }
}

/// Masked status view handed to collaborators.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationSummary {
    pub id: i64,
    pub recipient: String,
    pub message_type: MessageType,
    pub status: DeliveryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<FailureKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_of: Option<i64>,
    pub sent_at: DateTime<Utc>,
}

/// Per-teacher counts by status and by message type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TeacherStats {
    pub teacher_id: i64,
    pub total: u64,
    pub by_status: BTreeMap<String, u64>,
    pub by_type: BTreeMap<String, u64>,
}

impl TeacherStats {
    pub fn new(teacher_id: i64) -> Self {
        Self {
            teacher_id,
            ..Default::default()
        }
    }

    pub fn count_status(&self, status: DeliveryStatus) -> u64 {
        self.by_status.get(status.as_str()).copied().unwrap_or(0)
    }
}
