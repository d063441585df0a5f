use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::template::MessageParams;

/// Kind of notification being sent.
///
/// Each base kind has a retry variant used for operator-triggered re-sends.
/// Retry variants never nest: the retry variant of a retry variant is itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    #[serde(rename = "TEST_RESULT")]
    TestResult,
    #[serde(rename = "ENROLLMENT_CONFIRMATION")]
    Enrollment,
    #[serde(rename = "REMINDER")]
    Reminder,
    #[serde(rename = "ANNOUNCEMENT")]
    Announcement,
    #[serde(rename = "TEST_RESULT_RETRY")]
    TestResultRetry,
    #[serde(rename = "ENROLLMENT_CONFIRMATION_RETRY")]
    EnrollmentRetry,
    #[serde(rename = "REMINDER_RETRY")]
    ReminderRetry,
    #[serde(rename = "ANNOUNCEMENT_RETRY")]
    AnnouncementRetry,
}

impl MessageType {
    pub const ALL: [MessageType; 8] = [
        MessageType::TestResult,
        MessageType::Enrollment,
        MessageType::Reminder,
        MessageType::Announcement,
        MessageType::TestResultRetry,
        MessageType::EnrollmentRetry,
        MessageType::ReminderRetry,
        MessageType::AnnouncementRetry,
    ];

    /// Storage and wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::TestResult => "TEST_RESULT",
            MessageType::Enrollment => "ENROLLMENT_CONFIRMATION",
            MessageType::Reminder => "REMINDER",
            MessageType::Announcement => "ANNOUNCEMENT",
            MessageType::TestResultRetry => "TEST_RESULT_RETRY",
            MessageType::EnrollmentRetry => "ENROLLMENT_CONFIRMATION_RETRY",
            MessageType::ReminderRetry => "REMINDER_RETRY",
            MessageType::AnnouncementRetry => "ANNOUNCEMENT_RETRY",
        }
    }

    pub fn is_retry(&self) -> bool {
        !matches!(
            self,
            MessageType::TestResult
                | MessageType::Enrollment
                | MessageType::Reminder
                | MessageType::Announcement
        )
    }

    /// The non-retry kind this type belongs to
    pub fn base(&self) -> MessageType {
        match self {
            MessageType::TestResult | MessageType::TestResultRetry => MessageType::TestResult,
            MessageType::Enrollment | MessageType::EnrollmentRetry => MessageType::Enrollment,
            MessageType::Reminder | MessageType::ReminderRetry => MessageType::Reminder,
            MessageType::Announcement | MessageType::AnnouncementRetry => {
                MessageType::Announcement
            }
        }
    }

    pub fn retry_variant(&self) -> MessageType {
        match self.base() {
            MessageType::TestResult => MessageType::TestResultRetry,
            MessageType::Enrollment => MessageType::EnrollmentRetry,
            MessageType::Reminder => MessageType::ReminderRetry,
            _ => MessageType::AnnouncementRetry,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown message type: {0}")]
pub struct UnknownMessageType(pub String);

impl FromStr for MessageType {
    type Err = UnknownMessageType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MessageType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownMessageType(s.to_string()))
    }
}

/// What to send: structured parameters to compose, or text that was already rendered.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageBody {
    Params(MessageParams),
    Rendered(String),
}

/// Input to a single dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchRequest {
    /// Phone as entered by the user; normalized during dispatch
    pub raw_phone: String,
    pub message_type: MessageType,
    pub body: MessageBody,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_student: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_teacher: Option<i64>,
    /// Set only by the retry coordinator
    #[serde(skip)]
    pub(crate) retry_of: Option<i64>,
    /// Parameter snapshot carried over from the record being retried
    #[serde(skip)]
    pub(crate) metadata: Option<serde_json::Value>,
}

impl DispatchRequest {
    /// Build a request from structured parameters; the message type follows the params.
    pub fn new(raw_phone: impl Into<String>, params: MessageParams) -> Self {
        Self {
            raw_phone: raw_phone.into(),
            message_type: params.message_type(),
            body: MessageBody::Params(params),
            related_student: None,
            related_teacher: None,
            retry_of: None,
            metadata: None,
        }
    }

    /// Build a request carrying text that has already been rendered.
    pub fn rendered(
        raw_phone: impl Into<String>,
        message_type: MessageType,
        text: impl Into<String>,
    ) -> Self {
        Self {
            raw_phone: raw_phone.into(),
            message_type,
            body: MessageBody::Rendered(text.into()),
            related_student: None,
            related_teacher: None,
            retry_of: None,
            metadata: None,
        }
    }

    pub fn student(mut self, id: i64) -> Self {
        self.related_student = Some(id);
        self
    }

    pub fn teacher(mut self, id: i64) -> Self {
        self.related_teacher = Some(id);
        self
    }

    pub fn retry_of(&self) -> Option<i64> {
        self.retry_of
    }

    /// Snapshot persisted with the audit record
    pub(crate) fn metadata_snapshot(&self) -> Option<serde_json::Value> {
        match &self.body {
            MessageBody::Params(params) => Some(params.to_metadata()),
            MessageBody::Rendered(_) => self.metadata.clone(),
        }
    }
}

/// Who a convenience send goes to.
#[derive(Debug, Clone, Default)]
pub struct Recipient {
    pub phone: String,
    pub student: Option<i64>,
    pub teacher: Option<i64>,
}

impl Recipient {
    pub fn new(phone: impl Into<String>) -> Self {
        Self {
            phone: phone.into(),
            ..Default::default()
        }
    }

    pub fn student(mut self, id: i64) -> Self {
        self.student = Some(id);
        self
    }

    pub fn teacher(mut self, id: i64) -> Self {
        self.teacher = Some(id);
        self
    }
}

/// Scored test outcome, with percentage and grade as computed by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct TestScore {
    pub score: f64,
    pub max_score: f64,
    pub percentage: f64,
    pub grade: String,
}
