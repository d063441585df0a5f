//! Structured parameters for each message type

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::notification::MessageType;

/// Event parameters, one variant per base message type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageParams {
    TestResult {
        student_name: String,
        subject: String,
        score: f64,
        max_score: f64,
        percentage: f64,
        grade: String,
    },
    Enrollment {
        student_name: String,
        teacher_name: String,
        date: NaiveDate,
    },
    Reminder {
        student_name: String,
        date: NaiveDate,
        /// Free-form time of day, e.g. "4:30 PM"
        time: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        note: Option<String>,
    },
    Announcement {
        recipient_name: String,
        title: String,
        body: String,
    },
}

impl MessageParams {
    /// Base message type these parameters render
    pub fn message_type(&self) -> MessageType {
        match self {
            MessageParams::TestResult { .. } => MessageType::TestResult,
            MessageParams::Enrollment { .. } => MessageType::Enrollment,
            MessageParams::Reminder { .. } => MessageType::Reminder,
            MessageParams::Announcement { .. } => MessageType::Announcement,
        }
    }

    /// Snapshot stored alongside audit records
    pub fn to_metadata(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    pub fn from_metadata(value: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_snapshot_restores_params() {
        let params = MessageParams::Reminder {
            student_name: "Asha".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            time: "4:30 PM".to_string(),
            note: None,
        };

        let metadata = params.to_metadata();
        assert_eq!(metadata["kind"], "reminder");
        assert!(metadata.get("note").is_none());
        assert_eq!(MessageParams::from_metadata(&metadata), Some(params));
    }

    #[test]
    fn test_foreign_metadata_is_ignored() {
        let value = serde_json::json!({"source": "import"});
        assert!(MessageParams::from_metadata(&value).is_none());
    }
}
