//! Renders structured parameters into message text

use std::collections::BTreeMap;

use super::params::MessageParams;
use super::types::{ComposeError, ComposeResult, ComposedMessage};

/// Percentage at or above which a test result is labelled as passed.
pub const PASS_THRESHOLD: f64 = 60.0;

/// Render the message text and positional template variables for `params`.
pub fn compose(params: &MessageParams) -> ComposeResult<ComposedMessage> {
    match params {
        MessageParams::TestResult {
            student_name,
            subject,
            score,
            max_score,
            percentage,
            grade,
        } => {
            require("student_name", student_name)?;
            require("subject", subject)?;
            require("grade", grade)?;
            finite("score", *score)?;
            finite("max_score", *max_score)?;
            finite("percentage", *percentage)?;

            let status = if *percentage >= PASS_THRESHOLD {
                "PASSED"
            } else {
                "NEEDS IMPROVEMENT"
            };

            let text = format!(
                "🎓 *EduGrowHub - Test Result*\n\n\
                 Dear {},\n\n\
                 Your test result for *{}* is now available:\n\n\
                 📊 Score: {:.1}/{:.1}\n\
                 📈 Percentage: {:.1}%\n\
                 🏆 Grade: {}\n\
                 ✅ Status: {}\n\n\
                 Keep up the great work! 💪\n\n\
                 Best regards,\n\
                 EduGrowHub Team",
                student_name, subject, score, max_score, percentage, grade, status
            );

            Ok(ComposedMessage {
                text,
                variables: positional([
                    student_name.clone(),
                    subject.clone(),
                    format!("{:.1}", score),
                    format!("{:.1}", max_score),
                    format!("{:.1}", percentage),
                    grade.clone(),
                ]),
            })
        }

        MessageParams::Enrollment {
            student_name,
            teacher_name,
            date,
        } => {
            require("student_name", student_name)?;
            require("teacher_name", teacher_name)?;

            let text = format!(
                "🎉 *Welcome to EduGrowHub!*\n\n\
                 Dear {},\n\n\
                 Congratulations! You have been successfully enrolled in our educational program.\n\n\
                 👨‍🏫 Your Teacher: {}\n\
                 📚 Platform: EduGrowHub\n\
                 🗓️ Enrollment Date: {}\n\n\
                 We're excited to have you on this learning journey!\n\n\
                 Best regards,\n\
                 EduGrowHub Team",
                student_name, teacher_name, date
            );

            Ok(ComposedMessage {
                text,
                variables: positional([
                    student_name.clone(),
                    teacher_name.clone(),
                    date.to_string(),
                ]),
            })
        }

        MessageParams::Reminder {
            student_name,
            date,
            time,
            note,
        } => {
            require("student_name", student_name)?;
            require("time", time)?;

            let mut text = format!(
                "⏰ *EduGrowHub - Reminder*\n\n\
                 Dear {},\n\n\
                 This is a reminder for your session on {} at {}.\n",
                student_name, date, time
            );
            if let Some(note) = note.as_deref().filter(|n| !n.trim().is_empty()) {
                text.push_str(&format!("\n📝 Note: {}\n", note));
            }
            text.push_str("\nBest regards,\nEduGrowHub Team");

            // Approved reminder templates take only date and time
            Ok(ComposedMessage {
                text,
                variables: positional([date.to_string(), time.clone()]),
            })
        }

        MessageParams::Announcement {
            recipient_name,
            title,
            body,
        } => {
            require("recipient_name", recipient_name)?;
            require("title", title)?;
            require("body", body)?;

            let text = format!(
                "📢 *{}*\n\n\
                 Dear {},\n\n\
                 {}\n\n\
                 Best regards,\n\
                 EduGrowHub Team",
                title, recipient_name, body
            );

            Ok(ComposedMessage {
                text,
                variables: positional([recipient_name.clone(), title.clone(), body.clone()]),
            })
        }
    }
}

fn require(field: &'static str, value: &str) -> ComposeResult<()> {
    if value.trim().is_empty() {
        return Err(ComposeError::MissingField(field));
    }
    Ok(())
}

fn finite(field: &'static str, value: f64) -> ComposeResult<()> {
    if !value.is_finite() {
        return Err(ComposeError::InvalidValue {
            field,
            reason: "must be a finite number".to_string(),
        });
    }
    Ok(())
}

/// Number values "1", "2", ... in order
fn positional<const N: usize>(values: [String; N]) -> BTreeMap<String, String> {
    values
        .into_iter()
        .enumerate()
        .map(|(i, v)| ((i + 1).to_string(), v))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn test_result(percentage: f64) -> MessageParams {
        MessageParams::TestResult {
            student_name: "Asha".to_string(),
            subject: "Math".to_string(),
            score: 42.0,
            max_score: 50.0,
            percentage,
            grade: "B".to_string(),
        }
    }

    #[test]
    fn test_result_formats_numbers_to_one_decimal() {
        let composed = compose(&test_result(84.0)).unwrap();

        assert!(composed.text.contains("Dear Asha"));
        assert!(composed.text.contains("*Math*"));
        assert!(composed.text.contains("Score: 42.0/50.0"));
        assert!(composed.text.contains("Percentage: 84.0%"));
        assert!(composed.text.contains("Grade: B"));
        assert!(composed.text.contains("Status: PASSED"));
        assert_eq!(composed.variables.get("3").map(String::as_str), Some("42.0"));
        assert_eq!(composed.variables.len(), 6);
    }

    #[test]
    fn test_result_pass_label_boundary() {
        assert!(compose(&test_result(60.0)).unwrap().text.contains("PASSED"));
        assert!(compose(&test_result(59.9))
            .unwrap()
            .text
            .contains("NEEDS IMPROVEMENT"));
    }

    #[test]
    fn test_non_finite_score_rejected() {
        let params = MessageParams::TestResult {
            student_name: "Asha".to_string(),
            subject: "Math".to_string(),
            score: f64::NAN,
            max_score: 50.0,
            percentage: 84.0,
            grade: "B".to_string(),
        };
        assert!(matches!(
            compose(&params),
            Err(ComposeError::InvalidValue { field: "score", .. })
        ));
    }

    #[test]
    fn test_enrollment_message() {
        let params = MessageParams::Enrollment {
            student_name: "Asha".to_string(),
            teacher_name: "Mr. Rao".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
        };

        let composed = compose(&params).unwrap();
        assert!(composed.text.contains("Your Teacher: Mr. Rao"));
        assert!(composed.text.contains("Enrollment Date: 2025-06-01"));
    }

    #[test]
    fn test_reminder_variables_are_date_and_time() {
        let params = MessageParams::Reminder {
            student_name: "Asha".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            time: "4:30 PM".to_string(),
            note: Some("Bring your notebook".to_string()),
        };

        let composed = compose(&params).unwrap();
        assert!(composed.text.contains("on 2025-06-01 at 4:30 PM"));
        assert!(composed.text.contains("Note: Bring your notebook"));

        let vars: Vec<(&str, &str)> = composed
            .variables
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert_eq!(vars, vec![("1", "2025-06-01"), ("2", "4:30 PM")]);
    }

    #[test]
    fn test_reminder_without_note() {
        let params = MessageParams::Reminder {
            student_name: "Asha".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            time: "9:00 AM".to_string(),
            note: Some("   ".to_string()),
        };
        assert!(!compose(&params).unwrap().text.contains("Note:"));
    }

    #[test]
    fn test_missing_field_is_reported() {
        let params = MessageParams::Announcement {
            recipient_name: "Parents".to_string(),
            title: "".to_string(),
            body: "School closed on Friday".to_string(),
        };
        assert_eq!(compose(&params), Err(ComposeError::MissingField("title")));
    }
}
