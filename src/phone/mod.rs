//! Phone number normalization and masking.
//!
//! Canonical phones are the audit and dedup key, so normalization must be
//! deterministic and idempotent: feeding a canonical value back in returns it
//! unchanged.

use thiserror::Error;

/// Minimum length of an explicit international number, including the '+'.
const MIN_INTERNATIONAL_LEN: usize = 11;

/// Length of a national subscriber number without country code.
const NATIONAL_NUMBER_LEN: usize = 10;

/// Fixed mask inserted between the visible head and tail of a phone.
pub const PHONE_MASK: &str = "***";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PhoneError {
    #[error("InvalidPhoneFormat")]
    InvalidFormat,
}

/// Converts raw user-entered phone numbers into canonical international form.
#[derive(Debug, Clone)]
pub struct PhoneNormalizer {
    default_country_code: String,
}

impl PhoneNormalizer {
    /// `default_country_code` is given without '+', e.g. "91".
    pub fn new(default_country_code: impl Into<String>) -> Self {
        let code: String = default_country_code.into();
        Self {
            default_country_code: code.trim_start_matches('+').to_string(),
        }
    }

    pub fn default_country_code(&self) -> &str {
        &self.default_country_code
    }

    /// Normalize a raw phone string.
    ///
    /// Everything except digits and a leading '+' is stripped. Then:
    /// - `+...` is accepted when at least 11 characters long
    /// - country code followed by 10 digits gets a '+' prefix
    /// - a bare 10-digit number gets '+' and the default country code
    ///
    /// Anything else is `PhoneError::InvalidFormat`.
    pub fn normalize(&self, raw: &str) -> Result<String, PhoneError> {
        let trimmed = raw.trim();
        let international = trimmed.starts_with('+');
        let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();

        if digits.is_empty() {
            return Err(PhoneError::InvalidFormat);
        }

        if international {
            let canonical = format!("+{}", digits);
            return if canonical.len() >= MIN_INTERNATIONAL_LEN {
                Ok(canonical)
            } else {
                Err(PhoneError::InvalidFormat)
            };
        }

        let cc = &self.default_country_code;
        if !cc.is_empty()
            && digits.len() == cc.len() + NATIONAL_NUMBER_LEN
            && digits.starts_with(cc.as_str())
        {
            return Ok(format!("+{}", digits));
        }

        if digits.len() == NATIONAL_NUMBER_LEN {
            return Ok(format!("+{}{}", cc, digits));
        }

        Err(PhoneError::InvalidFormat)
    }
}

impl Default for PhoneNormalizer {
    fn default() -> Self {
        Self::new("91")
    }
}

/// Mask a phone for logs and UI: first 3 and last 4 characters stay visible.
///
/// Values too short to keep anything hidden collapse to the bare mask.
pub fn mask_phone(phone: &str) -> String {
    let chars: Vec<char> = phone.chars().collect();
    if chars.len() < 8 {
        return PHONE_MASK.to_string();
    }

    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}{}", head, PHONE_MASK, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ten_digit_numbers_get_default_country_code() {
        let normalizer = PhoneNormalizer::default();
        for raw in ["9876543210", "1234567890", "0000000000", "5550001111"] {
            assert_eq!(normalizer.normalize(raw).unwrap(), format!("+91{}", raw));
        }
    }

    #[test]
    fn test_strips_formatting_characters() {
        let normalizer = PhoneNormalizer::default();
        assert_eq!(
            normalizer.normalize("(987) 654-3210").unwrap(),
            "+919876543210"
        );
        assert_eq!(
            normalizer.normalize(" +91 98765 43210 ").unwrap(),
            "+919876543210"
        );
    }

    #[test]
    fn test_country_code_prefixed_number() {
        let normalizer = PhoneNormalizer::default();
        assert_eq!(normalizer.normalize("919876543210").unwrap(), "+919876543210");
    }

    #[test]
    fn test_twelve_digits_with_other_prefix_rejected() {
        let normalizer = PhoneNormalizer::default();
        assert_eq!(
            normalizer.normalize("449876543210"),
            Err(PhoneError::InvalidFormat)
        );
    }

    #[test]
    fn test_international_numbers_accepted_as_is() {
        let normalizer = PhoneNormalizer::default();
        assert_eq!(normalizer.normalize("+14155238886").unwrap(), "+14155238886");
        assert_eq!(normalizer.normalize("+4420794600").unwrap(), "+4420794600");
    }

    #[test]
    fn test_short_international_rejected() {
        let normalizer = PhoneNormalizer::default();
        assert_eq!(normalizer.normalize("+123456789"), Err(PhoneError::InvalidFormat));
        assert_eq!(normalizer.normalize("+"), Err(PhoneError::InvalidFormat));
    }

    #[test]
    fn test_invalid_inputs() {
        let normalizer = PhoneNormalizer::default();
        for raw in ["", "   ", "123", "abc", "12345678901234", "98765-4321"] {
            assert_eq!(
                normalizer.normalize(raw),
                Err(PhoneError::InvalidFormat),
                "expected {raw:?} to be rejected"
            );
        }
    }

    #[test]
    fn test_plus_only_kept_when_leading() {
        let normalizer = PhoneNormalizer::default();
        // An embedded '+' is stripped, leaving a plain 10-digit number
        assert_eq!(normalizer.normalize("98765+43210").unwrap(), "+919876543210");
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let normalizer = PhoneNormalizer::default();
        for raw in [
            "9876543210",
            "919876543210",
            "+14155238886",
            "+91 (987) 654-3210",
            "+447700900123",
        ] {
            let once = normalizer.normalize(raw).unwrap();
            let twice = normalizer.normalize(&once).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_custom_country_code() {
        let normalizer = PhoneNormalizer::new("+1");
        assert_eq!(normalizer.default_country_code(), "1");
        assert_eq!(normalizer.normalize("4155238886").unwrap(), "+14155238886");
        assert_eq!(normalizer.normalize("14155238886").unwrap(), "+14155238886");
    }

    #[test]
    fn test_mask_phone() {
        assert_eq!(mask_phone("+919876543210"), "+91***3210");
        assert_eq!(mask_phone("+14155238886"), "+14***8886");
        assert_eq!(mask_phone("UNKNOWN"), "***");
        assert_eq!(mask_phone(""), "***");
    }
}
