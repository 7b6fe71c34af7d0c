//! Request field validation.
//!
//! Validators collect [`FieldError`]s instead of failing fast so a client can
//! see every bad field in a single response.

use serde::Serialize;

/// A single rejected field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Accumulates field errors across several checks.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `message` against `field` unless `ok` holds.
    pub fn check(&mut self, ok: bool, field: &'static str, message: &str) -> &mut Self {
        if !ok {
            self.errors.push(FieldError::new(field, message));
        }
        self
    }

    pub fn finish(self) -> Result<(), Vec<FieldError>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

/// Pragmatic address check: one `@`, non-empty local part, dotted domain.
pub fn is_email(value: &str) -> bool {
    let value = value.trim();
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') || value.chars().any(char::is_whitespace) {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2
        && labels.iter().all(|l| {
            !l.is_empty()
                && !l.starts_with('-')
                && !l.ends_with('-')
                && l.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
        && labels.last().is_some_and(|tld| tld.len() >= 2)
}

/// E.164: `+`, a non-zero leading digit and up to 15 digits total.
pub fn is_e164_phone(value: &str) -> bool {
    let Some(digits) = value.strip_prefix('+') else {
        return false;
    };
    (2..=15).contains(&digits.len())
        && !digits.starts_with('0')
        && digits.chars().all(|c| c.is_ascii_digit())
}

pub fn is_six_digit_code(value: &str) -> bool {
    value.len() == 6 && value.chars().all(|c| c.is_ascii_digit())
}

/// `0x` followed by 64 hex digits.
pub fn is_tx_hash(value: &str) -> bool {
    value.len() == 66
        && value.starts_with("0x")
        && value[2..].chars().all(|c| c.is_ascii_hexdigit())
}

/// `0x` followed by 40 hex digits.
pub fn is_wallet_address(value: &str) -> bool {
    value.len() == 42
        && value.starts_with("0x")
        && value[2..].chars().all(|c| c.is_ascii_hexdigit())
}

pub fn char_len_between(value: &str, min: usize, max: usize) -> bool {
    let n = value.trim().chars().count();
    n >= min && n <= max
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_format() {
        assert!(is_email("investor@example.com"));
        assert!(is_email("a.b+tag@sub.example.org"));
        assert!(!is_email("investor"));
        assert!(!is_email("@example.com"));
        assert!(!is_email("a@b"));
        assert!(!is_email("a@@example.com"));
        assert!(!is_email("a b@example.com"));
    }

    #[test]
    fn test_phone_format() {
        assert!(is_e164_phone("+33123456789"));
        assert!(is_e164_phone("+22501234567"));
        assert!(!is_e164_phone("0123456789"));
        assert!(!is_e164_phone("+0123"));
        assert!(!is_e164_phone("+1234567890123456"));
    }

    #[test]
    fn test_tx_hash_format() {
        let hash = format!("0x{}", "ab".repeat(32));
        assert!(is_tx_hash(&hash));
        assert!(!is_tx_hash("0xabc"));
        assert!(!is_tx_hash(&format!("0x{}", "zz".repeat(32))));
    }

    #[test]
    fn test_validator_collects_all_errors() {
        let mut v = Validator::new();
        v.check(false, "email", "Invalid email")
            .check(true, "name", "Invalid name")
            .check(false, "password", "Password too short");
        let errors = v.finish().unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].field, "email");
        assert_eq!(errors[1].field, "password");
    }

    #[test]
    fn test_code_format() {
        assert!(is_six_digit_code("123456"));
        assert!(!is_six_digit_code("12345"));
        assert!(!is_six_digit_code("12345a"));
    }
}
