//! Verification code delivery.
//!
//! There is no mail gateway: [`LogNotifier`] writes the code to the log and
//! [`OutboxNotifier`] keeps it in memory so tests can read it back.

use crate::domain::CodePurpose;
use crate::ports::CodeNotifier;
use parking_lot::Mutex;
use tracing::info;

#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl CodeNotifier for LogNotifier {
    fn deliver(&self, email: &str, purpose: CodePurpose, code: &str) {
        info!(email = %email, purpose = purpose.as_str(), code = %code, "Verification code issued");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxEntry {
    pub email: String,
    pub purpose: CodePurpose,
    pub code: String,
}

/// Captures every delivered code.
#[derive(Debug, Default)]
pub struct OutboxNotifier {
    sent: Mutex<Vec<OutboxEntry>>,
}

impl OutboxNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent code sent to `email` for `purpose`.
    pub fn last_code(&self, email: &str, purpose: CodePurpose) -> Option<String> {
        let email = email.to_lowercase();
        self.sent
            .lock()
            .iter()
            .rev()
            .find(|e| e.email == email && e.purpose == purpose)
            .map(|e| e.code.clone())
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }
}

impl CodeNotifier for OutboxNotifier {
    fn deliver(&self, email: &str, purpose: CodePurpose, code: &str) {
        self.sent.lock().push(OutboxEntry {
            email: email.to_lowercase(),
            purpose,
            code: code.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outbox_returns_latest_code() {
        let outbox = OutboxNotifier::new();
        outbox.deliver("a@example.com", CodePurpose::EmailVerification, "111111");
        outbox.deliver("a@example.com", CodePurpose::PasswordReset, "222222");
        outbox.deliver("A@example.com", CodePurpose::EmailVerification, "333333");

        assert_eq!(
            outbox.last_code("a@example.com", CodePurpose::EmailVerification),
            Some("333333".into())
        );
        assert_eq!(
            outbox.last_code("a@example.com", CodePurpose::PasswordReset),
            Some("222222".into())
        );
        assert_eq!(outbox.last_code("b@example.com", CodePurpose::PasswordReset), None);
        assert_eq!(outbox.sent_count(), 3);
    }
}
