//! Outstanding email verification and password reset codes.

use crate::domain::user::normalize_email;
use crate::domain::{BondsError, BondsResult, CodePurpose, VerificationCode};
use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::Rng;
use subtle::ConstantTimeEq;

type CodeKey = (String, CodePurpose);

/// Single-use codes keyed by (lowercased email, purpose).
#[derive(Default)]
pub struct CodeStore {
    codes: DashMap<CodeKey, VerificationCode>,
}

impl CodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh 6-digit code, replacing any outstanding one for the key.
    pub fn issue(
        &self,
        email: &str,
        purpose: CodePurpose,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> String {
        let code = rand::thread_rng().gen_range(100_000..=999_999).to_string();
        self.codes.insert(
            (normalize_email(email), purpose),
            VerificationCode {
                code: code.clone(),
                purpose,
                expires_at: now + ttl,
            },
        );
        code
    }

    /// Check and consume a code.
    ///
    /// Missing is [`BondsError::CodeInvalid`]; expired is
    /// [`BondsError::CodeExpired`] and removes the code; wrong digits are
    /// [`BondsError::CodeMismatch`] and keep it.
    pub fn verify(
        &self,
        email: &str,
        purpose: CodePurpose,
        code: &str,
        now: DateTime<Utc>,
    ) -> BondsResult<()> {
        match self.codes.entry((normalize_email(email), purpose)) {
            Entry::Vacant(_) => Err(BondsError::CodeInvalid),
            Entry::Occupied(entry) => {
                let stored = entry.get();
                if stored.purpose != purpose {
                    return Err(BondsError::CodeInvalid);
                }
                if stored.is_expired(now) {
                    entry.remove();
                    return Err(BondsError::CodeExpired);
                }
                if !bool::from(stored.code.as_bytes().ct_eq(code.as_bytes())) {
                    return Err(BondsError::CodeMismatch);
                }
                entry.remove();
                Ok(())
            }
        }
    }

    pub fn has_pending(&self, email: &str, purpose: CodePurpose) -> bool {
        self.codes.contains_key(&(normalize_email(email), purpose))
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Drop every expired code. Returns how many were removed.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let before = self.codes.len();
        self.codes.retain(|_, c| !c.is_expired(now));
        before.saturating_sub(self.codes.len())
    }
}
