//! Failed login tracking and temporary lockout.

use crate::domain::user::normalize_email;
use crate::domain::LoginAttemptRecord;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::warn;

/// Locks an email out once `threshold` failures land within `window` of
/// each other. A failure after a quiet window starts a new count.
pub struct AttemptTracker {
    records: DashMap<String, LoginAttemptRecord>,
    threshold: u32,
    window: Duration,
}

impl AttemptTracker {
    pub fn new(threshold: u32, window: Duration) -> Self {
        Self {
            records: DashMap::new(),
            threshold,
            window,
        }
    }

    fn is_fresh(&self, record: &LoginAttemptRecord, now: DateTime<Utc>) -> bool {
        now - record.last_attempt < self.window
    }

    pub fn is_locked(&self, email: &str, now: DateTime<Utc>) -> bool {
        self.records
            .get(&normalize_email(email))
            .is_some_and(|r| r.count >= self.threshold && self.is_fresh(&r, now))
    }

    pub fn record_failure(&self, email: &str, now: DateTime<Utc>) {
        let key = normalize_email(email);
        let mut entry = self.records.entry(key.clone()).or_insert(LoginAttemptRecord {
            count: 0,
            last_attempt: now,
        });
        if entry.count > 0 && !self.is_fresh(&entry, now) {
            entry.count = 0;
        }
        entry.count += 1;
        entry.last_attempt = now;
        if entry.count >= self.threshold {
            warn!(email = %key, failures = entry.count, "Login locked out");
        }
    }

    pub fn clear(&self, email: &str) {
        self.records.remove(&normalize_email(email));
    }

    /// Failures currently on record (0 when absent).
    pub fn failures(&self, email: &str) -> u32 {
        self.records
            .get(&normalize_email(email))
            .map(|r| r.count)
            .unwrap_or(0)
    }

    /// Drop records whose window has passed.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let before = self.records.len();
        self.records.retain(|_, r| now - r.last_attempt < self.window);
        before.saturating_sub(self.records.len())
    }
}
