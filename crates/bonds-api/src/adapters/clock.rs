//! Clock adapters.

use crate::ports::Clock;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;

/// Default system time source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for deterministic expiry and TOTP tests.
#[derive(Debug)]
pub struct ManualClock {
    time: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(initial: DateTime<Utc>) -> Self {
        Self {
            time: RwLock::new(initial),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.time.write() += by;
    }

    pub fn set(&self, time: DateTime<Utc>) {
        *self.time.write() = time;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.time.read()
    }
}
