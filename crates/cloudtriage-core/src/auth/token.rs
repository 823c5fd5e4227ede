//! Access tokens and the clock used to judge their expiry

use std::time::{Duration, SystemTime};

use parking_lot::Mutex;

/// Tokens are refreshed this long before they expire
pub const DEFAULT_EXPIRY_SKEW: Duration = Duration::from_secs(5 * 60);

/// Bearer token with its absolute expiry
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: SystemTime,
}

impl AccessToken {
    pub fn new(value: impl Into<String>, expires_at: SystemTime) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    /// Usable at `now`: `now < expires_at - skew`
    pub fn is_valid_at(&self, now: SystemTime, skew: Duration) -> bool {
        match self.expires_at.checked_sub(skew) {
            Some(refresh_at) => now < refresh_at,
            None => false,
        }
    }

    /// Seconds until expiry, zero when already expired
    pub fn remaining(&self, now: SystemTime) -> Duration {
        self.expires_at.duration_since(now).unwrap_or_default()
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Wall-clock source
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Clock moved by hand, for expiry tests
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<SystemTime>,
}

impl ManualClock {
    pub fn new(start: SystemTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }

    pub fn set(&self, to: SystemTime) {
        *self.now.lock() = to;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000))
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        *self.now.lock()
    }
}
