use chrono::{DateTime, Duration, Utc};

/// How long after issuance a rotating code is accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessWindow(Duration);

impl FreshnessWindow {
    pub const DEFAULT_SECS: u64 = 10;

    pub fn new(max_age: Duration) -> Self {
        Self(max_age)
    }

    pub fn from_secs(secs: u64) -> Self {
        Self(Duration::seconds(secs.min(i32::MAX as u64) as i64))
    }

    pub fn max_age(&self) -> Duration {
        self.0
    }

    /// `0 <= now - issued_at <= max_age`, both ends inclusive, at full
    /// timestamp precision. A code stamped after `now` is not valid yet.
    pub fn admits(&self, now: DateTime<Utc>, issued_at: DateTime<Utc>) -> bool {
        let age = now - issued_at;
        age >= Duration::zero() && age <= self.0
    }
}

impl Default for FreshnessWindow {
    fn default() -> Self {
        Self::from_secs(Self::DEFAULT_SECS)
    }
}
