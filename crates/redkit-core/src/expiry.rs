//! Key expiry expressed as a relative duration or an absolute deadline

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Time-to-live attached to a write or set on an existing key
///
/// Absolute deadlines are turned into a relative duration at call time
/// (`deadline - now`). A deadline in the past produces a negative value, which
/// is forwarded to the store unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// Expire after the given duration
    In(Duration),
    /// Expire at the given instant
    At(DateTime<Utc>),
}

impl Expiry {
    /// Relative expiry in milliseconds, measured from now
    pub fn relative_millis(&self) -> i64 {
        self.relative_millis_at(Utc::now())
    }

    /// Relative expiry in milliseconds, measured from `now`
    pub fn relative_millis_at(&self, now: DateTime<Utc>) -> i64 {
        match self {
            Expiry::In(duration) => i64::try_from(duration.as_millis()).unwrap_or(i64::MAX),
            Expiry::At(deadline) => (*deadline - now).num_milliseconds(),
        }
    }
}

impl From<Duration> for Expiry {
    fn from(duration: Duration) -> Self {
        Expiry::In(duration)
    }
}

impl From<DateTime<Utc>> for Expiry {
    fn from(deadline: DateTime<Utc>) -> Self {
        Expiry::At(deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_relative_duration() {
        let expiry = Expiry::In(Duration::from_secs(90));
        assert_eq!(expiry.relative_millis(), 90_000);
    }

    #[test]
    fn test_absolute_deadline_is_converted() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let deadline = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 30).unwrap();
        assert_eq!(Expiry::At(deadline).relative_millis_at(now), 30_000);
    }

    #[test]
    fn test_past_deadline_is_negative() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let deadline = Utc.with_ymd_and_hms(2024, 5, 1, 11, 59, 58).unwrap();
        assert_eq!(Expiry::At(deadline).relative_millis_at(now), -2_000);
    }

    #[test]
    fn test_huge_duration_saturates() {
        let expiry = Expiry::In(Duration::MAX);
        assert_eq!(expiry.relative_millis(), i64::MAX);
    }
}
