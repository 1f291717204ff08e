//! Wall-clock abstraction.
//!
//! The pipeline never calls `Utc::now()` directly so that the temporal
//! features and the unusual-hour reason can be replayed deterministically.

use chrono::{DateTime, Utc};

/// Source of the current instant.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Reads the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always returns the same instant. Used for replays and tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedTimeSource(pub DateTime<Utc>);

impl TimeSource for FixedTimeSource {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_fixed_time_source() {
        let instant = Utc.with_ymd_and_hms(2024, 3, 5, 3, 15, 0).unwrap();
        let clock = FixedTimeSource(instant);
        assert_eq!(clock.now(), instant);
        assert_eq!(clock.now(), clock.now());
    }
}
