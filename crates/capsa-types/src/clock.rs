use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};

/// Injectable time source.
///
/// Wall-clock timestamps name archives and order blackboard writes, so the
/// clock is a seam: production code uses [`SystemClock`], tests supply a
/// [`FixedClock`] to make every persisted timestamp deterministic.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Deterministic clock for tests. Each call to [`Clock::now`] returns the
/// held instant; `advance_micros` moves it forward so successive writes get
/// distinct, ordered timestamps.
pub struct FixedClock {
    instant: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self {
            instant: Mutex::new(instant),
        }
    }

    /// A fixed clock at an arbitrary known instant.
    pub fn default_epoch() -> Self {
        Self::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().expect("valid date"))
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        *self.instant.lock().expect("lock poisoned") = instant;
    }

    pub fn advance_micros(&self, micros: i64) {
        let mut guard = self.instant.lock().expect("lock poisoned");
        *guard += chrono::Duration::microseconds(micros);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.instant.lock().expect("lock poisoned")
    }
}

/// ISO-8601 UTC timestamp with microsecond precision and `+00:00` offset.
/// This is the format of every `timestamp` field Capsa persists.
pub fn format_timestamp(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// Compact `YYYYmmdd_HHMMSS` form used in archive file names.
pub fn format_compact(instant: DateTime<Utc>) -> String {
    instant.format("%Y%m%d_%H%M%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_is_deterministic() {
        let clock = FixedClock::default_epoch();
        assert_eq!(clock.now(), clock.now());
    }

    #[test]
    fn fixed_clock_advances() {
        let clock = FixedClock::default_epoch();
        let before = clock.now();
        clock.advance_micros(1500);
        assert!(clock.now() > before);
    }

    #[test]
    fn timestamp_format_has_offset_and_micros() {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 3, 5, 7, 9, 11).unwrap());
        let ts = format_timestamp(clock.now());
        assert_eq!(ts, "2024-03-05T07:09:11.000000+00:00");
    }

    #[test]
    fn compact_format_for_archive_names() {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 3, 5, 7, 9, 11).unwrap());
        assert_eq!(format_compact(clock.now()), "20240305_070911");
    }

    #[test]
    fn system_clock_moves_forward() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
