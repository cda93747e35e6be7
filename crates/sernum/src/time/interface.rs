use chrono::{DateTime, Utc};

/// A source of wall-clock time for stamping records.
///
/// Stores take their clock as a parameter so that `created_at` and every
/// month-based query can be pinned in tests.
///
/// # Example
/// ```
/// use chrono::{DateTime, TimeZone, Utc};
/// use sernum::TimeSource;
///
/// struct FixedTime;
/// impl TimeSource for FixedTime {
///     fn now(&self) -> DateTime<Utc> {
///         Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
///     }
/// }
///
/// assert_eq!(FixedTime.now().timestamp(), 1_748_779_200);
/// ```
pub trait TimeSource {
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock, in UTC.
#[derive(Default, Clone, Copy, Debug)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

impl<T: TimeSource + ?Sized> TimeSource for &T {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}
