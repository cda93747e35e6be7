use chrono::{DateTime, Datelike, NaiveDate, Utc};
use core::{fmt, str::FromStr};

/// A calendar month in UTC, written `YYYY-MM`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid month `{input}`, expected YYYY-MM")]
pub struct MonthParseError {
    input: String,
}

/// The last year a [`YearMonth`] may name. The month after it still starts in
/// a four-digit year, so RFC 3339 bounds compare correctly as text.
const MAX_YEAR: i32 = 9998;

impl YearMonth {
    /// Returns `None` unless `1 <= year <= 9998` and `1 <= month <= 12`.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        ((1..=MAX_YEAR).contains(&year) && (1..=12).contains(&month))
            .then_some(Self { year, month })
    }

    /// The month `instant` falls in.
    pub fn of(instant: DateTime<Utc>) -> Self {
        Self {
            year: instant.year(),
            month: instant.month(),
        }
    }

    pub const fn year(&self) -> i32 {
        self.year
    }

    pub const fn month(&self) -> u32 {
        self.month
    }

    pub fn previous(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Half-open `[start, end)` bounds of the month.
    pub fn bounds(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let next = self.next();
        (
            first_instant(self.year, self.month),
            first_instant(next.year, next.month),
        )
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        Self::of(instant) == *self
    }
}

fn first_instant(year: i32, month: u32) -> DateTime<Utc> {
    // Every validated month (and the one after it) is inside chrono's range.
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map_or(DateTime::<Utc>::MAX_UTC, |dt| dt.and_utc())
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = MonthParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || MonthParseError {
            input: s.to_owned(),
        };
        let (y, m) = s.split_once('-').ok_or_else(err)?;
        if y.len() != 4 || m.len() != 2 {
            return Err(err());
        }
        let year = y.parse().map_err(|_| err())?;
        let month = m.parse().map_err(|_| err())?;
        Self::new(year, month).ok_or_else(err)
    }
}
