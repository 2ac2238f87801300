use chrono::{Datelike, Duration as ChronoDuration, NaiveDate, Weekday};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

pub const MIN_YEAR: i32 = 1900;
pub const MAX_YEAR: i32 = 2100;

const CANONICAL_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateErrorKind {
    Format,
    YearOutOfRange,
    MonthOutOfRange,
    DayOutOfRange,
    Impossible,
    Overflow,
}

impl fmt::Display for DateErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Format => "expected YYYY-MM-DD",
            Self::YearOutOfRange => "year must be in 1900..=2100",
            Self::MonthOutOfRange => "month must be in 1..=12",
            Self::DayOutOfRange => "day must be in 1..=31",
            Self::Impossible => "no such calendar day",
            Self::Overflow => "day arithmetic left the supported range",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid date {value:?}: {kind}")]
pub struct DateError {
    pub value: String,
    pub kind: DateErrorKind,
}

impl DateError {
    fn new(value: impl Into<String>, kind: DateErrorKind) -> Self {
        Self {
            value: value.into(),
            kind,
        }
    }
}

/// A calendar day that is known to round-trip through the canonical
/// `YYYY-MM-DD` form and to lie within 1900..=2100.
///
/// The only ways to obtain one are [`SchoolDate::parse`] and
/// [`SchoolDate::add_days`], so every holder can rely on the invariants
/// without re-checking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchoolDate(NaiveDate);

impl SchoolDate {
    pub fn parse(s: &str) -> Result<Self, DateError> {
        let b = s.as_bytes();
        let shape_ok = b.len() == 10
            && b[4] == b'-'
            && b[7] == b'-'
            && b.iter()
                .enumerate()
                .all(|(i, c)| i == 4 || i == 7 || c.is_ascii_digit());
        if !shape_ok {
            return Err(DateError::new(s, DateErrorKind::Format));
        }

        // Shape check guarantees these are ASCII digits.
        let num = |r: std::ops::Range<usize>| -> u32 {
            b[r].iter().fold(0, |acc, c| acc * 10 + u32::from(c - b'0'))
        };
        let year = num(0..4) as i32;
        let month = num(5..7);
        let day = num(8..10);

        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(DateError::new(s, DateErrorKind::YearOutOfRange));
        }
        if !(1..=12).contains(&month) {
            return Err(DateError::new(s, DateErrorKind::MonthOutOfRange));
        }
        if !(1..=31).contains(&day) {
            return Err(DateError::new(s, DateErrorKind::DayOutOfRange));
        }

        let date = NaiveDate::from_ymd_opt(year, month, day)
            .ok_or_else(|| DateError::new(s, DateErrorKind::Impossible))?;
        let candidate = SchoolDate(date);
        if candidate.to_string() != s {
            return Err(DateError::new(s, DateErrorKind::Impossible));
        }
        Ok(candidate)
    }

    pub fn add_days(self, n: i64) -> Result<Self, DateError> {
        let shifted = self
            .0
            .checked_add_signed(ChronoDuration::days(n))
            .ok_or_else(|| DateError::new(self.to_string(), DateErrorKind::Overflow))?;
        // Re-enter through the canonical constructor so the year bounds hold.
        Self::parse(&shifted.format(CANONICAL_FORMAT).to_string()).map_err(|e| {
            let kind = match e.kind {
                DateErrorKind::YearOutOfRange => DateErrorKind::Overflow,
                other => other,
            };
            DateError::new(e.value, kind)
        })
    }

    /// 0 = Sunday .. 6 = Saturday.
    pub fn weekday_of(self) -> u8 {
        self.0.weekday().num_days_from_sunday() as u8
    }

    pub fn weekday(self) -> Weekday {
        self.0.weekday()
    }

    pub fn is_school_day(self) -> bool {
        !matches!(self.weekday_of(), 0 | 6)
    }

    /// Agrees with byte-wise comparison of the canonical strings because the
    /// format is fixed width, zero padded and most-significant first.
    pub fn compare(self, other: Self) -> Ordering {
        self.cmp(&other)
    }

    /// Inclusive day count from `self` to `end`; zero when `end` precedes `self`.
    pub fn days_through(self, end: Self) -> i64 {
        let span = (end.0 - self.0).num_days();
        if span < 0 {
            0
        } else {
            span + 1
        }
    }

    pub fn month(self) -> u32 {
        self.0.month()
    }
}

impl fmt::Display for SchoolDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(CANONICAL_FORMAT))
    }
}

impl FromStr for SchoolDate {
    type Err = DateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
