use crate::calendar::{DateError, SchoolDate};
use crate::holidays::HolidaySet;
use chrono::Weekday;
use std::fmt;
use tracing::debug;

/// A `timetable_slots` row as stored; any column may be missing in rows
/// written by older clients.
#[derive(Debug, Clone, Default)]
pub struct SlotRow {
    pub id: i64,
    pub grade: Option<i64>,
    pub class_number: Option<i64>,
    pub weekday: Option<i64>,
    pub period: Option<i64>,
    pub subject: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotDefect {
    Missing(&'static str),
    NotPositive(&'static str, i64),
    WeekdayOutOfRange(i64),
}

impl fmt::Display for SlotDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing(field) => write!(f, "{field} is missing"),
            Self::NotPositive(field, v) => write!(f, "{field} must be >= 1 (got {v})"),
            Self::WeekdayOutOfRange(v) => write!(f, "weekday must be in 1..=5 (got {v})"),
        }
    }
}

/// A weekly recurring teaching assignment with every required field present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub id: Option<i64>,
    pub grade: i64,
    pub class_number: i64,
    pub weekday: Weekday,
    pub period: i64,
    pub subject: Option<String>,
}

/// Maps the stored weekday number (1 = Monday .. 5 = Friday).
pub fn school_weekday(n: i64) -> Option<Weekday> {
    match n {
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        _ => None,
    }
}

pub fn weekday_number(w: Weekday) -> i64 {
    i64::from(w.number_from_monday())
}

fn positive(field: &'static str, v: Option<i64>) -> Result<i64, SlotDefect> {
    match v {
        None => Err(SlotDefect::Missing(field)),
        Some(n) if n < 1 => Err(SlotDefect::NotPositive(field, n)),
        Some(n) => Ok(n),
    }
}

impl Slot {
    pub fn from_row(row: &SlotRow) -> Result<Self, SlotDefect> {
        let grade = positive("grade", row.grade)?;
        let class_number = positive("class_number", row.class_number)?;
        let period = positive("period", row.period)?;
        let raw_weekday = row.weekday.ok_or(SlotDefect::Missing("weekday"))?;
        let weekday = school_weekday(raw_weekday).ok_or(SlotDefect::WeekdayOutOfRange(raw_weekday))?;
        let subject = row
            .subject
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        Ok(Self {
            id: Some(row.id),
            grade,
            class_number,
            weekday,
            period,
            subject,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Occurrence<'a> {
    pub date: SchoolDate,
    pub slot: &'a Slot,
}

/// Slots grouped by the school weekday they recur on, keeping list order
/// within each day.
pub struct SlotRecurrence<'a> {
    by_weekday: [Vec<&'a Slot>; 5],
}

impl<'a> SlotRecurrence<'a> {
    pub fn new(slots: &'a [Slot]) -> Self {
        let mut by_weekday: [Vec<&'a Slot>; 5] = Default::default();
        for slot in slots {
            if let Some(bucket) = by_weekday.get_mut(slot.weekday.num_days_from_monday() as usize) {
                bucket.push(slot);
            }
        }
        Self { by_weekday }
    }

    pub fn slots_on(&self, weekday: Weekday) -> &[&'a Slot] {
        self.by_weekday
            .get(weekday.num_days_from_monday() as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Occurrences for every school day in `[start, end]` that is not a
    /// holiday, ordered by date and then by slot list order.
    pub fn expand(
        &self,
        start: SchoolDate,
        end: SchoolDate,
        holidays: &HolidaySet,
    ) -> Result<Vec<Occurrence<'a>>, DateError> {
        let mut out = Vec::new();
        let mut current = start;
        while current.compare(end).is_le() {
            if current.is_school_day() && !holidays.contains(current) {
                let day_slots = self.slots_on(current.weekday());
                if day_slots.is_empty() {
                    debug!(date = %current, "no slots scheduled");
                }
                out.extend(day_slots.iter().map(|slot| Occurrence {
                    date: current,
                    slot: *slot,
                }));
            }
            if current == end {
                break;
            }
            current = current.add_days(1)?;
        }
        Ok(out)
    }
}
