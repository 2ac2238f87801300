use crate::calendar::SchoolDate;
use std::collections::HashSet;
use tracing::warn;

/// A `school_calendar` row as stored. The date is kept raw so that rows
/// written before validation existed can still be read and skipped.
#[derive(Debug, Clone)]
pub struct HolidayEntry {
    pub date: Option<String>,
    pub is_holiday: bool,
}

#[derive(Debug, Default, Clone)]
pub struct HolidaySet {
    dates: HashSet<SchoolDate>,
}

impl HolidaySet {
    pub fn build<'a, I>(entries: I, start: SchoolDate, end: SchoolDate) -> Self
    where
        I: IntoIterator<Item = &'a HolidayEntry>,
    {
        let mut dates = HashSet::new();
        for entry in entries {
            if !entry.is_holiday {
                continue;
            }
            let Some(raw) = entry.date.as_deref() else {
                warn!("dropping holiday entry without a date");
                continue;
            };
            match SchoolDate::parse(raw.trim()) {
                Ok(d) if d >= start && d <= end => {
                    dates.insert(d);
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "dropping holiday entry with unusable date"),
            }
        }
        Self { dates }
    }

    pub fn contains(&self, date: SchoolDate) -> bool {
        self.dates.contains(&date)
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }
}
