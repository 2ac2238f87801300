use crate::calendar::SchoolDate;
use crate::generate::{GenerateError, Stage};
use crate::holidays::HolidaySet;
use crate::ordering::{LessonOrderCounter, LessonOrderKey};
use crate::recurrence::Occurrence;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lesson {
    pub lesson_date: SchoolDate,
    pub grade: i64,
    pub class_number: i64,
    pub period: i64,
    pub lesson_order: i64,
    pub lesson_title: String,
    pub subject: String,
}

pub fn lesson_title(order: i64) -> String {
    format!("{order}차시")
}

impl Lesson {
    fn check(&self, start: SchoolDate, end: SchoolDate, holidays: &HolidaySet) -> Result<(), GenerateError> {
        for (field, v) in [
            ("grade", self.grade),
            ("class_number", self.class_number),
            ("period", self.period),
            ("lesson_order", self.lesson_order),
        ] {
            if v < 1 {
                return Err(GenerateError::IncompleteSlotData {
                    slot_id: None,
                    defect: format!("{field} must be >= 1 (got {v})"),
                });
            }
        }

        let reason = if self.lesson_date < start || self.lesson_date > end {
            Some("outside timetable range")
        } else if !self.lesson_date.is_school_day() {
            Some("falls on a weekend")
        } else if holidays.contains(self.lesson_date) {
            Some("falls on a holiday")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(GenerateError::InvalidDate {
                stage: Stage::Expand,
                field: "lesson_date",
                value: self.lesson_date.to_string(),
                reason: reason.to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// Turns expanded occurrences into numbered lessons. Stops at the first
/// lesson that breaks an invariant; nothing built so far is returned.
pub fn build_lessons(
    occurrences: &[Occurrence<'_>],
    counter: &mut LessonOrderCounter,
    start: SchoolDate,
    end: SchoolDate,
    holidays: &HolidaySet,
) -> Result<Vec<Lesson>, GenerateError> {
    let mut out = Vec::with_capacity(occurrences.len());
    for occ in occurrences {
        let slot = occ.slot;
        let order = counter.take(LessonOrderKey::for_slot(slot));
        let lesson = Lesson {
            lesson_date: occ.date,
            grade: slot.grade,
            class_number: slot.class_number,
            period: slot.period,
            lesson_order: order,
            lesson_title: lesson_title(order),
            subject: slot.subject.clone().unwrap_or_default(),
        };
        lesson.check(start, end, holidays)?;
        out.push(lesson);
    }
    Ok(out)
}
