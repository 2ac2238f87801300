use crate::calendar::{DateError, SchoolDate};
use crate::config::GenerationSettings;
use crate::holidays::HolidaySet;
use crate::lessons::{build_lessons, Lesson};
use crate::lock::TimetableLocks;
use crate::ordering::LessonOrderCounter;
use crate::recurrence::{Slot, SlotRecurrence};
use crate::store;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::fmt;
use tracing::{info, info_span, warn};
use uuid::Uuid;

pub const MSG_NO_SLOTS: &str = "no slots — only date range validated";
pub const MSG_NO_LESSONS: &str = "no lessons generated — all candidate days were weekends/holidays";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    Validate,
    Expand,
    Replace,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Validate => "validate",
            Self::Expand => "expand",
            Self::Replace => "replace",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("{field} {value:?} is not a valid date: {reason}")]
    InvalidDate {
        stage: Stage,
        field: &'static str,
        value: String,
        reason: String,
    },
    #[error("start date {start} is after end date {end}")]
    InvalidRange { start: SchoolDate, end: SchoolDate },
    #[error("timetable {0} not found")]
    MissingTimetable(i64),
    #[error("incomplete slot data: {defect}")]
    IncompleteSlotData { slot_id: Option<i64>, defect: String },
    #[error("range spans {days} days, more than the limit of {limit}")]
    RangeTooLarge { days: i64, limit: i64 },
    #[error("storage failure during {stage}: {source}")]
    Persistence {
        stage: Stage,
        #[source]
        source: rusqlite::Error,
    },
}

impl GenerateError {
    pub fn stage(&self) -> Stage {
        match self {
            Self::InvalidDate { stage, .. } | Self::Persistence { stage, .. } => *stage,
            Self::InvalidRange { .. } | Self::RangeTooLarge { .. } => Stage::Validate,
            Self::MissingTimetable(_) => Stage::Load,
            Self::IncompleteSlotData { .. } => Stage::Expand,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidDate { .. } => "invalid_date",
            Self::InvalidRange { .. } => "invalid_range",
            Self::MissingTimetable(_) => "not_found",
            Self::IncompleteSlotData { .. } => "incomplete_slot_data",
            Self::RangeTooLarge { .. } => "range_too_large",
            Self::Persistence { .. } => "db_failed",
        }
    }

    fn date(stage: Stage, field: &'static str, e: DateError) -> Self {
        Self::InvalidDate {
            stage,
            field,
            value: e.value,
            reason: e.kind.to_string(),
        }
    }
}

fn persistence(stage: Stage) -> impl FnOnce(rusqlite::Error) -> GenerateError {
    move |source| GenerateError::Persistence { stage, source }
}

/// Everything a run would write, computed without touching the lessons table.
#[derive(Debug, Clone)]
pub struct GenerationPlan {
    pub timetable_id: i64,
    pub start: SchoolDate,
    pub end: SchoolDate,
    pub slot_count: usize,
    pub discarded_slots: usize,
    pub holiday_count: usize,
    pub lessons: Vec<Lesson>,
}

impl GenerationPlan {
    pub fn message(&self) -> String {
        if self.slot_count == 0 {
            MSG_NO_SLOTS.to_string()
        } else if self.lessons.is_empty() {
            MSG_NO_LESSONS.to_string()
        } else {
            format!("{} lessons generated", self.lessons.len())
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: String,
    pub timetable_id: i64,
    pub start: SchoolDate,
    pub end: SchoolDate,
    pub count: usize,
    pub message: String,
    pub removed_in_range: usize,
    pub removed_invalid: usize,
}

fn parse_bound(field: &'static str, raw: Option<&str>) -> Result<SchoolDate, GenerateError> {
    let Some(raw) = raw else {
        return Err(GenerateError::InvalidDate {
            stage: Stage::Validate,
            field,
            value: "NULL".to_string(),
            reason: "missing".to_string(),
        });
    };
    SchoolDate::parse(raw.trim()).map_err(|e| GenerateError::date(Stage::Validate, field, e))
}

/// Load, validate and expand. Reads only; the caller owns the transaction.
pub fn plan(
    conn: &Connection,
    timetable_id: i64,
    settings: &GenerationSettings,
) -> Result<GenerationPlan, GenerateError> {
    let timetable = store::read_timetable(conn, timetable_id)
        .map_err(persistence(Stage::Load))?
        .ok_or(GenerateError::MissingTimetable(timetable_id))?;
    let slot_rows = store::read_slots(conn, timetable_id).map_err(persistence(Stage::Load))?;

    let start = parse_bound("start_date", timetable.start_date.as_deref())?;
    let end = parse_bound("end_date", timetable.end_date.as_deref())?;
    if start > end {
        return Err(GenerateError::InvalidRange { start, end });
    }
    let days = start.days_through(end);
    if days > settings.max_range_days {
        return Err(GenerateError::RangeTooLarge {
            days,
            limit: settings.max_range_days,
        });
    }

    let holiday_rows = store::read_holidays(conn, start, end).map_err(persistence(Stage::Load))?;
    let holidays = HolidaySet::build(&holiday_rows, start, end);

    let mut slots = Vec::with_capacity(slot_rows.len());
    for row in &slot_rows {
        match Slot::from_row(row) {
            Ok(s) => slots.push(s),
            Err(defect) => warn!(slot_id = row.id, %defect, "discarding incomplete slot"),
        }
    }
    let discarded_slots = slot_rows.len() - slots.len();

    let occurrences = SlotRecurrence::new(&slots)
        .expand(start, end, &holidays)
        .map_err(|e| GenerateError::date(Stage::Expand, "lesson_date", e))?;
    let lessons = build_lessons(
        &occurrences,
        &mut LessonOrderCounter::new(),
        start,
        end,
        &holidays,
    )?;

    info!(
        %start,
        %end,
        days,
        slots = slots.len(),
        discarded_slots,
        holidays = holidays.len(),
        lessons = lessons.len(),
        "expanded timetable"
    );

    Ok(GenerationPlan {
        timetable_id,
        start,
        end,
        slot_count: slots.len(),
        discarded_slots,
        holiday_count: holidays.len(),
        lessons,
    })
}

/// Computes a plan inside a read transaction that is always rolled back.
pub fn preview(
    conn: &Connection,
    timetable_id: i64,
    settings: &GenerationSettings,
) -> Result<GenerationPlan, GenerateError> {
    let tx = conn
        .unchecked_transaction()
        .map_err(persistence(Stage::Load))?;
    let result = plan(&tx, timetable_id, settings);
    rollback(tx);
    result
}

/// Regenerates the lessons for one timetable: computes the full new set,
/// then deletes the old rows in range and inserts the new ones in a single
/// transaction. Any error leaves the lessons table as it was.
pub fn generate(
    conn: &Connection,
    locks: &TimetableLocks,
    timetable_id: i64,
    settings: &GenerationSettings,
) -> Result<RunSummary, GenerateError> {
    let run_id = Uuid::new_v4().to_string();
    let span = info_span!("generate_lessons", run_id = %run_id, timetable_id);
    let _entered = span.enter();

    let _guard = locks.acquire(timetable_id);
    // IMMEDIATE takes the write lock up front so no other connection can
    // change slots or holidays between our reads and the replace.
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
        .map_err(persistence(Stage::Load))?;

    let plan = match plan(&tx, timetable_id, settings) {
        Ok(p) => p,
        Err(e) => {
            warn!(stage = %e.stage(), error = %e, "generation rejected");
            rollback(tx);
            return Err(e);
        }
    };

    let replaced = replace_lessons(&tx, &plan);
    let (removed_invalid, removed_in_range, inserted) = match replaced {
        Ok(v) => v,
        Err(e) => {
            warn!(stage = %e.stage(), error = %e, "replace failed, rolling back");
            rollback(tx);
            return Err(e);
        }
    };
    tx.commit().map_err(persistence(Stage::Replace))?;

    let message = plan.message();
    info!(
        count = inserted,
        removed_in_range,
        removed_invalid,
        %message,
        "lessons replaced"
    );
    Ok(RunSummary {
        run_id,
        timetable_id,
        start: plan.start,
        end: plan.end,
        count: inserted,
        message,
        removed_in_range,
        removed_invalid,
    })
}

fn rollback(tx: Transaction<'_>) {
    if let Err(e) = tx.rollback() {
        warn!(error = %e, "rollback failed");
    }
}

fn replace_lessons(
    conn: &Connection,
    plan: &GenerationPlan,
) -> Result<(usize, usize, usize), GenerateError> {
    let removed_invalid =
        store::delete_lessons_with_invalid_dates(conn).map_err(persistence(Stage::Replace))?;
    if removed_invalid > 0 {
        warn!(removed_invalid, "purged lessons with invalid dates");
    }
    let removed_in_range = store::delete_lessons_in_range(conn, plan.start, plan.end)
        .map_err(persistence(Stage::Replace))?;
    let inserted =
        store::bulk_insert_lessons(conn, &plan.lessons).map_err(persistence(Stage::Replace))?;
    Ok((removed_invalid, removed_in_range, inserted))
}
