//! Row-level reads and writes used by lesson generation. Every function takes
//! a plain `Connection` so callers decide the transaction boundary; a
//! `rusqlite::Transaction` derefs to one.

use crate::calendar::SchoolDate;
use crate::holidays::HolidayEntry;
use crate::lessons::Lesson;
use crate::recurrence::{weekday_number, Slot, SlotRow};
use rusqlite::{params, Connection, OptionalExtension};

#[derive(Debug, Clone)]
pub struct TimetableRow {
    pub id: i64,
    pub semester: i64,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub name: Option<String>,
}

pub fn read_timetable(conn: &Connection, id: i64) -> rusqlite::Result<Option<TimetableRow>> {
    conn.query_row(
        "SELECT id, semester, start_date, end_date, name FROM timetables WHERE id = ?",
        [id],
        |r| {
            Ok(TimetableRow {
                id: r.get(0)?,
                semester: r.get(1)?,
                start_date: r.get(2)?,
                end_date: r.get(3)?,
                name: r.get(4)?,
            })
        },
    )
    .optional()
}

pub fn read_slots(conn: &Connection, timetable_id: i64) -> rusqlite::Result<Vec<SlotRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, grade, class_number, weekday, period, subject
         FROM timetable_slots
         WHERE timetable_id = ?
         ORDER BY id",
    )?;
    let rows = stmt.query_map([timetable_id], |r| {
        Ok(SlotRow {
            id: r.get(0)?,
            grade: r.get(1)?,
            class_number: r.get(2)?,
            weekday: r.get(3)?,
            period: r.get(4)?,
            subject: r.get(5)?,
        })
    })?;
    rows.collect()
}

pub fn read_holidays(
    conn: &Connection,
    start: SchoolDate,
    end: SchoolDate,
) -> rusqlite::Result<Vec<HolidayEntry>> {
    let mut stmt = conn.prepare(
        "SELECT event_date, is_holiday
         FROM school_calendar
         WHERE event_date BETWEEN ? AND ?
         ORDER BY event_date, id",
    )?;
    let rows = stmt.query_map(params![start.to_string(), end.to_string()], |r| {
        Ok(HolidayEntry {
            date: r.get(0)?,
            is_holiday: r.get::<_, Option<i64>>(1)?.unwrap_or(0) != 0,
        })
    })?;
    rows.collect()
}

pub fn delete_lessons_in_range(
    conn: &Connection,
    start: SchoolDate,
    end: SchoolDate,
) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM lessons WHERE lesson_date BETWEEN ? AND ?",
        params![start.to_string(), end.to_string()],
    )
}

/// Removes lessons anywhere in the table whose stored date is missing or does
/// not parse as a canonical calendar date.
pub fn delete_lessons_with_invalid_dates(conn: &Connection) -> rusqlite::Result<usize> {
    let bad_ids = {
        let mut stmt = conn.prepare("SELECT id, lesson_date FROM lessons")?;
        let rows = stmt.query_map([], |r| {
            Ok((r.get::<_, i64>(0)?, r.get::<_, Option<String>>(1)?))
        })?;
        let mut ids = Vec::new();
        for row in rows {
            let (id, date) = row?;
            let valid = date
                .as_deref()
                .map(|s| SchoolDate::parse(s).is_ok())
                .unwrap_or(false);
            if !valid {
                ids.push(id);
            }
        }
        ids
    };

    let mut stmt = conn.prepare("DELETE FROM lessons WHERE id = ?")?;
    let mut removed = 0;
    for id in bad_ids {
        removed += stmt.execute([id])?;
    }
    Ok(removed)
}

pub fn bulk_insert_lessons(conn: &Connection, lessons: &[Lesson]) -> rusqlite::Result<usize> {
    let ts = crate::db::now_ts();
    let mut stmt = conn.prepare(
        "INSERT INTO lessons(lesson_date, grade, class_number, period, lesson_order, lesson_title, subject, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
    )?;
    let mut inserted = 0;
    for l in lessons {
        inserted += stmt.execute(params![
            l.lesson_date.to_string(),
            l.grade,
            l.class_number,
            l.period,
            l.lesson_order,
            l.lesson_title,
            l.subject,
            ts
        ])?;
    }
    Ok(inserted)
}

pub fn insert_timetable(
    conn: &Connection,
    semester: i64,
    start: SchoolDate,
    end: SchoolDate,
    name: Option<&str>,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO timetables(semester, start_date, end_date, name, created_at) VALUES(?, ?, ?, ?, ?)",
        params![semester, start.to_string(), end.to_string(), name, crate::db::now_ts()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_slot(
    conn: &Connection,
    timetable_id: i64,
    slot: &Slot,
    classroom: Option<&str>,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO timetable_slots(timetable_id, classroom, grade, class_number, weekday, period, subject)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        params![
            timetable_id,
            classroom,
            slot.grade,
            slot.class_number,
            weekday_number(slot.weekday),
            slot.period,
            slot.subject
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn delete_slots(conn: &Connection, timetable_id: i64) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM timetable_slots WHERE timetable_id = ?",
        [timetable_id],
    )
}
