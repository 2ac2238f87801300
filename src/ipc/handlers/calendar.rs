use crate::calendar::SchoolDate;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, ordered_range, parse_bool, parse_opt_string};
use crate::ipc::types::{AppState, Request};
use rusqlite::{params, Connection};
use serde_json::{json, Value as JsonValue};
use tracing::info;

struct CalendarEvent {
    date: SchoolDate,
    title: Option<String>,
    description: Option<String>,
    is_holiday: bool,
}

fn parse_event(v: &JsonValue, idx: usize) -> Result<CalendarEvent, (&'static str, String)> {
    let obj = v
        .as_object()
        .ok_or_else(|| ("bad_params", format!("events[{}] must be an object", idx)))?;
    let raw_date = obj
        .get("date")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .ok_or_else(|| ("bad_params", format!("events[{}].date is required", idx)))?;
    let date = SchoolDate::parse(raw_date)
        .map_err(|e| ("invalid_date", format!("events[{}].date: {}", idx, e)))?;
    let title = parse_opt_string(obj.get("title"))
        .map_err(|m| ("bad_params", format!("events[{}].title {}", idx, m)))?;
    let description = parse_opt_string(obj.get("description"))
        .map_err(|m| ("bad_params", format!("events[{}].description {}", idx, m)))?;
    // Extraction output uses snake_case; accept both spellings.
    let flag = obj.get("isHoliday").or_else(|| obj.get("is_holiday"));
    let is_holiday = parse_bool(flag, false)
        .map_err(|m| ("bad_params", format!("events[{}].isHoliday {}", idx, m)))?;
    Ok(CalendarEvent {
        date,
        title,
        description,
        is_holiday,
    })
}

fn replace_calendar(conn: &Connection, events: &[CalendarEvent]) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM school_calendar", [])?;
    let ts = crate::db::now_ts();
    let mut stmt = conn.prepare(
        "INSERT INTO school_calendar(event_date, title, description, is_holiday, created_at)
         VALUES(?, ?, ?, ?, ?)",
    )?;
    let mut n = 0;
    for e in events {
        n += stmt.execute(params![
            e.date.to_string(),
            e.title,
            e.description,
            if e.is_holiday { 1 } else { 0 },
            ts
        ])?;
    }
    Ok(n)
}

fn handle_calendar_save(state: &mut AppState, req: &Request) -> JsonValue {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let Some(arr) = req.params.get("events").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "events must be an array", None);
    };
    if arr.is_empty() {
        return err(&req.id, "bad_params", "no events to save", None);
    }
    let events = match arr
        .iter()
        .enumerate()
        .map(|(i, v)| parse_event(v, i))
        .collect::<Result<Vec<_>, _>>()
    {
        Ok(v) => v,
        Err((code, m)) => return err(&req.id, code, m, None),
    };

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };
    let count = match replace_calendar(&tx, &events) {
        Ok(n) => n,
        Err(e) => {
            let _ = tx.rollback();
            return err(&req.id, "db_insert_failed", e.to_string(), None);
        }
    };
    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    let holidays = events.iter().filter(|e| e.is_holiday).count();
    info!(count, holidays, "school calendar replaced");
    ok(
        &req.id,
        json!({
            "count": count,
            "holidayCount": holidays,
            "message": format!("{} events saved", count),
        }),
    )
}

pub(crate) fn list_events(
    conn: &Connection,
    start: SchoolDate,
    end: SchoolDate,
) -> rusqlite::Result<Vec<JsonValue>> {
    let mut stmt = conn.prepare(
        "SELECT id, event_date, title, description, is_holiday
         FROM school_calendar
         WHERE event_date BETWEEN ? AND ?
         ORDER BY event_date, id",
    )?;
    let rows = stmt.query_map(params![start.to_string(), end.to_string()], |r| {
        Ok(json!({
            "id": r.get::<_, i64>(0)?,
            "date": r.get::<_, String>(1)?,
            "title": r.get::<_, Option<String>>(2)?,
            "description": r.get::<_, Option<String>>(3)?,
            "isHoliday": r.get::<_, i64>(4)? != 0,
        }))
    })?;
    rows.collect()
}

fn handle_calendar_list(state: &mut AppState, req: &Request) -> JsonValue {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let (start, end) = match ordered_range(req, "start", "end") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match list_events(conn, start, end) {
        Ok(events) => ok(&req.id, json!({ "events": events })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<JsonValue> {
    match req.method.as_str() {
        "calendar.save" => Some(handle_calendar_save(state, req)),
        "calendar.list" => Some(handle_calendar_list(state, req)),
        _ => None,
    }
}
