use crate::config;
use crate::generate;
use crate::ipc::error::{err, generate_err, ok};
use crate::ipc::handlers::calendar::list_events;
use crate::ipc::helpers::{db_conn, ordered_range, required_i64};
use crate::ipc::types::{AppState, Request};
use crate::lessons::Lesson;
use rusqlite::params;
use serde_json::{json, Value as JsonValue};

fn lesson_to_json(l: &Lesson) -> JsonValue {
    json!({
        "lessonDate": l.lesson_date.to_string(),
        "grade": l.grade,
        "classNumber": l.class_number,
        "period": l.period,
        "lessonOrder": l.lesson_order,
        "lessonTitle": l.lesson_title,
        "subject": l.subject,
    })
}

fn handle_lessons_generate(state: &mut AppState, req: &Request) -> JsonValue {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let timetable_id = match required_i64(req, "timetableId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let settings = config::load_generation_settings(conn);

    match generate::generate(conn, &state.locks, timetable_id, &settings) {
        Ok(summary) => ok(
            &req.id,
            json!({
                "runId": summary.run_id,
                "timetableId": summary.timetable_id,
                "startDate": summary.start.to_string(),
                "endDate": summary.end.to_string(),
                "count": summary.count,
                "message": summary.message,
                "removedInRange": summary.removed_in_range,
                "removedInvalid": summary.removed_invalid,
            }),
        ),
        Err(e) => generate_err(&req.id, &e),
    }
}

fn handle_lessons_preview(state: &mut AppState, req: &Request) -> JsonValue {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let timetable_id = match required_i64(req, "timetableId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let settings = config::load_generation_settings(conn);

    match generate::preview(conn, timetable_id, &settings) {
        Ok(plan) => ok(
            &req.id,
            json!({
                "timetableId": plan.timetable_id,
                "startDate": plan.start.to_string(),
                "endDate": plan.end.to_string(),
                "slotCount": plan.slot_count,
                "discardedSlotCount": plan.discarded_slots,
                "holidayCount": plan.holiday_count,
                "count": plan.lessons.len(),
                "message": plan.message(),
                "lessons": plan.lessons.iter().map(lesson_to_json).collect::<Vec<_>>(),
            }),
        ),
        Err(e) => generate_err(&req.id, &e),
    }
}

fn handle_lessons_list(state: &mut AppState, req: &Request) -> JsonValue {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let (start, end) = match ordered_range(req, "start", "end") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let mut stmt = match conn.prepare(
        "SELECT id, lesson_date, grade, class_number, period, lesson_order, lesson_title, subject
         FROM lessons
         WHERE lesson_date BETWEEN ? AND ?
         ORDER BY grade, class_number, lesson_date, period, id",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let lessons = match stmt.query_map(params![start.to_string(), end.to_string()], |r| {
        Ok(json!({
            "id": r.get::<_, i64>(0)?,
            "lessonDate": r.get::<_, String>(1)?,
            "grade": r.get::<_, i64>(2)?,
            "classNumber": r.get::<_, i64>(3)?,
            "period": r.get::<_, i64>(4)?,
            "lessonOrder": r.get::<_, i64>(5)?,
            "lessonTitle": r.get::<_, Option<String>>(6)?,
            "subject": r.get::<_, Option<String>>(7)?,
        }))
    }) {
        Ok(rows) => match rows.collect::<Result<Vec<_>, _>>() {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        },
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let events = match list_events(conn, start, end) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    ok(
        &req.id,
        json!({ "lessons": lessons, "calendarEvents": events }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<JsonValue> {
    match req.method.as_str() {
        "lessons.generate" => Some(handle_lessons_generate(state, req)),
        "lessons.preview" => Some(handle_lessons_preview(state, req)),
        "lessons.list" => Some(handle_lessons_list(state, req)),
        _ => None,
    }
}
