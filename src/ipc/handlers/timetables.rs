use crate::calendar::SchoolDate;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, ordered_range, parse_opt_i64, parse_opt_string, required_i64};
use crate::ipc::types::{AppState, Request};
use crate::recurrence::{Slot, SlotDefect, SlotRow};
use crate::store;
use rusqlite::{params, Connection};
use serde_json::{json, Value as JsonValue};
use tracing::info;

struct SlotInput {
    slot: Slot,
    classroom: Option<String>,
}

/// March through July is the first semester; everything else the second.
fn semester_for(start: SchoolDate) -> i64 {
    if (3..=7).contains(&start.month()) {
        1
    } else {
        2
    }
}

/// "203" is grade 2, class 3.
fn parse_classroom(raw: &str) -> Result<(i64, i64), String> {
    let n: i64 = raw
        .trim()
        .parse()
        .map_err(|_| format!("invalid classroom: {}", raw))?;
    if !(100..=999).contains(&n) {
        return Err(format!("invalid classroom: {}", raw));
    }
    Ok((n / 100, n % 100))
}

fn classroom_value(v: Option<&JsonValue>) -> Result<Option<String>, &'static str> {
    match v {
        Some(JsonValue::Number(n)) => Ok(Some(n.to_string())),
        other => parse_opt_string(other),
    }
}

fn parse_slot(v: &JsonValue, idx: usize) -> Result<SlotInput, (&'static str, String)> {
    let bad = |m: String| ("bad_params", format!("slots[{}].{}", idx, m));
    let obj = v
        .as_object()
        .ok_or_else(|| ("bad_params", format!("slots[{}] must be an object", idx)))?;

    let classroom = classroom_value(obj.get("classroom")).map_err(|m| bad(format!("classroom {}", m)))?;
    let mut grade = parse_opt_i64(obj.get("grade")).map_err(|m| bad(format!("grade {}", m)))?;
    let mut class_number =
        parse_opt_i64(obj.get("classNumber")).map_err(|m| bad(format!("classNumber {}", m)))?;
    if grade.is_none() && class_number.is_none() {
        if let Some(c) = classroom.as_deref() {
            let (g, n) = parse_classroom(c).map_err(|m| ("bad_params", format!("slots[{}]: {}", idx, m)))?;
            grade = Some(g);
            class_number = Some(n);
        }
    }
    let weekday = parse_opt_i64(obj.get("weekday")).map_err(|m| bad(format!("weekday {}", m)))?;
    let period = parse_opt_i64(obj.get("period")).map_err(|m| bad(format!("period {}", m)))?;
    let subject = parse_opt_string(obj.get("subject")).map_err(|m| bad(format!("subject {}", m)))?;

    let row = SlotRow {
        id: 0,
        grade,
        class_number,
        weekday,
        period,
        subject,
    };
    let mut slot = Slot::from_row(&row).map_err(|defect| match defect {
        SlotDefect::WeekdayOutOfRange(_) => ("bad_params", format!("slots[{}]: {}", idx, defect)),
        _ => ("incomplete_slot_data", format!("slots[{}]: {}", idx, defect)),
    })?;
    slot.id = None;
    Ok(SlotInput { slot, classroom })
}

fn parse_slots(req: &Request) -> Result<Vec<SlotInput>, JsonValue> {
    let arr = match req.params.get("slots") {
        None | Some(JsonValue::Null) => return Ok(Vec::new()),
        Some(v) => v
            .as_array()
            .ok_or_else(|| err(&req.id, "bad_params", "slots must be an array", None))?,
    };
    arr.iter()
        .enumerate()
        .map(|(i, v)| parse_slot(v, i).map_err(|(code, m)| err(&req.id, code, m, None)))
        .collect()
}

fn insert_slots(conn: &Connection, timetable_id: i64, slots: &[SlotInput]) -> rusqlite::Result<()> {
    for s in slots {
        store::insert_slot(conn, timetable_id, &s.slot, s.classroom.as_deref())?;
    }
    Ok(())
}

fn handle_timetables_save(state: &mut AppState, req: &Request) -> JsonValue {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let (start, end) = match ordered_range(req, "startDate", "endDate") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let name = match parse_opt_string(req.params.get("name")) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("name {}", m), None),
    };
    let slots = match parse_slots(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let semester = semester_for(start);

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };
    let timetable_id = match store::insert_timetable(&tx, semester, start, end, name.as_deref()) {
        Ok(id) => id,
        Err(e) => {
            let _ = tx.rollback();
            return err(&req.id, "db_insert_failed", e.to_string(), None);
        }
    };
    if let Err(e) = insert_slots(&tx, timetable_id, &slots) {
        let _ = tx.rollback();
        return err(&req.id, "db_insert_failed", e.to_string(), None);
    }
    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    info!(timetable_id, semester, slots = slots.len(), "timetable saved");
    ok(
        &req.id,
        json!({
            "timetableId": timetable_id,
            "semester": semester,
            "slotCount": slots.len(),
        }),
    )
}

fn handle_timetables_list(state: &mut AppState, req: &Request) -> JsonValue {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let mut stmt = match conn.prepare(
        "SELECT t.id, t.semester, t.start_date, t.end_date, t.name, t.created_at,
                (SELECT COUNT(*) FROM timetable_slots s WHERE s.timetable_id = t.id)
         FROM timetables t
         ORDER BY t.id DESC",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let timetables = match stmt.query_map([], |r| {
        Ok(json!({
            "id": r.get::<_, i64>(0)?,
            "semester": r.get::<_, i64>(1)?,
            "startDate": r.get::<_, Option<String>>(2)?,
            "endDate": r.get::<_, Option<String>>(3)?,
            "name": r.get::<_, Option<String>>(4)?,
            "createdAt": r.get::<_, Option<String>>(5)?,
            "slotCount": r.get::<_, i64>(6)?,
        }))
    }) {
        Ok(rows) => match rows.collect::<Result<Vec<_>, _>>() {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        },
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    ok(&req.id, json!({ "timetables": timetables }))
}

fn handle_timetables_open(state: &mut AppState, req: &Request) -> JsonValue {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let timetable_id = match required_i64(req, "timetableId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let timetable = match store::read_timetable(conn, timetable_id) {
        Ok(Some(t)) => t,
        Ok(None) => return err(&req.id, "not_found", "timetable not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let mut stmt = match conn.prepare(
        "SELECT id, classroom, grade, class_number, weekday, period, subject
         FROM timetable_slots
         WHERE timetable_id = ?
         ORDER BY id",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let slots = match stmt.query_map(params![timetable_id], |r| {
        Ok(json!({
            "id": r.get::<_, i64>(0)?,
            "classroom": r.get::<_, Option<String>>(1)?,
            "grade": r.get::<_, Option<i64>>(2)?,
            "classNumber": r.get::<_, Option<i64>>(3)?,
            "weekday": r.get::<_, Option<i64>>(4)?,
            "period": r.get::<_, Option<i64>>(5)?,
            "subject": r.get::<_, Option<String>>(6)?,
        }))
    }) {
        Ok(rows) => match rows.collect::<Result<Vec<_>, _>>() {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        },
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    ok(
        &req.id,
        json!({
            "timetable": {
                "id": timetable.id,
                "semester": timetable.semester,
                "startDate": timetable.start_date,
                "endDate": timetable.end_date,
                "name": timetable.name,
            },
            "slots": slots,
        }),
    )
}

fn handle_timetables_replace_slots(state: &mut AppState, req: &Request) -> JsonValue {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let timetable_id = match required_i64(req, "timetableId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let slots = match parse_slots(req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    // Slot edits must not interleave with a regeneration of the same timetable.
    let _guard = state.locks.acquire(timetable_id);
    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };
    match store::read_timetable(&tx, timetable_id) {
        Ok(Some(_)) => {}
        Ok(None) => {
            let _ = tx.rollback();
            return err(&req.id, "not_found", "timetable not found", None);
        }
        Err(e) => {
            let _ = tx.rollback();
            return err(&req.id, "db_query_failed", e.to_string(), None);
        }
    }
    let removed = match store::delete_slots(&tx, timetable_id) {
        Ok(n) => n,
        Err(e) => {
            let _ = tx.rollback();
            return err(&req.id, "db_update_failed", e.to_string(), None);
        }
    };
    if let Err(e) = insert_slots(&tx, timetable_id, &slots) {
        let _ = tx.rollback();
        return err(&req.id, "db_insert_failed", e.to_string(), None);
    }
    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    info!(timetable_id, removed, slots = slots.len(), "timetable slots replaced");
    ok(
        &req.id,
        json!({ "ok": true, "slotCount": slots.len(), "removedSlotCount": removed }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<JsonValue> {
    match req.method.as_str() {
        "timetables.save" => Some(handle_timetables_save(state, req)),
        "timetables.list" => Some(handle_timetables_list(state, req)),
        "timetables.open" => Some(handle_timetables_open(state, req)),
        "timetables.replaceSlots" => Some(handle_timetables_replace_slots(state, req)),
        _ => None,
    }
}
