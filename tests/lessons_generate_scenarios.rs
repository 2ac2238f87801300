mod test_support;

use chrono::{Datelike, NaiveDate, Weekday};
use serde_json::json;
use std::collections::{BTreeMap, HashSet};
use test_support::{error_code, request_err, request_ok, spawn_sidecar, temp_dir};

fn lessons_of(result: &serde_json::Value) -> Vec<serde_json::Value> {
    result
        .get("lessons")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default()
}

fn str_field<'a>(v: &'a serde_json::Value, key: &str) -> &'a str {
    v.get(key).and_then(|x| x.as_str()).unwrap_or("")
}

fn int_field(v: &serde_json::Value, key: &str) -> i64 {
    v.get(key).and_then(|x| x.as_i64()).unwrap_or(-1)
}

#[test]
fn single_monday_slot_in_one_week_yields_one_lesson() {
    let workspace = temp_dir("progressd-scenario-a");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let saved = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "timetables.save",
        json!({
            "startDate": "2025-03-03",
            "endDate": "2025-03-07",
            "slots": [
                { "grade": 1, "classNumber": 1, "weekday": 1, "period": 1, "subject": "Math" }
            ]
        }),
    );
    let tid = int_field(&saved, "timetableId");

    let run = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "lessons.generate",
        json!({ "timetableId": tid }),
    );
    assert_eq!(int_field(&run, "count"), 1);
    assert_eq!(str_field(&run, "message"), "1 lessons generated");

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "lessons.list",
        json!({ "start": "2025-03-03", "end": "2025-03-07" }),
    );
    let lessons = lessons_of(&listed);
    assert_eq!(lessons.len(), 1);
    let l = &lessons[0];
    assert_eq!(str_field(l, "lessonDate"), "2025-03-03");
    assert_eq!(int_field(l, "grade"), 1);
    assert_eq!(int_field(l, "classNumber"), 1);
    assert_eq!(int_field(l, "period"), 1);
    assert_eq!(int_field(l, "lessonOrder"), 1);
    assert_eq!(str_field(l, "lessonTitle"), "1차시");
    assert_eq!(str_field(l, "subject"), "Math");
}

#[test]
fn holiday_on_second_monday_suppresses_its_lesson() {
    let workspace = temp_dir("progressd-scenario-b");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "calendar.save",
        json!({ "events": [
            { "date": "2025-03-10", "title": "재량휴업일", "isHoliday": true }
        ]}),
    );
    let saved = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "timetables.save",
        json!({
            "startDate": "2025-03-03",
            "endDate": "2025-03-10",
            "slots": [
                { "classroom": "101", "weekday": 1, "period": 1, "subject": "Math" }
            ]
        }),
    );
    let tid = int_field(&saved, "timetableId");

    let run = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "lessons.generate",
        json!({ "timetableId": tid }),
    );
    assert_eq!(int_field(&run, "count"), 1);

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "lessons.list",
        json!({ "start": "2025-03-03", "end": "2025-03-10" }),
    );
    let lessons = lessons_of(&listed);
    assert_eq!(lessons.len(), 1);
    assert_eq!(str_field(&lessons[0], "lessonDate"), "2025-03-03");
    assert_eq!(int_field(&lessons[0], "lessonOrder"), 1);
    let events = listed
        .get("calendarEvents")
        .and_then(|v| v.as_array())
        .map(|a| a.len())
        .unwrap_or(0);
    assert_eq!(events, 1);
}

#[test]
fn semester_run_respects_exclusions_and_numbers_contiguously() {
    let workspace = temp_dir("progressd-semester");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let holidays = ["2025-03-19", "2025-05-05", "2025-06-06"];
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "calendar.save",
        json!({ "events": [
            { "date": holidays[0], "title": "개교기념일", "isHoliday": true },
            { "date": "2025-04-10", "title": "중간고사", "isHoliday": false },
            { "date": holidays[1], "title": "어린이날", "is_holiday": true },
            { "date": holidays[2], "title": "현충일", "isHoliday": true }
        ]}),
    );
    let saved = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "timetables.save",
        json!({
            "startDate": "2025-03-03",
            "endDate": "2025-07-18",
            "name": "2025 1학기",
            "slots": [
                { "classroom": "101", "weekday": 1, "period": 1, "subject": "Math" },
                { "classroom": "101", "weekday": 3, "period": 1, "subject": "Math" },
                { "classroom": "101", "weekday": 3, "period": 3, "subject": "Science" },
                { "classroom": "102", "weekday": 2, "period": 2 }
            ]
        }),
    );
    let tid = int_field(&saved, "timetableId");

    let first = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "lessons.generate",
        json!({ "timetableId": tid }),
    );
    assert_eq!(int_field(&first, "count"), 77);

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "lessons.list",
        json!({ "start": "2025-03-03", "end": "2025-07-18" }),
    );
    let lessons = lessons_of(&listed);
    assert_eq!(lessons.len(), 77);

    let holiday_set: HashSet<&str> = holidays.iter().copied().collect();
    let mut by_key: BTreeMap<(i64, i64, i64, String), Vec<(String, i64)>> = BTreeMap::new();
    for l in &lessons {
        let date = str_field(l, "lessonDate");
        let parsed = NaiveDate::parse_from_str(date, "%Y-%m-%d").expect("stored date");
        assert!(
            !matches!(parsed.weekday(), Weekday::Sat | Weekday::Sun),
            "weekend lesson on {}",
            date
        );
        assert!(!holiday_set.contains(date), "holiday lesson on {}", date);
        assert_eq!(
            str_field(l, "lessonTitle"),
            format!("{}차시", int_field(l, "lessonOrder"))
        );
        by_key
            .entry((
                int_field(l, "grade"),
                int_field(l, "classNumber"),
                int_field(l, "period"),
                str_field(l, "subject").to_string(),
            ))
            .or_default()
            .push((date.to_string(), int_field(l, "lessonOrder")));
    }
    assert_eq!(by_key.len(), 3);
    for (key, mut rows) in by_key {
        rows.sort();
        let orders: Vec<i64> = rows.iter().map(|(_, o)| *o).collect();
        let expected: Vec<i64> = (1..=rows.len() as i64).collect();
        assert_eq!(orders, expected, "orders for {:?}", key);
        assert!(rows.windows(2).all(|w| w[0].0 < w[1].0), "dates for {:?}", key);
    }

    // A second run over unchanged inputs rewrites the identical set.
    let second = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "lessons.generate",
        json!({ "timetableId": tid }),
    );
    assert_eq!(int_field(&second, "count"), 77);
    assert_eq!(int_field(&second, "removedInRange"), 77);
    let relisted = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "lessons.list",
        json!({ "start": "2025-03-03", "end": "2025-07-18" }),
    );
    let strip = |v: &[serde_json::Value]| -> Vec<(String, i64, i64, i64, i64, String, String)> {
        v.iter()
            .map(|l| {
                (
                    str_field(l, "lessonDate").to_string(),
                    int_field(l, "grade"),
                    int_field(l, "classNumber"),
                    int_field(l, "period"),
                    int_field(l, "lessonOrder"),
                    str_field(l, "lessonTitle").to_string(),
                    str_field(l, "subject").to_string(),
                )
            })
            .collect()
    };
    assert_eq!(strip(&lessons_of(&relisted)), strip(&lessons));
}

#[test]
fn preview_matches_generate_without_writing() {
    let workspace = temp_dir("progressd-preview");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let saved = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "timetables.save",
        json!({
            "startDate": "2025-03-03",
            "endDate": "2025-03-21",
            "slots": [
                { "classroom": "203", "weekday": 4, "period": 5, "subject": "국어" },
                { "classroom": "203", "weekday": 5, "period": 5, "subject": "국어" }
            ]
        }),
    );
    let tid = int_field(&saved, "timetableId");

    let preview = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "lessons.preview",
        json!({ "timetableId": tid }),
    );
    assert_eq!(int_field(&preview, "count"), 6);
    assert_eq!(int_field(&preview, "slotCount"), 2);
    let planned = lessons_of(&preview);
    assert_eq!(str_field(&planned[0], "lessonDate"), "2025-03-06");
    assert_eq!(int_field(&planned[0], "grade"), 2);
    assert_eq!(int_field(&planned[0], "classNumber"), 3);
    assert_eq!(str_field(&planned[5], "lessonTitle"), "6차시");

    let before = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "lessons.list",
        json!({ "start": "2025-03-03", "end": "2025-03-21" }),
    );
    assert!(lessons_of(&before).is_empty());

    let run = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "lessons.generate",
        json!({ "timetableId": tid }),
    );
    assert_eq!(int_field(&run, "count"), 6);
}

#[test]
fn empty_outcomes_report_distinct_messages() {
    let workspace = temp_dir("progressd-empty-messages");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let no_slots = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "timetables.save",
        json!({ "startDate": "2025-03-03", "endDate": "2025-03-07", "slots": [] }),
    );
    let run = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "lessons.generate",
        json!({ "timetableId": int_field(&no_slots, "timetableId") }),
    );
    assert_eq!(int_field(&run, "count"), 0);
    assert_eq!(str_field(&run, "message"), "no slots — only date range validated");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "calendar.save",
        json!({ "events": [{ "date": "2025-03-17", "isHoliday": true }] }),
    );
    let all_excluded = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "timetables.save",
        json!({
            "startDate": "2025-03-15",
            "endDate": "2025-03-17",
            "slots": [{ "classroom": "101", "weekday": 1, "period": 1, "subject": "Math" }]
        }),
    );
    let run = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "lessons.generate",
        json!({ "timetableId": int_field(&all_excluded, "timetableId") }),
    );
    assert_eq!(int_field(&run, "count"), 0);
    assert_eq!(
        str_field(&run, "message"),
        "no lessons generated — all candidate days were weekends/holidays"
    );
}

#[test]
fn range_beyond_iteration_ceiling_is_rejected() {
    let workspace = temp_dir("progressd-scenario-d");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let saved = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "timetables.save",
        json!({
            "startDate": "2025-03-03",
            "endDate": "2028-03-03",
            "slots": [{ "classroom": "101", "weekday": 1, "period": 1, "subject": "Math" }]
        }),
    );
    let tid = int_field(&saved, "timetableId");

    let error = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "lessons.generate",
        json!({ "timetableId": tid }),
    );
    assert_eq!(error_code(&error), "range_too_large");
    let details = error.get("details").cloned().unwrap_or_default();
    assert_eq!(str_field(&details, "stage"), "validate");
    assert_eq!(int_field(&details, "limit"), 1000);
    assert_eq!(int_field(&details, "days"), 1097);

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "lessons.list",
        json!({ "start": "2025-03-03", "end": "2028-03-03" }),
    );
    assert!(lessons_of(&listed).is_empty());
}

#[test]
fn unknown_timetable_is_not_found() {
    let workspace = temp_dir("progressd-missing-timetable");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let error = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "lessons.generate",
        json!({ "timetableId": 999 }),
    );
    assert_eq!(error_code(&error), "not_found");
    assert_eq!(
        error
            .get("details")
            .and_then(|d| d.get("stage"))
            .and_then(|v| v.as_str()),
        Some("load")
    );
}
