mod test_support;

use serde_json::json;
use std::io::{BufRead, Write};
use test_support::{error_code, request, request_err, spawn_sidecar, temp_dir};

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("progressd-router-smoke");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let calls = [
        ("health", json!({})),
        ("workspace.select", json!({ "path": workspace.to_string_lossy() })),
        (
            "timetables.save",
            json!({
                "startDate": "2025-03-03",
                "endDate": "2025-03-07",
                "slots": [{ "classroom": "101", "weekday": 1, "period": 1, "subject": "Math" }]
            }),
        ),
        ("timetables.list", json!({})),
        ("timetables.open", json!({ "timetableId": 1 })),
        ("timetables.replaceSlots", json!({ "timetableId": 1, "slots": [] })),
        (
            "calendar.save",
            json!({ "events": [{ "date": "2025-03-05", "isHoliday": false }] }),
        ),
        ("calendar.list", json!({ "start": "2025-03-01", "end": "2025-03-31" })),
        ("lessons.preview", json!({ "timetableId": 1 })),
        ("lessons.generate", json!({ "timetableId": 1 })),
        ("lessons.list", json!({ "start": "2025-03-01", "end": "2025-03-31" })),
        ("setup.generation.get", json!({})),
        ("setup.generation.update", json!({ "patch": { "maxRangeDays": 400 } })),
    ];
    for (i, (method, params)) in calls.into_iter().enumerate() {
        let id = (i + 1).to_string();
        let value = request(&mut stdin, &mut reader, &id, method, params);
        assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id.as_str()));
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(true),
            "{} failed: {}",
            method,
            value
        );
    }

    let error = request_err(&mut stdin, &mut reader, "99", "grades.compute", json!({}));
    assert_eq!(error_code(&error), "not_implemented");

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn workspace_methods_require_a_selected_workspace() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let health = request(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(health.get("ok").and_then(|v| v.as_bool()), Some(true));
    assert!(health
        .get("result")
        .and_then(|r| r.get("workspacePath"))
        .map(|v| v.is_null())
        .unwrap_or(false));

    for method in ["timetables.list", "lessons.generate", "setup.generation.get"] {
        let error = request_err(&mut stdin, &mut reader, "2", method, json!({ "timetableId": 1 }));
        assert_eq!(error_code(&error), "no_workspace", "{}", method);
    }
}

#[test]
fn malformed_lines_get_bad_json_and_the_loop_continues() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    writeln!(stdin, "{{not json").expect("write garbage");
    stdin.flush().expect("flush garbage");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read bad_json response");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response");
    assert_eq!(value.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(
        value
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str()),
        Some("bad_json")
    );

    let health = request(&mut stdin, &mut reader, "2", "health", json!({}));
    assert_eq!(health.get("ok").and_then(|v| v.as_bool()), Some(true));
}
