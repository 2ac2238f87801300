use serde_json::json;

use crate::generate::GenerateError;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

pub fn generate_err(id: &str, e: &GenerateError) -> serde_json::Value {
    let mut details = json!({ "stage": e.stage().as_str() });
    match e {
        GenerateError::InvalidDate { field, value, .. } => {
            details["field"] = json!(field);
            details["value"] = json!(value);
        }
        GenerateError::InvalidRange { start, end } => {
            details["startDate"] = json!(start.to_string());
            details["endDate"] = json!(end.to_string());
        }
        GenerateError::MissingTimetable(tid) => {
            details["timetableId"] = json!(tid);
        }
        GenerateError::IncompleteSlotData { slot_id, .. } => {
            details["slotId"] = json!(slot_id);
        }
        GenerateError::RangeTooLarge { days, limit } => {
            details["days"] = json!(days);
            details["limit"] = json!(limit);
        }
        GenerateError::Persistence { .. } => {}
    }
    err(id, e.code(), e.to_string(), Some(details))
}
