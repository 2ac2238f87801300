use crate::calendar::SchoolDate;
use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::Value as JsonValue;

pub fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, JsonValue> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn required_i64(req: &Request, key: &str) -> Result<i64, JsonValue> {
    req.params
        .get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn parse_opt_string(v: Option<&JsonValue>) -> Result<Option<String>, &'static str> {
    match v {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => {
            let s = v.as_str().ok_or("must be string or null")?.trim().to_string();
            if s.is_empty() {
                Ok(None)
            } else {
                Ok(Some(s))
            }
        }
    }
}

pub fn parse_opt_i64(v: Option<&JsonValue>) -> Result<Option<i64>, &'static str> {
    match v {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v.as_i64().map(Some).ok_or("must be integer or null"),
    }
}

pub fn parse_bool(v: Option<&JsonValue>, default: bool) -> Result<bool, &'static str> {
    match v {
        None => Ok(default),
        Some(v) if v.is_null() => Ok(default),
        Some(v) => v.as_bool().ok_or("must be boolean"),
    }
}

/// Reads `params[key]` as a canonical date, surrounding whitespace ignored.
pub fn required_date(req: &Request, key: &str) -> Result<SchoolDate, JsonValue> {
    let raw = req
        .params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))?;
    SchoolDate::parse(raw).map_err(|e| {
        err(
            &req.id,
            "invalid_date",
            format!("{}: {}", key, e),
            Some(serde_json::json!({ "field": key, "value": raw })),
        )
    })
}

pub fn ordered_range(
    req: &Request,
    start_key: &str,
    end_key: &str,
) -> Result<(SchoolDate, SchoolDate), JsonValue> {
    let start = required_date(req, start_key)?;
    let end = required_date(req, end_key)?;
    if start > end {
        return Err(err(
            &req.id,
            "invalid_range",
            format!("{} {} is after {} {}", start_key, start, end_key, end),
            None,
        ));
    }
    Ok((start, end))
}
