use crate::config;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::db_conn;
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_generation_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let settings = config::load_generation_settings(conn);
    ok(&req.id, json!({ "generation": settings.to_json() }))
}

fn handle_generation_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing patch", None);
    };
    let current = config::load_generation_settings(conn);
    let next = match current.apply_patch(patch) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };
    if let Err(e) = config::save_generation_settings(conn, &next) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "generation": next.to_json() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.generation.get" => Some(handle_generation_get(state, req)),
        "setup.generation.update" => Some(handle_generation_update(state, req)),
        _ => None,
    }
}
