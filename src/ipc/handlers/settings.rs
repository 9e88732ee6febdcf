use crate::config::PAGE_SIZE_SETTING;
use crate::db;
use crate::ipc::error::{respond, HandlerErr, HandlerResult};
use crate::ipc::helpers::{db_conn, get_required_str};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};

fn validate(key: &str, value: &Value) -> Result<(), HandlerErr> {
    if key == PAGE_SIZE_SETTING && !value.as_u64().is_some_and(|n| n >= 1) {
        return Err(HandlerErr::bad_params(format!(
            "{} must be a positive integer",
            PAGE_SIZE_SETTING
        )));
    }
    Ok(())
}

fn handle_settings_get(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let key = get_required_str(&req.params, "key")?;
    let value = db::settings_get_json(conn, &key).map_err(HandlerErr::query)?;
    Ok(json!({ "key": key, "value": value }))
}

fn handle_settings_set(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let key = get_required_str(&req.params, "key")?;
    let Some(value) = req.params.get("value") else {
        return Err(HandlerErr::bad_params("missing value"));
    };
    validate(&key, value)?;
    db::settings_set_json(conn, &key, value).map_err(HandlerErr::update)?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "settings.get" => handle_settings_get(state, req),
        "settings.set" => handle_settings_set(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
