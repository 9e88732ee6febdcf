use crate::db;
use crate::ipc::error::{respond, HandlerErr, HandlerResult};
use crate::ipc::helpers::{db_conn, get_optional_f64, get_required_str};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_subjects_create(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let name = get_required_str(&req.params, "name")?;
    let credit_hours = match get_optional_f64(&req.params, "creditHours")? {
        None => 1,
        Some(v) if v >= 1.0 && v.fract() == 0.0 && v <= u32::MAX as f64 => v as u32,
        Some(_) => return Err(HandlerErr::bad_params("creditHours must be an integer >= 1")),
    };
    let exists = db::list_subjects(conn)
        .map_err(HandlerErr::query)?
        .iter()
        .any(|s| s.name.eq_ignore_ascii_case(&name));
    if exists {
        return Err(HandlerErr::bad_params("subject name already exists")
            .with_details(json!({ "name": name })));
    }
    let subject = db::create_subject(conn, &name, credit_hours).map_err(HandlerErr::update)?;
    Ok(json!({ "subject": subject }))
}

fn handle_subjects_list(state: &mut AppState, _req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let subjects = db::list_subjects(conn).map_err(HandlerErr::query)?;
    Ok(json!({ "subjects": subjects }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "subjects.create" => handle_subjects_create(state, req),
        "subjects.list" => handle_subjects_list(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
