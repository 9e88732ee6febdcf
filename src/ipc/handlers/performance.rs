use crate::db;
use crate::features::extract_features;
use crate::ipc::error::{respond, HandlerErr, HandlerResult};
use crate::ipc::helpers::{db_conn, get_required_str};
use crate::ipc::types::{AppState, Request};
use crate::scoring::score_performance;
use serde_json::json;

fn load_profile(
    conn: &rusqlite::Connection,
    student_id: &str,
) -> Result<crate::domain::StudentProfile, HandlerErr> {
    db::load_profile(conn, student_id)
        .map_err(HandlerErr::query)?
        .ok_or_else(|| HandlerErr::not_found("student", student_id))
}

fn handle_performance_score(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let student_id = get_required_str(&req.params, "studentId")?;
    let profile = load_profile(conn, &student_id)?;
    let score = score_performance(&profile);
    Ok(json!({
        "studentId": student_id,
        "stored": profile.student.academic_performance,
        "score": score,
    }))
}

fn handle_performance_features(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let student_id = get_required_str(&req.params, "studentId")?;
    let profile = load_profile(conn, &student_id)?;
    let features = extract_features(&profile);
    Ok(json!({
        "studentId": student_id,
        "vector": features.as_slice(),
        "named": features.to_named_json(),
    }))
}

fn handle_performance_rescore_all(state: &mut AppState, _req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let total = db::count_students(conn, false).map_err(HandlerErr::query)?;
    let students = db::list_students(conn, false, 0, total).map_err(HandlerErr::query)?;
    let mut changed = 0usize;
    for s in &students {
        if let Some(score) = db::rescore_student(conn, &s.id).map_err(HandlerErr::update)? {
            if s.academic_performance != Some(score.label) {
                changed += 1;
            }
        }
    }
    let distribution = db::performance_distribution(conn).map_err(HandlerErr::query)?;
    tracing::info!(rescored = students.len(), changed, "performance rescored");
    Ok(json!({
        "rescored": students.len(),
        "changed": changed,
        "distribution": distribution,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "performance.score" => handle_performance_score(state, req),
        "performance.features" => handle_performance_features(state, req),
        "performance.rescoreAll" => handle_performance_rescore_all(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
