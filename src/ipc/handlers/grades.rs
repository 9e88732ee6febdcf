use crate::db::{self, NewGrade};
use crate::domain::{ExamType, Semester};
use crate::ipc::error::{respond, HandlerErr, HandlerResult};
use crate::ipc::helpers::{
    db_conn, get_optional_bool, get_optional_f64, get_optional_str, get_required_str, parse_date,
};
use crate::ipc::types::{AppState, Request};
use chrono::Utc;
use serde_json::json;

fn choice<T: Copy>(
    params: &serde_json::Value,
    key: &str,
    default: T,
    parse: fn(&str) -> Option<T>,
) -> Result<T, HandlerErr> {
    match get_optional_str(params, key) {
        None => Ok(default),
        Some(raw) => parse(&raw)
            .ok_or_else(|| HandlerErr::bad_params(format!("unknown {}: {}", key, raw))),
    }
}

fn handle_grades_record(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let p = &req.params;
    let student_id = get_required_str(p, "studentId")?;
    let subject_id = get_required_str(p, "subjectId")?;
    let Some(score) = get_optional_f64(p, "score")? else {
        return Err(HandlerErr::bad_params("missing score"));
    };
    let max_score = get_optional_f64(p, "maxScore")?.unwrap_or(100.0);
    if score < 0.0 || max_score <= 0.0 {
        return Err(HandlerErr::bad_params(
            "score must be >= 0 and maxScore must be > 0",
        ));
    }
    let date_recorded = match get_optional_str(p, "dateRecorded") {
        Some(raw) => parse_date("dateRecorded", &raw)?,
        None => Utc::now().date_naive(),
    };

    let grade = NewGrade {
        exam_type: choice(p, "examType", ExamType::Final, ExamType::parse)?,
        semester: choice(p, "semester", Semester::Fall, Semester::parse)?,
        is_retake: get_optional_bool(p, "isRetake")?.unwrap_or(false),
        student_id,
        subject_id,
        score,
        max_score,
        date_recorded,
    };

    if !db::student_exists(conn, &grade.student_id).map_err(HandlerErr::query)? {
        return Err(HandlerErr::not_found("student", &grade.student_id));
    }
    if !db::subject_exists(conn, &grade.subject_id).map_err(HandlerErr::query)? {
        return Err(HandlerErr::not_found("subject", &grade.subject_id));
    }

    let recorded = db::record_grade(conn, &grade).map_err(HandlerErr::update)?;
    Ok(json!({
        "grade": recorded.grade,
        "trend": recorded.trend,
        "performance": recorded.performance,
    }))
}

fn handle_grades_list(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let student_id = get_required_str(&req.params, "studentId")?;
    let grades = db::list_grades(conn, &student_id).map_err(HandlerErr::query)?;
    Ok(json!({ "grades": grades }))
}

fn handle_grades_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let grade_id = get_required_str(&req.params, "gradeId")?;
    if db::load_grade(conn, &grade_id)
        .map_err(HandlerErr::query)?
        .is_none()
    {
        return Err(HandlerErr::not_found("grade", &grade_id));
    }
    let performance = db::delete_grade(conn, &grade_id).map_err(HandlerErr::update)?;
    Ok(json!({ "ok": true, "performance": performance }))
}

fn handle_trends_list(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let student_id = get_required_str(&req.params, "studentId")?;
    let trends = db::list_trends(conn, &student_id).map_err(HandlerErr::query)?;
    Ok(json!({ "trends": trends }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "grades.record" => handle_grades_record(state, req),
        "grades.list" => handle_grades_list(state, req),
        "grades.delete" => handle_grades_delete(state, req),
        "trends.list" => handle_trends_list(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
