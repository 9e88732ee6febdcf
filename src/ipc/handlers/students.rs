use crate::db;
use crate::domain::Student;
use crate::ipc::error::{respond, HandlerErr, HandlerResult};
use crate::ipc::helpers::{
    db_conn, effective_page_size, get_optional_bool, get_page_number, get_required_str, parse_date,
};
use crate::ipc::types::{AppState, Request};
use crate::predictor::paginate;
use crate::reports::{build_category_data, ReportCategory};
use crate::scoring::score_performance;
use chrono::{NaiveDate, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

const DEFAULT_GUARDIAN: &str = "Unknown Guardian";

/// `None` when the key is absent, `Some(None)` when it is null or blank.
fn patch_str(p: &Value, key: &str) -> Result<Option<Option<String>>, HandlerErr> {
    match p.get(key) {
        None => Ok(None),
        Some(Value::Null) => Ok(Some(None)),
        Some(Value::String(s)) => {
            let t = s.trim();
            Ok(Some(if t.is_empty() { None } else { Some(t.to_string()) }))
        }
        Some(_) => Err(HandlerErr::bad_params(format!("{} must be a string", key))),
    }
}

fn patch_date(p: &Value, key: &str) -> Result<Option<Option<NaiveDate>>, HandlerErr> {
    match patch_str(p, key)? {
        None => Ok(None),
        Some(None) => Ok(Some(None)),
        Some(Some(raw)) => Ok(Some(Some(parse_date(key, &raw)?))),
    }
}

fn patch_number(p: &Value, key: &str) -> Result<Option<Option<f64>>, HandlerErr> {
    match p.get(key) {
        None => Ok(None),
        Some(Value::Null) => Ok(Some(None)),
        Some(v) => match v.as_f64().filter(|n| n.is_finite()) {
            Some(n) => Ok(Some(Some(n))),
            None => Err(HandlerErr::bad_params(format!("{} must be a number", key))),
        },
    }
}

fn apply_student_patch(s: &mut Student, p: &Value) -> Result<(), HandlerErr> {
    if let Some(v) = patch_str(p, "fullName")? {
        s.full_name = v.ok_or_else(|| HandlerErr::bad_params("fullName must not be empty"))?;
    }
    if let Some(v) = patch_str(p, "email")? {
        let email = v.ok_or_else(|| HandlerErr::bad_params("email must not be empty"))?;
        if !email.contains('@') {
            return Err(HandlerErr::bad_params("email is not valid"));
        }
        s.email = email;
    }
    if let Some(v) = patch_str(p, "guardianName")? {
        s.guardian_name = v.unwrap_or_else(|| DEFAULT_GUARDIAN.to_string());
    }

    let optional_fields: [(&str, &mut Option<String>); 9] = [
        ("mobile", &mut s.mobile),
        ("gender", &mut s.gender),
        ("nationality", &mut s.nationality),
        ("address", &mut s.address),
        ("guardianRelationship", &mut s.guardian_relationship),
        ("guardianContact", &mut s.guardian_contact),
        ("guardianAddress", &mut s.guardian_address),
        ("guardianJobTitle", &mut s.guardian_job_title),
        ("gradeLevel", &mut s.grade_level),
    ];
    for (key, slot) in optional_fields {
        if let Some(v) = patch_str(p, key)? {
            *slot = v;
        }
    }

    if let Some(v) = patch_date(p, "dateOfBirth")? {
        s.date_of_birth = v;
    }
    if let Some(v) = patch_date(p, "enrollmentDate")? {
        s.enrollment_date = v;
    }

    if let Some(v) = patch_number(p, "attendancePercentage")? {
        let pct = v.unwrap_or(0.0);
        if !(0.0..=100.0).contains(&pct) {
            return Err(HandlerErr::bad_params(
                "attendancePercentage must be between 0 and 100",
            ));
        }
        s.attendance_percentage = pct;
    }
    if let Some(v) = patch_number(p, "guardianMonthlyIncome")? {
        if v.is_some_and(|n| n < 0.0) {
            return Err(HandlerErr::bad_params(
                "guardianMonthlyIncome must not be negative",
            ));
        }
        s.guardian_monthly_income = v;
    }
    if let Some(v) = get_optional_bool(p, "isActive")? {
        s.is_active = v;
    }
    Ok(())
}

fn ensure_email_free(
    conn: &rusqlite::Connection,
    email: &str,
    except_id: Option<&str>,
) -> Result<(), HandlerErr> {
    if db::email_taken(conn, email, except_id).map_err(HandlerErr::query)? {
        return Err(HandlerErr::bad_params("email already in use")
            .with_details(json!({ "email": email })));
    }
    Ok(())
}

fn handle_students_create(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let full_name = get_required_str(&req.params, "fullName")?;
    get_required_str(&req.params, "email")?;

    let mut student = Student::new(Uuid::new_v4().to_string(), full_name);
    apply_student_patch(&mut student, &req.params)?;
    ensure_email_free(conn, &student.email, None)?;

    // New students get a personal report right away.
    let today = Utc::now().date_naive();
    let (performance, profile, report) = db::create_student_with_report(
        conn,
        &student,
        ReportCategory::Personal.code(),
        "Automatic",
        |p| Ok(build_category_data(p, ReportCategory::Personal, today)),
    )
    .map_err(HandlerErr::update)?;

    tracing::info!(student_id = %student.id, label = %performance.label, "student created");
    Ok(json!({
        "student": profile.student,
        "performance": performance,
        "reportId": report.id,
    }))
}

fn handle_students_get(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let student_id = get_required_str(&req.params, "studentId")?;
    let profile = db::load_profile(conn, &student_id)
        .map_err(HandlerErr::query)?
        .ok_or_else(|| HandlerErr::not_found("student", &student_id))?;
    let performance = score_performance(&profile);
    Ok(json!({
        "student": profile.student,
        "economic": profile.economic,
        "health": profile.health,
        "tech": profile.tech,
        "subjects": profile.subjects,
        "performance": performance,
    }))
}

fn handle_students_list(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let active_only = get_optional_bool(&req.params, "activeOnly")?.unwrap_or(false);
    let page_size = effective_page_size(state, conn)?;
    let total = db::count_students(conn, active_only).map_err(HandlerErr::query)?;
    let page = paginate(total, get_page_number(&req.params), page_size);
    let students = db::list_students(conn, active_only, page.offset(), page.page_size)
        .map_err(HandlerErr::query)?;
    Ok(json!({ "students": students, "page": page }))
}

fn handle_students_update(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let student_id = get_required_str(&req.params, "studentId")?;
    let Some(patch) = req.params.get("patch").filter(|v| v.is_object()) else {
        return Err(HandlerErr::bad_params("patch must be an object"));
    };
    let mut student = db::load_student(conn, &student_id)
        .map_err(HandlerErr::query)?
        .ok_or_else(|| HandlerErr::not_found("student", &student_id))?;
    apply_student_patch(&mut student, patch)?;
    ensure_email_free(conn, &student.email, Some(&student_id))?;

    let performance = db::save_student(conn, &student).map_err(HandlerErr::update)?;
    student.academic_performance = Some(performance.label);
    Ok(json!({ "student": student, "performance": performance }))
}

fn handle_students_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let student_id = get_required_str(&req.params, "studentId")?;
    if !db::delete_student(conn, &student_id).map_err(HandlerErr::update)? {
        return Err(HandlerErr::not_found("student", &student_id));
    }
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "students.create" => handle_students_create(state, req),
        "students.get" => handle_students_get(state, req),
        "students.list" => handle_students_list(state, req),
        "students.update" => handle_students_update(state, req),
        "students.delete" => handle_students_delete(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_sets_and_clears_optional_fields() {
        let mut s = Student::new("s1", "Rami");
        s.mobile = Some("0100".into());
        apply_student_patch(
            &mut s,
            &json!({
                "mobile": null,
                "gender": "Male",
                "dateOfBirth": "2009-05-01",
                "attendancePercentage": 87.5,
                "guardianName": ""
            }),
        )
        .map_err(|e| e.message)
        .expect("patch");
        assert_eq!(s.mobile, None);
        assert_eq!(s.gender.as_deref(), Some("Male"));
        assert_eq!(s.date_of_birth, NaiveDate::from_ymd_opt(2009, 5, 1));
        assert_eq!(s.attendance_percentage, 87.5);
        assert_eq!(s.guardian_name, DEFAULT_GUARDIAN);
    }

    #[test]
    fn patch_rejects_out_of_range_attendance_and_bad_dates() {
        let mut s = Student::new("s1", "Rami");
        let e = apply_student_patch(&mut s, &json!({ "attendancePercentage": 120 }))
            .err()
            .expect("rejected");
        assert_eq!(e.code, "bad_params");
        let e = apply_student_patch(&mut s, &json!({ "dateOfBirth": "01/05/2009" }))
            .err()
            .expect("rejected");
        assert_eq!(e.code, "bad_params");
    }
}
