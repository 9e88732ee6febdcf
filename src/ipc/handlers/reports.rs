use crate::db;
use crate::evaluation::compute_evaluation_metrics;
use crate::ipc::error::{respond, HandlerErr, HandlerResult};
use crate::ipc::helpers::{db_conn, get_optional_bool, get_optional_str, get_required_str};
use crate::ipc::types::{AppState, Request};
use crate::reports::{build_category_data, build_report_data, ReportCategory};
use chrono::Utc;
use serde_json::json;

const AUTOMATIC: &str = "Automatic";

fn handle_reports_build(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let student_id = get_required_str(&req.params, "studentId")?;
    let category = get_required_str(&req.params, "category")?;
    let persist = get_optional_bool(&req.params, "persist")?.unwrap_or(true);

    let profile = db::load_profile(conn, &student_id)
        .map_err(HandlerErr::query)?
        .ok_or_else(|| HandlerErr::not_found("student", &student_id))?;
    let data = build_report_data(&profile, &category, Utc::now().date_naive());

    // Unknown categories build an empty map and are never stored; neither is a preview.
    let Some(known) = ReportCategory::parse(&category).filter(|_| persist) else {
        return Ok(json!({ "report": null, "data": data }));
    };
    let report = db::create_report(conn, &student_id, known.code(), AUTOMATIC, &data)
        .map_err(HandlerErr::update)?;
    Ok(json!({ "report": report, "data": data }))
}

/// One report per active student for the chosen category.
fn handle_reports_generate_all(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let raw = get_required_str(&req.params, "category")?;
    let Some(category) = ReportCategory::parse(&raw) else {
        return Err(HandlerErr::bad_params(format!("unknown category: {}", raw)));
    };
    let today = Utc::now().date_naive();
    let total = db::count_students(conn, true).map_err(HandlerErr::query)?;
    let students = db::list_students(conn, true, 0, total).map_err(HandlerErr::query)?;

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::update(e.into()))?;
    let mut generated = 0usize;
    for s in students {
        let Some(profile) = db::load_profile(&tx, &s.id).map_err(HandlerErr::query)? else {
            continue;
        };
        let data = build_category_data(&profile, category, today);
        db::create_report(&tx, &s.id, category.code(), AUTOMATIC, &data)
            .map_err(HandlerErr::update)?;
        generated += 1;
    }
    tx.commit().map_err(|e| HandlerErr::update(e.into()))?;

    tracing::info!(category = category.code(), generated, "reports generated");
    Ok(json!({
        "generated": generated,
        "category": category.code(),
        "message": format!(
            "{} reports generated for category '{}'.",
            generated,
            category.code()
        ),
    }))
}

fn handle_reports_list(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let category = match get_optional_str(&req.params, "category") {
        Some(raw) => Some(
            ReportCategory::parse(&raw)
                .ok_or_else(|| HandlerErr::bad_params(format!("unknown category: {}", raw)))?,
        ),
        None => None,
    };
    let student_id = get_optional_str(&req.params, "studentId");
    let reports = db::list_reports(conn, category.map(|c| c.code()), student_id.as_deref())
        .map_err(HandlerErr::query)?;
    Ok(json!({ "reports": reports }))
}

fn handle_reports_get(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let report_id = get_required_str(&req.params, "reportId")?;
    let report = db::load_report(conn, &report_id)
        .map_err(HandlerErr::query)?
        .ok_or_else(|| HandlerErr::not_found("report", &report_id))?;
    let display = ReportCategory::parse(&report.category).map(|c| c.display());
    Ok(json!({ "report": report, "categoryDisplay": display }))
}

fn handle_reports_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let report_id = get_required_str(&req.params, "reportId")?;
    if !db::delete_report(conn, &report_id).map_err(HandlerErr::update)? {
        return Err(HandlerErr::not_found("report", &report_id));
    }
    Ok(json!({ "ok": true }))
}

/// Report counts, label distribution and how cached predictions compare with
/// the scorer's current labels.
fn handle_reports_dashboard(state: &mut AppState, _req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let by_category = db::report_counts_by_category(conn).map_err(HandlerErr::query)?;
    let total_reports: i64 = by_category.values().sum();
    let students = db::count_students(conn, false).map_err(HandlerErr::query)?;
    let distribution = db::performance_distribution(conn).map_err(HandlerErr::query)?;

    let (y_true, y_pred): (Vec<String>, Vec<String>) = db::list_predictions(conn)
        .map_err(HandlerErr::query)?
        .into_iter()
        .filter_map(|p| p.actual.map(|actual| (actual, p.predicted)))
        .unzip();
    let evaluation = if y_true.is_empty() {
        None
    } else {
        Some(compute_evaluation_metrics(&y_true, &y_pred))
    };

    Ok(json!({
        "totalReports": total_reports,
        "reportsByCategory": by_category,
        "totalStudents": students,
        "performanceDistribution": distribution,
        "evaluation": evaluation,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "reports.build" => handle_reports_build(state, req),
        "reports.generateAll" => handle_reports_generate_all(state, req),
        "reports.list" => handle_reports_list(state, req),
        "reports.get" => handle_reports_get(state, req),
        "reports.delete" => handle_reports_delete(state, req),
        "reports.dashboard" => handle_reports_dashboard(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
