use crate::db::{self, SatelliteKind};
use crate::domain::{EconomicSituation, HealthInformation, SocialMediaAndTechnology};
use crate::ipc::error::{respond, HandlerErr, HandlerResult};
use crate::ipc::helpers::{db_conn, get_required_str};
use crate::ipc::types::{AppState, Request};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;

fn parse_profile<T: DeserializeOwned>(req: &Request) -> Result<T, HandlerErr> {
    let Some(raw) = req.params.get("profile").filter(|v| v.is_object()) else {
        return Err(HandlerErr::bad_params("profile must be an object"));
    };
    serde_json::from_value(raw.clone())
        .map_err(|e| HandlerErr::bad_params(format!("invalid profile: {}", e)))
}

fn set_profile<T: DeserializeOwned + Serialize>(
    state: &mut AppState,
    req: &Request,
    kind: SatelliteKind,
    validate: fn(&T) -> Result<(), HandlerErr>,
) -> HandlerResult {
    let conn = db_conn(state)?;
    let student_id = get_required_str(&req.params, "studentId")?;
    let profile: T = parse_profile(req)?;
    validate(&profile)?;
    if !db::student_exists(conn, &student_id).map_err(HandlerErr::query)? {
        return Err(HandlerErr::not_found("student", &student_id));
    }
    let performance =
        db::set_satellite(conn, kind, &student_id, &profile).map_err(HandlerErr::update)?;
    Ok(json!({ "profile": profile, "performance": performance }))
}

fn non_negative(key: &str, v: f64) -> Result<(), HandlerErr> {
    if v.is_finite() && v >= 0.0 {
        Ok(())
    } else {
        Err(HandlerErr::bad_params(format!("{} must not be negative", key)))
    }
}

fn validate_economic(p: &EconomicSituation) -> Result<(), HandlerErr> {
    non_negative("dailyStudyHours", p.daily_study_hours)?;
    if let Some(v) = p.family_income_level {
        non_negative("familyIncomeLevel", v)?;
    }
    if let Some(v) = p.monthly_expenses {
        non_negative("monthlyExpenses", v)?;
    }
    Ok(())
}

fn validate_health(p: &HealthInformation) -> Result<(), HandlerErr> {
    for (key, v) in [("weight", p.weight), ("height", p.height)] {
        if let Some(v) = v {
            non_negative(key, v)?;
        }
    }
    Ok(())
}

fn validate_tech(p: &SocialMediaAndTechnology) -> Result<(), HandlerErr> {
    non_negative("dailyScreenTime", p.daily_screen_time)?;
    non_negative("dailyGamingHours", p.daily_gaming_hours)
}

fn handle_profiles_clear(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let student_id = get_required_str(&req.params, "studentId")?;
    let kind_raw = get_required_str(&req.params, "kind")?;
    let Some(kind) = SatelliteKind::parse(&kind_raw) else {
        return Err(HandlerErr::bad_params("kind must be economic, health or tech"));
    };
    match db::clear_satellite(conn, kind, &student_id).map_err(HandlerErr::update)? {
        Some(performance) => Ok(json!({ "cleared": true, "performance": performance })),
        None => Ok(json!({ "cleared": false })),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "profiles.economic.set" => {
            set_profile::<EconomicSituation>(state, req, SatelliteKind::Economic, validate_economic)
        }
        "profiles.health.set" => {
            set_profile::<HealthInformation>(state, req, SatelliteKind::Health, validate_health)
        }
        "profiles.tech.set" => {
            set_profile::<SocialMediaAndTechnology>(state, req, SatelliteKind::Tech, validate_tech)
        }
        "profiles.clear" => handle_profiles_clear(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
