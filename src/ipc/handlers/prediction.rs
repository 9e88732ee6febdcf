use crate::db;
use crate::domain::PerformanceLabel;
use crate::ipc::error::{respond, HandlerErr, HandlerResult};
use crate::ipc::helpers::{db_conn, effective_page_size, get_optional_bool, get_page_number};
use crate::ipc::types::{AppState, Request};
use crate::predictor::{paginate, BatchOutcome};
use serde_json::json;

fn handle_predictor_status(state: &mut AppState, _req: &Request) -> HandlerResult {
    Ok(json!(state.predictor.status()))
}

/// One page of students, predicted in a single batch.
fn handle_predictor_dashboard(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let cache = get_optional_bool(&req.params, "cache")?.unwrap_or(true);
    let page_size = effective_page_size(state, conn)?;
    let total = db::count_students(conn, false).map_err(HandlerErr::query)?;
    let page = paginate(total, get_page_number(&req.params), page_size);
    let categories: Vec<&str> = PerformanceLabel::ALL.iter().map(|l| l.as_str()).collect();

    let students = db::list_students(conn, false, page.offset(), page.page_size)
        .map_err(HandlerErr::query)?;
    let profiles = db::load_profiles(conn, students).map_err(HandlerErr::query)?;

    match state.predictor.predict_batch(&profiles) {
        BatchOutcome::Unavailable { message } => Ok(json!({
            "available": false,
            "message": message,
            "predictions": [],
            "page": page,
            "categories": categories,
        })),
        BatchOutcome::Ready(predictions) => {
            if cache {
                // Error rows keep whatever label was cached before.
                for p in &predictions {
                    let Some(label) = p.predicted_performance.label() else {
                        continue;
                    };
                    db::upsert_prediction(conn, &p.student_id, label.as_str())
                        .map_err(HandlerErr::update)?;
                }
            }
            Ok(json!({
                "available": true,
                "predictions": predictions,
                "page": page,
                "categories": categories,
            }))
        }
    }
}

fn handle_predictions_list(state: &mut AppState, _req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let predictions = db::list_predictions(conn).map_err(HandlerErr::query)?;
    Ok(json!({ "predictions": predictions }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "predictor.status" => handle_predictor_status(state, req),
        "predictor.dashboard" => handle_predictor_dashboard(state, req),
        "predictions.list" => handle_predictions_list(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::domain::Student;
    use crate::predictor::{Classifier, ModelError, ModelInfo, Predictor};
    use ndarray::Array2;
    use std::sync::Arc;
    use std::time::{SystemTime, UNIX_EPOCH};

    struct OutOfRange;

    impl Classifier for OutOfRange {
        fn predict_batch(&self, features: &Array2<f64>) -> Result<Vec<i64>, ModelError> {
            Ok(vec![9; features.nrows()])
        }
    }

    #[test]
    fn error_rows_leave_the_cached_label_alone() {
        let ws = std::env::temp_dir().join(format!(
            "schoolhub-prediction-cache-{}",
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ));
        std::fs::create_dir_all(&ws).expect("create temp dir");

        let mut state = AppState::new(Config::default());
        state.db = Some(db::open_db(&ws).expect("open db"));
        state.workspace = Some(ws);
        state.predictor = Predictor::with_classifier(
            Arc::new(OutOfRange),
            ModelInfo {
                path: "memory".to_string(),
                format: "test".to_string(),
                sha256: String::new(),
                classes: 5,
            },
        );
        {
            let conn = state.db.as_ref().expect("db");
            db::save_student(conn, &Student::new("s1", "Rami")).expect("save");
            db::upsert_prediction(conn, "s1", "Good").expect("seed prediction");
        }

        let req = Request {
            id: "1".to_string(),
            method: "predictor.dashboard".to_string(),
            params: json!({}),
        };
        let result = handle_predictor_dashboard(&mut state, &req)
            .map_err(|e| e.message)
            .expect("dashboard");
        assert_eq!(result["predictions"][0]["predictedPerformance"], json!("Error"));

        let cached = db::list_predictions(state.db.as_ref().expect("db")).expect("list");
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].predicted, "Good");
    }
}
