use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::config::Config;
use crate::predictor::Predictor;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub config: Config,
    /// Loaded lazily on the first predictor call and kept for the process lifetime.
    pub predictor: Predictor,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let predictor = Predictor::from_path(config.model_path.clone());
        Self {
            workspace: None,
            db: None,
            config,
            predictor,
        }
    }
}
