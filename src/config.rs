use crate::predictor::DEFAULT_PAGE_SIZE;
use anyhow::Context;
use std::path::PathBuf;

pub const MODEL_PATH_VAR: &str = "SCHOOLHUBD_MODEL_PATH";
pub const PAGE_SIZE_VAR: &str = "SCHOOLHUBD_PAGE_SIZE";
pub const LOG_VAR: &str = "SCHOOLHUBD_LOG";

pub const DEFAULT_MODEL_PATH: &str = "models/student_performance_model.json";
pub const DEFAULT_LOG_FILTER: &str = "schoolhubd=info";

/// Workspace setting that overrides the predictor page size.
pub const PAGE_SIZE_SETTING: &str = "predictor.pageSize";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub model_path: PathBuf,
    pub page_size: usize,
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            page_size: DEFAULT_PAGE_SIZE,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves the config from any key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut cfg = Config::default();
        if let Some(p) = get(MODEL_PATH_VAR) {
            cfg.model_path = PathBuf::from(p);
        }
        if let Some(raw) = get(PAGE_SIZE_VAR) {
            let n: usize = raw
                .parse()
                .with_context(|| format!("{} must be a positive integer, got {:?}", PAGE_SIZE_VAR, raw))?;
            cfg.page_size = n.max(1);
        }
        if let Some(f) = get(LOG_VAR) {
            cfg.log_filter = f;
        }
        Ok(cfg)
    }

    /// Page size after applying a workspace override, if it is a positive integer.
    pub fn effective_page_size(&self, setting: Option<&serde_json::Value>) -> usize {
        setting
            .and_then(|v| v.as_u64())
            .filter(|n| *n >= 1)
            .map(|n| n as usize)
            .unwrap_or(self.page_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let cfg = Config::from_lookup(lookup(&[])).expect("config");
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.page_size, 20);
    }

    #[test]
    fn env_values_override_defaults() {
        let cfg = Config::from_lookup(lookup(&[
            (MODEL_PATH_VAR, "/tmp/model.json"),
            (PAGE_SIZE_VAR, " 5 "),
            (LOG_VAR, "schoolhubd=debug"),
        ]))
        .expect("config");
        assert_eq!(cfg.model_path, PathBuf::from("/tmp/model.json"));
        assert_eq!(cfg.page_size, 5);
        assert_eq!(cfg.log_filter, "schoolhubd=debug");
    }

    #[test]
    fn zero_page_size_is_raised_and_garbage_rejected() {
        let cfg = Config::from_lookup(lookup(&[(PAGE_SIZE_VAR, "0")])).expect("config");
        assert_eq!(cfg.page_size, 1);
        assert!(Config::from_lookup(lookup(&[(PAGE_SIZE_VAR, "many")])).is_err());
    }

    #[test]
    fn workspace_setting_wins_when_valid() {
        let cfg = Config::default();
        assert_eq!(cfg.effective_page_size(Some(&json!(7))), 7);
        assert_eq!(cfg.effective_page_size(Some(&json!(0))), 20);
        assert_eq!(cfg.effective_page_size(Some(&json!("x"))), 20);
        assert_eq!(cfg.effective_page_size(None), 20);
    }
}
