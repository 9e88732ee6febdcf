//! School records sidecar: weighted performance scoring, batch prediction
//! against an external classifier, and category reports, served over
//! line-delimited JSON on stdin/stdout.

pub mod backup;
pub mod config;
pub mod db;
pub mod domain;
pub mod evaluation;
pub mod features;
pub mod grades;
pub mod ipc;
pub mod predictor;
pub mod reports;
pub mod scoring;
