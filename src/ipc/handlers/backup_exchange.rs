use crate::backup;
use crate::db;
use crate::ipc::error::{respond, HandlerErr, HandlerResult};
use crate::ipc::helpers::get_required_str;
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

fn workspace_param(state: &AppState, req: &Request) -> Result<PathBuf, HandlerErr> {
    req.params
        .get("workspacePath")
        .and_then(|v| v.as_str())
        .map(PathBuf::from)
        .or_else(|| state.workspace.clone())
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

fn handle_backup_export_workspace_bundle(state: &mut AppState, req: &Request) -> HandlerResult {
    let out_path = get_required_str(&req.params, "outPath")?;
    let workspace_path = workspace_param(state, req)?;

    if let Some(conn) = state.db.as_ref() {
        let _ = conn.execute_batch("PRAGMA wal_checkpoint(FULL)");
    }

    let export = backup::export_workspace_bundle(&workspace_path, &PathBuf::from(&out_path))
        .map_err(|e| {
            HandlerErr::new("backup_failed", format!("{:#}", e))
                .with_details(json!({ "path": out_path }))
        })?;

    Ok(json!({
        "path": out_path,
        "bundleFormat": export.bundle_format,
        "entryCount": export.entry_count,
        "dbSha256": export.db_sha256,
    }))
}

fn handle_backup_import_workspace_bundle(state: &mut AppState, req: &Request) -> HandlerResult {
    let in_path = get_required_str(&req.params, "inPath")?;
    let workspace_path = workspace_param(state, req)?;
    let src = PathBuf::from(&in_path);
    if !src.is_file() {
        return Err(HandlerErr::new("not_found", "bundle file not found")
            .with_details(json!({ "path": in_path })));
    }

    // Drop open handle before replacing file.
    state.db = None;
    let import = match backup::import_workspace_bundle(&src, &workspace_path) {
        Ok(import) => import,
        Err(e) => {
            // Rejected bundles leave the database file untouched.
            if let Some(ws) = state.workspace.as_ref() {
                state.db = db::open_db(ws)
                    .map_err(|reopen| tracing::warn!(error = %reopen, "workspace reopen failed"))
                    .ok();
            }
            return Err(HandlerErr::new("backup_failed", format!("{:#}", e))
                .with_details(json!({ "path": in_path })));
        }
    };

    let conn = db::open_db(&workspace_path)
        .map_err(|e| HandlerErr::new("db_open_failed", format!("{:#}", e)))?;
    state.workspace = Some(workspace_path.clone());
    state.db = Some(conn);

    Ok(json!({
        "workspacePath": workspace_path.to_string_lossy(),
        "bundleFormatDetected": import.bundle_format_detected,
        "dbSha256": import.db_sha256,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "backup.exportWorkspaceBundle" => handle_backup_export_workspace_bundle(state, req),
        "backup.importWorkspaceBundle" => handle_backup_import_workspace_bundle(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
