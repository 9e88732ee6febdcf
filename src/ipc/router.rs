use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::err;

type TryHandle = fn(&mut AppState, &Request) -> Option<serde_json::Value>;

const HANDLERS: [TryHandle; 10] = [
    handlers::core::try_handle,
    handlers::settings::try_handle,
    handlers::subjects::try_handle,
    handlers::students::try_handle,
    handlers::profiles::try_handle,
    handlers::grades::try_handle,
    handlers::performance::try_handle,
    handlers::prediction::try_handle,
    handlers::reports::try_handle,
    handlers::backup_exchange::try_handle,
];

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    for handler in HANDLERS {
        if let Some(resp) = handler(state, &req) {
            return resp;
        }
    }

    tracing::debug!(method = %req.method, "unknown method");
    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}
