use axum::extract::State;
use serde::Serialize;
use serde_json::{json, Value};

use crate::response::{ApiResponse, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SessionIssued {
    pub token: String,
    pub expires_in_secs: u64,
}

/// POST /api/auth/session - issue a fresh session token
pub async fn session_create(State(state): State<AppState>) -> ApiResult<SessionIssued> {
    let token = state.sessions.issue();
    tracing::info!(target: "audit", "session issued");

    Ok(ApiResponse::created(SessionIssued {
        token,
        expires_in_secs: state.sessions.ttl().as_secs(),
    }))
}

/// DELETE /api/auth/session - clear all sessions
pub async fn session_reset(State(state): State<AppState>) -> ApiResult<Value> {
    state.sessions.reset();
    tracing::info!(target: "audit", "all sessions cleared");

    Ok(ApiResponse::success(json!({ "cleared": true })))
}
