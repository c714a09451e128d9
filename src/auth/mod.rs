use axum::http::Method;
use subtle::ConstantTimeEq;

use crate::error::ApiError;
use crate::session::SessionStore;

/// Timing-safe comparison of a provided credential against the expected one.
///
/// A length mismatch returns false immediately; length is not secret. For
/// equal lengths the comparison runs in constant time regardless of where
/// the first differing byte sits.
pub fn secret_matches(provided: &str, expected: &str) -> bool {
    if provided.len() != expected.len() {
        return false;
    }
    provided.as_bytes().ct_eq(expected.as_bytes()).into()
}

fn is_read_only(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Authentication gate decision for one request.
///
/// Read-only methods always pass. Mutating methods need either a valid
/// session token (checked first, the interactive path) or the configured
/// shared secret via the timing-safe comparator (the headless fallback).
/// The shared secret is never logged or echoed.
pub fn authorize(
    method: &Method,
    session_token: Option<&str>,
    api_key: Option<&str>,
    sessions: &SessionStore,
    configured_key: Option<&str>,
) -> Result<(), ApiError> {
    if is_read_only(method) {
        return Ok(());
    }

    if let Some(token) = session_token {
        if sessions.validate(token) {
            return Ok(());
        }
        tracing::warn!(target: "audit", "session token rejected");
    }

    if let Some(key) = api_key {
        return match configured_key {
            Some(expected) if secret_matches(key, expected) => Ok(()),
            Some(_) => {
                tracing::warn!(target: "audit", "api key rejected");
                Err(ApiError::unauthorized())
            }
            None => Err(ApiError::service_unavailable(
                "API key authentication is not configured",
            )),
        };
    }

    Err(ApiError::unauthorized())
}
