use axum::extract::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::config;
use crate::error::ApiError;

/// Outermost middleware: bounds the lifetime of a single request.
///
/// If the deadline fires before a response is produced, the inner future is
/// dropped — cancelling the remaining pipeline work and releasing its
/// timers — and a 408 envelope is emitted instead. Normal completion
/// disarms the deadline implicitly.
pub async fn guard(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let deadline = config::config().request_timeout();

    match tokio::time::timeout(deadline, next.run(req)).await {
        Ok(response) => response,
        Err(_) => {
            tracing::warn!(
                method = %method,
                path = %path,
                timeout_secs = deadline.as_secs(),
                "request deadline fired, abandoning"
            );
            ApiError::timeout().into_response()
        }
    }
}
