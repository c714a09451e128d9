use axum::http::{Method, StatusCode};
use std::net::IpAddr;
use std::time::Instant;
use uuid::Uuid;

/// Per-request correlation state: a unique id assigned at entry, carried on
/// every log line for the request and echoed in the response headers.
pub struct CorrelationContext {
    pub id: Uuid,
    pub started: Instant,
}

/// Assign a correlation id and log request entry.
pub fn begin(method: &Method, path: &str, client: IpAddr) -> CorrelationContext {
    let ctx = CorrelationContext {
        id: Uuid::new_v4(),
        started: Instant::now(),
    };

    tracing::info!(
        request_id = %ctx.id,
        method = %method,
        path = %path,
        client = %client,
        "request received"
    );

    ctx
}

/// Classify and log request completion. Precedence: successful mutation
/// logs on the audit channel, any 4xx/5xx logs at WARN, everything else at
/// INFO.
pub fn complete(ctx: &CorrelationContext, method: &Method, path: &str, status: StatusCode) {
    let elapsed_ms = ctx.started.elapsed().as_millis() as u64;
    let mutating = !matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS);

    if mutating && status.is_success() {
        tracing::info!(
            target: "audit",
            request_id = %ctx.id,
            method = %method,
            path = %path,
            status = status.as_u16(),
            elapsed_ms,
            "mutation completed"
        );
    } else if status.is_client_error() || status.is_server_error() {
        tracing::warn!(
            request_id = %ctx.id,
            method = %method,
            path = %path,
            status = status.as_u16(),
            elapsed_ms,
            "request rejected"
        );
    } else {
        tracing::info!(
            request_id = %ctx.id,
            method = %method,
            path = %path,
            status = status.as_u16(),
            elapsed_ms,
            "request completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correlation_ids_are_unique_per_request() {
        let client: IpAddr = IpAddr::V4(std::net::Ipv4Addr::LOCALHOST);
        let a = begin(&Method::GET, "/health", client);
        let b = begin(&Method::GET, "/health", client);
        assert_ne!(a.id, b.id);
    }
}
