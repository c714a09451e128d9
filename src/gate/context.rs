use axum::body::Bytes;
use axum::http::{HeaderMap, Method};
use serde_json::Value;
use std::net::IpAddr;
use uuid::Uuid;

use crate::ratelimit::Decision;

/// Header carrying the primary (interactive) credential.
pub const SESSION_TOKEN_HEADER: &str = "x-session-token";
/// Header carrying the fallback shared secret.
pub const API_KEY_HEADER: &str = "x-api-key";
/// Correlation id echoed on every response.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Which schema a mutation route's body is validated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    DyeCatalog,
    LocaleFile,
}

/// Route classification driving stage applicability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// No side effects; bypasses the authentication gate.
    Read,
    /// State-changing; requires auth, and a schema when a kind is known.
    Mutation(Option<MutationKind>),
    /// Issues the session credential itself, so it is auth-exempt and
    /// guarded by its own strict rate tier instead.
    SessionCreate,
}

/// Classify a request by method and path.
pub fn classify(method: &Method, path: &str) -> RouteClass {
    if matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS) {
        return RouteClass::Read;
    }

    if path == "/api/auth/session" {
        return match *method {
            Method::POST => RouteClass::SessionCreate,
            _ => RouteClass::Mutation(None),
        };
    }

    if *method == Method::PUT {
        if path == "/api/dyes" {
            return RouteClass::Mutation(Some(MutationKind::DyeCatalog));
        }
        if path.starts_with("/api/locales/") {
            return RouteClass::Mutation(Some(MutationKind::LocaleFile));
        }
    }

    // Unmatched mutating routes still pass the auth stage before the 404
    RouteClass::Mutation(None)
}

/// Per-request state threaded through the gate stages.
pub struct GateContext {
    pub request_id: Uuid,
    pub method: Method,
    pub path: String,
    pub route: RouteClass,
    pub client: IpAddr,
    pub content_type: Option<String>,
    pub content_length: u64,
    pub session_token: Option<String>,
    pub api_key: Option<String>,
    /// Buffered request body, present only for schema-validated routes.
    pub body: Option<Bytes>,
    /// Set by the schema stage; handed to the handler via extensions.
    pub validated_body: Option<Value>,
    /// Global-tier decision, used for the RateLimit-* response headers.
    pub global_rate: Option<Decision>,
}

impl GateContext {
    pub fn new(
        request_id: Uuid,
        method: Method,
        path: String,
        client: IpAddr,
        headers: &HeaderMap,
        body: Option<Bytes>,
    ) -> Self {
        let route = classify(&method, &path);
        let header_str =
            |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string);

        let content_length = headers
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        Self {
            request_id,
            method,
            path,
            route,
            client,
            content_type: header_str("content-type"),
            content_length,
            session_token: header_str(SESSION_TOKEN_HEADER),
            api_key: header_str(API_KEY_HEADER),
            body,
            validated_body: None,
            global_rate: None,
        }
    }

    /// True when the request carries a body, per its declared length.
    pub fn has_body(&self) -> bool {
        self.content_length > 0
    }
}

/// Correlation id attached to the request for handlers and downstream logs.
#[derive(Debug, Clone, Copy)]
pub struct RequestId(pub Uuid);

/// Schema-validated JSON payload, attached only after the schema stage
/// passes. Handlers never see rejected bodies.
#[derive(Debug, Clone)]
pub struct ValidatedJson(pub Value);
