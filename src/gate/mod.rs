//! The request gate: an ordered, short-circuiting chain of security stages
//! run in front of every route handler.
//!
//! Stage order is fixed: rate tiers (global, session, write), content-type
//! enforcement, authentication, schema validation. Any stage may end the
//! request with an error envelope; handlers only ever see requests that
//! passed the whole chain.

pub mod audit;
pub mod context;
pub mod stages;
pub mod timeout;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::config::{self, LimitsConfig};
use crate::error::ApiError;
use crate::ratelimit::{Decision, FixedWindowLimiter, TierPolicy};
use crate::session::SessionStore;
use crate::state::AppState;

use context::{GateContext, MutationKind, RequestId, RouteClass, ValidatedJson, REQUEST_ID_HEADER};
use stages::{
    AuthStage, ContentTypeStage, GateStage, RateLimitStage, SchemaStage, StageOutcome, TierScope,
};

/// The ordered stage chain, built once at startup from injected stores.
pub struct GatePipeline {
    stages: Vec<Box<dyn GateStage>>,
}

impl GatePipeline {
    pub fn new(
        sessions: Arc<SessionStore>,
        limits: &LimitsConfig,
        configured_key: Option<String>,
    ) -> Self {
        let global = Arc::new(FixedWindowLimiter::new(TierPolicy {
            name: "global",
            max_requests: limits.global_requests,
            window: std::time::Duration::from_secs(limits.global_window_secs),
        }));
        let session = Arc::new(FixedWindowLimiter::new(TierPolicy {
            name: "session",
            max_requests: limits.session_requests,
            window: std::time::Duration::from_secs(limits.session_window_secs),
        }));
        let write = Arc::new(FixedWindowLimiter::new(TierPolicy {
            name: "write",
            max_requests: limits.write_requests,
            window: std::time::Duration::from_secs(limits.write_window_secs),
        }));

        let stages: Vec<Box<dyn GateStage>> = vec![
            Box::new(RateLimitStage::new(TierScope::Global, global)),
            Box::new(RateLimitStage::new(TierScope::SessionCreate, session)),
            Box::new(RateLimitStage::new(TierScope::Write, write)),
            Box::new(ContentTypeStage),
            Box::new(AuthStage::new(sessions, configured_key)),
            Box::new(SchemaStage),
        ];

        Self { stages }
    }

    /// Run the stages in order. Returns the short-circuiting error, if any.
    pub async fn run(&self, ctx: &mut GateContext) -> Option<ApiError> {
        for stage in &self.stages {
            if !stage.applies_to(ctx) {
                tracing::trace!(
                    request_id = %ctx.request_id,
                    stage = stage.name(),
                    "stage skipped"
                );
                continue;
            }

            match stage.check(ctx).await {
                StageOutcome::Continue => {
                    tracing::trace!(
                        request_id = %ctx.request_id,
                        stage = stage.name(),
                        "stage passed"
                    );
                }
                StageOutcome::Respond(err) => {
                    tracing::debug!(
                        request_id = %ctx.request_id,
                        stage = stage.name(),
                        status = err.status_code(),
                        "gate short-circuit"
                    );
                    return Some(err);
                }
            }
        }
        None
    }
}

/// Axum middleware wrapping the pipeline around every route.
///
/// Buffers the body for schema-validated routes (size-capped), runs the
/// stage chain, and either emits the stage's error envelope or forwards the
/// request — with the validated payload and correlation id attached — to
/// the handler. Every response gets the correlation and rate-limit headers.
pub async fn enforce(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request,
    next: Next,
) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let corr = audit::begin(&method, &path, addr.ip());

    let (mut parts, body) = req.into_parts();

    // Only schema-validated routes need the body up front
    let wants_schema = matches!(
        context::classify(&method, &path),
        RouteClass::Mutation(Some(MutationKind::DyeCatalog | MutationKind::LocaleFile))
    );
    let (buffered, body) = if wants_schema {
        match axum::body::to_bytes(body, config::config().server.max_body_bytes).await {
            Ok(bytes) => {
                let replay = Body::from(bytes.clone());
                (Some(bytes), replay)
            }
            Err(e) => {
                tracing::warn!(request_id = %corr.id, error = %e, "request body rejected");
                let mut response = ApiError::bad_request("Request body too large").into_response();
                // Same correlation headers as every other gated response; no
                // rate decision exists yet since no stage has run
                annotate(&mut response, corr.id, None);
                audit::complete(&corr, &method, &path, response.status());
                return response;
            }
        }
    } else {
        (None, body)
    };

    let mut ctx = GateContext::new(
        corr.id,
        method.clone(),
        path.clone(),
        addr.ip(),
        &parts.headers,
        buffered,
    );

    let verdict = state.gate.run(&mut ctx).await;
    let global_rate = ctx.global_rate;

    let mut response = match verdict {
        Some(err) => err.into_response(),
        None => {
            parts.extensions.insert(RequestId(corr.id));
            if let Some(payload) = ctx.validated_body.take() {
                parts.extensions.insert(ValidatedJson(payload));
            }
            next.run(Request::from_parts(parts, body)).await
        }
    };

    annotate(&mut response, corr.id, global_rate);
    audit::complete(&corr, &method, &path, response.status());
    response
}

/// Attach the correlation id and standard rate-limit headers.
fn annotate(response: &mut Response, request_id: uuid::Uuid, rate: Option<Decision>) {
    let headers = response.headers_mut();

    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        headers.insert(REQUEST_ID_HEADER, value);
    }

    if let Some(decision) = rate {
        let pairs = [
            ("ratelimit-limit", decision.limit.to_string()),
            ("ratelimit-remaining", decision.remaining.to_string()),
            ("ratelimit-reset", decision.reset_after.as_secs().to_string()),
        ];
        for (name, value) in pairs {
            if let Ok(value) = HeaderValue::from_str(&value) {
                headers.insert(name, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use axum::http::{HeaderMap, Method};
    use std::net::IpAddr;
    use std::time::Duration;
    use uuid::Uuid;

    const CLIENT: IpAddr = IpAddr::V4(std::net::Ipv4Addr::LOCALHOST);

    fn pipeline(configured_key: Option<String>) -> (Arc<SessionStore>, GatePipeline) {
        let sessions = Arc::new(SessionStore::new(Duration::from_secs(60)));
        let limits = LimitsConfig {
            global_requests: 100,
            global_window_secs: 60,
            write_requests: 5,
            write_window_secs: 60,
            session_requests: 2,
            session_window_secs: 60,
        };
        let gate = GatePipeline::new(sessions.clone(), &limits, configured_key);
        (sessions, gate)
    }

    fn ctx(method: Method, path: &str, headers: HeaderMap, body: Option<Bytes>) -> GateContext {
        GateContext::new(Uuid::new_v4(), method, path.to_string(), CLIENT, &headers, body)
    }

    #[tokio::test]
    async fn read_requests_pass_and_record_global_rate() {
        let (_, gate) = pipeline(None);
        let mut ctx = ctx(Method::GET, "/api/dyes", HeaderMap::new(), None);

        assert!(gate.run(&mut ctx).await.is_none());
        let rate = ctx.global_rate.expect("global decision recorded");
        assert_eq!(rate.limit, 100);
        assert_eq!(rate.remaining, 99);
    }

    #[tokio::test]
    async fn unauthenticated_mutation_is_denied_before_schema() {
        let (_, gate) = pipeline(None);
        let mut ctx = ctx(Method::PUT, "/api/dyes", HeaderMap::new(), None);

        let err = gate.run(&mut ctx).await.expect("gate must deny");
        assert_eq!(err.status_code(), 401);
        assert!(ctx.validated_body.is_none());
    }

    #[tokio::test]
    async fn session_tier_denies_past_its_cap() {
        let (_, gate) = pipeline(None);

        for _ in 0..2 {
            let mut ctx = ctx(Method::POST, "/api/auth/session", HeaderMap::new(), None);
            assert!(gate.run(&mut ctx).await.is_none());
        }

        let mut ctx = ctx(Method::POST, "/api/auth/session", HeaderMap::new(), None);
        let err = gate.run(&mut ctx).await.expect("third issuance denied");
        assert_eq!(err.status_code(), 429);
    }

    #[tokio::test]
    async fn authorized_valid_mutation_passes_all_stages() {
        let (sessions, gate) = pipeline(None);
        let token = sessions.issue();

        let body = serde_json::to_vec(&serde_json::json!([
            {"itemID": 1, "name": "Snow White", "hex": "#ffffff"}
        ]))
        .expect("serialize body");

        let mut headers = HeaderMap::new();
        headers.insert("content-type", "application/json".parse().expect("header"));
        headers.insert(
            "content-length",
            body.len().to_string().parse().expect("header"),
        );
        headers.insert(
            context::SESSION_TOKEN_HEADER,
            token.parse().expect("token header"),
        );

        let mut ctx = ctx(Method::PUT, "/api/dyes", headers, Some(Bytes::from(body)));
        assert!(gate.run(&mut ctx).await.is_none());
        assert!(ctx.validated_body.is_some());
    }

    #[tokio::test]
    async fn api_key_fallback_authorizes_mutation() {
        let (_, gate) = pipeline(Some("hunter2".to_string()));

        let body = serde_json::to_vec(&serde_json::json!([
            {"itemID": 1, "name": "Snow White", "hex": "#ffffff"}
        ]))
        .expect("serialize body");

        let mut headers = HeaderMap::new();
        headers.insert("content-type", "application/json".parse().expect("header"));
        headers.insert(
            "content-length",
            body.len().to_string().parse().expect("header"),
        );
        headers.insert(context::API_KEY_HEADER, "hunter2".parse().expect("header"));

        let mut ctx = ctx(Method::PUT, "/api/dyes", headers, Some(Bytes::from(body)));
        assert!(gate.run(&mut ctx).await.is_none());
    }

    #[tokio::test]
    async fn schema_failure_short_circuits_with_details() {
        let (sessions, gate) = pipeline(None);
        let token = sessions.issue();

        let body = serde_json::to_vec(&serde_json::json!([{"itemID": "not-a-number"}]))
            .expect("serialize body");

        let mut headers = HeaderMap::new();
        headers.insert("content-type", "application/json".parse().expect("header"));
        headers.insert(
            "content-length",
            body.len().to_string().parse().expect("header"),
        );
        headers.insert(
            context::SESSION_TOKEN_HEADER,
            token.parse().expect("token header"),
        );

        let mut ctx = ctx(Method::PUT, "/api/dyes", headers, Some(Bytes::from(body)));
        let err = gate.run(&mut ctx).await.expect("schema must deny");
        assert_eq!(err.status_code(), 400);

        let rendered = serde_json::to_string(&err.to_json()).expect("render envelope");
        assert!(!rendered.contains("not-a-number"));
    }
}
