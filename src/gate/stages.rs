use async_trait::async_trait;
use std::sync::Arc;

use crate::auth;
use crate::error::ApiError;
use crate::gate::context::{GateContext, MutationKind, RouteClass};
use crate::ratelimit::FixedWindowLimiter;
use crate::session::SessionStore;
use crate::validation;

/// Result of one stage check.
pub enum StageOutcome {
    Continue,
    Respond(ApiError),
}

/// One link in the gate chain. Stages run strictly in registration order;
/// a `Respond` outcome short-circuits the rest of the chain.
#[async_trait]
pub trait GateStage: Send + Sync {
    /// Stage name for logging and debugging
    fn name(&self) -> &'static str;

    /// Check if the stage applies to this request
    fn applies_to(&self, ctx: &GateContext) -> bool;

    async fn check(&self, ctx: &mut GateContext) -> StageOutcome;
}

/// Which requests a rate tier covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierScope {
    /// Every request.
    Global,
    /// Every mutating request, session issuance included.
    Write,
    /// Session issuance only.
    SessionCreate,
}

pub struct RateLimitStage {
    scope: TierScope,
    limiter: Arc<FixedWindowLimiter>,
}

impl RateLimitStage {
    pub fn new(scope: TierScope, limiter: Arc<FixedWindowLimiter>) -> Self {
        Self { scope, limiter }
    }
}

#[async_trait]
impl GateStage for RateLimitStage {
    fn name(&self) -> &'static str {
        match self.scope {
            TierScope::Global => "rate_limit_global",
            TierScope::Write => "rate_limit_write",
            TierScope::SessionCreate => "rate_limit_session",
        }
    }

    fn applies_to(&self, ctx: &GateContext) -> bool {
        match self.scope {
            TierScope::Global => true,
            TierScope::Write => matches!(
                ctx.route,
                RouteClass::Mutation(_) | RouteClass::SessionCreate
            ),
            TierScope::SessionCreate => ctx.route == RouteClass::SessionCreate,
        }
    }

    async fn check(&self, ctx: &mut GateContext) -> StageOutcome {
        let decision = self.limiter.check(ctx.client);

        if self.scope == TierScope::Global {
            ctx.global_rate = Some(decision);
        }

        if decision.allowed {
            StageOutcome::Continue
        } else {
            StageOutcome::Respond(ApiError::too_many_requests(decision.retry_after_secs()))
        }
    }
}

/// Bodies must declare `application/json`. Enforcement applies only when a
/// body is present, per the declared content length.
pub struct ContentTypeStage;

#[async_trait]
impl GateStage for ContentTypeStage {
    fn name(&self) -> &'static str {
        "content_type"
    }

    fn applies_to(&self, ctx: &GateContext) -> bool {
        ctx.has_body()
    }

    async fn check(&self, ctx: &mut GateContext) -> StageOutcome {
        let is_json = ctx
            .content_type
            .as_deref()
            .map(|ct| {
                ct.split(';')
                    .next()
                    .unwrap_or("")
                    .trim()
                    .eq_ignore_ascii_case("application/json")
            })
            .unwrap_or(false);

        if is_json {
            StageOutcome::Continue
        } else {
            StageOutcome::Respond(ApiError::unsupported_media_type(
                "Content-Type must be application/json",
            ))
        }
    }
}

pub struct AuthStage {
    sessions: Arc<SessionStore>,
    configured_key: Option<String>,
}

impl AuthStage {
    pub fn new(sessions: Arc<SessionStore>, configured_key: Option<String>) -> Self {
        Self {
            sessions,
            configured_key,
        }
    }
}

#[async_trait]
impl GateStage for AuthStage {
    fn name(&self) -> &'static str {
        "auth"
    }

    fn applies_to(&self, ctx: &GateContext) -> bool {
        // Session issuance is the route that hands out the credential; it is
        // covered by its own rate tier instead.
        matches!(ctx.route, RouteClass::Mutation(_))
    }

    async fn check(&self, ctx: &mut GateContext) -> StageOutcome {
        match auth::authorize(
            &ctx.method,
            ctx.session_token.as_deref(),
            ctx.api_key.as_deref(),
            &self.sessions,
            self.configured_key.as_deref(),
        ) {
            Ok(()) => StageOutcome::Continue,
            Err(err) => StageOutcome::Respond(err),
        }
    }
}

/// Parses and validates the buffered body against the route's schema,
/// stashing the accepted payload on the context for the handler.
pub struct SchemaStage;

#[async_trait]
impl GateStage for SchemaStage {
    fn name(&self) -> &'static str {
        "schema"
    }

    fn applies_to(&self, ctx: &GateContext) -> bool {
        matches!(ctx.route, RouteClass::Mutation(Some(_)))
    }

    async fn check(&self, ctx: &mut GateContext) -> StageOutcome {
        let Some(bytes) = ctx.body.as_ref().filter(|b| !b.is_empty()) else {
            return StageOutcome::Respond(ApiError::bad_request("Request body is required"));
        };

        let payload: serde_json::Value = match serde_json::from_slice(bytes) {
            Ok(v) => v,
            Err(e) => {
                // Parse detail stays server-side; it can echo request bytes
                tracing::debug!(target: "validation", error = %e, "body is not valid JSON");
                return StageOutcome::Respond(ApiError::bad_request("Invalid JSON body"));
            }
        };

        let kind = match ctx.route {
            RouteClass::Mutation(Some(kind)) => kind,
            _ => return StageOutcome::Continue,
        };

        let outcome = match kind {
            MutationKind::DyeCatalog => validation::validate_dye_catalog(&payload),
            MutationKind::LocaleFile => validation::validate_locale_map(&payload),
        };

        match outcome {
            Ok(()) => {
                ctx.validated_body = Some(payload);
                StageOutcome::Continue
            }
            Err(issues) => StageOutcome::Respond(ApiError::validation_failed(issues)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use axum::http::{HeaderMap, HeaderValue, Method};
    use std::net::IpAddr;
    use std::time::Duration;
    use uuid::Uuid;

    const CLIENT: IpAddr = IpAddr::V4(std::net::Ipv4Addr::LOCALHOST);

    fn ctx(method: Method, path: &str, headers: HeaderMap, body: Option<Bytes>) -> GateContext {
        GateContext::new(Uuid::new_v4(), method, path.to_string(), CLIENT, &headers, body)
    }

    fn json_headers(len: usize) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        headers.insert(
            "content-length",
            HeaderValue::from_str(&len.to_string()).expect("numeric header"),
        );
        headers
    }

    #[tokio::test]
    async fn content_type_stage_skips_bodyless_requests() {
        let stage = ContentTypeStage;
        let ctx = ctx(Method::POST, "/api/auth/session", HeaderMap::new(), None);
        assert!(!stage.applies_to(&ctx));
    }

    #[tokio::test]
    async fn content_type_stage_rejects_non_json_bodies() {
        let stage = ContentTypeStage;
        let mut headers = json_headers(4);
        headers.insert("content-type", HeaderValue::from_static("text/plain"));
        let mut ctx = ctx(Method::PUT, "/api/dyes", headers, Some(Bytes::from("abcd")));

        assert!(stage.applies_to(&ctx));
        match stage.check(&mut ctx).await {
            StageOutcome::Respond(err) => assert_eq!(err.status_code(), 415),
            StageOutcome::Continue => panic!("expected 415"),
        }
    }

    #[tokio::test]
    async fn content_type_stage_accepts_json_with_charset() {
        let stage = ContentTypeStage;
        let mut headers = json_headers(4);
        headers.insert(
            "content-type",
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        let mut ctx = ctx(Method::PUT, "/api/dyes", headers, Some(Bytes::from("abcd")));

        assert!(matches!(stage.check(&mut ctx).await, StageOutcome::Continue));
    }

    #[tokio::test]
    async fn schema_stage_stashes_validated_payload() {
        let stage = SchemaStage;
        let body = serde_json::to_vec(&serde_json::json!([
            {"itemID": 1, "name": "Snow White", "hex": "#ffffff"}
        ]))
        .expect("serialize body");
        let mut ctx = ctx(
            Method::PUT,
            "/api/dyes",
            json_headers(body.len()),
            Some(Bytes::from(body)),
        );

        assert!(matches!(stage.check(&mut ctx).await, StageOutcome::Continue));
        assert!(ctx.validated_body.is_some());
    }

    #[tokio::test]
    async fn schema_stage_rejects_invalid_json() {
        let stage = SchemaStage;
        let mut ctx = ctx(
            Method::PUT,
            "/api/dyes",
            json_headers(3),
            Some(Bytes::from("{{{")),
        );

        match stage.check(&mut ctx).await {
            StageOutcome::Respond(err) => assert_eq!(err.status_code(), 400),
            StageOutcome::Continue => panic!("expected 400"),
        }
        assert!(ctx.validated_body.is_none());
    }

    #[tokio::test]
    async fn auth_stage_skips_session_issuance() {
        let sessions = Arc::new(SessionStore::new(Duration::from_secs(60)));
        let stage = AuthStage::new(sessions, None);

        let issuance = ctx(Method::POST, "/api/auth/session", HeaderMap::new(), None);
        assert!(!stage.applies_to(&issuance));

        let mutation = ctx(Method::PUT, "/api/dyes", HeaderMap::new(), None);
        assert!(stage.applies_to(&mutation));
    }

    #[tokio::test]
    async fn auth_stage_accepts_session_token_header() {
        let sessions = Arc::new(SessionStore::new(Duration::from_secs(60)));
        let token = sessions.issue();
        let stage = AuthStage::new(sessions, None);

        let mut headers = HeaderMap::new();
        headers.insert(
            crate::gate::context::SESSION_TOKEN_HEADER,
            HeaderValue::from_str(&token).expect("token header"),
        );
        let mut ctx = ctx(Method::PUT, "/api/dyes", headers, None);

        assert!(matches!(stage.check(&mut ctx).await, StageOutcome::Continue));
    }

    #[tokio::test]
    async fn write_tier_covers_session_issuance() {
        use crate::ratelimit::TierPolicy;

        let limiter = Arc::new(FixedWindowLimiter::new(TierPolicy {
            name: "write",
            max_requests: 30,
            window: Duration::from_secs(60),
        }));
        let stage = RateLimitStage::new(TierScope::Write, limiter);

        let issuance = ctx(Method::POST, "/api/auth/session", HeaderMap::new(), None);
        assert!(stage.applies_to(&issuance));

        let read = ctx(Method::GET, "/api/dyes", HeaderMap::new(), None);
        assert!(!stage.applies_to(&read));
    }
}
