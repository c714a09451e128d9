use std::net::SocketAddr;

use anyhow::Context;
use axum::{routing::get, Router};
use serde_json::{json, Value};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

mod auth;
mod config;
mod error;
mod gate;
mod handlers;
mod ratelimit;
mod response;
mod session;
mod state;
mod storage;
mod validation;

use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DYE_ADMIN_DATA_DIR etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    let config = config::config();

    // Startup check: an unreachable data root is fatal
    let root = match storage::validate_root(&config.data.root) {
        Ok(root) => root,
        Err(e) => {
            tracing::error!(error = %e, "data root validation failed, refusing to serve");
            std::process::exit(1);
        }
    };
    tracing::info!(data_root = %root.display(), "data root validated");

    let state = AppState::new(config, root);
    let app = app(state);

    // Loopback only: single trusted local operator
    let bind_addr = format!("{}:{}", config.server.bind_host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    println!("dye-admin API listening on http://{}", bind_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("server error")?;

    Ok(())
}

fn app(state: AppState) -> Router {
    Router::new()
        // Public info
        .route("/", get(root))
        .route("/health", get(health))
        // Data and session routes, all behind the gate
        .merge(session_routes())
        .merge(data_routes())
        .fallback(not_found)
        // Innermost: convert handler panics into a 500 envelope
        .layer(CatchPanicLayer::custom(handle_panic))
        // The gate pipeline: correlation, rate tiers, content-type, auth, schema
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            gate::enforce,
        ))
        // Outermost: per-request deadline
        .layer(axum::middleware::from_fn(gate::timeout::guard))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn session_routes() -> Router<AppState> {
    use axum::routing::post;
    use handlers::session;

    Router::new().route(
        "/api/auth/session",
        post(session::session_create).delete(session::session_reset),
    )
}

fn data_routes() -> Router<AppState> {
    use handlers::{dyes, locales};

    Router::new()
        .route("/api/dyes", get(dyes::dyes_get).put(dyes::dyes_put))
        .route(
            "/api/locales/:code",
            get(locales::locale_get).put(locales::locale_put),
        )
}

async fn root() -> axum::response::Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    axum::response::Json(json!({
        "success": true,
        "data": {
            "name": "Dye Admin API",
            "version": version,
            "description": "Loopback admin API for editing dye catalog and locale files",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "session": "POST /api/auth/session (issue token), DELETE /api/auth/session (reset)",
                "dyes": "GET|PUT /api/dyes",
                "locales": "GET|PUT /api/locales/:code",
            }
        }
    }))
}

async fn health(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> impl axum::response::IntoResponse {
    let now = chrono::Utc::now();

    match state.data.read_dyes().await {
        Ok(_) => (
            axum::http::StatusCode::OK,
            axum::response::Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "data_root": "ok"
                }
            })),
        ),
        Err(e) => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            axum::response::Json(json!({
                "success": false,
                "error": "data root unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "data_root_error": e.to_string()
                }
            })),
        ),
    }
}

async fn not_found() -> error::ApiError {
    error::ApiError::not_found("Route not found")
}

/// Catch-all: even an unanticipated panic becomes a structured 500, with
/// the detail logged server-side only.
fn handle_panic(err: Box<dyn std::any::Any + Send + 'static>) -> axum::response::Response {
    use axum::response::IntoResponse;

    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic payload"
    };
    tracing::error!(panic = %detail, "handler panicked");

    error::ApiError::internal_server_error("Internal server error").into_response()
}
