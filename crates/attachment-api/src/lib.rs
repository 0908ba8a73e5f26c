//! # attachment-api — Axum Service for Attachments
//!
//! Stores uploaded files in the configured storage backend, keeps their
//! metadata in Postgres (or memory), and serves content back after checking
//! it against the recorded integrity hash. Attachments owned by a peer
//! organisation are fetched from that peer over OIDC client credentials.
//!
//! ## API Surface
//!
//! | Path                          | Module                      |
//! |-------------------------------|-----------------------------|
//! | `/v1/attachment`              | [`routes::attachment`]      |
//! | `/v1/attachment/{idOrHash}`   | [`routes::attachment`]      |
//! | `/health/liveness`            | this module                 |
//! | `/health/readiness`           | this module                 |
//! | `/openapi.json`               | [`openapi`]                 |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → AuthMiddleware → Handler
//! ```

pub mod auth;
pub mod db;
pub mod error;
pub mod extractors;
pub mod openapi;
pub mod resolver;
pub mod routes;
pub mod state;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::response::IntoResponse;
use axum::{Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::auth::AuthConfig;
use crate::state::AppState;

/// Assemble the application router.
///
/// Health checks and `/openapi.json` are mounted outside the auth
/// middleware.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        token: state.config.auth_token.clone(),
    };

    let api = Router::new()
        .merge(routes::attachment::router())
        .layer(DefaultBodyLimit::max(state.config.upload_limit_bytes))
        .layer(from_fn(auth::auth_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(axum::Extension(auth_config))
        .with_state(state.clone());

    let unauthenticated = Router::new()
        .route("/health/liveness", axum::routing::get(liveness))
        .route("/health/readiness", axum::routing::get(readiness))
        .merge(openapi::router())
        .with_state(state);

    Router::new().merge(unauthenticated).merge(api)
}

/// GET /health/liveness
async fn liveness() -> &'static str {
    "ok"
}

/// GET /health/readiness. Checks every collaborator the API depends on.
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let (storage, identity, metadata) = tokio::join!(
        state.storage.status(),
        state.identity.health(),
        state.metadata.ping(),
    );

    let storage_up = storage.is_up();
    let identity_detail = match identity {
        Ok(health) if health.is_healthy() => json!({ "status": "up", "version": health.version }),
        Ok(health) => json!({ "status": "down", "reason": format!("reported {} {}", health.status, health.version) }),
        Err(e) => json!({ "status": "down", "reason": e.to_string() }),
    };
    let identity_up = identity_detail["status"] == "up";
    let metadata_detail = match metadata {
        Ok(()) => json!({ "status": "up" }),
        Err(e) => json!({ "status": "down", "reason": e.to_string() }),
    };
    let metadata_up = metadata_detail["status"] == "up";

    let ready = storage_up && identity_up && metadata_up;
    let body = json!({
        "status": if ready { "ready" } else { "unavailable" },
        "storage": { "backend": state.storage.name(), "probe": storage },
        "identity": identity_detail,
        "metadata": metadata_detail,
    });

    if ready {
        (StatusCode::OK, Json(body))
    } else {
        tracing::warn!(detail = %body, "readiness check failed");
        (StatusCode::SERVICE_UNAVAILABLE, Json(body))
    }
}
