//! OAuth 2.0 authorization server that never renders login or consent
//! pages itself. End-user authentication and scope consent are delegated
//! to two external provider UIs over a browser redirect protocol; the
//! providers report their results back over an admin RPC surface.
//!
//! The crate exposes two routers: the public OAuth 2.0 surface
//! (`/authorize`, `/token`) and the server-to-server admin RPC surface
//! (`/api/IdentityService.Verify`, `/api/ConsentService.*`). They are
//! bound to separate listeners in `main`.

pub mod config;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod services;
pub mod utils;

use std::time::Duration;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::AppState;
use crate::handlers::{
    authorize_handler, grant_consent_handler, show_consent_challenge_handler, token_handler,
    verify_handler,
};
use crate::middleware::request_scope_middleware;

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Health check endpoint
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Router for the public OAuth 2.0 surface.
///
/// Only `/authorize` and `/token` live here, and only these two routes run
/// the request-scope middleware: the `r` cookie is the anti-CSRF anchor of
/// the redirect protocol and must not be reset by any other endpoint.
pub fn oauth2_router(state: AppState) -> Router {
    Router::new()
        .route("/authorize", get(authorize_handler))
        .route("/token", post(token_handler))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            request_scope_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .with_state(state)
}

/// Router for the admin RPC surface called by the provider UIs.
///
/// The RPC endpoints take JSON bodies and answer `{ redirectURL, error? }`.
/// No request-scope middleware here: these calls are server-to-server and
/// must not touch the browser's request-id cookie.
pub fn admin_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/IdentityService.Verify", post(verify_handler))
        .route(
            "/api/ConsentService.ShowConsentChallenge",
            post(show_consent_challenge_handler),
        )
        .route(
            "/api/ConsentService.GrantConsent",
            post(grant_consent_handler),
        )
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .with_state(state)
}
