//! GET /authorize - the OAuth 2.0 authorization endpoint.
//!
//! The handler delegates the who-is-authorized decision to the broker.
//! A redirect outcome is written as-is; a subject outcome is handed to
//! the token pipeline, which issues the authorization code and builds
//! the redirect back to the client.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};

use crate::config::AppState;
use crate::error::{AuthorizeError, OAuthErrorBody, TokenError};
use crate::models::RequestScope;
use crate::services::Authorization;

pub async fn authorize_handler(
    axum::extract::State(state): axum::extract::State<AppState>,
    Extension(scope): Extension<RequestScope>,
) -> Response {
    let outcome = match state.broker.authorize(&scope).await {
        Ok(outcome) => outcome,
        Err(err) => {
            if let AuthorizeError::ServerError(source) = &err {
                tracing::error!(
                    request_id = %scope.request_id,
                    error = %source,
                    "authorization failed"
                );
            }
            return error_redirect(&scope, err.oauth_code(), &err.to_string());
        }
    };

    match outcome {
        Authorization::Redirect(location) => found(&location),
        Authorization::Subject(subject_id) => {
            match state.tokens.finalize_authorization(&scope, &subject_id).await {
                Ok(location) => found(&location),
                Err(err) => {
                    if let TokenError::ServerError(source) = &err {
                        tracing::error!(
                            request_id = %scope.request_id,
                            error = %source,
                            "authorization code issuance failed"
                        );
                    }
                    error_redirect(&scope, err.code(), &err.to_string())
                }
            }
        }
    }
}

/// 302 Found; the redirect protocol relies on this exact status.
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// Send the OAuth error back to the client's redirect URI, or answer
/// with a plain error body when there is nowhere to redirect to.
fn error_redirect(scope: &RequestScope, error: &str, description: &str) -> Response {
    let redirect_uri = scope.query_value("redirect_uri");
    if redirect_uri.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(OAuthErrorBody {
                error: error.to_string(),
                error_description: description.to_string(),
            }),
        )
            .into_response();
    }

    let mut location = redirect_uri;
    location.push_str(if location.contains('?') { "&" } else { "?" });
    location.push_str(&format!(
        "error={}&error_description={}",
        urlencoding::encode(error),
        urlencoding::encode(description)
    ));
    if let Some(state) = scope.query_param("state") {
        location.push_str(&format!("&state={}", urlencoding::encode(&state)));
    }

    found(&location)
}
