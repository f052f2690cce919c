//! POST /token - the OAuth 2.0 token endpoint.

use axum::{extract::State, Form, Json};

use crate::config::AppState;
use crate::dto::TokenRequest;
use crate::error::TokenError;
use crate::services::{TokenResponse, TokenService};

pub async fn token_handler(
    State(state): State<AppState>,
    Form(request): Form<TokenRequest>,
) -> Result<Json<TokenResponse>, TokenError> {
    let response = match request.grant_type.as_str() {
        "authorization_code" => handle_authorization_code_grant(&state.tokens, &request).await?,
        "refresh_token" => handle_refresh_token_grant(&state.tokens, &request).await?,
        "client_credentials" => handle_client_credentials_grant(&state.tokens, &request).await?,
        _ => return Err(TokenError::UnsupportedGrantType),
    };

    Ok(Json(response))
}

async fn handle_authorization_code_grant(
    tokens: &TokenService,
    request: &TokenRequest,
) -> Result<TokenResponse, TokenError> {
    let code = require(request.code.as_deref(), "code")?;
    let client_id = require(request.client_id.as_deref(), "client_id")?;
    let client_secret = require(request.client_secret.as_deref(), "client_secret")?;
    let redirect_uri = require(request.redirect_uri.as_deref(), "redirect_uri")?;

    tokens
        .exchange_code(
            code,
            client_id,
            client_secret,
            redirect_uri,
            request.code_verifier.as_deref(),
        )
        .await
}

async fn handle_refresh_token_grant(
    tokens: &TokenService,
    request: &TokenRequest,
) -> Result<TokenResponse, TokenError> {
    let refresh_token = require(request.refresh_token.as_deref(), "refresh_token")?;
    let client_id = require(request.client_id.as_deref(), "client_id")?;
    let client_secret = require(request.client_secret.as_deref(), "client_secret")?;

    tokens.refresh(refresh_token, client_id, client_secret).await
}

async fn handle_client_credentials_grant(
    tokens: &TokenService,
    request: &TokenRequest,
) -> Result<TokenResponse, TokenError> {
    let client_id = require(request.client_id.as_deref(), "client_id")?;
    let client_secret = require(request.client_secret.as_deref(), "client_secret")?;

    tokens
        .client_credentials(client_id, client_secret, request.scope.as_deref().unwrap_or(""))
        .await
}

fn require<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str, TokenError> {
    value.ok_or_else(|| TokenError::InvalidRequest(format!("{name} is required")))
}
