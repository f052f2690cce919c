//! Token pipeline: authorization-code issuance and the `/token` grants.
//!
//! The broker decides *who* is authorized; this service turns that
//! decision into an authorization code and later into opaque access and
//! refresh tokens. All token material is stored hashed.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{RepositoryError, TokenError};
use crate::models::{AuthorizationCode, RequestScope, Token};
use crate::repositories::{AuthorizationCodeRepository, ClientRepository, TokenRepository};
use crate::utils::pkce::{validate_code_verifier, verify_pkce, PKCE_METHOD_S256};
use crate::utils::secret::{generate_token, hash_token, verify_secret};

/// Token endpoint success response, per RFC 6749 §5.1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub token_type: String,
    pub expires_in: i64,
    pub scope: String,
}

impl TokenResponse {
    fn new(access_token: String, refresh_token: Option<String>, expires_in: i64, scope: &str) -> Self {
        Self {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in,
            scope: scope.to_string(),
        }
    }
}

/// Issues authorization codes and access/refresh tokens.
#[derive(Clone)]
pub struct TokenService {
    clients: Arc<dyn ClientRepository>,
    authorization_codes: Arc<dyn AuthorizationCodeRepository>,
    tokens: Arc<dyn TokenRepository>,
    access_token_ttl_secs: i64,
    authorization_code_ttl_secs: i64,
}

impl TokenService {
    pub fn new(
        clients: Arc<dyn ClientRepository>,
        authorization_codes: Arc<dyn AuthorizationCodeRepository>,
        tokens: Arc<dyn TokenRepository>,
        access_token_ttl_secs: i64,
        authorization_code_ttl_secs: i64,
    ) -> Self {
        Self {
            clients,
            authorization_codes,
            tokens,
            access_token_ttl_secs,
            authorization_code_ttl_secs,
        }
    }

    /// Turn a finalized broker decision into an authorization code and
    /// build the redirect back to the client.
    pub async fn finalize_authorization(
        &self,
        scope: &RequestScope,
        subject_id: &str,
    ) -> Result<String, TokenError> {
        let client_id = scope.query_value("client_id");
        let redirect_uri = scope.query_value("redirect_uri");
        if client_id.is_empty() {
            return Err(TokenError::InvalidRequest("client_id is required".to_string()));
        }
        if redirect_uri.is_empty() {
            return Err(TokenError::InvalidRequest(
                "redirect_uri is required".to_string(),
            ));
        }

        let client = self
            .clients
            .find_by_id(&client_id)
            .await?
            .ok_or(TokenError::InvalidClient)?;

        if !client.owns_redirect_uri(&redirect_uri) {
            return Err(TokenError::InvalidRequest(
                "redirect_uri does not match the registered URI".to_string(),
            ));
        }

        let code_challenge = scope.query_value("code_challenge");
        let code_challenge_method = if code_challenge.is_empty() {
            String::new()
        } else {
            let method = scope.query_value("code_challenge_method");
            if method.is_empty() {
                PKCE_METHOD_S256.to_string()
            } else {
                method
            }
        };

        let code = generate_token();
        let record = AuthorizationCode::new(
            hash_token(&code),
            client.id.clone(),
            subject_id.to_string(),
            redirect_uri.clone(),
            scope.query_value("scope"),
            code_challenge,
            code_challenge_method,
            self.authorization_code_ttl_secs,
        );
        self.authorization_codes.store(&record).await?;

        tracing::debug!(
            request_id = %scope.request_id,
            client_id = %client.id,
            subject_id = %subject_id,
            "issued authorization code"
        );

        let mut location = redirect_uri;
        location.push_str(if location.contains('?') { "&" } else { "?" });
        location.push_str(&format!("code={}", urlencoding::encode(&code)));
        if let Some(state) = scope.query_param("state") {
            location.push_str(&format!("&state={}", urlencoding::encode(&state)));
        }

        Ok(location)
    }

    /// `authorization_code` grant: redeem a code for tokens.
    pub async fn exchange_code(
        &self,
        code: &str,
        client_id: &str,
        client_secret: &str,
        redirect_uri: &str,
        code_verifier: Option<&str>,
    ) -> Result<TokenResponse, TokenError> {
        let client = self.authenticate_client(client_id, client_secret).await?;

        let record = self
            .authorization_codes
            .find_valid_by_hash(&hash_token(code))
            .await?
            .ok_or_else(|| {
                TokenError::InvalidGrant("invalid or expired authorization code".to_string())
            })?;

        if record.client_id != client.id {
            return Err(TokenError::InvalidGrant(
                "authorization code was not issued to this client".to_string(),
            ));
        }

        if record.redirect_uri != redirect_uri {
            return Err(TokenError::InvalidGrant(
                "redirect_uri does not match".to_string(),
            ));
        }

        if !record.code_challenge.is_empty() {
            let verifier = code_verifier.ok_or_else(|| {
                TokenError::InvalidRequest("code_verifier is required".to_string())
            })?;

            if !validate_code_verifier(verifier) {
                return Err(TokenError::InvalidGrant(
                    "invalid code_verifier format".to_string(),
                ));
            }

            if !verify_pkce(verifier, &record.code_challenge, &record.code_challenge_method) {
                return Err(TokenError::InvalidGrant(
                    "code_verifier does not match code_challenge".to_string(),
                ));
            }
        }

        // Single use: a concurrent redemption loses here.
        self.authorization_codes
            .mark_used(&record.code_hash)
            .await
            .map_err(|err| match err {
                RepositoryError::Conflict => {
                    TokenError::InvalidGrant("authorization code already redeemed".to_string())
                }
                err => TokenError::from(err),
            })?;

        self.issue(Some(record.subject_id), &client.id, &record.scope, true)
            .await
    }

    /// `refresh_token` grant with rotation. Reuse of a revoked refresh
    /// token revokes every live token of the (client, subject) pair.
    pub async fn refresh(
        &self,
        refresh_token: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<TokenResponse, TokenError> {
        let client = self.authenticate_client(client_id, client_secret).await?;

        let token = self
            .tokens
            .find_by_refresh_token_hash(&hash_token(refresh_token))
            .await?
            .ok_or_else(|| TokenError::InvalidGrant("invalid refresh token".to_string()))?;

        if token.client_id != client.id {
            return Err(TokenError::InvalidGrant(
                "refresh token was not issued to this client".to_string(),
            ));
        }

        if token.revoked {
            if let Some(subject_id) = &token.subject_id {
                let revoked = self
                    .tokens
                    .revoke_all_for_client_and_subject(&client.id, subject_id)
                    .await?;
                tracing::warn!(
                    client_id = %client.id,
                    subject_id = %subject_id,
                    revoked,
                    "revoked refresh token reused, revoked the whole grant"
                );
            }
            return Err(TokenError::InvalidGrant(
                "refresh token has been revoked".to_string(),
            ));
        }

        self.tokens.revoke(&token.id).await?;

        self.issue(token.subject_id, &client.id, &token.scope, true)
            .await
    }

    /// `client_credentials` grant: access token only, no refresh token.
    pub async fn client_credentials(
        &self,
        client_id: &str,
        client_secret: &str,
        scope: &str,
    ) -> Result<TokenResponse, TokenError> {
        let client = self.authenticate_client(client_id, client_secret).await?;
        self.issue(None, &client.id, scope, false).await
    }

    async fn authenticate_client(
        &self,
        client_id: &str,
        client_secret: &str,
    ) -> Result<crate::models::Client, TokenError> {
        let client = self
            .clients
            .find_by_id(client_id)
            .await?
            .ok_or(TokenError::InvalidClient)?;

        if !verify_secret(client_secret, &client.secret_hash) {
            return Err(TokenError::InvalidClient);
        }

        Ok(client)
    }

    async fn issue(
        &self,
        subject_id: Option<String>,
        client_id: &str,
        scope: &str,
        with_refresh_token: bool,
    ) -> Result<TokenResponse, TokenError> {
        let access_token = generate_token();
        let refresh_token = with_refresh_token.then(generate_token);

        let token = Token::new(
            uuid::Uuid::new_v4().to_string(),
            client_id.to_string(),
            subject_id,
            hash_token(&access_token),
            refresh_token.as_deref().map(hash_token),
            scope.to_string(),
            self.access_token_ttl_secs,
        );
        self.tokens.store(&token).await?;

        Ok(TokenResponse::new(
            access_token,
            refresh_token,
            self.access_token_ttl_secs,
            scope,
        ))
    }
}
