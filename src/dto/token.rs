//! Request type for the token endpoint, per RFC 6749.

use serde::Deserialize;

/// POST /token (form-encoded)
///
/// Carries the union of the fields of the supported grant types:
/// `authorization_code`, `refresh_token`, and `client_credentials`.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRequest {
    pub grant_type: String,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub code_verifier: Option<String>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
}
