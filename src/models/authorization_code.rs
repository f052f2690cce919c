use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Authorization code handed to the client after broker finalization.
///
/// Only the SHA-256 hash of the code is stored; the plain code travels in
/// the redirect back to the client and comes back once at the token
/// endpoint. Single use, short lived.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationCode {
    pub code_hash: String,
    pub client_id: String,
    pub subject_id: String,
    pub redirect_uri: String,
    /// Space-delimited scope string as requested at `/authorize`.
    pub scope: String,
    /// Empty when the client did not send a PKCE challenge.
    pub code_challenge: String,
    pub code_challenge_method: String,
    pub used: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl AuthorizationCode {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        code_hash: String,
        client_id: String,
        subject_id: String,
        redirect_uri: String,
        scope: String,
        code_challenge: String,
        code_challenge_method: String,
        ttl_secs: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            code_hash,
            client_id,
            subject_id,
            redirect_uri,
            scope,
            code_challenge,
            code_challenge_method,
            used: false,
            expires_at: now + Duration::seconds(ttl_secs),
            created_at: now,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}
