use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Issued access/refresh token pair, stored by hash only.
///
/// `subject_id` is `None` for tokens issued through the client
/// credentials grant; those carry no refresh token either.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub id: String,
    pub client_id: String,
    pub subject_id: Option<String>,
    pub access_token_hash: String,
    pub refresh_token_hash: Option<String>,
    pub scope: String,
    pub revoked: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Token {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: String,
        client_id: String,
        subject_id: Option<String>,
        access_token_hash: String,
        refresh_token_hash: Option<String>,
        scope: String,
        ttl_secs: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            client_id,
            subject_id,
            access_token_hash,
            refresh_token_hash,
            scope,
            revoked: false,
            expires_at: now + Duration::seconds(ttl_secs),
            created_at: now,
        }
    }
}
