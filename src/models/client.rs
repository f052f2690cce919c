use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Registered OAuth 2.0 client.
///
/// The secret is stored as a bcrypt hash; the plain secret only exists in
/// the client's own configuration. `redirect_uri` is the registered
/// callback URL: a request's `redirect_uri` is accepted only when it
/// matches exactly, no partial matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: String,
    pub secret_hash: String,
    pub redirect_uri: String,
    pub created_at: DateTime<Utc>,
}

impl Client {
    pub fn new(id: String, secret_hash: String, redirect_uri: String) -> Self {
        Self {
            id,
            secret_hash,
            redirect_uri,
            created_at: Utc::now(),
        }
    }

    pub fn owns_redirect_uri(&self, redirect_uri: &str) -> bool {
        redirect_uri == self.redirect_uri
    }
}
