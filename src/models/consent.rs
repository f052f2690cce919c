use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Scopes;

/// Durable record of the scopes a subject has granted to a client.
///
/// Unique per (client_id, subject_id). The scope set only grows: every
/// new grant is merged into the existing record, and the broker never
/// deletes consents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Consent {
    pub id: String,
    pub client_id: String,
    pub subject_id: String,
    pub scopes: Scopes,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Consent {
    pub fn new(id: String, client_id: String, subject_id: String, scopes: Scopes) -> Self {
        let now = Utc::now();
        Self {
            id,
            client_id,
            subject_id,
            scopes,
            created_at: now,
            updated_at: now,
        }
    }

    /// Widen the record with newly granted scopes.
    pub fn merge_scopes(&mut self, granted: &Scopes) {
        self.scopes = self.scopes.merge(granted);
        self.updated_at = Utc::now();
    }
}
