use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Footprint, Scopes};

/// One in-flight scope-consent step.
///
/// `missing_scopes` is always a subset of `requested_scopes`;
/// `granted_scopes` stays `None` until the consent provider reports the
/// user's decision through `ConsentService.GrantConsent`. The `used` flag
/// is recorded for audit shape even though consumption deletes the row
/// immediately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsentChallenge {
    pub id: String,
    pub verifier: String,
    pub client_id: String,
    pub subject_id: String,
    pub requested_scopes: Scopes,
    pub missing_scopes: Scopes,
    pub granted_scopes: Option<Scopes>,
    pub footprint: Footprint,
    pub used: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConsentChallenge {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: String,
        verifier: String,
        client_id: String,
        subject_id: String,
        requested_scopes: Scopes,
        missing_scopes: Scopes,
        footprint: Footprint,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            verifier,
            client_id,
            subject_id,
            requested_scopes,
            missing_scopes,
            granted_scopes: None,
            footprint,
            used: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record the user's decision, clamped to the requested set so a
    /// malicious provider response cannot widen the grant.
    pub fn grant(&mut self, scopes: &Scopes) {
        self.granted_scopes = Some(scopes.intersect(&self.requested_scopes));
        self.updated_at = Utc::now();
    }
}
