use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Footprint;

/// One in-flight authorization attempt awaiting end-user authentication.
///
/// The verifier is minted together with the challenge but only becomes
/// usable once an identity is bound through `IdentityService.Verify`; the
/// broker rejects a presented verifier whose challenge is still unbound.
/// The row is deleted when the flow moves on (to the consent hop or to
/// finalization).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginChallenge {
    pub id: String,
    pub client_id: String,
    pub verifier: String,
    pub identity: Option<Identity>,
    pub footprint: Footprint,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The authenticated end-user, as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub subject_id: String,
}

impl LoginChallenge {
    pub fn new(id: String, client_id: String, verifier: String, footprint: Footprint) -> Self {
        let now = Utc::now();
        Self {
            id,
            client_id,
            verifier,
            identity: None,
            footprint,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_bound(&self) -> bool {
        self.identity.is_some()
    }

    /// Bind the challenge to an authenticated subject.
    pub fn bind(&mut self, subject_id: String) {
        self.identity = Some(Identity { subject_id });
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn footprint() -> Footprint {
        Footprint {
            request_id: "r1".to_string(),
            redirect_url: "http://localhost:8888/auth?challenge=c1".to_string(),
            request_url: "http://broker.local/authorize?client_id=test".to_string(),
        }
    }

    #[test]
    fn starts_unbound() {
        let challenge = LoginChallenge::new(
            "c1".to_string(),
            "test".to_string(),
            "v1".to_string(),
            footprint(),
        );
        assert!(!challenge.is_bound());
        assert_eq!(challenge.verifier, "v1");
    }

    #[test]
    fn bind_records_the_subject() {
        let mut challenge = LoginChallenge::new(
            "c1".to_string(),
            "test".to_string(),
            "v1".to_string(),
            footprint(),
        );
        challenge.bind("alice".to_string());
        assert_eq!(
            challenge.identity,
            Some(Identity {
                subject_id: "alice".to_string()
            })
        );
    }
}
