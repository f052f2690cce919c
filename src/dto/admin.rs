//! Wire types for the admin RPC surface.
//!
//! Requests and responses carry only JSON-safe primitive fields. Every
//! response has an `error` field that is non-empty exactly when the call
//! failed; the HTTP status stays 200 for service-level failures so the
//! provider UIs switch on the body, not the status line.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// POST /api/IdentityService.Verify
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyRequest {
    #[serde(rename = "challengeID")]
    pub challenge_id: String,
    #[serde(rename = "subjectID")]
    pub subject_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyResponse {
    #[serde(rename = "redirectURL")]
    pub redirect_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VerifyResponse {
    pub fn redirect(redirect_url: String) -> Self {
        Self {
            redirect_url,
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            redirect_url: String::new(),
            error: Some(message),
        }
    }
}

/// POST /api/ConsentService.ShowConsentChallenge
#[derive(Debug, Clone, Deserialize)]
pub struct ShowConsentChallengeRequest {
    #[serde(rename = "consentChallenge")]
    pub consent_challenge: String,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct ShowConsentChallengeResponse {
    #[serde(rename = "clientID")]
    pub client_id: String,
    #[serde(rename = "subjectID")]
    pub subject_id: String,
    #[serde(rename = "requestedScopes")]
    pub requested_scopes: Vec<String>,
    #[serde(rename = "missingScopes")]
    pub missing_scopes: Vec<String>,
    #[serde(rename = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "updatedAt")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ShowConsentChallengeResponse {
    pub fn error(message: String) -> Self {
        Self {
            error: Some(message),
            ..Self::default()
        }
    }
}

/// POST /api/ConsentService.GrantConsent
#[derive(Debug, Clone, Deserialize)]
pub struct GrantConsentRequest {
    #[serde(rename = "challengeID")]
    pub challenge_id: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GrantConsentResponse {
    #[serde(rename = "redirectURL")]
    pub redirect_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GrantConsentResponse {
    pub fn redirect(redirect_url: String) -> Self {
        Self {
            redirect_url,
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            redirect_url: String::new(),
            error: Some(message),
        }
    }
}
