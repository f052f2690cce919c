//! Admin RPC handlers called server-to-server by the provider UIs.
//!
//! Service-level failures are reported inside the body (`error` field,
//! HTTP 200); only body-decode failures surface as 4xx through the
//! `Json` extractor. These handlers never translate between OAuth error
//! codes and RPC errors.

use axum::{extract::State, Json};

use crate::config::AppState;
use crate::dto::{
    GrantConsentRequest, GrantConsentResponse, ShowConsentChallengeRequest,
    ShowConsentChallengeResponse, VerifyRequest, VerifyResponse,
};
use crate::error::AdminError;

/// POST /api/IdentityService.Verify
pub async fn verify_handler(
    State(state): State<AppState>,
    Json(request): Json<VerifyRequest>,
) -> Json<VerifyResponse> {
    match state
        .identity
        .verify(&request.challenge_id, &request.subject_id)
        .await
    {
        Ok(redirect_url) => Json(VerifyResponse::redirect(redirect_url)),
        Err(err) => {
            log_storage_failure("IdentityService.Verify", &err);
            Json(VerifyResponse::error(err.to_string()))
        }
    }
}

/// POST /api/ConsentService.ShowConsentChallenge
pub async fn show_consent_challenge_handler(
    State(state): State<AppState>,
    Json(request): Json<ShowConsentChallengeRequest>,
) -> Json<ShowConsentChallengeResponse> {
    match state
        .consent
        .show_consent_challenge(&request.consent_challenge)
        .await
    {
        Ok(challenge) => Json(ShowConsentChallengeResponse {
            client_id: challenge.client_id,
            subject_id: challenge.subject_id,
            requested_scopes: challenge.requested_scopes.to_vec(),
            missing_scopes: challenge.missing_scopes.to_vec(),
            created_at: Some(challenge.created_at),
            updated_at: Some(challenge.updated_at),
            error: None,
        }),
        Err(err) => {
            log_storage_failure("ConsentService.ShowConsentChallenge", &err);
            Json(ShowConsentChallengeResponse::error(err.to_string()))
        }
    }
}

/// POST /api/ConsentService.GrantConsent
pub async fn grant_consent_handler(
    State(state): State<AppState>,
    Json(request): Json<GrantConsentRequest>,
) -> Json<GrantConsentResponse> {
    match state
        .consent
        .grant_consent(&request.challenge_id, &request.scopes)
        .await
    {
        Ok(redirect_url) => Json(GrantConsentResponse::redirect(redirect_url)),
        Err(err) => {
            log_storage_failure("ConsentService.GrantConsent", &err);
            Json(GrantConsentResponse::error(err.to_string()))
        }
    }
}

fn log_storage_failure(method: &str, err: &AdminError) {
    if let AdminError::Storage(source) = err {
        tracing::error!(method, error = %source, "admin rpc storage failure");
    }
}
