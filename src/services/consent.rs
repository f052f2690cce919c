use std::sync::Arc;

use crate::error::{AdminError, RepositoryError};
use crate::models::{Consent, ConsentChallenge, Scopes};
use crate::repositories::{ConsentChallengeRepository, ConsentRepository};
use crate::services::broker::PARAM_CONSENT_VERIFIER;
use crate::utils::secret::generate_token;
use crate::utils::url::append_query_param;

/// Consent-side admin RPC service.
///
/// The consent provider UI fetches the pending challenge to render the
/// scope list, then reports the user's decision.
#[derive(Clone)]
pub struct ConsentService {
    consents: Arc<dyn ConsentRepository>,
    consent_challenges: Arc<dyn ConsentChallengeRepository>,
}

impl ConsentService {
    pub fn new(
        consents: Arc<dyn ConsentRepository>,
        consent_challenges: Arc<dyn ConsentChallengeRepository>,
    ) -> Self {
        Self {
            consents,
            consent_challenges,
        }
    }

    /// Read-only lookup of a pending consent challenge.
    pub async fn show_consent_challenge(
        &self,
        challenge_id: &str,
    ) -> Result<ConsentChallenge, AdminError> {
        self.consent_challenges
            .find_by_id(challenge_id)
            .await?
            .ok_or(AdminError::NotFound)
    }

    /// Record the user's consent decision.
    ///
    /// The granted set (clamped to the requested one) is merged into the
    /// durable consent record for (client, subject), then written onto
    /// the challenge. Returns the redirect-back URL: the challenge's
    /// original request URL with `consent_verifier` appended.
    ///
    /// Not idempotent: a challenge that already carries a decision, or
    /// was already consumed, reads as `NotFound`.
    pub async fn grant_consent(
        &self,
        challenge_id: &str,
        scopes: &[String],
    ) -> Result<String, AdminError> {
        let mut challenge = self
            .consent_challenges
            .find_by_id(challenge_id)
            .await?
            .ok_or(AdminError::NotFound)?;

        if challenge.granted_scopes.is_some() || challenge.used {
            return Err(AdminError::NotFound);
        }

        challenge.grant(&Scopes::from_slice(scopes));
        let granted = challenge
            .granted_scopes
            .clone()
            .unwrap_or_default();

        match self
            .consents
            .find_by_client_and_subject(&challenge.client_id, &challenge.subject_id)
            .await?
        {
            Some(mut consent) => {
                consent.merge_scopes(&granted);
                self.consents.update_with_scopes(&consent).await?;
            }
            None => {
                let consent = Consent::new(
                    generate_token(),
                    challenge.client_id.clone(),
                    challenge.subject_id.clone(),
                    granted.clone(),
                );
                self.consents.store(&consent).await?;
            }
        }

        match self
            .consent_challenges
            .update_with_granted_scopes(&challenge)
            .await
        {
            Ok(()) => {}
            // A racing grant won between our lookup and the write; to the
            // caller that reads the same as a consumed challenge.
            Err(RepositoryError::NotFound | RepositoryError::Conflict) => {
                return Err(AdminError::NotFound)
            }
            Err(err) => return Err(err.into()),
        }

        tracing::debug!(
            challenge_id = %challenge.id,
            subject_id = %challenge.subject_id,
            granted_scopes = %granted.to_space_delimited(),
            "recorded consent decision"
        );

        append_query_param(
            &challenge.footprint.request_url,
            PARAM_CONSENT_VERIFIER,
            &challenge.verifier,
        )
        .map_err(|err| AdminError::from(RepositoryError::Backend(err.to_string())))
    }
}
