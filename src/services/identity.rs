use std::sync::Arc;

use crate::error::{AdminError, RepositoryError};
use crate::repositories::LoginChallengeRepository;
use crate::services::broker::PARAM_LOGIN_VERIFIER;
use crate::utils::url::append_query_param;

/// Identity-side admin RPC service.
///
/// Called server-to-server by the identity provider UI once it has
/// authenticated the end user.
#[derive(Clone)]
pub struct IdentityService {
    login_challenges: Arc<dyn LoginChallengeRepository>,
}

impl IdentityService {
    pub fn new(login_challenges: Arc<dyn LoginChallengeRepository>) -> Self {
        Self { login_challenges }
    }

    /// Bind the authenticated subject to a pending login challenge.
    ///
    /// Returns the redirect-back URL: the challenge's original request
    /// URL with `login_verifier` appended. Fails with `NotFound` for an
    /// unknown challenge and `Conflict` for one that is already bound;
    /// two concurrent calls cannot both succeed.
    pub async fn verify(
        &self,
        challenge_id: &str,
        subject_id: &str,
    ) -> Result<String, AdminError> {
        let mut challenge = self
            .login_challenges
            .find_by_id(challenge_id)
            .await?
            .ok_or(AdminError::NotFound)?;

        if challenge.is_bound() {
            return Err(AdminError::Conflict);
        }

        challenge.bind(subject_id.to_string());
        self.login_challenges
            .update_with_authorization(&challenge)
            .await?;

        tracing::debug!(
            challenge_id = %challenge.id,
            subject_id = %subject_id,
            "bound subject to login challenge"
        );

        append_query_param(
            &challenge.footprint.request_url,
            PARAM_LOGIN_VERIFIER,
            &challenge.verifier,
        )
        .map_err(|err| AdminError::from(RepositoryError::Backend(err.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::models::{Footprint, LoginChallenge};
    use crate::repositories::memory::MemoryLoginChallengeRepository;

    async fn seeded_service() -> (IdentityService, Arc<MemoryLoginChallengeRepository>) {
        let repository = Arc::new(MemoryLoginChallengeRepository::default());
        let challenge = LoginChallenge::new(
            "c1".to_string(),
            "test".to_string(),
            "v1".to_string(),
            Footprint {
                request_id: "r1".to_string(),
                redirect_url: "http://localhost:8888/auth?challenge=c1".to_string(),
                request_url: "http://broker.local/authorize?client_id=test&state=xyz".to_string(),
            },
        );
        repository.store(&challenge).await.unwrap();
        (IdentityService::new(repository.clone()), repository)
    }

    #[tokio::test]
    async fn verify_binds_and_returns_the_redirect_url() {
        let (service, repository) = seeded_service().await;

        let redirect_url = service.verify("c1", "alice").await.unwrap();
        assert_eq!(
            redirect_url,
            "http://broker.local/authorize?client_id=test&state=xyz&login_verifier=v1"
        );

        let challenge = repository.find_by_id("c1").await.unwrap().unwrap();
        assert_eq!(
            challenge.identity.map(|i| i.subject_id),
            Some("alice".to_string())
        );
    }

    #[tokio::test]
    async fn verify_unknown_challenge_is_not_found() {
        let (service, _) = seeded_service().await;
        assert!(matches!(
            service.verify("missing", "alice").await,
            Err(AdminError::NotFound)
        ));
    }

    #[tokio::test]
    async fn verify_twice_is_a_conflict() {
        let (service, _) = seeded_service().await;
        service.verify("c1", "alice").await.unwrap();
        assert!(matches!(
            service.verify("c1", "mallory").await,
            Err(AdminError::Conflict)
        ));
        // same subject again is still refused at the RPC level
        assert!(matches!(
            service.verify("c1", "alice").await,
            Err(AdminError::Conflict)
        ));
    }
}
