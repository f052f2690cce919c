//! Authorization broker - the state machine behind `/authorize`.
//!
//! One logical authorization request becomes a chain of browser
//! redirects: out to the identity provider, back with a login verifier,
//! optionally out to the consent provider, back with a consent verifier.
//! Each hop is glued to the next by a challenge/verifier pair persisted
//! in the repositories; the broker itself keeps no in-process state.

use std::sync::Arc;

use url::Url;

use crate::error::{AuthorizeError, IntegrityError};
use crate::models::{ConsentChallenge, Footprint, LoginChallenge, RequestScope, Scopes};
use crate::repositories::{
    ConsentChallengeRepository, ConsentRepository, LoginChallengeRepository,
};
use crate::utils::secret::generate_token;

pub const PARAM_LOGIN_VERIFIER: &str = "login_verifier";
pub const PARAM_CONSENT_VERIFIER: &str = "consent_verifier";

pub const PARAM_LOGIN_CHALLENGE: &str = "challenge";
pub const PARAM_CONSENT_CHALLENGE: &str = "consent_challenge";

/// Outcome of one pass through the authorization state machine.
///
/// This is the user-authorization contract consumed by the token
/// pipeline: either a non-empty subject id (the flow is complete) or a
/// redirect the handler must write, meaning no subject yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorization {
    Subject(String),
    Redirect(String),
}

/// Brokers end-user authentication and consent to the external provider
/// UIs.
#[derive(Clone)]
pub struct AuthorizationBroker {
    identity_provider_url: Url,
    consent_provider_url: Url,
    login_challenges: Arc<dyn LoginChallengeRepository>,
    consent_challenges: Arc<dyn ConsentChallengeRepository>,
    consents: Arc<dyn ConsentRepository>,
}

impl AuthorizationBroker {
    pub fn new(
        identity_provider_url: Url,
        consent_provider_url: Url,
        login_challenges: Arc<dyn LoginChallengeRepository>,
        consent_challenges: Arc<dyn ConsentChallengeRepository>,
        consents: Arc<dyn ConsentRepository>,
    ) -> Self {
        Self {
            identity_provider_url,
            consent_provider_url,
            login_challenges,
            consent_challenges,
            consents,
        }
    }

    /// Run one `/authorize` hit through the state machine.
    ///
    /// Three-way switch on the query string: a present `login_verifier`
    /// selects the login-return branch, a present `consent_verifier` the
    /// consent-return branch, neither the initial branch. The login
    /// branch wins when both are present.
    pub async fn authorize(&self, scope: &RequestScope) -> Result<Authorization, AuthorizeError> {
        if let Some(verifier) = scope.query_param(PARAM_LOGIN_VERIFIER) {
            if verifier.is_empty() {
                return Err(AuthorizeError::InvalidRequest);
            }
            return self.resume_from_login(scope, &verifier).await;
        }

        if let Some(verifier) = scope.query_param(PARAM_CONSENT_VERIFIER) {
            if verifier.is_empty() {
                return Err(AuthorizeError::InvalidRequest);
            }
            return self.resume_from_consent(scope, &verifier).await;
        }

        self.begin(scope).await
    }

    /// Initial branch: park the request behind a login challenge and send
    /// the browser to the identity provider.
    async fn begin(&self, scope: &RequestScope) -> Result<Authorization, AuthorizeError> {
        let challenge_id = generate_token();

        let mut provider_url = self.identity_provider_url.clone();
        provider_url
            .query_pairs_mut()
            .append_pair(PARAM_LOGIN_CHALLENGE, &challenge_id);

        let challenge = LoginChallenge::new(
            challenge_id,
            scope.query_value("client_id"),
            generate_token(),
            Footprint::capture(scope, &provider_url),
        );

        self.login_challenges.store(&challenge).await?;

        tracing::debug!(
            request_id = %scope.request_id,
            challenge_id = %challenge.id,
            client_id = %challenge.client_id,
            "created login challenge"
        );

        Ok(Authorization::Redirect(provider_url.to_string()))
    }

    /// Login-return branch: the browser came back from the identity
    /// provider carrying a login verifier.
    async fn resume_from_login(
        &self,
        scope: &RequestScope,
        verifier: &str,
    ) -> Result<Authorization, AuthorizeError> {
        let challenge = self
            .login_challenges
            .find_by_verifier(verifier)
            .await?
            .ok_or(AuthorizeError::AccessDenied)?;

        check_footprint(&challenge.footprint, scope)?;

        // A verifier is only usable once Verify bound an identity.
        let identity = challenge
            .identity
            .clone()
            .ok_or(AuthorizeError::AccessDenied)?;

        let requested = Scopes::from_space_delimited(&scope.query_value("scope"));

        let consent = self
            .consents
            .find_by_client_and_subject(&challenge.client_id, &identity.subject_id)
            .await?;

        if let Some(consent) = &consent {
            if consent.scopes.has_all(&requested) {
                self.login_challenges.delete(&challenge).await?;

                tracing::debug!(
                    request_id = %scope.request_id,
                    challenge_id = %challenge.id,
                    subject_id = %identity.subject_id,
                    "authorization finalized with prior consent"
                );

                return Ok(Authorization::Subject(identity.subject_id));
            }
        }

        let granted = consent.map(|consent| consent.scopes).unwrap_or_default();
        let missing = requested.diff(&granted);

        let challenge_id = generate_token();
        let mut provider_url = self.consent_provider_url.clone();
        provider_url
            .query_pairs_mut()
            .append_pair(PARAM_CONSENT_CHALLENGE, &challenge_id);

        // The consent footprint carries the original authorize URL forward
        // so the consent verifier lands on a clean query, while the chain
        // anchor moves to the request id minted for this hop.
        let footprint = Footprint {
            request_id: scope.request_id.clone(),
            redirect_url: provider_url.to_string(),
            request_url: challenge.footprint.request_url.clone(),
        };

        let consent_challenge = ConsentChallenge::new(
            challenge_id,
            generate_token(),
            challenge.client_id.clone(),
            identity.subject_id,
            requested,
            missing,
            footprint,
        );

        self.consent_challenges.store(&consent_challenge).await?;
        self.login_challenges.delete(&challenge).await?;

        tracing::debug!(
            request_id = %scope.request_id,
            challenge_id = %consent_challenge.id,
            missing_scopes = %consent_challenge.missing_scopes.to_space_delimited(),
            "consent required, created consent challenge"
        );

        Ok(Authorization::Redirect(provider_url.to_string()))
    }

    /// Consent-return branch: the browser came back from the consent
    /// provider carrying a consent verifier.
    async fn resume_from_consent(
        &self,
        scope: &RequestScope,
        verifier: &str,
    ) -> Result<Authorization, AuthorizeError> {
        let mut challenge = self
            .consent_challenges
            .find_by_verifier(verifier)
            .await?
            .ok_or(AuthorizeError::AccessDenied)?;

        if challenge.granted_scopes.is_none() || challenge.used {
            return Err(AuthorizeError::AccessDenied);
        }

        check_footprint(&challenge.footprint, scope)?;

        challenge.used = true;
        self.consent_challenges.delete(&challenge).await?;

        tracing::debug!(
            request_id = %scope.request_id,
            challenge_id = %challenge.id,
            subject_id = %challenge.subject_id,
            "authorization finalized after consent"
        );

        Ok(Authorization::Subject(challenge.subject_id))
    }
}

fn check_footprint(footprint: &Footprint, scope: &RequestScope) -> Result<(), AuthorizeError> {
    match footprint.validate(scope) {
        Ok(()) => Ok(()),
        Err(IntegrityError::Violation(violation)) => {
            tracing::debug!(
                request_id = %scope.request_id,
                %violation,
                "footprint validation rejected the request"
            );
            Err(AuthorizeError::AccessDenied)
        }
        Err(err) => Err(AuthorizeError::ServerError(err.into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    use crate::models::Consent;
    use crate::repositories::Repositories;
    use crate::utils::url::append_query_param;

    const AUTHORIZE_URL: &str = "http://broker.local/authorize?client_id=test&response_type=code&redirect_uri=https%3A%2F%2Fclient.example%2Fcallback&scope=read+write&state=xyz";

    fn broker(repositories: &Repositories) -> AuthorizationBroker {
        AuthorizationBroker::new(
            Url::parse("http://localhost:8888/auth").unwrap(),
            Url::parse("http://localhost:8888/consent").unwrap(),
            repositories.login_challenges.clone(),
            repositories.consent_challenges.clone(),
            repositories.consents.clone(),
        )
    }

    fn scope(url: &str, request_id: &str, previous: &str, referer: &str) -> RequestScope {
        RequestScope {
            request_id: request_id.to_string(),
            previous_request_id: previous.to_string(),
            referer: referer.to_string(),
            request_url: Url::parse(url).unwrap(),
        }
    }

    fn initial_scope() -> RequestScope {
        scope(AUTHORIZE_URL, "req-1", "", "")
    }

    /// Drive the initial branch and return the stored challenge.
    async fn begin(repositories: &Repositories) -> LoginChallenge {
        let outcome = broker(repositories)
            .authorize(&initial_scope())
            .await
            .unwrap();
        let Authorization::Redirect(location) = outcome else {
            panic!("expected redirect, got {outcome:?}");
        };
        let url = Url::parse(&location).unwrap();
        let id = url
            .query_pairs()
            .find(|(k, _)| k == PARAM_LOGIN_CHALLENGE)
            .map(|(_, v)| v.into_owned())
            .unwrap();
        repositories
            .login_challenges
            .find_by_id(&id)
            .await
            .unwrap()
            .unwrap()
    }

    /// Bind a subject the way Verify would, and build the return request.
    async fn bind_and_return(
        repositories: &Repositories,
        subject: &str,
    ) -> (LoginChallenge, RequestScope) {
        let mut challenge = begin(repositories).await;
        challenge.bind(subject.to_string());
        repositories
            .login_challenges
            .update_with_authorization(&challenge)
            .await
            .unwrap();

        let return_url = append_query_param(
            &challenge.footprint.request_url,
            PARAM_LOGIN_VERIFIER,
            &challenge.verifier,
        )
        .unwrap();
        let scope = scope(&return_url, "req-2", "req-1", "http://localhost:8888/auth");
        (challenge, scope)
    }

    async fn seed_consent(repositories: &Repositories, subject: &str, scopes: &str) {
        repositories
            .consents
            .store(&Consent::new(
                "consent-1".to_string(),
                "test".to_string(),
                subject.to_string(),
                Scopes::from_space_delimited(scopes),
            ))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn initial_branch_persists_a_challenge_and_redirects() {
        let repositories = Repositories::in_memory();
        let challenge = begin(&repositories).await;

        assert_eq!(challenge.client_id, "test");
        assert!(challenge.identity.is_none());
        assert!(!challenge.verifier.is_empty());
        assert_eq!(challenge.footprint.request_id, "req-1");
        assert!(challenge
            .footprint
            .redirect_url
            .starts_with("http://localhost:8888/auth?challenge="));
    }

    #[tokio::test]
    async fn unknown_login_verifier_is_denied() {
        let repositories = Repositories::in_memory();
        let url = append_query_param(AUTHORIZE_URL, PARAM_LOGIN_VERIFIER, "nope").unwrap();
        let scope = scope(&url, "req-2", "req-1", "http://localhost:8888/auth");

        let result = broker(&repositories).authorize(&scope).await;
        assert!(matches!(result, Err(AuthorizeError::AccessDenied)));
    }

    #[tokio::test]
    async fn empty_login_verifier_is_an_invalid_request() {
        let repositories = Repositories::in_memory();
        let url = format!("{AUTHORIZE_URL}&login_verifier=");
        let scope = scope(&url, "req-2", "req-1", "http://localhost:8888/auth");

        let result = broker(&repositories).authorize(&scope).await;
        assert!(matches!(result, Err(AuthorizeError::InvalidRequest)));
    }

    #[tokio::test]
    async fn unbound_challenge_verifier_is_denied() {
        let repositories = Repositories::in_memory();
        let challenge = begin(&repositories).await;

        let url = append_query_param(
            &challenge.footprint.request_url,
            PARAM_LOGIN_VERIFIER,
            &challenge.verifier,
        )
        .unwrap();
        let scope = scope(&url, "req-2", "req-1", "http://localhost:8888/auth");

        let result = broker(&repositories).authorize(&scope).await;
        assert!(matches!(result, Err(AuthorizeError::AccessDenied)));
    }

    #[tokio::test]
    async fn login_return_with_covering_consent_finalizes() {
        let repositories = Repositories::in_memory();
        seed_consent(&repositories, "alice", "read write").await;
        let (challenge, scope) = bind_and_return(&repositories, "alice").await;

        let outcome = broker(&repositories).authorize(&scope).await.unwrap();
        assert_eq!(outcome, Authorization::Subject("alice".to_string()));

        // consumed challenge row must be gone
        let stored = repositories
            .login_challenges
            .find_by_id(&challenge.id)
            .await
            .unwrap();
        assert!(stored.is_none());
    }

    #[tokio::test]
    async fn login_return_without_consent_creates_a_consent_challenge() {
        let repositories = Repositories::in_memory();
        let (login_challenge, scope) = bind_and_return(&repositories, "alice").await;

        let outcome = broker(&repositories).authorize(&scope).await.unwrap();
        let Authorization::Redirect(location) = outcome else {
            panic!("expected redirect, got {outcome:?}");
        };
        assert!(location.starts_with("http://localhost:8888/consent?consent_challenge="));

        let id = Url::parse(&location)
            .unwrap()
            .query_pairs()
            .find(|(k, _)| k == PARAM_CONSENT_CHALLENGE)
            .map(|(_, v)| v.into_owned())
            .unwrap();
        let consent_challenge = repositories
            .consent_challenges
            .find_by_id(&id)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(consent_challenge.client_id, "test");
        assert_eq!(consent_challenge.subject_id, "alice");
        assert_eq!(
            consent_challenge.missing_scopes,
            Scopes::from_space_delimited("read write")
        );
        assert!(consent_challenge.granted_scopes.is_none());
        // chain anchor moved to this hop, origin URL carried forward
        assert_eq!(consent_challenge.footprint.request_id, "req-2");
        assert_eq!(
            consent_challenge.footprint.request_url,
            login_challenge.footprint.request_url
        );

        // the login challenge was consumed by the hand-off
        let stored = repositories
            .login_challenges
            .find_by_id(&login_challenge.id)
            .await
            .unwrap();
        assert!(stored.is_none());
    }

    #[tokio::test]
    async fn login_return_with_partial_consent_reports_the_difference() {
        let repositories = Repositories::in_memory();
        seed_consent(&repositories, "alice", "read").await;
        let (_, scope) = bind_and_return(&repositories, "alice").await;

        let outcome = broker(&repositories).authorize(&scope).await.unwrap();
        let Authorization::Redirect(location) = outcome else {
            panic!("expected redirect, got {outcome:?}");
        };
        let id = Url::parse(&location)
            .unwrap()
            .query_pairs()
            .find(|(k, _)| k == PARAM_CONSENT_CHALLENGE)
            .map(|(_, v)| v.into_owned())
            .unwrap();
        let consent_challenge = repositories
            .consent_challenges
            .find_by_id(&id)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(
            consent_challenge.missing_scopes,
            Scopes::from_space_delimited("write")
        );
        assert_eq!(
            consent_challenge.requested_scopes,
            Scopes::from_space_delimited("read write")
        );
    }

    #[tokio::test]
    async fn stale_request_chain_is_denied() {
        let repositories = Repositories::in_memory();
        seed_consent(&repositories, "alice", "read write").await;
        let (_, mut scope) = bind_and_return(&repositories, "alice").await;
        scope.previous_request_id = "stolen".to_string();

        let result = broker(&repositories).authorize(&scope).await;
        assert!(matches!(result, Err(AuthorizeError::AccessDenied)));
    }

    #[tokio::test]
    async fn tampered_referer_is_denied_without_row_mutation() {
        let repositories = Repositories::in_memory();
        seed_consent(&repositories, "alice", "read write").await;
        let (challenge, mut scope) = bind_and_return(&repositories, "alice").await;
        scope.referer = "https://evil.example/".to_string();

        let result = broker(&repositories).authorize(&scope).await;
        assert!(matches!(result, Err(AuthorizeError::AccessDenied)));

        let stored = repositories
            .login_challenges
            .find_by_id(&challenge.id)
            .await
            .unwrap();
        assert!(stored.is_some());
    }

    #[tokio::test]
    async fn replayed_login_verifier_is_denied() {
        let repositories = Repositories::in_memory();
        seed_consent(&repositories, "alice", "read write").await;
        let (_, scope) = bind_and_return(&repositories, "alice").await;

        let first = broker(&repositories).authorize(&scope).await.unwrap();
        assert_eq!(first, Authorization::Subject("alice".to_string()));

        let replay = broker(&repositories).authorize(&scope).await;
        assert!(matches!(replay, Err(AuthorizeError::AccessDenied)));
    }

    #[tokio::test]
    async fn consent_return_finalizes_and_consumes_the_challenge() {
        let repositories = Repositories::in_memory();
        let (_, login_scope) = bind_and_return(&repositories, "alice").await;

        let outcome = broker(&repositories).authorize(&login_scope).await.unwrap();
        let Authorization::Redirect(location) = outcome else {
            panic!("expected redirect");
        };
        let id = Url::parse(&location)
            .unwrap()
            .query_pairs()
            .find(|(k, _)| k == PARAM_CONSENT_CHALLENGE)
            .map(|(_, v)| v.into_owned())
            .unwrap();

        // the consent provider records a grant
        let mut challenge = repositories
            .consent_challenges
            .find_by_id(&id)
            .await
            .unwrap()
            .unwrap();
        challenge.grant(&Scopes::from_space_delimited("read write"));
        repositories
            .consent_challenges
            .update_with_granted_scopes(&challenge)
            .await
            .unwrap();

        let return_url = append_query_param(
            &challenge.footprint.request_url,
            PARAM_CONSENT_VERIFIER,
            &challenge.verifier,
        )
        .unwrap();
        let scope = scope(
            &return_url,
            "req-3",
            "req-2",
            "http://localhost:8888/consent",
        );

        let outcome = broker(&repositories).authorize(&scope).await.unwrap();
        assert_eq!(outcome, Authorization::Subject("alice".to_string()));

        let stored = repositories
            .consent_challenges
            .find_by_id(&challenge.id)
            .await
            .unwrap();
        assert!(stored.is_none());
    }

    #[tokio::test]
    async fn undecided_consent_verifier_is_denied() {
        let repositories = Repositories::in_memory();
        let (_, login_scope) = bind_and_return(&repositories, "alice").await;

        let outcome = broker(&repositories).authorize(&login_scope).await.unwrap();
        let Authorization::Redirect(location) = outcome else {
            panic!("expected redirect");
        };
        let id = Url::parse(&location)
            .unwrap()
            .query_pairs()
            .find(|(k, _)| k == PARAM_CONSENT_CHALLENGE)
            .map(|(_, v)| v.into_owned())
            .unwrap();
        let challenge = repositories
            .consent_challenges
            .find_by_id(&id)
            .await
            .unwrap()
            .unwrap();

        // no GrantConsent happened; presenting the verifier must fail
        let return_url = append_query_param(
            &challenge.footprint.request_url,
            PARAM_CONSENT_VERIFIER,
            &challenge.verifier,
        )
        .unwrap();
        let scope = scope(
            &return_url,
            "req-3",
            "req-2",
            "http://localhost:8888/consent",
        );

        let result = broker(&repositories).authorize(&scope).await;
        assert!(matches!(result, Err(AuthorizeError::AccessDenied)));
    }

    #[tokio::test]
    async fn login_branch_wins_when_both_verifiers_are_present() {
        let repositories = Repositories::in_memory();
        let url = format!("{AUTHORIZE_URL}&login_verifier=lv&consent_verifier=cv");
        let scope = scope(&url, "req-2", "req-1", "http://localhost:8888/auth");

        // both verifiers unknown; the login branch answers, so the error
        // comes from the login lookup rather than the consent one
        let result = broker(&repositories).authorize(&scope).await;
        assert!(matches!(result, Err(AuthorizeError::AccessDenied)));
    }
}
