//! In-memory repository implementations.
//!
//! Used by the test suites and honoring the same contracts as the MySQL
//! implementations, including the conditional-write semantics of
//! `update_with_authorization`, `update_with_granted_scopes`, and
//! `mark_used`. Guards are never held across an await point.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;

use crate::error::RepositoryError;
use crate::models::{AuthorizationCode, Client, Consent, ConsentChallenge, LoginChallenge, Token};
use crate::repositories::{
    AuthorizationCodeRepository, ClientRepository, ConsentChallengeRepository, ConsentRepository,
    LoginChallengeRepository, TokenRepository,
};

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>, RepositoryError> {
    lock.read()
        .map_err(|_| RepositoryError::Backend("state lock poisoned".to_string()))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>, RepositoryError> {
    lock.write()
        .map_err(|_| RepositoryError::Backend("state lock poisoned".to_string()))
}

/// In-memory login-challenge repository
#[derive(Clone, Default)]
pub struct MemoryLoginChallengeRepository {
    rows: Arc<RwLock<HashMap<String, LoginChallenge>>>,
}

#[async_trait]
impl LoginChallengeRepository for MemoryLoginChallengeRepository {
    async fn store(&self, challenge: &LoginChallenge) -> Result<(), RepositoryError> {
        write(&self.rows)?.insert(challenge.id.clone(), challenge.clone());
        Ok(())
    }

    async fn update_with_authorization(
        &self,
        challenge: &LoginChallenge,
    ) -> Result<(), RepositoryError> {
        let identity = challenge.identity.clone().ok_or_else(|| {
            RepositoryError::Backend("challenge carries no identity to bind".to_string())
        })?;

        let mut rows = write(&self.rows)?;
        let row = rows
            .get_mut(&challenge.id)
            .ok_or(RepositoryError::NotFound)?;

        match &row.identity {
            None => {
                row.identity = Some(identity);
                row.updated_at = Utc::now();
                Ok(())
            }
            Some(bound) if *bound == identity => Ok(()),
            Some(_) => Err(RepositoryError::Conflict),
        }
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<LoginChallenge>, RepositoryError> {
        Ok(read(&self.rows)?.get(id).cloned())
    }

    async fn find_by_verifier(
        &self,
        verifier: &str,
    ) -> Result<Option<LoginChallenge>, RepositoryError> {
        Ok(read(&self.rows)?
            .values()
            .find(|challenge| challenge.verifier == verifier)
            .cloned())
    }

    async fn delete(&self, challenge: &LoginChallenge) -> Result<(), RepositoryError> {
        write(&self.rows)?.remove(&challenge.id);
        Ok(())
    }
}

/// In-memory consent-challenge repository
#[derive(Clone, Default)]
pub struct MemoryConsentChallengeRepository {
    rows: Arc<RwLock<HashMap<String, ConsentChallenge>>>,
}

#[async_trait]
impl ConsentChallengeRepository for MemoryConsentChallengeRepository {
    async fn store(&self, challenge: &ConsentChallenge) -> Result<(), RepositoryError> {
        write(&self.rows)?.insert(challenge.id.clone(), challenge.clone());
        Ok(())
    }

    async fn update_with_granted_scopes(
        &self,
        challenge: &ConsentChallenge,
    ) -> Result<(), RepositoryError> {
        let granted = challenge.granted_scopes.clone().ok_or_else(|| {
            RepositoryError::Backend("challenge carries no granted scopes".to_string())
        })?;

        let mut rows = write(&self.rows)?;
        let row = rows
            .get_mut(&challenge.id)
            .ok_or(RepositoryError::NotFound)?;

        if row.granted_scopes.is_some() || row.used {
            return Err(RepositoryError::Conflict);
        }

        row.granted_scopes = Some(granted);
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<ConsentChallenge>, RepositoryError> {
        Ok(read(&self.rows)?.get(id).cloned())
    }

    async fn find_by_verifier(
        &self,
        verifier: &str,
    ) -> Result<Option<ConsentChallenge>, RepositoryError> {
        Ok(read(&self.rows)?
            .values()
            .find(|challenge| challenge.verifier == verifier)
            .cloned())
    }

    async fn delete(&self, challenge: &ConsentChallenge) -> Result<(), RepositoryError> {
        write(&self.rows)?.remove(&challenge.id);
        Ok(())
    }
}

/// In-memory consent repository, keyed by (client_id, subject_id)
#[derive(Clone, Default)]
pub struct MemoryConsentRepository {
    rows: Arc<RwLock<HashMap<(String, String), Consent>>>,
}

#[async_trait]
impl ConsentRepository for MemoryConsentRepository {
    async fn store(&self, consent: &Consent) -> Result<(), RepositoryError> {
        let key = (consent.client_id.clone(), consent.subject_id.clone());
        write(&self.rows)?.insert(key, consent.clone());
        Ok(())
    }

    async fn update_with_scopes(&self, consent: &Consent) -> Result<(), RepositoryError> {
        let key = (consent.client_id.clone(), consent.subject_id.clone());
        let mut rows = write(&self.rows)?;
        let row = rows.get_mut(&key).ok_or(RepositoryError::NotFound)?;
        row.scopes = consent.scopes.clone();
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn find_by_client_and_subject(
        &self,
        client_id: &str,
        subject_id: &str,
    ) -> Result<Option<Consent>, RepositoryError> {
        let key = (client_id.to_string(), subject_id.to_string());
        Ok(read(&self.rows)?.get(&key).cloned())
    }
}

/// In-memory client repository
#[derive(Clone, Default)]
pub struct MemoryClientRepository {
    rows: Arc<RwLock<HashMap<String, Client>>>,
}

#[async_trait]
impl ClientRepository for MemoryClientRepository {
    async fn upsert(&self, client: &Client) -> Result<(), RepositoryError> {
        write(&self.rows)?.insert(client.id.clone(), client.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Client>, RepositoryError> {
        Ok(read(&self.rows)?.get(id).cloned())
    }
}

/// In-memory authorization-code repository, keyed by code hash
#[derive(Clone, Default)]
pub struct MemoryAuthorizationCodeRepository {
    rows: Arc<RwLock<HashMap<String, AuthorizationCode>>>,
}

#[async_trait]
impl AuthorizationCodeRepository for MemoryAuthorizationCodeRepository {
    async fn store(&self, code: &AuthorizationCode) -> Result<(), RepositoryError> {
        write(&self.rows)?.insert(code.code_hash.clone(), code.clone());
        Ok(())
    }

    async fn find_valid_by_hash(
        &self,
        code_hash: &str,
    ) -> Result<Option<AuthorizationCode>, RepositoryError> {
        Ok(read(&self.rows)?
            .get(code_hash)
            .filter(|code| !code.used && !code.is_expired())
            .cloned())
    }

    async fn mark_used(&self, code_hash: &str) -> Result<(), RepositoryError> {
        let mut rows = write(&self.rows)?;
        match rows.get_mut(code_hash) {
            Some(code) if !code.used => {
                code.used = true;
                Ok(())
            }
            _ => Err(RepositoryError::Conflict),
        }
    }
}

/// In-memory token repository
#[derive(Clone, Default)]
pub struct MemoryTokenRepository {
    rows: Arc<RwLock<HashMap<String, Token>>>,
}

#[async_trait]
impl TokenRepository for MemoryTokenRepository {
    async fn store(&self, token: &Token) -> Result<(), RepositoryError> {
        write(&self.rows)?.insert(token.id.clone(), token.clone());
        Ok(())
    }

    async fn find_by_access_token_hash(
        &self,
        hash: &str,
    ) -> Result<Option<Token>, RepositoryError> {
        Ok(read(&self.rows)?
            .values()
            .find(|token| token.access_token_hash == hash)
            .cloned())
    }

    async fn find_by_refresh_token_hash(
        &self,
        hash: &str,
    ) -> Result<Option<Token>, RepositoryError> {
        Ok(read(&self.rows)?
            .values()
            .find(|token| token.refresh_token_hash.as_deref() == Some(hash))
            .cloned())
    }

    async fn revoke(&self, id: &str) -> Result<(), RepositoryError> {
        let mut rows = write(&self.rows)?;
        let token = rows.get_mut(id).ok_or(RepositoryError::NotFound)?;
        token.revoked = true;
        Ok(())
    }

    async fn revoke_all_for_client_and_subject(
        &self,
        client_id: &str,
        subject_id: &str,
    ) -> Result<u64, RepositoryError> {
        let mut revoked = 0;
        for token in write(&self.rows)?.values_mut() {
            if token.client_id == client_id
                && token.subject_id.as_deref() == Some(subject_id)
                && !token.revoked
            {
                token.revoked = true;
                revoked += 1;
            }
        }
        Ok(revoked)
    }
}
