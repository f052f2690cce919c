use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::MySqlPool;

use crate::error::RepositoryError;
use crate::models::{ConsentChallenge, Footprint, Scopes};

/// Contract for consent-challenge persistence.
///
/// Mirrors the login-challenge contract; the secondary `verifier` index
/// is kept disjoint from the login one by living in its own table.
#[async_trait]
pub trait ConsentChallengeRepository: Send + Sync {
    async fn store(&self, challenge: &ConsentChallenge) -> Result<(), RepositoryError>;

    /// Record the user's decision carried by `challenge.granted_scopes`.
    ///
    /// Conditional on the row still being undecided: fails with
    /// `Conflict` when a decision is already recorded, with `NotFound`
    /// when the row is gone.
    async fn update_with_granted_scopes(
        &self,
        challenge: &ConsentChallenge,
    ) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<ConsentChallenge>, RepositoryError>;

    async fn find_by_verifier(
        &self,
        verifier: &str,
    ) -> Result<Option<ConsentChallenge>, RepositoryError>;

    async fn delete(&self, challenge: &ConsentChallenge) -> Result<(), RepositoryError>;
}

/// MySQL-backed consent-challenge repository
#[derive(Clone)]
pub struct MySqlConsentChallengeRepository {
    pool: MySqlPool,
}

impl MySqlConsentChallengeRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

/// Row type for MySQL query results
#[derive(Debug, sqlx::FromRow)]
struct ConsentChallengeRow {
    id: String,
    verifier: String,
    client_id: String,
    subject_id: String,
    requested_scopes: serde_json::Value,
    missing_scopes: serde_json::Value,
    granted_scopes: Option<serde_json::Value>,
    footprint: serde_json::Value,
    used: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ConsentChallengeRow> for ConsentChallenge {
    type Error = RepositoryError;

    fn try_from(row: ConsentChallengeRow) -> Result<Self, Self::Error> {
        let requested_scopes: Scopes = serde_json::from_value(row.requested_scopes)?;
        let missing_scopes: Scopes = serde_json::from_value(row.missing_scopes)?;
        let granted_scopes: Option<Scopes> = row
            .granted_scopes
            .map(serde_json::from_value)
            .transpose()?;
        let footprint: Footprint = serde_json::from_value(row.footprint)?;

        Ok(ConsentChallenge {
            id: row.id,
            verifier: row.verifier,
            client_id: row.client_id,
            subject_id: row.subject_id,
            requested_scopes,
            missing_scopes,
            granted_scopes,
            footprint,
            used: row.used,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl ConsentChallengeRepository for MySqlConsentChallengeRepository {
    async fn store(&self, challenge: &ConsentChallenge) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO consent_challenges
                (id, verifier, client_id, subject_id, requested_scopes, missing_scopes,
                 granted_scopes, footprint, used, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&challenge.id)
        .bind(&challenge.verifier)
        .bind(&challenge.client_id)
        .bind(&challenge.subject_id)
        .bind(serde_json::to_value(&challenge.requested_scopes)?)
        .bind(serde_json::to_value(&challenge.missing_scopes)?)
        .bind(
            challenge
                .granted_scopes
                .as_ref()
                .map(serde_json::to_value)
                .transpose()?,
        )
        .bind(serde_json::to_value(&challenge.footprint)?)
        .bind(challenge.used)
        .bind(challenge.created_at)
        .bind(challenge.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_with_granted_scopes(
        &self,
        challenge: &ConsentChallenge,
    ) -> Result<(), RepositoryError> {
        let granted = challenge.granted_scopes.as_ref().ok_or_else(|| {
            RepositoryError::Backend("challenge carries no granted scopes".to_string())
        })?;

        // Conditional write: only an undecided, unused row is updated, so
        // two concurrent grant calls cannot both succeed.
        let result = sqlx::query(
            r#"
            UPDATE consent_challenges
            SET granted_scopes = ?, updated_at = ?
            WHERE id = ? AND granted_scopes IS NULL AND used = FALSE
            "#,
        )
        .bind(serde_json::to_value(granted)?)
        .bind(challenge.updated_at)
        .bind(&challenge.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let exists = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM consent_challenges WHERE id = ?",
            )
            .bind(&challenge.id)
            .fetch_one(&self.pool)
            .await?;

            return Err(if exists > 0 {
                RepositoryError::Conflict
            } else {
                RepositoryError::NotFound
            });
        }

        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<ConsentChallenge>, RepositoryError> {
        let row = sqlx::query_as::<_, ConsentChallengeRow>(
            r#"
            SELECT id, verifier, client_id, subject_id, requested_scopes, missing_scopes,
                   granted_scopes, footprint, used, created_at, updated_at
            FROM consent_challenges
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ConsentChallenge::try_from).transpose()
    }

    async fn find_by_verifier(
        &self,
        verifier: &str,
    ) -> Result<Option<ConsentChallenge>, RepositoryError> {
        let row = sqlx::query_as::<_, ConsentChallengeRow>(
            r#"
            SELECT id, verifier, client_id, subject_id, requested_scopes, missing_scopes,
                   granted_scopes, footprint, used, created_at, updated_at
            FROM consent_challenges
            WHERE verifier = ?
            "#,
        )
        .bind(verifier)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ConsentChallenge::try_from).transpose()
    }

    async fn delete(&self, challenge: &ConsentChallenge) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM consent_challenges WHERE id = ?")
            .bind(&challenge.id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
