use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::MySqlPool;

use crate::error::RepositoryError;
use crate::models::{Footprint, Identity, LoginChallenge};

/// Contract for login-challenge persistence.
///
/// `id` is the primary key; `verifier` acts as a unique secondary index.
#[async_trait]
pub trait LoginChallengeRepository: Send + Sync {
    async fn store(&self, challenge: &LoginChallenge) -> Result<(), RepositoryError>;

    /// Bind the challenge to the subject carried by `challenge.identity`.
    ///
    /// The only mutation that flips a challenge from unbound to bound.
    /// Idempotent for the same subject; fails with `Conflict` when the
    /// row is already bound to a different subject, with `NotFound` when
    /// the row is gone.
    async fn update_with_authorization(
        &self,
        challenge: &LoginChallenge,
    ) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<LoginChallenge>, RepositoryError>;

    async fn find_by_verifier(
        &self,
        verifier: &str,
    ) -> Result<Option<LoginChallenge>, RepositoryError>;

    async fn delete(&self, challenge: &LoginChallenge) -> Result<(), RepositoryError>;
}

/// MySQL-backed login-challenge repository
#[derive(Clone)]
pub struct MySqlLoginChallengeRepository {
    pool: MySqlPool,
}

impl MySqlLoginChallengeRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

/// Row type for MySQL query results
#[derive(Debug, sqlx::FromRow)]
struct LoginChallengeRow {
    id: String,
    client_id: String,
    verifier: String,
    subject_id: Option<String>,
    footprint: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<LoginChallengeRow> for LoginChallenge {
    type Error = RepositoryError;

    fn try_from(row: LoginChallengeRow) -> Result<Self, Self::Error> {
        let footprint: Footprint = serde_json::from_value(row.footprint)?;
        Ok(LoginChallenge {
            id: row.id,
            client_id: row.client_id,
            verifier: row.verifier,
            identity: row.subject_id.map(|subject_id| Identity { subject_id }),
            footprint,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl LoginChallengeRepository for MySqlLoginChallengeRepository {
    async fn store(&self, challenge: &LoginChallenge) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO login_challenges
                (id, client_id, verifier, subject_id, footprint, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&challenge.id)
        .bind(&challenge.client_id)
        .bind(&challenge.verifier)
        .bind(challenge.identity.as_ref().map(|i| i.subject_id.as_str()))
        .bind(serde_json::to_value(&challenge.footprint)?)
        .bind(challenge.created_at)
        .bind(challenge.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_with_authorization(
        &self,
        challenge: &LoginChallenge,
    ) -> Result<(), RepositoryError> {
        let subject_id = challenge
            .identity
            .as_ref()
            .map(|i| i.subject_id.as_str())
            .ok_or_else(|| {
                RepositoryError::Backend("challenge carries no identity to bind".to_string())
            })?;

        // Conditional write: only an unbound row (or one already bound to
        // the same subject) is updated, so two concurrent binds for
        // different subjects cannot both succeed.
        let result = sqlx::query(
            r#"
            UPDATE login_challenges
            SET subject_id = ?, updated_at = ?
            WHERE id = ? AND (subject_id IS NULL OR subject_id = ?)
            "#,
        )
        .bind(subject_id)
        .bind(challenge.updated_at)
        .bind(&challenge.id)
        .bind(subject_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let exists = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM login_challenges WHERE id = ?",
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

    async fn find_by_id(&self, id: &str) -> Result<Option<LoginChallenge>, RepositoryError> {
        let row = sqlx::query_as::<_, LoginChallengeRow>(
            r#"
            SELECT id, client_id, verifier, subject_id, footprint, created_at, updated_at
            FROM login_challenges
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(LoginChallenge::try_from).transpose()
    }

    async fn find_by_verifier(
        &self,
        verifier: &str,
    ) -> Result<Option<LoginChallenge>, RepositoryError> {
        let row = sqlx::query_as::<_, LoginChallengeRow>(
            r#"
            SELECT id, client_id, verifier, subject_id, footprint, created_at, updated_at
            FROM login_challenges
            WHERE verifier = ?
            "#,
        )
        .bind(verifier)
        .fetch_optional(&self.pool)
        .await?;

        row.map(LoginChallenge::try_from).transpose()
    }

    async fn delete(&self, challenge: &LoginChallenge) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM login_challenges WHERE id = ?")
            .bind(&challenge.id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
