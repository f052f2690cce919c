use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::MySqlPool;

use crate::error::RepositoryError;
use crate::models::{Consent, Scopes};

/// Contract for durable consent records, unique per (client, subject).
#[async_trait]
pub trait ConsentRepository: Send + Sync {
    async fn store(&self, consent: &Consent) -> Result<(), RepositoryError>;

    /// Persist a widened scope set for an existing record.
    async fn update_with_scopes(&self, consent: &Consent) -> Result<(), RepositoryError>;

    async fn find_by_client_and_subject(
        &self,
        client_id: &str,
        subject_id: &str,
    ) -> Result<Option<Consent>, RepositoryError>;
}

/// MySQL-backed consent repository
#[derive(Clone)]
pub struct MySqlConsentRepository {
    pool: MySqlPool,
}

impl MySqlConsentRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

/// Row type for MySQL query results
#[derive(Debug, sqlx::FromRow)]
struct ConsentRow {
    id: String,
    client_id: String,
    subject_id: String,
    scopes: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ConsentRow> for Consent {
    type Error = RepositoryError;

    fn try_from(row: ConsentRow) -> Result<Self, Self::Error> {
        let scopes: Scopes = serde_json::from_value(row.scopes)?;
        Ok(Consent {
            id: row.id,
            client_id: row.client_id,
            subject_id: row.subject_id,
            scopes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl ConsentRepository for MySqlConsentRepository {
    async fn store(&self, consent: &Consent) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO consents (id, client_id, subject_id, scopes, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&consent.id)
        .bind(&consent.client_id)
        .bind(&consent.subject_id)
        .bind(serde_json::to_value(&consent.scopes)?)
        .bind(consent.created_at)
        .bind(consent.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_with_scopes(&self, consent: &Consent) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE consents
            SET scopes = ?, updated_at = ?
            WHERE client_id = ? AND subject_id = ?
            "#,
        )
        .bind(serde_json::to_value(&consent.scopes)?)
        .bind(consent.updated_at)
        .bind(&consent.client_id)
        .bind(&consent.subject_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn find_by_client_and_subject(
        &self,
        client_id: &str,
        subject_id: &str,
    ) -> Result<Option<Consent>, RepositoryError> {
        let row = sqlx::query_as::<_, ConsentRow>(
            r#"
            SELECT id, client_id, subject_id, scopes, created_at, updated_at
            FROM consents
            WHERE client_id = ? AND subject_id = ?
            "#,
        )
        .bind(client_id)
        .bind(subject_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Consent::try_from).transpose()
    }
}
