use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::MySqlPool;

use crate::error::RepositoryError;
use crate::models::AuthorizationCode;

/// Contract for authorization-code persistence, keyed by code hash.
#[async_trait]
pub trait AuthorizationCodeRepository: Send + Sync {
    async fn store(&self, code: &AuthorizationCode) -> Result<(), RepositoryError>;

    /// Look up a code that is neither used nor expired.
    async fn find_valid_by_hash(
        &self,
        code_hash: &str,
    ) -> Result<Option<AuthorizationCode>, RepositoryError>;

    /// Flip the single-use flag. Fails with `Conflict` when the code was
    /// already redeemed, so concurrent exchanges cannot both succeed.
    async fn mark_used(&self, code_hash: &str) -> Result<(), RepositoryError>;
}

/// MySQL-backed authorization-code repository
#[derive(Clone)]
pub struct MySqlAuthorizationCodeRepository {
    pool: MySqlPool,
}

impl MySqlAuthorizationCodeRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

/// Row type for MySQL query results
#[derive(Debug, sqlx::FromRow)]
struct AuthorizationCodeRow {
    code_hash: String,
    client_id: String,
    subject_id: String,
    redirect_uri: String,
    scope: String,
    code_challenge: String,
    code_challenge_method: String,
    used: bool,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl From<AuthorizationCodeRow> for AuthorizationCode {
    fn from(row: AuthorizationCodeRow) -> Self {
        AuthorizationCode {
            code_hash: row.code_hash,
            client_id: row.client_id,
            subject_id: row.subject_id,
            redirect_uri: row.redirect_uri,
            scope: row.scope,
            code_challenge: row.code_challenge,
            code_challenge_method: row.code_challenge_method,
            used: row.used,
            expires_at: row.expires_at,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl AuthorizationCodeRepository for MySqlAuthorizationCodeRepository {
    async fn store(&self, code: &AuthorizationCode) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO authorization_codes
                (code_hash, client_id, subject_id, redirect_uri, scope,
                 code_challenge, code_challenge_method, used, expires_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&code.code_hash)
        .bind(&code.client_id)
        .bind(&code.subject_id)
        .bind(&code.redirect_uri)
        .bind(&code.scope)
        .bind(&code.code_challenge)
        .bind(&code.code_challenge_method)
        .bind(code.used)
        .bind(code.expires_at)
        .bind(code.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_valid_by_hash(
        &self,
        code_hash: &str,
    ) -> Result<Option<AuthorizationCode>, RepositoryError> {
        let row = sqlx::query_as::<_, AuthorizationCodeRow>(
            r#"
            SELECT code_hash, client_id, subject_id, redirect_uri, scope,
                   code_challenge, code_challenge_method, used, expires_at, created_at
            FROM authorization_codes
            WHERE code_hash = ? AND used = FALSE AND expires_at > ?
            "#,
        )
        .bind(code_hash)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(AuthorizationCode::from))
    }

    async fn mark_used(&self, code_hash: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE authorization_codes SET used = TRUE WHERE code_hash = ? AND used = FALSE",
        )
        .bind(code_hash)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Conflict);
        }

        Ok(())
    }
}
