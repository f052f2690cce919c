use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::MySqlPool;

use crate::error::RepositoryError;
use crate::models::Token;

/// Contract for issued-token persistence. Access and refresh hashes each
/// act as a unique index on the same record.
#[async_trait]
pub trait TokenRepository: Send + Sync {
    async fn store(&self, token: &Token) -> Result<(), RepositoryError>;

    async fn find_by_access_token_hash(
        &self,
        hash: &str,
    ) -> Result<Option<Token>, RepositoryError>;

    async fn find_by_refresh_token_hash(
        &self,
        hash: &str,
    ) -> Result<Option<Token>, RepositoryError>;

    async fn revoke(&self, id: &str) -> Result<(), RepositoryError>;

    /// Revoke every live token of a (client, subject) pair. Returns the
    /// number of tokens revoked.
    async fn revoke_all_for_client_and_subject(
        &self,
        client_id: &str,
        subject_id: &str,
    ) -> Result<u64, RepositoryError>;
}

/// MySQL-backed token repository
#[derive(Clone)]
pub struct MySqlTokenRepository {
    pool: MySqlPool,
}

impl MySqlTokenRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn find_by_column(
        &self,
        column: &str,
        hash: &str,
    ) -> Result<Option<Token>, RepositoryError> {
        let query = format!(
            r#"
            SELECT id, client_id, subject_id, access_token_hash, refresh_token_hash,
                   scope, revoked, expires_at, created_at
            FROM oauth_tokens
            WHERE {column} = ?
            "#
        );

        let row = sqlx::query_as::<_, TokenRow>(&query)
            .bind(hash)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Token::from))
    }
}

/// Row type for MySQL query results
#[derive(Debug, sqlx::FromRow)]
struct TokenRow {
    id: String,
    client_id: String,
    subject_id: Option<String>,
    access_token_hash: String,
    refresh_token_hash: Option<String>,
    scope: String,
    revoked: bool,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl From<TokenRow> for Token {
    fn from(row: TokenRow) -> Self {
        Token {
            id: row.id,
            client_id: row.client_id,
            subject_id: row.subject_id,
            access_token_hash: row.access_token_hash,
            refresh_token_hash: row.refresh_token_hash,
            scope: row.scope,
            revoked: row.revoked,
            expires_at: row.expires_at,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl TokenRepository for MySqlTokenRepository {
    async fn store(&self, token: &Token) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO oauth_tokens
                (id, client_id, subject_id, access_token_hash, refresh_token_hash,
                 scope, revoked, expires_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&token.id)
        .bind(&token.client_id)
        .bind(token.subject_id.as_deref())
        .bind(&token.access_token_hash)
        .bind(token.refresh_token_hash.as_deref())
        .bind(&token.scope)
        .bind(token.revoked)
        .bind(token.expires_at)
        .bind(token.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_access_token_hash(
        &self,
        hash: &str,
    ) -> Result<Option<Token>, RepositoryError> {
        self.find_by_column("access_token_hash", hash).await
    }

    async fn find_by_refresh_token_hash(
        &self,
        hash: &str,
    ) -> Result<Option<Token>, RepositoryError> {
        self.find_by_column("refresh_token_hash", hash).await
    }

    async fn revoke(&self, id: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE oauth_tokens SET revoked = TRUE WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn revoke_all_for_client_and_subject(
        &self,
        client_id: &str,
        subject_id: &str,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE oauth_tokens
            SET revoked = TRUE
            WHERE client_id = ? AND subject_id = ? AND revoked = FALSE
            "#,
        )
        .bind(client_id)
        .bind(subject_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
