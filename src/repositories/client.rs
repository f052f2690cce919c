use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::MySqlPool;

use crate::error::RepositoryError;
use crate::models::Client;

/// Contract for the registered-client store consulted by the token
/// pipeline. Registration itself is static (seeded at startup); there is
/// no dynamic registration endpoint.
#[async_trait]
pub trait ClientRepository: Send + Sync {
    async fn upsert(&self, client: &Client) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Client>, RepositoryError>;
}

/// MySQL-backed client repository
#[derive(Clone)]
pub struct MySqlClientRepository {
    pool: MySqlPool,
}

impl MySqlClientRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

/// Row type for MySQL query results
#[derive(Debug, sqlx::FromRow)]
struct ClientRow {
    id: String,
    secret_hash: String,
    redirect_uri: String,
    created_at: DateTime<Utc>,
}

impl From<ClientRow> for Client {
    fn from(row: ClientRow) -> Self {
        Client {
            id: row.id,
            secret_hash: row.secret_hash,
            redirect_uri: row.redirect_uri,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl ClientRepository for MySqlClientRepository {
    async fn upsert(&self, client: &Client) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO clients (id, secret_hash, redirect_uri, created_at)
            VALUES (?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                secret_hash = VALUES(secret_hash),
                redirect_uri = VALUES(redirect_uri)
            "#,
        )
        .bind(&client.id)
        .bind(&client.secret_hash)
        .bind(&client.redirect_uri)
        .bind(client.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Client>, RepositoryError> {
        let row = sqlx::query_as::<_, ClientRow>(
            r#"
            SELECT id, secret_hash, redirect_uri, created_at
            FROM clients
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Client::from))
    }
}
