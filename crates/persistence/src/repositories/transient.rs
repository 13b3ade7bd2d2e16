//! Transient repository: expiring key-value rows.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use domain::services::TransientStore;
use domain::ExportError;
use sqlx::PgPool;

use super::storage_error;
use crate::entities::TransientEntity;
use crate::metrics::QueryTimer;

/// Repository for the transients table.
#[derive(Clone)]
pub struct TransientRepository {
    pool: PgPool,
}

impl TransientRepository {
    /// Creates a new TransientRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Finds a transient by key, expired or not.
    pub async fn find(&self, key: &str) -> Result<Option<TransientEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_transient");
        let result = sqlx::query_as::<_, TransientEntity>(
            r#"
            SELECT key, value, expires_at
            FROM transients
            WHERE key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Inserts or replaces a transient.
    pub async fn upsert(&self, key: &str, value: &str, ttl_secs: i64) -> Result<(), sqlx::Error> {
        let expires_at = (ttl_secs > 0).then(|| Utc::now() + Duration::seconds(ttl_secs));
        let timer = QueryTimer::new("upsert_transient");
        let result = sqlx::query(
            r#"
            INSERT INTO transients (key, value, expires_at, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (key) DO UPDATE
            SET value = EXCLUDED.value,
                expires_at = EXCLUDED.expires_at,
                updated_at = NOW()
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(expires_at)
        .execute(&self.pool)
        .await;
        timer.record();
        result.map(|_| ())
    }

    /// Deletes a transient.
    pub async fn delete(&self, key: &str) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("delete_transient");
        let result = sqlx::query("DELETE FROM transients WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        timer.record();
        Ok(result.rows_affected())
    }

    /// Deletes every expired transient, returning how many were removed.
    pub async fn delete_expired(&self) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("delete_expired_transients");
        let result = sqlx::query(
            r#"
            DELETE FROM transients
            WHERE expires_at IS NOT NULL AND expires_at <= NOW()
            "#,
        )
        .execute(&self.pool)
        .await?;
        timer.record();
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl TransientStore for TransientRepository {
    async fn get(&self, key: &str) -> Result<Option<String>, ExportError> {
        let entity = self.find(key).await.map_err(storage_error)?;
        Ok(entity
            .filter(|transient| !transient.is_expired_at(Utc::now()))
            .map(|transient| transient.value))
    }

    async fn put(&self, key: &str, value: &str, ttl_secs: i64) -> Result<(), ExportError> {
        self.upsert(key, value, ttl_secs).await.map_err(storage_error)
    }

    async fn delete(&self, key: &str) -> Result<(), ExportError> {
        TransientRepository::delete(self, key)
            .await
            .map(|_| ())
            .map_err(storage_error)
    }

    async fn purge_expired(&self) -> Result<u64, ExportError> {
        self.delete_expired().await.map_err(storage_error)
    }
}
