//! Repository for API key database operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::entities::ApiKeyEntity;
use crate::metrics::QueryTimer;

/// Repository for API key operations.
#[derive(Clone)]
pub struct ApiKeyRepository {
    pool: PgPool,
}

impl ApiKeyRepository {
    /// Creates a new API key repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Finds an API key by its hash.
    ///
    /// Returns `None` if no key with the given hash exists.
    pub async fn find_by_key_hash(
        &self,
        key_hash: &str,
    ) -> Result<Option<ApiKeyEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_api_key_by_hash");
        let result = sqlx::query_as::<_, ApiKeyEntity>(
            r#"
            SELECT id, key_hash, key_prefix, name, capabilities, is_active, is_admin,
                   last_used_at, created_at, expires_at
            FROM api_keys
            WHERE key_hash = $1
            "#,
        )
        .bind(key_hash)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Stores a new key from its hash and prefix.
    pub async fn create(
        &self,
        name: &str,
        key_hash: &str,
        key_prefix: &str,
        capabilities: &[String],
        is_admin: bool,
    ) -> Result<ApiKeyEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_api_key");
        let result = sqlx::query_as::<_, ApiKeyEntity>(
            r#"
            INSERT INTO api_keys (key_hash, key_prefix, name, capabilities, is_admin)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, key_hash, key_prefix, name, capabilities, is_active, is_admin,
                      last_used_at, created_at, expires_at
            "#,
        )
        .bind(key_hash)
        .bind(key_prefix)
        .bind(name)
        .bind(capabilities)
        .bind(is_admin)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Touches `last_used_at`; called in the background after authentication.
    pub async fn update_last_used(&self, key_id: i64) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("touch_api_key");
        let result = sqlx::query("UPDATE api_keys SET last_used_at = NOW() WHERE id = $1")
            .bind(key_id)
            .execute(&self.pool)
            .await;
        timer.record();
        result.map(|_| ())
    }

    /// Whether the key is active and not expired right now.
    pub fn is_key_valid(key: &ApiKeyEntity) -> bool {
        Self::is_key_valid_at(key, Utc::now())
    }

    /// Whether the key is active and not expired at `at`.
    pub fn is_key_valid_at(key: &ApiKeyEntity, at: DateTime<Utc>) -> bool {
        key.is_active && key.expires_at.map_or(true, |expires_at| expires_at >= at)
    }
}
