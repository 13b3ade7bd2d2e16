//! API key authentication extractor.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use sqlx::PgPool;

use crate::app::AppState;
use crate::error::ApiError;
use persistence::repositories::ApiKeyRepository;
use shared::crypto::{extract_key_prefix, sha256_hex};

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Capability required by every export route.
pub const VIEW_ENTRIES: &str = "view_entries";

/// Authenticated API key.
#[derive(Debug, Clone)]
pub struct ApiKeyAuth {
    pub api_key_id: i64,
    /// Key prefix for identification (e.g., "ee_aBcDeFgH").
    pub key_prefix: String,
    pub is_admin: bool,
    pub capabilities: Vec<String>,
}

impl ApiKeyAuth {
    /// Whether the key grants `capability`; admin keys grant every capability.
    pub fn can(&self, capability: &str) -> bool {
        self.is_admin || self.capabilities.iter().any(|c| c == capability)
    }

    /// Validates an API key against the stored hashes.
    pub async fn validate(pool: &PgPool, api_key: &str) -> Result<Self, ApiError> {
        if extract_key_prefix(api_key).is_none() {
            return Err(ApiError::Unauthorized(
                "Invalid or missing API key".to_string(),
            ));
        }

        let repo = ApiKeyRepository::new(pool.clone());
        let key = repo
            .find_by_key_hash(&sha256_hex(api_key))
            .await
            .map_err(|e| {
                tracing::error!("Database error during API key lookup: {}", e);
                ApiError::Internal("Authentication service unavailable".to_string())
            })?
            .ok_or_else(|| ApiError::Unauthorized("Invalid or missing API key".to_string()))?;

        if !ApiKeyRepository::is_key_valid(&key) {
            let message = if key.is_active {
                "API key has expired"
            } else {
                "Invalid or missing API key"
            };
            return Err(ApiError::Unauthorized(message.to_string()));
        }

        // last_used_at is informational; do not hold the request for it.
        let pool = pool.clone();
        let key_id = key.id;
        tokio::spawn(async move {
            if let Err(e) = ApiKeyRepository::new(pool).update_last_used(key_id).await {
                tracing::warn!("Failed to update API key last_used_at: {}", e);
            }
        });

        Ok(ApiKeyAuth {
            api_key_id: key.id,
            key_prefix: key.key_prefix,
            is_admin: key.is_admin,
            capabilities: key.capabilities,
        })
    }
}

#[async_trait]
impl FromRequestParts<AppState> for ApiKeyAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let api_key = parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Invalid or missing API key".to_string()))?;

        Self::validate(&state.pool, api_key).await
    }
}
