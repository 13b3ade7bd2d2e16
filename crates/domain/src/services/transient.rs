//! Transient storage of request descriptors.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::warn;

use super::storage::TransientStore;
use crate::errors::ExportError;
use crate::models::RequestDescriptor;

/// Key prefix of request descriptor transients.
pub const REQUEST_TRANSIENT_PREFIX: &str = "wpforms-tools-entries-export-request-";

/// In-process transient store, used when no database backed store is
/// configured and in tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryTransientStore {
    items: Arc<RwLock<HashMap<String, (String, Option<DateTime<Utc>>)>>>,
}

impl MemoryTransientStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransientStore for MemoryTransientStore {
    async fn get(&self, key: &str) -> Result<Option<String>, ExportError> {
        let items = self.items.read().await;
        Ok(items.get(key).and_then(|(value, expires_at)| match expires_at {
            Some(at) if *at <= Utc::now() => None,
            _ => Some(value.clone()),
        }))
    }

    async fn put(&self, key: &str, value: &str, ttl_secs: i64) -> Result<(), ExportError> {
        let expires_at = (ttl_secs > 0).then(|| Utc::now() + Duration::seconds(ttl_secs));
        self.items
            .write()
            .await
            .insert(key.to_string(), (value.to_string(), expires_at));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), ExportError> {
        self.items.write().await.remove(key);
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, ExportError> {
        let now = Utc::now();
        let mut items = self.items.write().await;
        let before = items.len();
        items.retain(|_, (_, expires_at)| expires_at.map_or(true, |at| at > now));
        Ok((before - items.len()) as u64)
    }
}

/// Loads and saves request descriptors by request id.
#[derive(Clone)]
pub struct DescriptorStore {
    store: Arc<dyn TransientStore>,
    ttl_secs: i64,
}

impl DescriptorStore {
    pub fn new(store: Arc<dyn TransientStore>, ttl_secs: i64) -> Self {
        Self { store, ttl_secs }
    }

    fn key(request_id: &str) -> String {
        format!("{}{}", REQUEST_TRANSIENT_PREFIX, request_id)
    }

    /// Returns the descriptor, or `None` when it expired, never existed or
    /// can no longer be decoded.
    pub async fn load(&self, request_id: &str) -> Result<Option<RequestDescriptor>, ExportError> {
        let Some(raw) = self.store.get(&Self::key(request_id)).await? else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(descriptor) => Ok(Some(descriptor)),
            Err(e) => {
                warn!(request_id = %request_id, error = %e, "Discarding undecodable export request");
                Ok(None)
            }
        }
    }

    /// Stores the descriptor, restarting its TTL.
    pub async fn save(&self, descriptor: &RequestDescriptor) -> Result<(), ExportError> {
        let raw = serde_json::to_string(descriptor)?;
        self.store
            .put(&Self::key(&descriptor.request_id), &raw, self.ttl_secs)
            .await
    }
}
