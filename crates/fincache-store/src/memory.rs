//! In-memory store implementations.

use async_trait::async_trait;
use fincache_core::{DataError, DocumentStore, KeyValueStore, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::RwLock as AsyncRwLock;
use tracing::{debug, instrument, trace};

/// In-memory key-value store with an optional byte quota.
///
/// Stands in for browser storage: once keys plus values would exceed the
/// quota, writes fail the way a full storage area does.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: RwLock<HashMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryKeyValueStore {
    /// Create a new empty store without a quota.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that rejects writes past `bytes`.
    #[must_use]
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            entries: RwLock::default(),
            quota: Some(bytes),
        }
    }

    /// Bytes currently used by keys and values.
    #[must_use]
    pub fn used_bytes(&self) -> usize {
        self.entries
            .read()
            .map(|map| map.iter().map(|(k, v)| k.len() + v.len()).sum())
            .unwrap_or(0)
    }
}

fn poisoned(e: impl ToString) -> DataError {
    DataError::storage("local", e)
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let map = self.entries.read().map_err(poisoned)?;
        Ok(map.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut map = self.entries.write().map_err(poisoned)?;
        if let Some(quota) = self.quota {
            let current: usize = map
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            if current + key.len() + value.len() > quota {
                debug!(key, quota, "Memory store quota exceeded");
                return Err(DataError::storage("local", "storage quota exceeded"));
            }
        }
        map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let mut map = self.entries.write().map_err(poisoned)?;
        Ok(map.remove(key).is_some())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let map = self.entries.read().map_err(poisoned)?;
        Ok(map.keys().cloned().collect())
    }
}

/// In-memory document store, one collection per owner.
///
/// Data is lost when the store is dropped.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    collections: AsyncRwLock<HashMap<String, HashMap<String, Value>>>,
}

impl MemoryDocumentStore {
    /// Create a new empty document store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    #[instrument(skip(self))]
    async fn get(&self, owner: &str, doc_id: &str) -> Result<Option<Value>> {
        let collections = self.collections.read().await;
        let doc = collections.get(owner).and_then(|c| c.get(doc_id)).cloned();
        trace!(found = doc.is_some(), "Document lookup");
        Ok(doc)
    }

    #[instrument(skip(self, doc))]
    async fn set(&self, owner: &str, doc_id: &str, doc: Value) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections
            .entry(owner.to_string())
            .or_default()
            .insert(doc_id.to_string(), doc);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, owner: &str, doc_id: &str) -> Result<bool> {
        let mut collections = self.collections.write().await;
        Ok(collections
            .get_mut(owner)
            .is_some_and(|c| c.remove(doc_id).is_some()))
    }

    #[instrument(skip(self))]
    async fn list(&self, owner: &str) -> Result<Vec<(String, Value)>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(owner)
            .map(|c| c.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    #[instrument(skip(self, doc_ids), fields(count = doc_ids.len()))]
    async fn batch_delete(&self, owner: &str, doc_ids: &[String]) -> Result<usize> {
        let mut collections = self.collections.write().await;
        let Some(collection) = collections.get_mut(owner) else {
            return Ok(0);
        };
        let removed = doc_ids
            .iter()
            .filter(|id| collection.remove(id.as_str()).is_some())
            .count();
        debug!(removed, "Batch deleted documents");
        Ok(removed)
    }
}
