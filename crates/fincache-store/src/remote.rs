//! Remote (durable) cache tier.

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use fincache_core::{
    CacheEntry, CacheMetadata, CacheStatistics, CacheStorageStrategy, DocumentStore,
    FinancialBundle, Result, Symbol, validate_key,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::freshness::is_entry_stale;
use crate::stats::summarize;

/// Durable cache tier over a per-owner [`DocumentStore`] collection.
///
/// Each symbol is one document whose id is the upper-cased symbol.
#[derive(Debug)]
pub struct RemoteStorageStrategy {
    store: Arc<dyn DocumentStore>,
    default_ttl: TimeDelta,
}

impl RemoteStorageStrategy {
    /// Create a remote tier over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            default_ttl: TimeDelta::days(90),
        }
    }

    /// Set the TTL stamped on writes that carry no metadata.
    #[must_use]
    pub const fn with_default_ttl(mut self, ttl: TimeDelta) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Every readable, current-schema document of an owner with its size.
    async fn owner_entries(&self, owner: &str) -> Vec<(CacheEntry, usize)> {
        let docs = match self.store.list(owner).await {
            Ok(docs) => docs,
            Err(e) => {
                warn!(owner, error = %e, "Failed to list remote cache documents");
                return Vec::new();
            }
        };

        docs.into_iter()
            .filter_map(|(_, doc)| {
                let size = serde_json::to_vec(&doc).map(|v| v.len()).unwrap_or(0);
                let entry: CacheEntry = serde_json::from_value(doc).ok()?;
                (entry.owner == owner && entry.metadata.is_current_schema()).then_some((entry, size))
            })
            .collect()
    }

    async fn purge(&self, owner: &str, doc_id: &str) {
        if let Err(e) = self.store.delete(owner, doc_id).await {
            warn!(error = %e, "Failed to purge remote document");
        }
    }
}

#[async_trait]
impl CacheStorageStrategy for RemoteStorageStrategy {
    fn name(&self) -> &str {
        "remote"
    }

    #[instrument(skip(self))]
    async fn get(&self, owner: &str, symbol: &str) -> Option<CacheEntry> {
        if let Err(e) = validate_key(owner, symbol) {
            warn!(error = %e, "Rejected remote cache read");
            return None;
        }

        let doc_id = Symbol::new(symbol).to_string();
        let doc: Value = match self.store.get(owner, &doc_id).await {
            Ok(Some(doc)) => doc,
            Ok(None) => {
                debug!("Remote cache miss");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Remote cache read failed");
                return None;
            }
        };

        let entry: CacheEntry = match serde_json::from_value(doc) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Discarding unreadable remote cache document");
                self.purge(owner, &doc_id).await;
                return None;
            }
        };

        if entry.owner != owner {
            warn!(stored_owner = %entry.owner, "Remote cache document owner mismatch");
            return None;
        }

        if !entry.metadata.is_current_schema() {
            debug!(version = %entry.metadata.schema_version, "Purging remote document with old schema");
            self.purge(owner, &doc_id).await;
            return None;
        }

        debug!("Remote cache hit");
        Some(entry)
    }

    #[instrument(skip(self, data, metadata))]
    async fn set(
        &self,
        owner: &str,
        symbol: &str,
        data: &FinancialBundle,
        metadata: Option<CacheMetadata>,
    ) -> Result<String> {
        validate_key(owner, symbol)?;

        let symbol = Symbol::new(symbol);
        let metadata = metadata.unwrap_or_else(|| CacheMetadata::new(self.default_ttl));
        let entry = CacheEntry::new(owner, symbol.as_str(), data.clone(), metadata);
        let doc = serde_json::to_value(&entry)?;

        self.store
            .set(owner, symbol.as_str(), doc)
            .await
            .inspect_err(|e| warn!(error = %e, "Remote cache write failed"))?;

        debug!("Cached entry remotely");
        Ok(entry.id)
    }

    #[instrument(skip(self))]
    async fn remove(&self, owner: &str, symbol: &str) -> bool {
        if validate_key(owner, symbol).is_err() {
            return false;
        }
        match self.store.delete(owner, Symbol::new(symbol).as_str()).await {
            Ok(removed) => removed,
            Err(e) => {
                warn!(error = %e, "Remote cache remove failed");
                false
            }
        }
    }

    #[instrument(skip(self))]
    async fn clear(&self, owner: &str) -> usize {
        let doc_ids: Vec<String> = match self.store.list(owner).await {
            Ok(docs) => docs.into_iter().map(|(id, _)| id).collect(),
            Err(e) => {
                warn!(error = %e, "Failed to list remote cache documents");
                return 0;
            }
        };
        if doc_ids.is_empty() {
            return 0;
        }

        match self.store.batch_delete(owner, &doc_ids).await {
            Ok(removed) => {
                debug!(removed, "Cleared remote cache");
                removed
            }
            Err(e) => {
                warn!(error = %e, "Remote batch delete failed");
                0
            }
        }
    }

    #[instrument(skip(self))]
    async fn statistics(&self, owner: &str) -> CacheStatistics {
        let entries = self.owner_entries(owner).await;
        summarize(entries.iter().map(|(e, size)| (e, *size)), Utc::now())
    }

    async fn is_fresh(&self, owner: &str, symbol: &str) -> bool {
        self.get(owner, symbol)
            .await
            .is_some_and(|e| !is_entry_stale(&e.metadata))
    }

    #[instrument(skip(self))]
    async fn list_keys(&self, owner: &str) -> Vec<String> {
        let mut symbols: Vec<String> = self
            .owner_entries(owner)
            .await
            .into_iter()
            .map(|(e, _)| e.symbol)
            .collect();
        symbols.sort();
        symbols
    }
}
