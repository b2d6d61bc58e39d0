//! Local (client-side) cache tier.

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use fincache_core::{
    CacheEntry, CacheMetadata, CacheStatistics, CacheStorageStrategy, DataError, FinancialBundle,
    KeyValueStore, Result, Symbol, validate_key,
};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::freshness::{is_entry_stale, is_entry_stale_at};
use crate::stats::summarize;

/// Prefix of every key the local tier writes.
pub const LOCAL_KEY_PREFIX: &str = "fincache";

/// Eviction stops once projected usage drops to this share of the limit.
const EVICTION_TARGET: f64 = 0.8;

/// An entry read back from the store together with its key and size.
#[derive(Debug)]
struct StoredEntry {
    key: String,
    entry: CacheEntry,
    size: usize,
}

/// Fast, size-bounded cache tier over a synchronous [`KeyValueStore`].
///
/// Entries are stored as JSON under `fincache:{len}:{owner}:{SYMBOL}`, where
/// `len` is the owner's byte length, so owners and symbols may both contain
/// `:` without two keys colliding. Writes larger
/// than the byte limit are rejected outright; writes that would push the
/// owner's usage past the limit first evict that owner's stale entries.
#[derive(Debug)]
pub struct LocalStorageStrategy {
    store: Arc<dyn KeyValueStore>,
    max_size: usize,
    default_ttl: TimeDelta,
}

impl LocalStorageStrategy {
    /// Create a local tier over `store` holding at most `max_size` bytes per owner.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, max_size: usize) -> Self {
        Self {
            store,
            max_size,
            default_ttl: TimeDelta::days(90),
        }
    }

    /// Set the TTL stamped on writes that carry no metadata.
    #[must_use]
    pub const fn with_default_ttl(mut self, ttl: TimeDelta) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Key prefix shared by every entry of `owner`.
    fn owner_prefix(owner: &str) -> String {
        format!("{LOCAL_KEY_PREFIX}:{}:{owner}:", owner.len())
    }

    fn key(owner: &str, symbol: &str) -> String {
        format!("{}{}", Self::owner_prefix(owner), Symbol::new(symbol))
    }

    /// True if `key` was written for exactly this owner.
    fn is_owner_key(prefix: &str, key: &str) -> bool {
        key.strip_prefix(prefix).is_some_and(|symbol| !symbol.is_empty())
    }

    /// Every readable, current-schema entry of an owner.
    fn owner_entries(&self, owner: &str) -> Vec<StoredEntry> {
        let keys = match self.store.keys() {
            Ok(keys) => keys,
            Err(e) => {
                warn!(owner, error = %e, "Failed to enumerate local cache keys");
                return Vec::new();
            }
        };

        let prefix = Self::owner_prefix(owner);
        keys.into_iter()
            .filter(|key| Self::is_owner_key(&prefix, key))
            .filter_map(|key| {
                let raw = self.store.get(&key).ok()??;
                let entry: CacheEntry = serde_json::from_str(&raw).ok()?;
                (entry.owner == owner && entry.metadata.is_current_schema()).then(|| StoredEntry {
                    key,
                    entry,
                    size: raw.len(),
                })
            })
            .collect()
    }

    /// Evicts the owner's stale entries, oldest first, when the incoming write
    /// would take usage past the limit.
    fn ensure_capacity(&self, owner: &str, key: &str, incoming: usize) {
        let entries = self.owner_entries(owner);
        let current: usize = entries
            .iter()
            .filter(|e| e.key != key)
            .map(|e| e.size)
            .sum();
        let mut projected = current + incoming;
        if projected <= self.max_size {
            return;
        }

        let target = (self.max_size as f64 * EVICTION_TARGET) as usize;
        let now = Utc::now();
        let mut stale: Vec<StoredEntry> = entries
            .into_iter()
            .filter(|e| e.key != key && is_entry_stale_at(&e.entry.metadata, now))
            .collect();
        stale.sort_by_key(|e| e.entry.metadata.cached_at);

        let mut evicted = 0usize;
        for candidate in stale {
            if projected <= target {
                break;
            }
            match self.store.remove(&candidate.key) {
                Ok(_) => {
                    projected = projected.saturating_sub(candidate.size);
                    evicted += 1;
                }
                Err(e) => warn!(key = %candidate.key, error = %e, "Failed to evict local entry"),
            }
        }
        debug!(owner, evicted, projected, limit = self.max_size, "Evicted stale local entries");
    }
}

#[async_trait]
impl CacheStorageStrategy for LocalStorageStrategy {
    fn name(&self) -> &str {
        "local"
    }

    #[instrument(skip(self))]
    async fn get(&self, owner: &str, symbol: &str) -> Option<CacheEntry> {
        if let Err(e) = validate_key(owner, symbol) {
            warn!(error = %e, "Rejected local cache read");
            return None;
        }

        let key = Self::key(owner, symbol);
        let raw = match self.store.get(&key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("Local cache miss");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Local cache read failed");
                return None;
            }
        };

        let entry: CacheEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Discarding unreadable local cache entry");
                if let Err(e) = self.store.remove(&key) {
                    warn!(error = %e, "Failed to purge unreadable local entry");
                }
                return None;
            }
        };

        if entry.owner != owner {
            warn!(stored_owner = %entry.owner, "Local cache entry owner mismatch");
            return None;
        }

        if !entry.metadata.is_current_schema() {
            debug!(version = %entry.metadata.schema_version, "Purging local entry with old schema");
            if let Err(e) = self.store.remove(&key) {
                warn!(error = %e, "Failed to purge outdated local entry");
            }
            return None;
        }

        debug!("Local cache hit");
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
        let serialized = serde_json::to_string(&entry)?;

        let size = serialized.len();
        if size > self.max_size {
            warn!(size, max = self.max_size, "Entry too large for local cache");
            return Err(DataError::EntryTooLarge {
                size,
                max: self.max_size,
            });
        }

        let key = Self::key(owner, symbol.as_str());
        self.ensure_capacity(owner, &key, size);

        self.store.set(&key, &serialized).inspect_err(|e| {
            warn!(error = %e, "Local cache write failed");
        })?;

        debug!(size, "Cached entry locally");
        Ok(entry.id)
    }

    #[instrument(skip(self))]
    async fn remove(&self, owner: &str, symbol: &str) -> bool {
        if validate_key(owner, symbol).is_err() {
            return false;
        }
        match self.store.remove(&Self::key(owner, symbol)) {
            Ok(removed) => removed,
            Err(e) => {
                warn!(error = %e, "Local cache remove failed");
                false
            }
        }
    }

    #[instrument(skip(self))]
    async fn clear(&self, owner: &str) -> usize {
        let keys = match self.store.keys() {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "Failed to enumerate local cache keys");
                return 0;
            }
        };

        let prefix = Self::owner_prefix(owner);
        let mut removed = 0usize;
        for key in keys.iter().filter(|k| Self::is_owner_key(&prefix, k)) {
            match self.store.remove(key) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => warn!(key = %key, error = %e, "Local cache remove failed"),
            }
        }
        debug!(removed, "Cleared local cache");
        removed
    }

    #[instrument(skip(self))]
    async fn statistics(&self, owner: &str) -> CacheStatistics {
        let entries = self.owner_entries(owner);
        summarize(entries.iter().map(|e| (&e.entry, e.size)), Utc::now())
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
            .into_iter()
            .map(|e| e.entry.symbol)
            .collect();
        symbols.sort();
        symbols
    }
}
