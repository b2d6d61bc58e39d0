//! Hybrid cache tier composing a local and a remote tier.

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use fincache_core::{
    CacheEntry, CacheMetadata, CacheStatistics, CacheStorageStrategy, DataError, FinancialBundle,
    Result,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::stats::combine;

/// Remote hits younger than this are copied into the local tier.
pub const PROMOTION_THRESHOLD_DAYS: i64 = 30;

/// Local tier in front of a remote tier.
///
/// Reads try the local tier first and promote recent remote hits. Writes,
/// removals and aggregate queries fan out to both tiers concurrently and
/// succeed if either tier does.
#[derive(Debug)]
pub struct HybridStorageStrategy {
    local: Arc<dyn CacheStorageStrategy>,
    remote: Arc<dyn CacheStorageStrategy>,
    default_ttl: TimeDelta,
    promotion_threshold: TimeDelta,
}

impl HybridStorageStrategy {
    /// Compose two tiers.
    #[must_use]
    pub fn new(local: Arc<dyn CacheStorageStrategy>, remote: Arc<dyn CacheStorageStrategy>) -> Self {
        Self {
            local,
            remote,
            default_ttl: TimeDelta::days(90),
            promotion_threshold: TimeDelta::days(PROMOTION_THRESHOLD_DAYS),
        }
    }

    /// Set the TTL stamped on writes that carry no metadata.
    #[must_use]
    pub const fn with_default_ttl(mut self, ttl: TimeDelta) -> Self {
        self.default_ttl = ttl;
        self
    }

    fn is_recent(&self, entry: &CacheEntry) -> bool {
        entry.metadata.age(Utc::now()) < self.promotion_threshold
    }
}

#[async_trait]
impl CacheStorageStrategy for HybridStorageStrategy {
    fn name(&self) -> &str {
        "hybrid"
    }

    #[instrument(skip(self))]
    async fn get(&self, owner: &str, symbol: &str) -> Option<CacheEntry> {
        if let Some(entry) = self.local.get(owner, symbol).await {
            return Some(entry);
        }

        let entry = self.remote.get(owner, symbol).await?;
        if self.is_recent(&entry) {
            match self
                .local
                .set(owner, symbol, &entry.data, Some(entry.metadata.clone()))
                .await
            {
                Ok(_) => debug!("Promoted remote entry to local tier"),
                Err(e) => warn!(error = %e, "Failed to promote remote entry"),
            }
        }
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
        let metadata = metadata.unwrap_or_else(|| CacheMetadata::new(self.default_ttl));
        let (local, remote) = futures::join!(
            self.local.set(owner, symbol, data, Some(metadata.clone())),
            self.remote.set(owner, symbol, data, Some(metadata)),
        );

        match (local, remote) {
            (Ok(id), Ok(_)) => Ok(id),
            (Ok(id), Err(e)) => {
                warn!(error = %e, "Remote tier write failed; kept local copy");
                Ok(id)
            }
            (Err(e), Ok(id)) => {
                warn!(error = %e, "Local tier write failed; kept remote copy");
                Ok(id)
            }
            (Err(local), Err(remote)) => Err(DataError::storage(
                "hybrid",
                format!("local: {local}; remote: {remote}"),
            )),
        }
    }

    #[instrument(skip(self))]
    async fn remove(&self, owner: &str, symbol: &str) -> bool {
        let (local, remote) = futures::join!(
            self.local.remove(owner, symbol),
            self.remote.remove(owner, symbol),
        );
        local || remote
    }

    #[instrument(skip(self))]
    async fn clear(&self, owner: &str) -> usize {
        let (local, remote) = futures::join!(self.local.clear(owner), self.remote.clear(owner));
        // the tiers overlap, so the larger count is the number of symbols cleared
        local.max(remote)
    }

    #[instrument(skip(self))]
    async fn statistics(&self, owner: &str) -> CacheStatistics {
        let (local, remote) = futures::join!(
            self.local.statistics(owner),
            self.remote.statistics(owner),
        );
        combine(&local, &remote)
    }

    async fn is_fresh(&self, owner: &str, symbol: &str) -> bool {
        self.local.is_fresh(owner, symbol).await || self.remote.is_fresh(owner, symbol).await
    }

    #[instrument(skip(self))]
    async fn list_keys(&self, owner: &str) -> Vec<String> {
        let (local, remote) = futures::join!(
            self.local.list_keys(owner),
            self.remote.list_keys(owner),
        );
        local
            .into_iter()
            .chain(remote)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Moves local entries past the promotion threshold to the remote tier.
    ///
    /// A local copy is only dropped once the remote tier holds the symbol.
    #[instrument(skip(self))]
    async fn optimize_distribution(&self, owner: &str) -> usize {
        let mut demoted = 0usize;
        for symbol in self.local.list_keys(owner).await {
            let Some(entry) = self.local.get(owner, &symbol).await else {
                continue;
            };
            if self.is_recent(&entry) {
                continue;
            }

            if self.remote.get(owner, &symbol).await.is_none() {
                if let Err(e) = self
                    .remote
                    .set(owner, &symbol, &entry.data, Some(entry.metadata.clone()))
                    .await
                {
                    warn!(symbol = %symbol, error = %e, "Failed to demote entry; keeping local copy");
                    continue;
                }
            }

            if self.local.remove(owner, &symbol).await {
                demoted += 1;
            }
        }
        debug!(demoted, "Rebalanced hybrid tiers");
        demoted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalStorageStrategy;
    use crate::memory::{MemoryDocumentStore, MemoryKeyValueStore};
    use crate::remote::RemoteStorageStrategy;
    use fincache_core::Symbol;

    /// A tier that rejects every write and never holds anything.
    #[derive(Debug)]
    struct BrokenTier;

    #[async_trait]
    impl CacheStorageStrategy for BrokenTier {
        fn name(&self) -> &str {
            "broken"
        }
        async fn get(&self, _owner: &str, _symbol: &str) -> Option<CacheEntry> {
            None
        }
        async fn set(
            &self,
            _owner: &str,
            _symbol: &str,
            _data: &FinancialBundle,
            _metadata: Option<CacheMetadata>,
        ) -> Result<String> {
            Err(DataError::storage("broken", "unavailable"))
        }
        async fn remove(&self, _owner: &str, _symbol: &str) -> bool {
            false
        }
        async fn clear(&self, _owner: &str) -> usize {
            0
        }
        async fn statistics(&self, _owner: &str) -> CacheStatistics {
            CacheStatistics::default()
        }
        async fn is_fresh(&self, _owner: &str, _symbol: &str) -> bool {
            false
        }
        async fn list_keys(&self, _owner: &str) -> Vec<String> {
            Vec::new()
        }
    }

    fn tiers() -> (Arc<LocalStorageStrategy>, Arc<RemoteStorageStrategy>) {
        let local = Arc::new(LocalStorageStrategy::new(
            Arc::new(MemoryKeyValueStore::new()),
            1 << 20,
        ));
        let remote = Arc::new(RemoteStorageStrategy::new(Arc::new(
            MemoryDocumentStore::new(),
        )));
        (local, remote)
    }

    fn bundle(symbol: &str) -> FinancialBundle {
        FinancialBundle::new(Symbol::new(symbol))
    }

    fn aged(days: i64) -> CacheMetadata {
        CacheMetadata::new_at(Utc::now() - TimeDelta::days(days), TimeDelta::days(200))
    }

    #[tokio::test]
    async fn test_set_writes_both_tiers() {
        let (local, remote) = tiers();
        let hybrid = HybridStorageStrategy::new(local.clone(), remote.clone());
        hybrid.set("u1", "ACME", &bundle("ACME"), None).await.unwrap();

        assert!(local.get("u1", "ACME").await.is_some());
        assert!(remote.get("u1", "ACME").await.is_some());
        assert!(hybrid.is_fresh("u1", "ACME").await);
    }

    #[tokio::test]
    async fn test_set_succeeds_with_one_failing_tier() {
        let (local, remote) = tiers();

        let hybrid = HybridStorageStrategy::new(Arc::new(BrokenTier), remote.clone());
        assert!(hybrid.set("u1", "ACME", &bundle("ACME"), None).await.is_ok());
        assert!(remote.get("u1", "ACME").await.is_some());

        let hybrid = HybridStorageStrategy::new(local.clone(), Arc::new(BrokenTier));
        assert!(hybrid.set("u1", "MSFT", &bundle("MSFT"), None).await.is_ok());
        assert!(local.get("u1", "MSFT").await.is_some());
    }

    #[tokio::test]
    async fn test_set_fails_when_both_tiers_fail() {
        let hybrid = HybridStorageStrategy::new(Arc::new(BrokenTier), Arc::new(BrokenTier));
        let err = hybrid
            .set("u1", "ACME", &bundle("ACME"), None)
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("local:"));
        assert!(msg.contains("remote:"));
    }

    #[tokio::test]
    async fn test_promotes_recent_remote_hits_only() {
        let (local, remote) = tiers();
        let hybrid = HybridStorageStrategy::new(local.clone(), remote.clone());

        remote.set("u1", "OLD", &bundle("OLD"), Some(aged(40))).await.unwrap();
        remote.set("u1", "NEW", &bundle("NEW"), Some(aged(10))).await.unwrap();

        assert!(hybrid.get("u1", "OLD").await.is_some());
        assert!(hybrid.get("u1", "NEW").await.is_some());

        assert!(local.get("u1", "OLD").await.is_none());
        assert!(local.get("u1", "NEW").await.is_some());
    }

    #[tokio::test]
    async fn test_remove_clear_and_keys() {
        let (local, remote) = tiers();
        let hybrid = HybridStorageStrategy::new(local.clone(), remote.clone());
        hybrid.set("u1", "A", &bundle("A"), None).await.unwrap();
        hybrid.set("u1", "B", &bundle("B"), None).await.unwrap();
        remote.set("u1", "C", &bundle("C"), None).await.unwrap();

        assert_eq!(hybrid.list_keys("u1").await, vec!["A", "B", "C"]);

        let stats = hybrid.statistics("u1").await;
        assert_eq!(stats.total_entries, 5);

        assert!(hybrid.remove("u1", "A").await);
        assert!(local.get("u1", "A").await.is_none());
        assert!(remote.get("u1", "A").await.is_none());

        assert_eq!(hybrid.clear("u1").await, 2);
        assert!(hybrid.list_keys("u1").await.is_empty());
    }

    #[tokio::test]
    async fn test_optimize_distribution_demotes_old_entries() {
        let (local, remote) = tiers();
        let hybrid = HybridStorageStrategy::new(local.clone(), remote.clone());

        local.set("u1", "OLD", &bundle("OLD"), Some(aged(45))).await.unwrap();
        local.set("u1", "NEW", &bundle("NEW"), Some(aged(1))).await.unwrap();

        assert_eq!(hybrid.optimize_distribution("u1").await, 1);
        assert_eq!(local.list_keys("u1").await, vec!["NEW"]);
        assert!(remote.get("u1", "OLD").await.is_some());
        assert!(remote.get("u1", "NEW").await.is_none());
    }

    #[tokio::test]
    async fn test_optimize_keeps_local_copy_when_remote_write_fails() {
        let (local, _) = tiers();
        let hybrid = HybridStorageStrategy::new(local.clone(), Arc::new(BrokenTier));
        local.set("u1", "OLD", &bundle("OLD"), Some(aged(45))).await.unwrap();

        assert_eq!(hybrid.optimize_distribution("u1").await, 0);
        assert!(local.get("u1", "OLD").await.is_some());
    }
}
