//! Builds the storage strategy for a tier.

use chrono::TimeDelta;
use fincache_core::{CacheConfig, CacheStorageStrategy, DocumentStore, KeyValueStore, StorageTier};
use std::sync::Arc;
use tracing::debug;

use crate::freshness::ABSOLUTE_MAX_AGE_DAYS;
use crate::hybrid::HybridStorageStrategy;
use crate::local::LocalStorageStrategy;
use crate::remote::RemoteStorageStrategy;

/// Out-of-range durations fall back to the absolute ceiling.
fn ttl(config: &CacheConfig) -> TimeDelta {
    TimeDelta::from_std(config.default_ttl)
        .unwrap_or_else(|_| TimeDelta::days(ABSOLUTE_MAX_AGE_DAYS))
}

/// Creates the strategy for `tier` over the given stores.
///
/// The local tier is bounded by `config.max_cache_size`. Every tier stamps
/// `config.default_ttl` on writes that carry no metadata.
#[must_use]
pub fn create_strategy(
    tier: StorageTier,
    local_store: Arc<dyn KeyValueStore>,
    remote_store: Arc<dyn DocumentStore>,
    config: &CacheConfig,
) -> Arc<dyn CacheStorageStrategy> {
    let default_ttl = ttl(config);
    debug!(?tier, max_cache_size = config.max_cache_size, "Creating storage strategy");

    let local = || {
        Arc::new(
            LocalStorageStrategy::new(local_store.clone(), config.max_cache_size)
                .with_default_ttl(default_ttl),
        )
    };
    let remote =
        || Arc::new(RemoteStorageStrategy::new(remote_store.clone()).with_default_ttl(default_ttl));

    match tier {
        StorageTier::Local => local(),
        StorageTier::Remote => remote(),
        StorageTier::Hybrid => Arc::new(
            HybridStorageStrategy::new(local(), remote()).with_default_ttl(default_ttl),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryDocumentStore, MemoryKeyValueStore};
    use fincache_core::{FinancialBundle, Symbol};

    fn stores() -> (Arc<MemoryKeyValueStore>, Arc<MemoryDocumentStore>) {
        (
            Arc::new(MemoryKeyValueStore::new()),
            Arc::new(MemoryDocumentStore::new()),
        )
    }

    #[test]
    fn test_tier_names() {
        let config = CacheConfig::default();
        for (tier, name) in [
            (StorageTier::Local, "local"),
            (StorageTier::Remote, "remote"),
            (StorageTier::Hybrid, "hybrid"),
        ] {
            let (kv, docs) = stores();
            assert_eq!(create_strategy(tier, kv, docs, &config).name(), name);
        }
    }

    #[tokio::test]
    async fn test_local_strategy_uses_configured_size() {
        let (kv, docs) = stores();
        let config = CacheConfig::default().with_max_cache_size(64);
        let strategy = create_strategy(StorageTier::Local, kv, docs, &config);

        let mut bundle = FinancialBundle::new(Symbol::new("ACME"));
        bundle.current_price = Some(1.0);
        assert!(strategy.set("u1", "ACME", &bundle, None).await.is_err());
    }

    #[tokio::test]
    async fn test_default_ttl_is_stamped() {
        let (kv, docs) = stores();
        let config = CacheConfig::default().with_default_ttl(std::time::Duration::from_secs(3600));
        let strategy = create_strategy(StorageTier::Remote, kv, docs, &config);

        let bundle = FinancialBundle::new(Symbol::new("ACME"));
        strategy.set("u1", "ACME", &bundle, None).await.unwrap();
        let meta = strategy.get("u1", "ACME").await.unwrap().metadata;
        assert_eq!(meta.expires_at - meta.cached_at, TimeDelta::hours(1));
    }
}
