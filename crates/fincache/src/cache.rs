//! The cache orchestrator.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use fincache_core::{
    CacheConfig, CacheConfigUpdate, CacheEntry, CacheMetadata, CacheStatistics,
    CacheStorageStrategy, DataError, DocumentStore, FinancialBundle, FundamentalDataProvider,
    KeyValueStore, Result, StorageTier, Symbol, validate_key,
};
use fincache_store::{EarningsAnalyzer, create_strategy, is_entry_stale};

use crate::refresh::{InFlight, InFlightGuard, RefreshOptions, in_flight_key};
use crate::ttl::{intelligent_ttl, to_delta};

/// Earnings-aware cache in front of a fundamental data provider.
///
/// Reads are served from the active storage tier while the freshness policy
/// accepts them; otherwise data is fetched from the providers, analyzed for
/// its filing cadence and written back with an earnings-aware expiry.
///
/// The handle is cheap to clone and every clone shares the same tiers,
/// configuration and background refresh bookkeeping.
///
/// # Example
///
/// ```rust,ignore
/// use fincache::{FinancialDataCache, MemoryDocumentStore, MemoryKeyValueStore, RefreshOptions};
/// use std::sync::Arc;
///
/// let cache = FinancialDataCache::new(
///     Arc::new(MyProvider::default()),
///     Arc::new(MemoryKeyValueStore::new()),
///     Arc::new(MemoryDocumentStore::new()),
/// );
///
/// let data = cache.get_company_data("user-1", "AAPL", RefreshOptions::default()).await?;
/// ```
#[derive(Clone, Debug)]
pub struct FinancialDataCache {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    providers: Vec<Arc<dyn FundamentalDataProvider>>,
    local_store: Arc<dyn KeyValueStore>,
    remote_store: Arc<dyn DocumentStore>,
    config: RwLock<CacheConfig>,
    strategy: RwLock<Arc<dyn CacheStorageStrategy>>,
    analyzer: EarningsAnalyzer,
    in_flight: InFlight,
}

/// Builder for [`FinancialDataCache`].
#[derive(Debug)]
pub struct FinancialDataCacheBuilder {
    providers: Vec<Arc<dyn FundamentalDataProvider>>,
    local_store: Arc<dyn KeyValueStore>,
    remote_store: Arc<dyn DocumentStore>,
    config: CacheConfig,
}

impl FinancialDataCacheBuilder {
    /// Use `config` instead of the defaults.
    #[must_use]
    pub fn with_config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a provider tried after the ones already registered.
    #[must_use]
    pub fn with_fallback_provider(mut self, provider: Arc<dyn FundamentalDataProvider>) -> Self {
        debug!(provider = provider.name(), "Registering fallback provider");
        self.providers.push(provider);
        self
    }

    /// Build the cache.
    ///
    /// # Errors
    /// Returns [`DataError::InvalidParameter`] if the configuration is invalid.
    pub fn build(self) -> Result<FinancialDataCache> {
        self.config.validate()?;
        Ok(FinancialDataCache::from_parts(
            self.providers,
            self.local_store,
            self.remote_store,
            self.config,
        ))
    }
}

impl FinancialDataCache {
    /// Create a cache with the default configuration.
    #[must_use]
    pub fn new(
        provider: Arc<dyn FundamentalDataProvider>,
        local_store: Arc<dyn KeyValueStore>,
        remote_store: Arc<dyn DocumentStore>,
    ) -> Self {
        Self::from_parts(
            vec![provider],
            local_store,
            remote_store,
            CacheConfig::default(),
        )
    }

    /// Start building a cache with a custom configuration or fallback providers.
    #[must_use]
    pub fn builder(
        provider: Arc<dyn FundamentalDataProvider>,
        local_store: Arc<dyn KeyValueStore>,
        remote_store: Arc<dyn DocumentStore>,
    ) -> FinancialDataCacheBuilder {
        FinancialDataCacheBuilder {
            providers: vec![provider],
            local_store,
            remote_store,
            config: CacheConfig::default(),
        }
    }

    fn from_parts(
        providers: Vec<Arc<dyn FundamentalDataProvider>>,
        local_store: Arc<dyn KeyValueStore>,
        remote_store: Arc<dyn DocumentStore>,
        config: CacheConfig,
    ) -> Self {
        let strategy = create_strategy(
            config.tier(),
            local_store.clone(),
            remote_store.clone(),
            &config,
        );
        Self {
            inner: Arc::new(Inner {
                providers,
                local_store,
                remote_store,
                config: RwLock::new(config),
                strategy: RwLock::new(strategy),
                analyzer: EarningsAnalyzer::new(),
                in_flight: InFlight::default(),
            }),
        }
    }

    async fn strategy(&self) -> Arc<dyn CacheStorageStrategy> {
        self.inner.strategy.read().await.clone()
    }

    /// Returns financial data for a symbol, from cache when fresh.
    ///
    /// A fresh hit that expires within the refresh-ahead window also schedules
    /// a background refresh, unless disabled in the configuration or by
    /// `options.background == Some(false)`. Stale or missing entries are
    /// fetched and cached before returning. A failed cache write is logged
    /// and the fetched data is still returned.
    ///
    /// # Errors
    /// Returns [`DataError::InvalidParameter`] for an empty owner or symbol, or
    /// the provider's error if the data has to be fetched and every provider
    /// fails.
    #[instrument(skip(self, options))]
    pub async fn get_company_data(
        &self,
        owner: &str,
        symbol: &str,
        options: RefreshOptions,
    ) -> Result<FinancialBundle> {
        validate_key(owner, symbol)?;
        let symbol = Symbol::new(symbol);

        if options.force_refresh {
            debug!("Forced refresh; bypassing cache");
            return self.fetch_and_cache(owner, &symbol).await;
        }

        if let Some(entry) = self.strategy().await.get(owner, symbol.as_str()).await {
            if !is_entry_stale(&entry.metadata) {
                debug!("Serving cached data");
                if self.wants_background_refresh(&entry, &options).await {
                    self.schedule_refresh(owner, &symbol).await;
                }
                return Ok(entry.data);
            }
            debug!(cached_at = %entry.metadata.cached_at, "Cached data is stale");
        }

        self.fetch_and_cache(owner, &symbol).await
    }

    /// Refreshes the cached data for a symbol.
    ///
    /// With `metadata_only`, the earnings metadata of the cached entry is
    /// recomputed without fetching, and its expiry becomes `new_expiry` or a
    /// freshly computed TTL from now. With `background == Some(true)` the
    /// refresh is scheduled and this returns immediately.
    ///
    /// # Errors
    /// Returns [`DataError::InvalidParameter`] for an empty owner or symbol,
    /// [`DataError::Cache`] for a metadata-only refresh with nothing cached,
    /// the provider's error if fetching fails, or the storage error if the
    /// write does not land in any tier.
    #[instrument(skip(self, options))]
    pub async fn refresh_cache(
        &self,
        owner: &str,
        symbol: &str,
        options: RefreshOptions,
    ) -> Result<()> {
        validate_key(owner, symbol)?;
        let symbol = Symbol::new(symbol);

        if options.metadata_only {
            return self.refresh_metadata(owner, &symbol, &options).await;
        }

        if options.background == Some(true) {
            self.schedule_refresh(owner, &symbol).await;
            return Ok(());
        }

        let (_, written) = self.fetch_and_store(owner, &symbol).await?;
        written.map(|_| ())
    }

    async fn refresh_metadata(
        &self,
        owner: &str,
        symbol: &Symbol,
        options: &RefreshOptions,
    ) -> Result<()> {
        let strategy = self.strategy().await;
        let entry = strategy
            .get(owner, symbol.as_str())
            .await
            .ok_or_else(|| DataError::Cache(format!("No cached data for {symbol}")))?;

        let detection = self.inner.analyzer.analyze(&entry.data.filing_dates());
        let now = Utc::now();
        let expires_at = match options.new_expiry {
            Some(expiry) => expiry,
            None => {
                let config = self.config().await;
                now + intelligent_ttl(&config, &detection, &self.inner.analyzer, now)
            }
        };
        let metadata = CacheMetadata {
            expires_at,
            ..entry.metadata
        }
        .with_earnings(&detection);

        strategy
            .set(owner, symbol.as_str(), &entry.data, Some(metadata))
            .await?;
        debug!(%expires_at, "Refreshed cache metadata");
        Ok(())
    }

    async fn wants_background_refresh(&self, entry: &CacheEntry, options: &RefreshOptions) -> bool {
        if options.background == Some(false) {
            return false;
        }
        let config = self.inner.config.read().await;
        config.enable_background_refresh
            && entry.metadata.expires_at - Utc::now() <= to_delta(config.refresh_ahead)
    }

    /// Spawns a detached refresh after the configured delay, unless one is
    /// already running for this key.
    async fn schedule_refresh(&self, owner: &str, symbol: &Symbol) {
        let Some(guard) =
            InFlightGuard::acquire(&self.inner.in_flight, in_flight_key(owner, symbol.as_str()))
        else {
            debug!("Background refresh already in flight");
            return;
        };

        let delay = self.inner.config.read().await.background_delay;
        let cache = self.clone();
        let owner = owner.to_string();
        let symbol = symbol.clone();
        tokio::spawn(async move {
            let _guard = guard;
            tokio::time::sleep(delay).await;
            match cache.fetch_and_cache(&owner, &symbol).await {
                Ok(_) => debug!(owner = %owner, symbol = %symbol, "Background refresh complete"),
                Err(e) => {
                    warn!(owner = %owner, symbol = %symbol, error = %e, "Background refresh failed");
                }
            }
        });
    }

    async fn fetch_and_cache(&self, owner: &str, symbol: &Symbol) -> Result<FinancialBundle> {
        let (data, written) = self.fetch_and_store(owner, symbol).await?;
        if let Err(e) = written {
            warn!(symbol = %symbol, error = %e, "Failed to cache fetched data");
        }
        Ok(data)
    }

    /// Fetches, analyzes and writes. The outer error is the fetch failure,
    /// the inner result is the write outcome.
    async fn fetch_and_store(
        &self,
        owner: &str,
        symbol: &Symbol,
    ) -> Result<(FinancialBundle, Result<String>)> {
        let data = self.fetch(symbol).await?;

        let detection = self.inner.analyzer.analyze(&data.filing_dates());
        let config = self.config().await;
        let now = Utc::now();
        let ttl = intelligent_ttl(&config, &detection, &self.inner.analyzer, now);
        debug!(
            ttl_days = ttl.num_days(),
            confidence = detection.confidence,
            quarterly = detection.is_quarterly(),
            "Computed cache TTL"
        );

        let metadata = CacheMetadata::new_at(now, ttl).with_earnings(&detection);
        let written = self
            .strategy()
            .await
            .set(owner, symbol.as_str(), &data, Some(metadata))
            .await;
        Ok((data, written))
    }

    /// Tries each provider in order until one succeeds.
    async fn fetch(&self, symbol: &Symbol) -> Result<FinancialBundle> {
        let mut last_error = None;
        for provider in &self.inner.providers {
            debug!(provider = provider.name(), symbol = %symbol, "Fetching financials");
            match provider.fetch_financials(symbol).await {
                Ok(data) => return Ok(data),
                Err(e) => {
                    warn!(
                        provider = provider.name(),
                        error = %e,
                        "Provider failed, trying next"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            DataError::ProviderNotConfigured("No fundamental providers registered".to_string())
        }))
    }

    /// Returns the cached entry for a symbol without fetching or checking
    /// freshness.
    pub async fn cached_entry(&self, owner: &str, symbol: &str) -> Option<CacheEntry> {
        self.strategy().await.get(owner, symbol).await
    }

    /// Statistics for an owner's cached entries. Empty for an empty owner.
    #[instrument(skip(self))]
    pub async fn cache_statistics(&self, owner: &str) -> CacheStatistics {
        if owner.trim().is_empty() {
            warn!("Statistics requested without an owner");
            return CacheStatistics::default();
        }
        self.strategy().await.statistics(owner).await
    }

    /// Removes one symbol, or every symbol when `symbol` is `None`.
    /// Returns how many entries were removed.
    #[instrument(skip(self))]
    pub async fn clear_cache(&self, owner: &str, symbol: Option<&str>) -> usize {
        if owner.trim().is_empty() {
            warn!("Clear requested without an owner");
            return 0;
        }
        let strategy = self.strategy().await;
        match symbol {
            Some(symbol) => usize::from(strategy.remove(owner, symbol).await),
            None => strategy.clear(owner).await,
        }
    }

    /// Symbols cached for an owner, sorted.
    #[instrument(skip(self))]
    pub async fn cached_symbols(&self, owner: &str) -> Vec<String> {
        if owner.trim().is_empty() {
            warn!("Symbol listing requested without an owner");
            return Vec::new();
        }
        self.strategy().await.list_keys(owner).await
    }

    /// Returns true if a fresh entry is cached for the symbol.
    pub async fn is_cached(&self, owner: &str, symbol: &str) -> bool {
        self.strategy().await.is_fresh(owner, symbol).await
    }

    /// A snapshot of the current configuration.
    pub async fn config(&self) -> CacheConfig {
        self.inner.config.read().await.clone()
    }

    /// Merges a partial configuration update.
    ///
    /// The storage strategy is rebuilt when the update touches the tier flags
    /// or the local size limit. Data already cached is neither migrated nor
    /// invalidated.
    ///
    /// # Errors
    /// Returns [`DataError::InvalidParameter`] if the merged configuration is
    /// invalid; the current configuration is then left unchanged.
    #[instrument(skip(self))]
    pub async fn update_config(&self, update: CacheConfigUpdate) -> Result<()> {
        let mut config = self.inner.config.write().await;
        let merged = config.merged(&update);
        merged.validate()?;

        if update.affects_storage() {
            let strategy = create_strategy(
                merged.tier(),
                self.inner.local_store.clone(),
                self.inner.remote_store.clone(),
                &merged,
            );
            debug!(tier = strategy.name(), "Switched storage strategy");
            *self.inner.strategy.write().await = strategy;
        }

        *config = merged;
        Ok(())
    }

    /// Moves aged entries from the local to the remote tier when both are
    /// active. Returns how many entries moved.
    #[instrument(skip(self))]
    pub async fn optimize_distribution(&self, owner: &str) -> usize {
        if owner.trim().is_empty() {
            return 0;
        }
        self.strategy().await.optimize_distribution(owner).await
    }

    /// The tier selected by the current configuration.
    pub async fn active_tier(&self) -> StorageTier {
        self.inner.config.read().await.tier()
    }
}
