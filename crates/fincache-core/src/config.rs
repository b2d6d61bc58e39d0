//! Runtime cache policy.
//!
//! [`CacheConfig`] holds the knobs the orchestrator consults on every
//! operation. It is created with defaults, optionally overridden from the
//! environment, and changed at runtime through [`CacheConfigUpdate`].

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{DataError, Result};

const DAY: u64 = 24 * 60 * 60;

/// Which storage backend the orchestrator uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageTier {
    /// Fast, size-bounded client storage only.
    Local,
    /// Durable remote document store only.
    Remote,
    /// Local tier in front of the remote tier.
    #[default]
    Hybrid,
}

impl StorageTier {
    /// Selects the tier from the enablement flags.
    ///
    /// With neither tier enabled the local tier is used.
    #[must_use]
    pub const fn from_flags(enable_local: bool, enable_remote: bool) -> Self {
        match (enable_local, enable_remote) {
            (true, true) => Self::Hybrid,
            (false, true) => Self::Remote,
            _ => Self::Local,
        }
    }
}

/// Process-wide cache policy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// TTL used before earnings-aware adjustments.
    pub default_ttl: Duration,
    /// Byte limit of the local tier.
    pub max_cache_size: usize,
    /// Use the local tier.
    pub enable_local: bool,
    /// Use the remote tier.
    pub enable_remote: bool,
    /// Request compressed storage. Carried for stores that support it.
    pub enable_compression: bool,
    /// Absolute ceiling on any computed TTL.
    pub max_age: Duration,
    /// Allow background refresh of fresh hits.
    pub enable_background_refresh: bool,
    /// Background refresh only fires for hits expiring within this window.
    pub refresh_ahead: Duration,
    /// Delay before a scheduled background refresh starts.
    pub background_delay: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(90 * DAY),
            max_cache_size: 5 * 1024 * 1024,
            enable_local: true,
            enable_remote: true,
            enable_compression: false,
            max_age: Duration::from_secs(120 * DAY),
            enable_background_refresh: true,
            refresh_ahead: Duration::from_secs(7 * DAY),
            background_delay: Duration::from_millis(100),
        }
    }
}

impl CacheConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default TTL.
    #[must_use]
    pub const fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Sets the local tier byte limit.
    #[must_use]
    pub const fn with_max_cache_size(mut self, bytes: usize) -> Self {
        self.max_cache_size = bytes;
        self
    }

    /// Sets which tiers are enabled.
    #[must_use]
    pub const fn with_tiers(mut self, enable_local: bool, enable_remote: bool) -> Self {
        self.enable_local = enable_local;
        self.enable_remote = enable_remote;
        self
    }

    /// Enables or disables background refresh.
    #[must_use]
    pub const fn with_background_refresh(mut self, enabled: bool) -> Self {
        self.enable_background_refresh = enabled;
        self
    }

    /// The tier selected by the enablement flags.
    #[must_use]
    pub const fn tier(&self) -> StorageTier {
        StorageTier::from_flags(self.enable_local, self.enable_remote)
    }

    /// Checks the TTL bounds.
    ///
    /// # Errors
    /// Returns [`DataError::InvalidParameter`] for a zero TTL or max age, or a
    /// default TTL above the max age.
    pub fn validate(&self) -> Result<()> {
        if self.default_ttl.is_zero() {
            return Err(DataError::InvalidParameter(
                "default_ttl must be positive".to_string(),
            ));
        }
        if self.max_age.is_zero() {
            return Err(DataError::InvalidParameter(
                "max_age must be positive".to_string(),
            ));
        }
        if self.default_ttl > self.max_age {
            return Err(DataError::InvalidParameter(format!(
                "default_ttl ({}s) exceeds max_age ({}s)",
                self.default_ttl.as_secs(),
                self.max_age.as_secs()
            )));
        }
        Ok(())
    }

    /// Builds a configuration from `FINCACHE_*` environment variables on top
    /// of the defaults.
    ///
    /// Recognised variables: `FINCACHE_DEFAULT_TTL_DAYS`, `FINCACHE_MAX_AGE_DAYS`,
    /// `FINCACHE_MAX_CACHE_SIZE`, `FINCACHE_ENABLE_LOCAL`, `FINCACHE_ENABLE_REMOTE`,
    /// `FINCACHE_ENABLE_COMPRESSION`, `FINCACHE_BACKGROUND_REFRESH`.
    ///
    /// # Errors
    /// Returns [`DataError::InvalidParameter`] if a variable does not parse or
    /// the result fails [`validate`](Self::validate).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
            value
                .trim()
                .parse()
                .map_err(|_| DataError::InvalidParameter(format!("{key}={value}")))
        }

        let mut config = Self::default();
        if let Some(v) = lookup("FINCACHE_DEFAULT_TTL_DAYS") {
            config.default_ttl = Duration::from_secs(parse::<u64>("FINCACHE_DEFAULT_TTL_DAYS", &v)? * DAY);
        }
        if let Some(v) = lookup("FINCACHE_MAX_AGE_DAYS") {
            config.max_age = Duration::from_secs(parse::<u64>("FINCACHE_MAX_AGE_DAYS", &v)? * DAY);
        }
        if let Some(v) = lookup("FINCACHE_MAX_CACHE_SIZE") {
            config.max_cache_size = parse("FINCACHE_MAX_CACHE_SIZE", &v)?;
        }
        if let Some(v) = lookup("FINCACHE_ENABLE_LOCAL") {
            config.enable_local = parse("FINCACHE_ENABLE_LOCAL", &v)?;
        }
        if let Some(v) = lookup("FINCACHE_ENABLE_REMOTE") {
            config.enable_remote = parse("FINCACHE_ENABLE_REMOTE", &v)?;
        }
        if let Some(v) = lookup("FINCACHE_ENABLE_COMPRESSION") {
            config.enable_compression = parse("FINCACHE_ENABLE_COMPRESSION", &v)?;
        }
        if let Some(v) = lookup("FINCACHE_BACKGROUND_REFRESH") {
            config.enable_background_refresh = parse("FINCACHE_BACKGROUND_REFRESH", &v)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Merges a partial update, returning the merged configuration.
    #[must_use]
    pub fn merged(&self, update: &CacheConfigUpdate) -> Self {
        let mut next = self.clone();
        if let Some(v) = update.default_ttl {
            next.default_ttl = v;
        }
        if let Some(v) = update.max_cache_size {
            next.max_cache_size = v;
        }
        if let Some(v) = update.enable_local {
            next.enable_local = v;
        }
        if let Some(v) = update.enable_remote {
            next.enable_remote = v;
        }
        if let Some(v) = update.enable_compression {
            next.enable_compression = v;
        }
        if let Some(v) = update.max_age {
            next.max_age = v;
        }
        if let Some(v) = update.enable_background_refresh {
            next.enable_background_refresh = v;
        }
        if let Some(v) = update.refresh_ahead {
            next.refresh_ahead = v;
        }
        if let Some(v) = update.background_delay {
            next.background_delay = v;
        }
        next
    }
}

/// Partial [`CacheConfig`]; `None` fields keep their current value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfigUpdate {
    /// New default TTL.
    pub default_ttl: Option<Duration>,
    /// New local tier byte limit.
    pub max_cache_size: Option<usize>,
    /// Enable or disable the local tier.
    pub enable_local: Option<bool>,
    /// Enable or disable the remote tier.
    pub enable_remote: Option<bool>,
    /// Compression flag.
    pub enable_compression: Option<bool>,
    /// New absolute TTL ceiling.
    pub max_age: Option<Duration>,
    /// Background refresh toggle.
    pub enable_background_refresh: Option<bool>,
    /// New refresh-ahead window.
    pub refresh_ahead: Option<Duration>,
    /// New background refresh delay.
    pub background_delay: Option<Duration>,
}

impl CacheConfigUpdate {
    /// Returns true if the update changes which tier is active or how the
    /// local tier is bounded.
    #[must_use]
    pub const fn affects_storage(&self) -> bool {
        self.enable_local.is_some() || self.enable_remote.is_some() || self.max_cache_size.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_is_valid_hybrid() {
        let config = CacheConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tier(), StorageTier::Hybrid);
    }

    #[test]
    fn test_tier_from_flags() {
        assert_eq!(StorageTier::from_flags(true, false), StorageTier::Local);
        assert_eq!(StorageTier::from_flags(false, true), StorageTier::Remote);
        assert_eq!(StorageTier::from_flags(false, false), StorageTier::Local);
    }

    #[test]
    fn test_validate_rejects_ttl_above_max_age() {
        let config = CacheConfig::default().with_default_ttl(Duration::from_secs(200 * DAY));
        assert!(matches!(
            config.validate(),
            Err(DataError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_merged_only_touches_set_fields() {
        let base = CacheConfig::default();
        let update = CacheConfigUpdate {
            enable_remote: Some(false),
            ..Default::default()
        };
        let merged = base.merged(&update);
        assert!(!merged.enable_remote);
        assert_eq!(merged.default_ttl, base.default_ttl);
        assert_eq!(merged.tier(), StorageTier::Local);
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("FINCACHE_DEFAULT_TTL_DAYS", "30"),
            ("FINCACHE_ENABLE_REMOTE", "false"),
        ]
        .into_iter()
        .collect();
        let config = CacheConfig::from_lookup(|k| vars.get(k).map(|v| (*v).to_string())).unwrap();
        assert_eq!(config.default_ttl, Duration::from_secs(30 * DAY));
        assert_eq!(config.tier(), StorageTier::Local);

        let bad = CacheConfig::from_lookup(|k| {
            (k == "FINCACHE_MAX_CACHE_SIZE").then(|| "lots".to_string())
        });
        assert!(bad.is_err());
    }
}
