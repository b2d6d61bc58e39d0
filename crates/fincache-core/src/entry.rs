//! Cache entry, metadata and statistics types.
//!
//! Entries are addressed by a deterministic (owner, symbol) key; the types here
//! carry the freshness and provenance data the storage tiers persist alongside
//! each [`FinancialBundle`].

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::types::FinancialBundle;

/// Schema version written into every entry.
///
/// Entries carrying any other version are treated as misses and purged on read.
pub const CACHE_SCHEMA_VERSION: &str = "1.0.0";

/// Provenance of cached data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    /// Fetched from the upstream data source.
    #[default]
    Api,
    /// Entered by hand.
    Manual,
    /// Derived or estimated.
    Estimated,
}

/// How an earnings date was determined.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMethod {
    /// Inferred from the filing-date history.
    Pattern,
    /// Reported by an external calendar.
    Api,
    /// Set by hand.
    Manual,
    /// No usable dates.
    #[default]
    Unknown,
}

/// Output of the earnings pattern analyzer.
///
/// Derived on every full refresh and embedded into [`CacheMetadata`]; never
/// stored on its own.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EarningsDetectionResult {
    /// Estimated next filing date.
    pub next_earnings_date: Option<NaiveDate>,
    /// Most recent observed filing date.
    pub last_earnings_date: Option<NaiveDate>,
    /// Confidence in the estimate, in `[0, 1]`.
    pub confidence: f64,
    /// How the estimate was produced.
    pub method: DetectionMethod,
    /// Whether a quarterly cadence was detected, when enough data exists to say.
    pub quarterly_pattern: Option<bool>,
}

impl EarningsDetectionResult {
    /// A result carrying no information.
    #[must_use]
    pub fn unknown() -> Self {
        Self::default()
    }

    /// Returns true if a quarterly cadence was detected.
    #[must_use]
    pub fn is_quarterly(&self) -> bool {
        self.quarterly_pattern.unwrap_or(false)
    }
}

/// Freshness and provenance data attached to an entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CacheMetadata {
    /// When the entry was written.
    pub cached_at: DateTime<Utc>,
    /// Hard expiry; past this the entry is unconditionally stale.
    pub expires_at: DateTime<Utc>,
    /// Predicted next filing date.
    pub next_earnings_estimate: Option<DateTime<Utc>>,
    /// Most recent filing date observed in the data.
    pub last_earnings_date: Option<DateTime<Utc>>,
    /// Provenance tag.
    pub data_source: DataSource,
    /// Schema version the entry was written with.
    pub schema_version: String,
}

impl CacheMetadata {
    /// Metadata for an entry written now that expires after `ttl`.
    #[must_use]
    pub fn new(ttl: TimeDelta) -> Self {
        Self::new_at(Utc::now(), ttl)
    }

    /// Metadata for an entry written at `cached_at` that expires after `ttl`.
    ///
    /// Non-positive TTLs are raised to one second so that `expires_at` is always
    /// after `cached_at`.
    #[must_use]
    pub fn new_at(cached_at: DateTime<Utc>, ttl: TimeDelta) -> Self {
        let ttl = ttl.max(TimeDelta::seconds(1));
        Self {
            cached_at,
            expires_at: cached_at + ttl,
            next_earnings_estimate: None,
            last_earnings_date: None,
            data_source: DataSource::Api,
            schema_version: CACHE_SCHEMA_VERSION.to_string(),
        }
    }

    /// Copies the analyzer's dates into the metadata.
    #[must_use]
    pub fn with_earnings(mut self, detection: &EarningsDetectionResult) -> Self {
        self.next_earnings_estimate = detection.next_earnings_date.map(start_of_day);
        self.last_earnings_date = detection.last_earnings_date.map(start_of_day);
        self
    }

    /// Sets the provenance tag.
    #[must_use]
    pub const fn with_data_source(mut self, data_source: DataSource) -> Self {
        self.data_source = data_source;
        self
    }

    /// Age of the entry at `now`.
    #[must_use]
    pub fn age(&self, now: DateTime<Utc>) -> TimeDelta {
        now.signed_duration_since(self.cached_at)
    }

    /// Returns true once `now` is past the hard expiry.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Returns true if the entry was written with the current schema.
    #[must_use]
    pub fn is_current_schema(&self) -> bool {
        self.schema_version == CACHE_SCHEMA_VERSION
    }
}

/// Converts a calendar date to midnight UTC.
#[must_use]
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

/// One cached financial-data record for one (owner, symbol) pair.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Identifier of this write. Not stable across writes.
    pub id: String,
    /// User that owns the cache partition.
    pub owner: String,
    /// Cached symbol.
    pub symbol: String,
    /// The cached bundle.
    pub data: FinancialBundle,
    /// Freshness and provenance data.
    pub metadata: CacheMetadata,
}

impl CacheEntry {
    /// Creates an entry with a fresh random id.
    #[must_use]
    pub fn new(
        owner: impl Into<String>,
        symbol: impl Into<String>,
        data: FinancialBundle,
        metadata: CacheMetadata,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner: owner.into(),
            symbol: symbol.into(),
            data,
            metadata,
        }
    }

    /// Serialized size in bytes, used for quota accounting.
    #[must_use]
    pub fn size_estimate(&self) -> usize {
        serde_json::to_vec(self).map(|v| v.len()).unwrap_or(0)
    }
}

/// Aggregated cache health for one owner.
///
/// Always recomputed from the stored entries; never mutated in place.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStatistics {
    /// Number of entries.
    pub total_entries: usize,
    /// Entries the freshness policy accepts.
    pub fresh_entries: usize,
    /// Entries the freshness policy rejects.
    pub stale_entries: usize,
    /// Approximate serialized size of all entries.
    pub total_size_bytes: usize,
    /// Fraction of entries that are fresh (0 when empty).
    pub hit_ratio: f64,
    /// Mean entry age in days.
    pub average_age_days: f64,
    /// Symbol of the most recently written entry.
    pub newest_entry: Option<String>,
    /// Symbol of the least recently written entry.
    pub oldest_entry: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Symbol;

    #[test]
    fn test_metadata_expiry_after_creation() {
        let now = Utc::now();
        let meta = CacheMetadata::new_at(now, TimeDelta::days(90));
        assert!(meta.expires_at > meta.cached_at);
        assert!(meta.is_current_schema());

        let meta = CacheMetadata::new_at(now, TimeDelta::zero());
        assert!(meta.expires_at > meta.cached_at);
    }

    #[test]
    fn test_metadata_with_earnings() {
        let detection = EarningsDetectionResult {
            next_earnings_date: NaiveDate::from_ymd_opt(2025, 5, 15),
            last_earnings_date: NaiveDate::from_ymd_opt(2024, 11, 1),
            confidence: 0.9,
            method: DetectionMethod::Pattern,
            quarterly_pattern: Some(true),
        };
        let meta = CacheMetadata::new(TimeDelta::days(30)).with_earnings(&detection);
        assert_eq!(
            meta.next_earnings_estimate.map(|d| d.date_naive()),
            NaiveDate::from_ymd_opt(2025, 5, 15)
        );
        assert_eq!(
            meta.last_earnings_date.map(|d| d.date_naive()),
            NaiveDate::from_ymd_opt(2024, 11, 1)
        );
    }

    #[test]
    fn test_entry_ids_are_unique() {
        let data = FinancialBundle::new(Symbol::new("ACME"));
        let meta = CacheMetadata::new(TimeDelta::days(1));
        let a = CacheEntry::new("u1", "ACME", data.clone(), meta.clone());
        let b = CacheEntry::new("u1", "ACME", data, meta);
        assert_ne!(a.id, b.id);
        assert!(a.size_estimate() > 0);
    }

    #[test]
    fn test_data_source_serializes_lowercase() {
        let json = serde_json::to_string(&DataSource::Estimated).unwrap();
        assert_eq!(json, "\"estimated\"");
    }
}
