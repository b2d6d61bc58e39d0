//! Storage strategy contract shared by every cache tier.
//!
//! This module defines the [`CacheStorageStrategy`] trait implemented by the
//! local, remote and hybrid tiers.

use async_trait::async_trait;
use std::fmt::Debug;

use crate::{
    entry::{CacheEntry, CacheMetadata, CacheStatistics},
    error::Result,
    types::FinancialBundle,
};

/// A cache tier addressed by (owner, symbol).
///
/// Misses are never errors: an absent, unreadable or schema-mismatched entry is
/// reported as `None`, `false` or `0`. Store failures are logged inside the
/// implementation and converted to those same defaults. Only [`set`](Self::set)
/// reports failure, because a caller may need to know a write did not land.
///
/// Implementations must never return an entry belonging to a different owner.
#[async_trait]
pub trait CacheStorageStrategy: Send + Sync + Debug {
    /// Short name used in logs ("local", "remote", "hybrid").
    fn name(&self) -> &str;

    /// Reads the entry for a symbol.
    async fn get(&self, owner: &str, symbol: &str) -> Option<CacheEntry>;

    /// Writes an entry, returning the new entry id.
    ///
    /// When `metadata` is `None` the tier stamps default metadata.
    async fn set(
        &self,
        owner: &str,
        symbol: &str,
        data: &FinancialBundle,
        metadata: Option<CacheMetadata>,
    ) -> Result<String>;

    /// Removes the entry for a symbol. Returns true if something was removed.
    async fn remove(&self, owner: &str, symbol: &str) -> bool;

    /// Removes every entry of an owner, returning how many were removed.
    async fn clear(&self, owner: &str) -> usize;

    /// Recomputes statistics over an owner's entries.
    async fn statistics(&self, owner: &str) -> CacheStatistics;

    /// Returns true if an entry exists and the freshness policy accepts it.
    async fn is_fresh(&self, owner: &str, symbol: &str) -> bool;

    /// Symbols cached for an owner.
    async fn list_keys(&self, owner: &str) -> Vec<String>;

    /// Rebalances entries between tiers, returning how many moved.
    ///
    /// Single-tier strategies have nothing to rebalance.
    async fn optimize_distribution(&self, _owner: &str) -> usize {
        0
    }
}
