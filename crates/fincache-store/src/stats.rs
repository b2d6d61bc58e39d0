//! Statistics aggregation over stored entries.

use chrono::{DateTime, Utc};
use fincache_core::{CacheEntry, CacheStatistics};

use crate::freshness::is_entry_stale_at;

/// Builds statistics from `(entry, serialized size)` pairs.
#[must_use]
pub fn summarize<'a, I>(entries: I, now: DateTime<Utc>) -> CacheStatistics
where
    I: IntoIterator<Item = (&'a CacheEntry, usize)>,
{
    let mut stats = CacheStatistics::default();
    let mut total_age_days = 0.0;
    let mut newest: Option<&CacheEntry> = None;
    let mut oldest: Option<&CacheEntry> = None;

    for (entry, size) in entries {
        stats.total_entries += 1;
        stats.total_size_bytes += size;
        if is_entry_stale_at(&entry.metadata, now) {
            stats.stale_entries += 1;
        } else {
            stats.fresh_entries += 1;
        }
        total_age_days += entry.metadata.age(now).num_seconds() as f64 / 86_400.0;

        if newest.is_none_or(|n| entry.metadata.cached_at > n.metadata.cached_at) {
            newest = Some(entry);
        }
        if oldest.is_none_or(|o| entry.metadata.cached_at < o.metadata.cached_at) {
            oldest = Some(entry);
        }
    }

    if stats.total_entries > 0 {
        let n = stats.total_entries as f64;
        stats.hit_ratio = stats.fresh_entries as f64 / n;
        stats.average_age_days = total_age_days / n;
    }
    stats.newest_entry = newest.map(|e| e.symbol.clone());
    stats.oldest_entry = oldest.map(|e| e.symbol.clone());
    stats
}

/// Combines the statistics of two tiers.
///
/// Counts and sizes are summed. Ratios and ages are averaged over the tiers
/// that hold entries. Entry labels come from `primary` when it has them.
#[must_use]
pub fn combine(primary: &CacheStatistics, secondary: &CacheStatistics) -> CacheStatistics {
    let populated: Vec<&CacheStatistics> = [primary, secondary]
        .into_iter()
        .filter(|s| s.total_entries > 0)
        .collect();
    let mean = |f: fn(&CacheStatistics) -> f64| {
        if populated.is_empty() {
            0.0
        } else {
            populated.iter().map(|s| f(s)).sum::<f64>() / populated.len() as f64
        }
    };

    CacheStatistics {
        total_entries: primary.total_entries + secondary.total_entries,
        fresh_entries: primary.fresh_entries + secondary.fresh_entries,
        stale_entries: primary.stale_entries + secondary.stale_entries,
        total_size_bytes: primary.total_size_bytes + secondary.total_size_bytes,
        hit_ratio: mean(|s| s.hit_ratio),
        average_age_days: mean(|s| s.average_age_days),
        newest_entry: primary
            .newest_entry
            .clone()
            .or_else(|| secondary.newest_entry.clone()),
        oldest_entry: primary
            .oldest_entry
            .clone()
            .or_else(|| secondary.oldest_entry.clone()),
    }
}
