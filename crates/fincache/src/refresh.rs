//! Refresh options and background refresh bookkeeping.

use chrono::{DateTime, Utc};
use dashmap::DashSet;
use std::sync::Arc;

/// Per-call refresh behaviour.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RefreshOptions {
    /// Skip the cache and fetch from the provider.
    pub force_refresh: bool,
    /// `Some(false)` suppresses background refresh for this call. For
    /// [`refresh_cache`](crate::FinancialDataCache::refresh_cache), `Some(true)`
    /// schedules the refresh instead of awaiting it.
    pub background: Option<bool>,
    /// Recompute earnings metadata from cached data without fetching.
    pub metadata_only: bool,
    /// Expiry to apply in metadata-only mode.
    pub new_expiry: Option<DateTime<Utc>>,
}

impl RefreshOptions {
    /// Options that bypass the cache.
    #[must_use]
    pub fn force() -> Self {
        Self {
            force_refresh: true,
            ..Self::default()
        }
    }

    /// Options for a metadata-only refresh.
    #[must_use]
    pub fn metadata_only(new_expiry: Option<DateTime<Utc>>) -> Self {
        Self {
            metadata_only: true,
            new_expiry,
            ..Self::default()
        }
    }

    /// Sets whether background refresh is allowed.
    #[must_use]
    pub const fn with_background(mut self, background: bool) -> Self {
        self.background = Some(background);
        self
    }
}

/// `(owner, symbol)` pairs with a background refresh currently running.
pub(crate) type InFlight = Arc<DashSet<InFlightKey>>;

pub(crate) type InFlightKey = (String, String);

pub(crate) fn in_flight_key(owner: &str, symbol: &str) -> InFlightKey {
    (owner.to_owned(), symbol.to_owned())
}

/// Holds an in-flight key for the life of one background refresh.
#[derive(Debug)]
pub(crate) struct InFlightGuard {
    set: InFlight,
    key: InFlightKey,
}

impl InFlightGuard {
    /// Claims `key`, or returns `None` if a refresh for it is already running.
    pub(crate) fn acquire(set: &InFlight, key: InFlightKey) -> Option<Self> {
        set.insert(key.clone()).then(|| Self {
            set: Arc::clone(set),
            key,
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set.remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_is_exclusive_and_released_on_drop() {
        let set: InFlight = Arc::default();
        let key = in_flight_key("u1", "ACME");

        let guard = InFlightGuard::acquire(&set, key.clone()).unwrap();
        assert!(InFlightGuard::acquire(&set, key.clone()).is_none());
        assert!(InFlightGuard::acquire(&set, in_flight_key("u2", "ACME")).is_some());

        drop(guard);
        assert!(set.is_empty());
        assert!(InFlightGuard::acquire(&set, key).is_some());
    }

    #[test]
    fn test_separators_in_owner_or_symbol_stay_distinct() {
        let set: InFlight = Arc::default();
        let first = InFlightGuard::acquire(&set, in_flight_key("a:B", "C"));
        let second = InFlightGuard::acquire(&set, in_flight_key("a", "B:C"));
        assert!(first.is_some() && second.is_some());
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_option_constructors() {
        assert!(RefreshOptions::force().force_refresh);
        assert_eq!(RefreshOptions::default().with_background(false).background, Some(false));
        let meta = RefreshOptions::metadata_only(None);
        assert!(meta.metadata_only && !meta.force_refresh);
    }
}
