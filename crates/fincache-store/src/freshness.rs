//! Earnings-aware freshness policy.
//!
//! An entry is fresh only if it passes every check: hard expiry, the standard
//! or earnings-driven staleness rules, and the absolute age ceiling.

use chrono::{DateTime, TimeDelta, Utc};
use fincache_core::CacheMetadata;

/// Without an earnings estimate, entries older than this are stale.
pub const STANDARD_MAX_AGE_DAYS: i64 = 90;
/// No entry older than this is ever fresh.
pub const ABSOLUTE_MAX_AGE_DAYS: i64 = 120;
/// Days after an estimated earnings date during which a filing may still land.
pub const EARNINGS_GRACE_DAYS: i64 = 7;

/// Returns true if an entry with this metadata must be refetched now.
#[must_use]
pub fn is_stale(
    cached_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    next_earnings_estimate: Option<DateTime<Utc>>,
) -> bool {
    is_stale_at(cached_at, expires_at, next_earnings_estimate, Utc::now())
}

/// Returns true if an entry with this metadata must be refetched at `now`.
#[must_use]
pub fn is_stale_at(
    cached_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    next_earnings_estimate: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    if now > expires_at {
        return true;
    }

    let age = now.signed_duration_since(cached_at);
    if age > TimeDelta::days(ABSOLUTE_MAX_AGE_DAYS) {
        return true;
    }

    let Some(estimate) = next_earnings_estimate else {
        return age > TimeDelta::days(STANDARD_MAX_AGE_DAYS);
    };

    // Earnings have likely been reported since the data was cached.
    if now > estimate && cached_at < estimate {
        return true;
    }

    // Cached during the grace window, before the filing was likely available.
    let grace_end = estimate + TimeDelta::days(EARNINGS_GRACE_DAYS);
    now > grace_end && cached_at < grace_end
}

/// [`is_stale`] applied to an entry's metadata.
#[must_use]
pub fn is_entry_stale(metadata: &CacheMetadata) -> bool {
    is_entry_stale_at(metadata, Utc::now())
}

/// [`is_stale_at`] applied to an entry's metadata.
#[must_use]
pub fn is_entry_stale_at(metadata: &CacheMetadata, now: DateTime<Utc>) -> bool {
    is_stale_at(
        metadata.cached_at,
        metadata.expires_at,
        metadata.next_earnings_estimate,
        now,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_hard_expiry_wins() {
        let cached = at(2024, 5, 1);
        assert!(is_stale_at(cached, at(2024, 5, 10), None, at(2024, 5, 11)));
        assert!(!is_stale_at(cached, at(2024, 5, 10), None, at(2024, 5, 9)));
    }

    #[test]
    fn test_standard_rule_without_estimate() {
        let cached = at(2024, 1, 1);
        let far = at(2030, 1, 1);
        assert!(!is_stale_at(cached, far, None, at(2024, 3, 1)));
        assert!(is_stale_at(cached, far, None, at(2024, 4, 15)));
    }

    #[test]
    fn test_stale_by_earnings() {
        let cached = at(2024, 5, 1);
        let estimate = Some(at(2024, 5, 15));
        assert!(is_stale_at(cached, at(2030, 1, 1), estimate, at(2024, 6, 1)));
        assert!(!is_stale_at(cached, at(2030, 1, 1), estimate, at(2024, 5, 10)));
    }

    #[test]
    fn test_cached_after_estimate_is_fresh() {
        let estimate = Some(at(2024, 5, 15));
        assert!(!is_stale_at(
            at(2024, 6, 1),
            at(2030, 1, 1),
            estimate,
            at(2024, 7, 1)
        ));
    }

    #[test]
    fn test_grace_window() {
        let estimate = Some(at(2024, 5, 15));
        let cached = at(2024, 5, 18);
        assert!(!is_stale_at(cached, at(2030, 1, 1), estimate, at(2024, 5, 20)));
        assert!(is_stale_at(cached, at(2030, 1, 1), estimate, at(2024, 5, 23)));
    }

    #[test]
    fn test_absolute_ceiling_with_future_estimate() {
        let cached = at(2024, 1, 1);
        let estimate = Some(at(2025, 1, 1));
        assert!(!is_stale_at(cached, at(2030, 1, 1), estimate, at(2024, 4, 15)));
        assert!(is_stale_at(cached, at(2030, 1, 1), estimate, at(2024, 5, 15)));
    }

    #[test]
    fn test_entry_wrapper() {
        let meta = CacheMetadata::new_at(at(2024, 5, 1), TimeDelta::days(30));
        assert!(!is_entry_stale_at(&meta, at(2024, 5, 20)));
        assert!(is_entry_stale_at(&meta, at(2024, 6, 5)));
    }

    fn base() -> DateTime<Utc> {
        at(2024, 1, 1)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        /// Once stale, an entry never becomes fresh again as time passes.
        #[test]
        fn prop_staleness_is_monotonic(
            expires_in in 1i64..400,
            estimate in proptest::option::of(-200i64..400),
            t1 in 0i64..400,
            dt in 0i64..400,
        ) {
            let cached = base();
            let expires = cached + TimeDelta::days(expires_in);
            let estimate = estimate.map(|d| cached + TimeDelta::days(d));
            let now1 = cached + TimeDelta::days(t1);
            let now2 = now1 + TimeDelta::days(dt);
            if is_stale_at(cached, expires, estimate, now1) {
                prop_assert!(is_stale_at(cached, expires, estimate, now2));
            }
        }

        /// Nothing older than the ceiling is fresh.
        #[test]
        fn prop_hard_ceiling(
            expires_in in 1i64..1000,
            estimate in proptest::option::of(-500i64..1000),
            extra_hours in 1i64..10_000,
        ) {
            let cached = base();
            let expires = cached + TimeDelta::days(expires_in);
            let estimate = estimate.map(|d| cached + TimeDelta::days(d));
            let now = cached + TimeDelta::days(ABSOLUTE_MAX_AGE_DAYS) + TimeDelta::hours(extra_hours);
            prop_assert!(is_stale_at(cached, expires, estimate, now));
        }
    }
}
