//! Earnings-aware TTL computation.

use chrono::{DateTime, TimeDelta, Utc};
use fincache_core::{CacheConfig, EarningsDetectionResult, entry::start_of_day};
use fincache_store::{EarningsAnalyzer, freshness::ABSOLUTE_MAX_AGE_DAYS};
use std::time::Duration;

/// Estimates at or below this confidence never shorten the TTL.
const ESTIMATE_CONFIDENCE: f64 = 0.7;
/// Quarterly patterns above this confidence extend the TTL.
const PATTERN_CONFIDENCE: f64 = 0.5;
/// TTL cap while inside an earnings season.
const EARNINGS_SEASON_TTL_DAYS: i64 = 14;
/// Shortest TTL an upcoming estimate can shrink to.
const MIN_TTL_DAYS: i64 = 7;

pub(crate) fn to_delta(d: Duration) -> TimeDelta {
    TimeDelta::from_std(d).unwrap_or_else(|_| TimeDelta::days(ABSOLUTE_MAX_AGE_DAYS))
}

/// Computes the TTL for data written at `now`.
///
/// Starts from the configured default, expires ahead of a confident upcoming
/// estimate, extends for a confident quarterly cadence, caps at 14 days
/// during earnings season and never exceeds `max_age`.
pub(crate) fn intelligent_ttl(
    config: &CacheConfig,
    detection: &EarningsDetectionResult,
    analyzer: &EarningsAnalyzer,
    now: DateTime<Utc>,
) -> TimeDelta {
    let max_age = to_delta(config.max_age);
    let mut ttl = to_delta(config.default_ttl);

    let upcoming = detection
        .next_earnings_date
        .map(start_of_day)
        .filter(|next| detection.confidence > ESTIMATE_CONFIDENCE && *next > now);
    if let Some(next) = upcoming {
        let remaining = next - now;
        let buffer = TimeDelta::seconds(remaining.num_seconds() / 10)
            .clamp(TimeDelta::days(1), TimeDelta::days(MIN_TTL_DAYS));
        ttl = ttl.min((remaining - buffer).max(TimeDelta::days(MIN_TTL_DAYS)));
    }

    if detection.is_quarterly() && detection.confidence > PATTERN_CONFIDENCE {
        ttl = (ttl * 6 / 5).min(max_age);
    }

    if analyzer.is_earnings_season(now.date_naive()) {
        ttl = ttl.min(TimeDelta::days(EARNINGS_SEASON_TTL_DAYS));
    }

    ttl.min(max_age)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use fincache_core::DetectionMethod;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        start_of_day(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    fn detection(next: Option<(i32, u32, u32)>, confidence: f64, quarterly: bool) -> EarningsDetectionResult {
        EarningsDetectionResult {
            next_earnings_date: next.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
            last_earnings_date: None,
            confidence,
            method: DetectionMethod::Pattern,
            quarterly_pattern: Some(quarterly),
        }
    }

    // 62 days past the Q3 close, outside earnings season.
    fn quiet() -> DateTime<Utc> {
        at(2024, 12, 1)
    }

    #[test]
    fn test_low_confidence_keeps_default() {
        let ttl = intelligent_ttl(
            &CacheConfig::default(),
            &detection(Some((2025, 2, 14)), 0.4, false),
            &EarningsAnalyzer,
            quiet(),
        );
        assert_eq!(ttl, TimeDelta::days(90));
    }

    #[test]
    fn test_expires_before_confident_estimate() {
        // 75 days out: buffer caps at 7 days.
        let ttl = intelligent_ttl(
            &CacheConfig::default(),
            &detection(Some((2025, 2, 14)), 0.9, false),
            &EarningsAnalyzer,
            quiet(),
        );
        assert_eq!(ttl, TimeDelta::days(68));
    }

    #[test]
    fn test_near_estimate_floors_at_seven_days() {
        let ttl = intelligent_ttl(
            &CacheConfig::default(),
            &detection(Some((2024, 12, 5)), 0.9, false),
            &EarningsAnalyzer,
            quiet(),
        );
        assert_eq!(ttl, TimeDelta::days(7));
    }

    #[test]
    fn test_past_estimate_is_ignored() {
        let ttl = intelligent_ttl(
            &CacheConfig::default(),
            &detection(Some((2024, 11, 1)), 0.9, false),
            &EarningsAnalyzer,
            quiet(),
        );
        assert_eq!(ttl, TimeDelta::days(90));
    }

    #[test]
    fn test_quarterly_pattern_extends() {
        let ttl = intelligent_ttl(
            &CacheConfig::default(),
            &detection(Some((2025, 2, 14)), 0.9, true),
            &EarningsAnalyzer,
            quiet(),
        );
        assert_eq!(ttl, TimeDelta::days(68) * 6 / 5);

        let ttl = intelligent_ttl(
            &CacheConfig::default(),
            &detection(None, 0.6, true),
            &EarningsAnalyzer,
            quiet(),
        );
        assert_eq!(ttl, TimeDelta::days(108));
    }

    #[test]
    fn test_extension_is_capped_by_max_age() {
        let config = CacheConfig::default().with_default_ttl(Duration::from_secs(120 * 86_400));
        let ttl = intelligent_ttl(&config, &detection(None, 0.8, true), &EarningsAnalyzer, quiet());
        assert_eq!(ttl, TimeDelta::days(120));
    }

    #[test]
    fn test_earnings_season_caps_ttl() {
        // 20 days after the Q4 close.
        let ttl = intelligent_ttl(
            &CacheConfig::default(),
            &detection(None, 0.9, true),
            &EarningsAnalyzer,
            at(2025, 1, 20),
        );
        assert_eq!(ttl, TimeDelta::days(14));
    }
}
