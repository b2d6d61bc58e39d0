//! Earnings pattern analysis.
//!
//! Infers a company's reporting cadence from its filing-date history, estimates
//! the next filing date and scores how much that estimate can be trusted.

use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use fincache_core::{DetectionMethod, EarningsDetectionResult, PeriodType};
use tracing::trace;

/// Interval bounds, in days, counted as one quarter apart.
const QUARTER_INTERVAL_DAYS: std::ops::RangeInclusive<i64> = 80..=100;
/// Share of intervals that must look quarterly.
const QUARTERLY_SHARE: f64 = 0.75;
/// Confidence reported when only one date is available.
const SINGLE_DATE_CONFIDENCE: f64 = 0.3;
/// Interval standard deviation above which the cadence is irregular.
const IRREGULAR_STD_DEV_DAYS: f64 = 30.0;
/// A latest filing within this many days counts as recent.
const RECENT_FILING_DAYS: i64 = 120;
/// Earnings season spans this many days after a quarter end.
const EARNINGS_SEASON_DAYS: std::ops::RangeInclusive<i64> = 14..=45;

/// Infers reporting cadence and next filing date from filing-date history.
///
/// Unparseable dates are skipped, never fatal. Every method has an `_at`
/// variant taking the evaluation date so results can be pinned in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct EarningsAnalyzer;

impl EarningsAnalyzer {
    /// Creates a new analyzer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Detects the reporting cadence and scores it, evaluated today.
    #[must_use]
    pub fn detect_pattern<S: AsRef<str>>(&self, dates: &[S]) -> EarningsDetectionResult {
        self.detect_pattern_at(dates, Utc::now().date_naive())
    }

    /// Detects the reporting cadence and scores it, evaluated on `today`.
    ///
    /// Every parseable date counts as a data point, repeats included. Callers
    /// wanting one point per filing day pass de-duplicated dates, as
    /// [`FinancialBundle::filing_dates`](fincache_core::FinancialBundle::filing_dates)
    /// returns them.
    #[must_use]
    pub fn detect_pattern_at<S: AsRef<str>>(
        &self,
        dates: &[S],
        today: NaiveDate,
    ) -> EarningsDetectionResult {
        let mut parsed: Vec<NaiveDate> = dates
            .iter()
            .filter_map(|d| parse_date(d.as_ref()))
            .collect();
        parsed.sort_unstable();

        let Some(&last) = parsed.last() else {
            trace!("No parseable filing dates");
            return EarningsDetectionResult::unknown();
        };

        if parsed.len() < 2 {
            return EarningsDetectionResult {
                next_earnings_date: None,
                last_earnings_date: Some(last),
                confidence: SINGLE_DATE_CONFIDENCE,
                method: DetectionMethod::Pattern,
                quarterly_pattern: Some(false),
            };
        }

        let intervals: Vec<i64> = parsed
            .windows(2)
            .map(|w| (w[1] - w[0]).num_days())
            .collect();
        let quarterly_count = intervals
            .iter()
            .filter(|d| QUARTER_INTERVAL_DAYS.contains(d))
            .count();
        let quarterly = quarterly_count as f64 / intervals.len() as f64 >= QUARTERLY_SHARE;

        let mut confidence: f64 = 0.5;
        if parsed.len() >= 4 {
            confidence += 0.2;
        }
        if parsed.len() >= 8 {
            confidence += 0.1;
        }
        if quarterly {
            confidence += 0.2;
        }
        if std_dev(&intervals) > IRREGULAR_STD_DEV_DAYS {
            confidence -= 0.2;
        }
        if (today - last).num_days() <= RECENT_FILING_DAYS {
            confidence += 0.1;
        }

        EarningsDetectionResult {
            next_earnings_date: None,
            last_earnings_date: Some(last),
            confidence: confidence.clamp(0.0, 1.0),
            method: DetectionMethod::Pattern,
            quarterly_pattern: Some(quarterly),
        }
    }

    /// Estimates the next filing date after `last_date`.
    ///
    /// With a confirmed quarterly pattern the estimate is the end of the next
    /// calendar quarter plus the reporting delay (45 days, or 90 after Q4).
    /// Otherwise it is simply three months after the last date. Returns `None`
    /// if `last_date` does not parse.
    #[must_use]
    pub fn estimate_next_date(&self, last_date: &str, pattern_confirmed: bool) -> Option<NaiveDate> {
        let last = parse_date(last_date)?;
        if !pattern_confirmed {
            return last.checked_add_months(Months::new(3));
        }

        let quarter = quarter_of(last);
        let (year, next_quarter) = if quarter == 4 {
            (last.year() + 1, 1)
        } else {
            (last.year(), quarter + 1)
        };
        let delay = PeriodType::closing_quarter(next_quarter).filing_delay_days();
        quarter_end(year, next_quarter).map(|end| end + TimeDelta::days(delay))
    }

    /// Detects the pattern and estimates the next filing date, evaluated today.
    #[must_use]
    pub fn analyze<S: AsRef<str>>(&self, dates: &[S]) -> EarningsDetectionResult {
        self.analyze_at(dates, Utc::now().date_naive())
    }

    /// Detects the pattern and estimates the next filing date, evaluated on `today`.
    #[must_use]
    pub fn analyze_at<S: AsRef<str>>(&self, dates: &[S], today: NaiveDate) -> EarningsDetectionResult {
        let mut result = self.detect_pattern_at(dates, today);
        if let Some(last) = result.last_earnings_date {
            result.next_earnings_date =
                self.estimate_next_date(&last.to_string(), result.is_quarterly());
        }
        result
    }

    /// Returns true if `date` falls in the reporting window that follows the
    /// most recently completed calendar quarter.
    #[must_use]
    pub fn is_earnings_season(&self, date: NaiveDate) -> bool {
        previous_quarter_end(date)
            .is_some_and(|end| EARNINGS_SEASON_DAYS.contains(&(date - end).num_days()))
    }
}

/// Parses `YYYY-MM-DD`, RFC 3339 or `YYYY-MM-DD HH:MM:SS`.
fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|d| d.date_naive()))
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|d| d.date())
        })
}

fn quarter_of(date: NaiveDate) -> u32 {
    (date.month0() / 3) + 1
}

/// Last day of a calendar quarter.
fn quarter_end(year: i32, quarter: u32) -> Option<NaiveDate> {
    if quarter == 4 {
        return NaiveDate::from_ymd_opt(year, 12, 31);
    }
    NaiveDate::from_ymd_opt(year, quarter * 3 + 1, 1).and_then(|d| d.pred_opt())
}

/// End of the last quarter completed before `date`.
fn previous_quarter_end(date: NaiveDate) -> Option<NaiveDate> {
    let first_month = (quarter_of(date) - 1) * 3 + 1;
    NaiveDate::from_ymd_opt(date.year(), first_month, 1).and_then(|d| d.pred_opt())
}

fn std_dev(values: &[i64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<i64>() as f64 / n;
    let variance = values
        .iter()
        .map(|v| (*v as f64 - mean).powi(2))
        .sum::<f64>()
        / n;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_empty_input() {
        let analyzer = EarningsAnalyzer::new();
        let result = analyzer.detect_pattern::<&str>(&[]);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.method, DetectionMethod::Unknown);
        assert!(result.last_earnings_date.is_none());
    }

    #[test]
    fn test_all_invalid_input() {
        let analyzer = EarningsAnalyzer::new();
        let result = analyzer.analyze(&["not a date", "2024-13-45", ""]);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.method, DetectionMethod::Unknown);
        assert!(result.next_earnings_date.is_none());
    }

    #[test]
    fn test_single_date_low_confidence() {
        let analyzer = EarningsAnalyzer::new();
        let result = analyzer.detect_pattern(&["2024-05-01"]);
        assert_eq!(result.confidence, 0.3);
        assert_eq!(result.quarterly_pattern, Some(false));
        assert_eq!(result.last_earnings_date, Some(date(2024, 5, 1)));
    }

    #[test]
    fn test_repeated_dates_count_as_points() {
        let analyzer = EarningsAnalyzer::new();
        let result = analyzer.detect_pattern_at(&["2024-05-01", "2024-05-01"], date(2024, 6, 1));
        assert_eq!(result.quarterly_pattern, Some(false));
        assert_eq!(result.last_earnings_date, Some(date(2024, 5, 1)));
        // base + recent
        assert!((result.confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_quarterly_detection() {
        let analyzer = EarningsAnalyzer::new();
        let dates = ["2024-01-01", "2024-04-01", "2024-07-01", "2024-09-30"];
        let result = analyzer.detect_pattern(&dates);
        assert_eq!(result.quarterly_pattern, Some(true));
        assert!(result.confidence > 0.7);
        assert_eq!(result.last_earnings_date, Some(date(2024, 9, 30)));
    }

    #[test]
    fn test_invalid_dates_are_filtered() {
        let analyzer = EarningsAnalyzer::new();
        let dates = ["2024-01-01", "garbage", "2024-04-01", "2024-07-01", "2024-09-30"];
        let result = analyzer.detect_pattern_at(&dates, date(2024, 10, 15));
        assert_eq!(result.quarterly_pattern, Some(true));
        // base + 4 points + quarterly + recent
        assert!((result.confidence - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_irregular_intervals_lower_confidence() {
        let analyzer = EarningsAnalyzer::new();
        let dates = ["2023-01-01", "2023-01-20", "2023-09-01", "2023-09-15"];
        let result = analyzer.detect_pattern_at(&dates, date(2025, 1, 1));
        assert_eq!(result.quarterly_pattern, Some(false));
        // base + 4 points - irregular
        assert!((result.confidence - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_mixed_formats_parse() {
        let analyzer = EarningsAnalyzer::new();
        let dates = [
            "2024-02-01T16:30:00Z",
            "2024-05-01 09:00:00",
            "2024-08-01",
        ];
        let result = analyzer.detect_pattern(&dates);
        assert_eq!(result.last_earnings_date, Some(date(2024, 8, 1)));
        assert_eq!(result.quarterly_pattern, Some(true));
    }

    #[test]
    fn test_estimate_next_date_confirmed() {
        let analyzer = EarningsAnalyzer::new();
        // Q1 -> Q2 end + 45
        assert_eq!(
            analyzer.estimate_next_date("2024-02-15", true),
            Some(date(2024, 8, 14))
        );
        // Q2 -> Q3 end + 45
        assert_eq!(
            analyzer.estimate_next_date("2024-05-01", true),
            Some(date(2024, 11, 14))
        );
        // Q3 -> Q4 end + 90
        assert_eq!(
            analyzer.estimate_next_date("2024-08-01", true),
            Some(date(2025, 3, 31))
        );
        // Q4 wraps to Q1 of the next year
        assert_eq!(
            analyzer.estimate_next_date("2024-11-01", true),
            Some(date(2025, 5, 15))
        );
    }

    #[test]
    fn test_estimate_next_date_unconfirmed_and_leap_year() {
        let analyzer = EarningsAnalyzer::new();
        assert_eq!(
            analyzer.estimate_next_date("2024-02-29", false),
            Some(date(2024, 5, 29))
        );
        assert_eq!(
            analyzer.estimate_next_date("2023-11-30", false),
            Some(date(2024, 2, 29))
        );
        assert_eq!(analyzer.estimate_next_date("nope", true), None);
    }

    #[test]
    fn test_analyze_composes() {
        let analyzer = EarningsAnalyzer::new();
        let dates = ["2024-02-01", "2024-05-01", "2024-08-01", "2024-11-01"];
        let result = analyzer.analyze(&dates);
        assert_eq!(result.quarterly_pattern, Some(true));
        assert_eq!(result.next_earnings_date, Some(date(2025, 5, 15)));
        assert_eq!(result.method, DetectionMethod::Pattern);
    }

    #[test]
    fn test_is_earnings_season() {
        let analyzer = EarningsAnalyzer::new();
        assert!(analyzer.is_earnings_season(date(2024, 4, 20)));
        assert!(analyzer.is_earnings_season(date(2024, 1, 14)));
        assert!(analyzer.is_earnings_season(date(2024, 11, 14)));
        assert!(!analyzer.is_earnings_season(date(2024, 4, 5)));
        assert!(!analyzer.is_earnings_season(date(2024, 6, 1)));
        assert!(!analyzer.is_earnings_season(date(2024, 12, 20)));
    }
}
