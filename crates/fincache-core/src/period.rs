//! Reporting periods and their filing deadlines.

use serde::{Deserialize, Serialize};

/// Whether a statement covers a fiscal year or a single quarter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodType {
    /// Fiscal year, reported once after the fourth quarter closes.
    #[default]
    Annual,
    /// One of the first three fiscal quarters.
    Quarterly,
}

impl PeriodType {
    /// The report due after calendar quarter `quarter` (1-4) closes.
    #[must_use]
    pub const fn closing_quarter(quarter: u32) -> Self {
        if quarter == 4 { Self::Annual } else { Self::Quarterly }
    }

    /// Typical days between period end and filing.
    #[must_use]
    pub const fn filing_delay_days(self) -> i64 {
        match self {
            Self::Annual => 90,
            Self::Quarterly => 45,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fourth_quarter_is_annual() {
        assert_eq!(PeriodType::closing_quarter(4), PeriodType::Annual);
        assert_eq!(PeriodType::closing_quarter(1).filing_delay_days(), 45);
        assert_eq!(PeriodType::closing_quarter(4).filing_delay_days(), 90);
    }

    #[test]
    fn test_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&PeriodType::Quarterly).unwrap(), "\"quarterly\"");
    }
}
