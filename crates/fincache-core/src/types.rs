//! Core financial data types.
//!
//! This module defines the data structures the cache stores:
//!
//! - [`Symbol`] - Trading symbol/ticker
//! - [`FinancialStatement`] - One dated financial statement
//! - [`FinancialBundle`] - The statement bundle a data source returns for a symbol

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::period::PeriodType;

/// A trading symbol/ticker.
///
/// Symbols are automatically uppercased on creation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Symbol(String);

impl Symbol {
    /// Creates a new symbol from a string, converting to uppercase.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into().trim().to_uppercase())
    }

    /// Returns the symbol as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Symbol {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// A single dated financial statement.
///
/// The same struct carries income statement, balance sheet or cash flow line
/// items; which ones are populated depends on the list it belongs to in a
/// [`FinancialBundle`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialStatement {
    /// Stock symbol.
    pub symbol: Symbol,
    /// End date of the reporting period.
    pub period_end: NaiveDate,
    /// Type of period (annual or quarterly).
    pub period_type: PeriodType,
    /// Date the statement was filed, when the source reports it.
    pub filing_date: Option<NaiveDate>,
    /// Fiscal year.
    pub fiscal_year: Option<i32>,
    /// Fiscal quarter (1-4).
    pub fiscal_quarter: Option<i32>,

    // Income Statement
    /// Total revenue.
    pub revenue: Option<f64>,
    /// Gross profit.
    pub gross_profit: Option<f64>,
    /// Operating income.
    pub operating_income: Option<f64>,
    /// Net income.
    pub net_income: Option<f64>,
    /// EBITDA.
    pub ebitda: Option<f64>,
    /// Diluted earnings per share.
    pub eps_diluted: Option<f64>,

    // Balance Sheet
    /// Total assets.
    pub total_assets: Option<f64>,
    /// Total liabilities.
    pub total_liabilities: Option<f64>,
    /// Cash and cash equivalents.
    pub cash_and_equivalents: Option<f64>,
    /// Total debt.
    pub total_debt: Option<f64>,
    /// Stockholders' equity.
    pub stockholders_equity: Option<f64>,

    // Cash Flow Statement
    /// Operating cash flow.
    pub operating_cash_flow: Option<f64>,
    /// Capital expenditures.
    pub capital_expenditures: Option<f64>,
    /// Free cash flow.
    pub free_cash_flow: Option<f64>,
}

impl FinancialStatement {
    /// Creates a new financial statement with required fields.
    #[must_use]
    pub fn new(symbol: Symbol, period_end: NaiveDate, period_type: PeriodType) -> Self {
        Self {
            symbol,
            period_end,
            period_type,
            ..Default::default()
        }
    }

    /// Sets the filing date.
    #[must_use]
    pub const fn with_filing_date(mut self, filing_date: NaiveDate) -> Self {
        self.filing_date = Some(filing_date);
        self
    }

    /// The date this statement became public, falling back to the period end.
    #[must_use]
    pub fn filing_date(&self) -> NaiveDate {
        self.filing_date.unwrap_or(self.period_end)
    }
}

/// Everything a data source returns for one symbol.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialBundle {
    /// Stock symbol.
    pub symbol: Symbol,
    /// Income statements, most recent first.
    pub income_statements: Vec<FinancialStatement>,
    /// Balance sheets, most recent first.
    pub balance_sheets: Vec<FinancialStatement>,
    /// Cash flow statements, most recent first.
    pub cash_flow_statements: Vec<FinancialStatement>,
    /// Latest share price.
    pub current_price: Option<f64>,
    /// Shares outstanding.
    pub shares_outstanding: Option<f64>,
}

impl FinancialBundle {
    /// Creates an empty bundle for a symbol.
    #[must_use]
    pub fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            ..Default::default()
        }
    }

    /// Iterates over every statement in the bundle.
    pub fn statements(&self) -> impl Iterator<Item = &FinancialStatement> {
        self.income_statements
            .iter()
            .chain(&self.balance_sheets)
            .chain(&self.cash_flow_statements)
    }

    /// All filing dates found in the bundle as ISO strings, de-duplicated and
    /// sorted ascending.
    #[must_use]
    pub fn filing_dates(&self) -> Vec<String> {
        self.statements()
            .map(FinancialStatement::filing_date)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(|d| d.to_string())
            .collect()
    }

    /// Returns true if the bundle holds no statements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statements().next().is_none()
    }
}
