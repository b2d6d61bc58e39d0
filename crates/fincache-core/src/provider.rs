//! Provider traits for fetching financial data.
//!
//! The cache treats the upstream source as opaque: it asks for a symbol's
//! [`FinancialBundle`] and either gets one or an error.

use async_trait::async_trait;
use std::fmt::Debug;

use crate::{
    error::Result,
    types::{FinancialBundle, Symbol},
};

/// Base trait for all data providers.
pub trait DataProvider: Send + Sync + Debug {
    /// Returns the name of this provider (e.g., "Financial Modeling Prep").
    fn name(&self) -> &str;

    /// Returns a description of this provider.
    fn description(&self) -> &str {
        ""
    }
}

/// Provider for fundamental financial data.
#[async_trait]
pub trait FundamentalDataProvider: DataProvider {
    /// Fetches the income, balance and cash flow statements for a symbol along
    /// with its current price and share count.
    ///
    /// Fails with a descriptive error on network or lookup failure.
    async fn fetch_financials(&self, symbol: &Symbol) -> Result<FinancialBundle>;
}
