//! Error types for cache and data operations.
//!
//! This module defines [`DataError`] which covers all error cases that can occur
//! when fetching financial data or reading and writing the cache tiers.
//!
//! A cache miss is never an error: absence is reported as `None`, `false` or `0`
//! by the storage strategies. Errors are reserved for failed writes, failed
//! fetches and invalid input.

use thiserror::Error;

/// Errors that can occur during data and cache operations.
#[derive(Error, Debug)]
pub enum DataError {
    /// Network-related errors (connection failures, timeouts, etc.).
    #[error("Network error: {0}")]
    Network(String),

    /// Rate limit exceeded by a provider.
    #[error("Rate limited by {provider}: retry after {retry_after:?}")]
    RateLimited {
        /// The provider that rate limited the request.
        provider: String,
        /// Suggested time to wait before retrying.
        retry_after: Option<std::time::Duration>,
    },

    /// The requested symbol was not found.
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// Error parsing or serializing data.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Error in cache orchestration (e.g. nothing cached to refresh).
    #[error("Cache error: {0}")]
    Cache(String),

    /// An underlying store (key-value or document) failed.
    #[error("Storage error in {tier} tier: {message}")]
    Storage {
        /// The tier that failed ("local", "remote", "hybrid").
        tier: String,
        /// Description of the failure.
        message: String,
    },

    /// A serialized entry exceeds the tier's size limit.
    #[error("Entry too large: {size} bytes exceeds maximum size of {max} bytes")]
    EntryTooLarge {
        /// Serialized size of the rejected entry.
        size: usize,
        /// Configured size limit.
        max: usize,
    },

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The requested provider is not configured.
    #[error("Provider not configured: {0}")]
    ProviderNotConfigured(String),

    /// Any other error.
    #[error("{0}")]
    Other(String),
}

impl DataError {
    /// Creates a [`DataError::Storage`] for the given tier.
    pub fn storage(tier: impl Into<String>, message: impl ToString) -> Self {
        Self::Storage {
            tier: tier.into(),
            message: message.to_string(),
        }
    }
}

impl From<serde_json::Error> for DataError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e.to_string())
    }
}

/// Result type alias using [`DataError`].
pub type Result<T> = std::result::Result<T, DataError>;

/// Fails fast when an owner or symbol is empty.
///
/// # Errors
/// Returns [`DataError::InvalidParameter`] naming the missing field.
pub fn validate_key(owner: &str, symbol: &str) -> Result<()> {
    if owner.trim().is_empty() {
        return Err(DataError::InvalidParameter("owner is required".to_string()));
    }
    if symbol.trim().is_empty() {
        return Err(DataError::InvalidParameter("symbol is required".to_string()));
    }
    Ok(())
}
