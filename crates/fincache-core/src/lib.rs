#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/fincache/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core traits and types for the earnings-aware financial data cache.
//!
//! This crate provides the foundational abstractions:
//!
//! - [`CacheStorageStrategy`](strategy::CacheStorageStrategy) - Contract every cache tier implements
//! - [`KeyValueStore`](store::KeyValueStore) / [`DocumentStore`](store::DocumentStore) - Stores the tiers sit on
//! - [`FundamentalDataProvider`](provider::FundamentalDataProvider) - Upstream data source
//! - [`CacheEntry`](entry::CacheEntry), [`CacheMetadata`](entry::CacheMetadata) - What gets cached
//! - [`CacheConfig`](config::CacheConfig) - Runtime policy

/// Runtime cache policy.
pub mod config;
/// Cache entry, metadata and statistics types.
pub mod entry;
/// Error types for data and cache operations.
pub mod error;
/// Reporting period definitions.
pub mod period;
/// Provider traits for fetching financial data.
pub mod provider;
/// Store contracts the tiers are built on.
pub mod store;
/// Storage strategy contract.
pub mod strategy;
/// Core data types (Symbol, FinancialStatement, FinancialBundle).
pub mod types;

// Re-export commonly used items at crate root
pub use config::{CacheConfig, CacheConfigUpdate, StorageTier};
pub use entry::{
    CACHE_SCHEMA_VERSION, CacheEntry, CacheMetadata, CacheStatistics, DataSource,
    DetectionMethod, EarningsDetectionResult,
};
pub use error::{DataError, Result, validate_key};
pub use period::PeriodType;
pub use provider::{DataProvider, FundamentalDataProvider};
pub use store::{DocumentStore, KeyValueStore};
pub use strategy::CacheStorageStrategy;
pub use types::{FinancialBundle, FinancialStatement, Symbol};
