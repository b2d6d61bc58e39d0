#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/fincache/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Earnings-aware caching of company financial data.
//!
//! This crate re-exports the core types and cache tiers, and provides the
//! [`FinancialDataCache`] orchestrator that decides when cached data can be
//! served and when it must be fetched again.
//!
//! # Features
//!
//! - `sqlite` - SQLite-backed local and remote stores (default)
//!
//! # Example
//!
//! ```rust,ignore
//! use fincache::{CacheConfig, FinancialDataCache, RefreshOptions, SqliteDocumentStore, SqliteKeyValueStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> fincache::Result<()> {
//!     let cache = FinancialDataCache::builder(
//!         Arc::new(MyProvider::default()),
//!         Arc::new(SqliteKeyValueStore::new("local.db")?),
//!         Arc::new(SqliteDocumentStore::new("remote.db")?),
//!     )
//!     .with_config(CacheConfig::from_env()?)
//!     .build()?;
//!
//!     let data = cache.get_company_data("user-1", "AAPL", RefreshOptions::default()).await?;
//!     println!("{} income statements", data.income_statements.len());
//!
//!     Ok(())
//! }
//! ```

// Core types and traits
pub use fincache_core::*;

// Tiers and stores
#[cfg(feature = "sqlite")]
pub use fincache_store::{SqliteDocumentStore, SqliteKeyValueStore};
pub use fincache_store::{
    EarningsAnalyzer, HybridStorageStrategy, LocalStorageStrategy, MemoryDocumentStore,
    MemoryKeyValueStore, RemoteStorageStrategy, create_strategy, is_stale, is_stale_at,
};

mod cache;
mod refresh;
mod ttl;

pub use cache::{FinancialDataCache, FinancialDataCacheBuilder};
pub use refresh::RefreshOptions;
