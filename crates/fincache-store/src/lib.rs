#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/fincache/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Cache tiers and the policies they share.
//!
//! This crate provides implementations of the [`CacheStorageStrategy`] trait from `fincache-core`:
//!
//! - [`LocalStorageStrategy`] - Size-bounded tier over a [`KeyValueStore`](fincache_core::KeyValueStore)
//! - [`RemoteStorageStrategy`] - Durable tier over a [`DocumentStore`](fincache_core::DocumentStore)
//! - [`HybridStorageStrategy`] - Local tier in front of the remote tier
//!
//! and the stores they run on:
//!
//! - [`MemoryKeyValueStore`], [`MemoryDocumentStore`] - In-memory stores
//! - [`SqliteKeyValueStore`], [`SqliteDocumentStore`] - Persistent stores (requires `sqlite` feature)

/// Filing-date pattern analysis.
pub mod earnings;
/// Strategy construction by tier.
pub mod factory;
/// Earnings-aware staleness rules.
pub mod freshness;
/// Two-tier strategy.
pub mod hybrid;
/// Local tier.
pub mod local;
/// In-memory stores.
pub mod memory;
/// Remote tier.
pub mod remote;
/// Statistics aggregation.
pub mod stats;

/// SQLite-backed stores.
#[cfg(feature = "sqlite")]
pub mod sqlite;

// Re-export the trait for convenience
pub use fincache_core::CacheStorageStrategy;

pub use earnings::EarningsAnalyzer;
pub use factory::create_strategy;
pub use freshness::{is_entry_stale, is_stale, is_stale_at};
pub use hybrid::HybridStorageStrategy;
pub use local::LocalStorageStrategy;
pub use memory::{MemoryDocumentStore, MemoryKeyValueStore};
pub use remote::RemoteStorageStrategy;

#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteDocumentStore, SqliteKeyValueStore};
