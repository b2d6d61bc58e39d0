//! Contracts for the stores the cache tiers are built on.
//!
//! - [`KeyValueStore`] - synchronous, string-keyed, size-bounded client storage
//! - [`DocumentStore`] - asynchronous, owner-partitioned durable collections

use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Debug;

use crate::error::Result;

/// Synchronous string key-value storage scoped to the running client.
///
/// Writes may fail when the store's quota is exhausted.
pub trait KeyValueStore: Send + Sync + Debug {
    /// Reads a value.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Writes a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Deletes a value. Returns true if the key existed.
    fn remove(&self, key: &str) -> Result<bool>;

    /// Lists every key in the store.
    fn keys(&self) -> Result<Vec<String>>;
}

/// Durable per-owner document collections, one document per id.
#[async_trait]
pub trait DocumentStore: Send + Sync + Debug {
    /// Reads one document.
    async fn get(&self, owner: &str, doc_id: &str) -> Result<Option<Value>>;

    /// Writes one document, replacing any previous one.
    async fn set(&self, owner: &str, doc_id: &str, doc: Value) -> Result<()>;

    /// Deletes one document. Returns true if it existed.
    async fn delete(&self, owner: &str, doc_id: &str) -> Result<bool>;

    /// Lists every document in an owner's collection as `(id, document)` pairs.
    async fn list(&self, owner: &str) -> Result<Vec<(String, Value)>>;

    /// Deletes several documents atomically, returning how many existed.
    async fn batch_delete(&self, owner: &str, doc_ids: &[String]) -> Result<usize>;
}
