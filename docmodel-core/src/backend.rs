//! Storage backend abstraction.
//!
//! A backend is a database-scoped document store. Every operation names the
//! collection it acts on; collections are created lazily on first write.
//!
//! # Traits
//!
//! - [`StoreBackend`]: implemented by concrete stores (in-memory, MongoDB); object
//!   safe, so connections share backends as `Arc<dyn StoreBackend>`
//! - [`StoreBackendBuilder`]: factory trait for creating backend instances
//!
//! The mapper never retries, batches or caches backend calls: each query set
//! evaluation and each save is exactly one call into this trait.

use std::{collections::BTreeMap, fmt::Debug};

use async_trait::async_trait;
use bson::{Bson, Document};
use futures::stream::BoxStream;

use crate::{
    error::DocumentStoreResult,
    query::{Expr, Query, SortDirection},
};

/// A lazily consumed sequence of raw documents.
pub type DocumentStream = BoxStream<'static, DocumentStoreResult<Document>>;

/// Options for single-document updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    /// Insert a new document when nothing matches the filter.
    pub upsert: bool,
    /// Wait for the store to acknowledge the write.
    pub acknowledged: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self { upsert: false, acknowledged: true }
    }
}

/// Result of a single-document update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateOutcome {
    pub matched: u64,
    pub modified: u64,
    /// Identity of the document the update matched, when one did.
    pub matched_id: Option<Bson>,
    /// Identity of the inserted document when an upsert inserted one.
    pub upserted_id: Option<Bson>,
}

/// Live description of one index of a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexInfo {
    /// Indexed (field, direction) pairs, in index order.
    pub key: Vec<(String, SortDirection)>,
    pub unique: bool,
}

impl IndexInfo {
    /// Reads an index key document such as `{"titles": -1, "val": 1}`.
    pub fn from_keys(keys: &Document, unique: bool) -> Self {
        Self {
            key: keys
                .iter()
                .map(|(field, direction)| (field.clone(), SortDirection::from_bson(direction)))
                .collect(),
            unique,
        }
    }

    /// The conventional name for an index over `keys`, e.g. `titles_-1_val_1`.
    pub fn default_name(keys: &[(String, SortDirection)]) -> String {
        keys.iter()
            .map(|(field, direction)| format!("{}_{}", field, direction.as_i32()))
            .collect::<Vec<_>>()
            .join("_")
    }
}

/// Abstract interface for document storage backends.
///
/// # Thread Safety
///
/// All implementations must be thread-safe and support concurrent access from
/// multiple async tasks. Ordering between concurrent writers is whatever the
/// implementation provides; single-document writes are expected to be atomic.
///
/// # Error Handling
///
/// Store failures are reported as
/// [`DocumentStoreError::Backend`](crate::error::DocumentStoreError::Backend).
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Finds documents matching `query`, applying its sort, offset and limit.
    ///
    /// The returned stream owns everything it needs and can outlive `self`.
    async fn find_documents(&self, query: Query, collection: &str) -> DocumentStoreResult<DocumentStream>;

    /// Counts documents matching `filter`.
    async fn count_documents(&self, filter: Option<Expr>, collection: &str) -> DocumentStoreResult<u64>;

    /// Inserts one document and returns its identity (`_id`).
    ///
    /// A document without an `_id` gets a fresh `ObjectId`. The identity is
    /// known even when `acknowledged` is false.
    async fn insert_document(
        &self,
        document: Document,
        collection: &str,
        acknowledged: bool,
    ) -> DocumentStoreResult<Bson>;

    /// Updates the first document matching `filter`.
    ///
    /// When `options.acknowledged` is set, the outcome names the document
    /// actually written: `matched_id` for an updated document, `upserted_id`
    /// for an inserted one.
    ///
    /// An `update` whose keys are operators (`$set`, `$unset`) is applied as a
    /// partial update; any other document replaces the matched document, keeping
    /// its `_id`.
    async fn update_document(
        &self,
        filter: Option<Expr>,
        update: Document,
        collection: &str,
        options: WriteOptions,
    ) -> DocumentStoreResult<UpdateOutcome>;

    /// Returns the indexes of a collection keyed by name.
    ///
    /// A collection that does not exist has no indexes.
    async fn index_information(&self, collection: &str) -> DocumentStoreResult<BTreeMap<String, IndexInfo>>;

    /// Creates (or confirms) an index and returns its name.
    async fn create_index(
        &self,
        collection: &str,
        keys: Vec<(String, SortDirection)>,
        unique: bool,
        name: Option<String>,
    ) -> DocumentStoreResult<String>;

    /// Lists the names of all collections in the store.
    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>>;

    /// Drops a collection and all its documents. Dropping a missing collection is not an error.
    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()>;

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// Backends are shared behind an `Arc`, so shutdown takes `&self`; the
    /// backend must not be used afterwards.
    async fn shutdown(&self) -> DocumentStoreResult<()> {
        Ok(())
    }
}

#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}
