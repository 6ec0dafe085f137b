//! Collection handles.
//!
//! A [`Collection`] pairs a collection name with the backend of the connection it
//! lives on. Handles are cheap to clone and are what managers, query sets and
//! entities talk to; they never own the backend's lifecycle.

use std::{collections::BTreeMap, fmt, sync::Arc};

use bson::{Bson, Document};

use crate::{
    backend::{DocumentStream, IndexInfo, StoreBackend, UpdateOutcome, WriteOptions},
    error::DocumentStoreResult,
    query::{Expr, Query, SortDirection},
};

#[derive(Clone)]
pub struct Collection {
    name: String,
    backend: Arc<dyn StoreBackend>,
}

impl Collection {
    pub fn new(name: impl Into<String>, backend: Arc<dyn StoreBackend>) -> Self {
        Self { name: name.into(), backend }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Finds documents matching `query` as a lazily consumed stream.
    pub async fn find(&self, query: Query) -> DocumentStoreResult<DocumentStream> {
        self.backend
            .find_documents(query, &self.name)
            .await
    }

    /// Counts documents matching `filter`.
    pub async fn count(&self, filter: Option<Expr>) -> DocumentStoreResult<u64> {
        self.backend
            .count_documents(filter, &self.name)
            .await
    }

    /// Inserts a document and returns its identity.
    pub async fn insert(&self, document: Document, acknowledged: bool) -> DocumentStoreResult<Bson> {
        self.backend
            .insert_document(document, &self.name, acknowledged)
            .await
    }

    /// Updates (or with `options.upsert`, inserts) a single document.
    pub async fn update(
        &self,
        filter: Option<Expr>,
        update: Document,
        options: WriteOptions,
    ) -> DocumentStoreResult<UpdateOutcome> {
        self.backend
            .update_document(filter, update, &self.name, options)
            .await
    }

    /// Returns the collection's live indexes keyed by name.
    pub async fn index_information(&self) -> DocumentStoreResult<BTreeMap<String, IndexInfo>> {
        self.backend
            .index_information(&self.name)
            .await
    }

    /// Creates an index and returns its name.
    pub async fn create_index(
        &self,
        keys: Vec<(String, SortDirection)>,
        unique: bool,
        name: Option<String>,
    ) -> DocumentStoreResult<String> {
        self.backend
            .create_index(&self.name, keys, unique, name)
            .await
    }

    /// Drops the collection with all its documents and indexes.
    pub async fn drop(&self) -> DocumentStoreResult<()> {
        self.backend.drop_collection(&self.name).await
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("backend", &self.backend)
            .finish()
    }
}
