//! In-memory storage implementation for document stores.
//!
//! Collections keep their documents in insertion order, which is also the
//! natural order of unsorted queries. Every collection has the implicit `_id_`
//! index; further indexes are recorded so they can be reported back and, when
//! unique, enforced on every write.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use async_trait::async_trait;
use bson::{Bson, Document, oid::ObjectId};
use futures::{StreamExt, stream};
use mea::rwlock::RwLock;
use tracing::trace;

use docmodel_core::{
    backend::{DocumentStream, IndexInfo, StoreBackend, StoreBackendBuilder, UpdateOutcome, WriteOptions},
    document::ID_FIELD,
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, Query, SortDirection},
};

use crate::{
    evaluator::{Matcher, compare_for_sort, lookup_path},
    update::{apply_operators, is_operator_update, replacement, upsert_seed},
};

/// Name of the implicit identity index.
pub const ID_INDEX: &str = "_id_";

#[derive(Debug, Clone)]
struct MemoryCollection {
    documents: Vec<Document>,
    indexes: BTreeMap<String, IndexInfo>,
}

impl MemoryCollection {
    fn new() -> Self {
        Self {
            documents: Vec::new(),
            indexes: BTreeMap::from([(
                ID_INDEX.to_string(),
                IndexInfo {
                    key: vec![(ID_FIELD.to_string(), SortDirection::Asc)],
                    unique: false,
                },
            )]),
        }
    }

    fn position(&self, matcher: &Matcher<'_>) -> DocumentStoreResult<Option<usize>> {
        for (position, document) in self.documents.iter().enumerate() {
            if matcher.matches(document)? {
                return Ok(Some(position));
            }
        }

        Ok(None)
    }

    /// Rejects `candidate` if it collides with another document on `_id` or on
    /// a unique index. `replacing` is the position the candidate will take.
    fn check_unique(&self, candidate: &Document, replacing: Option<usize>, collection: &str) -> DocumentStoreResult<()> {
        let others = self
            .documents
            .iter()
            .enumerate()
            .filter(|(position, _)| Some(*position) != replacing)
            .map(|(_, document)| document);

        for other in others {
            if other.get(ID_FIELD) == candidate.get(ID_FIELD) {
                return Err(duplicate_key(collection, ID_INDEX));
            }

            for (name, info) in self.indexes.iter().filter(|(_, info)| info.unique) {
                if index_key(other, info) == index_key(candidate, info) {
                    return Err(duplicate_key(collection, name));
                }
            }
        }

        Ok(())
    }
}

fn index_key<'a>(document: &'a Document, info: &IndexInfo) -> Vec<Option<&'a Bson>> {
    info.key
        .iter()
        .map(|(field, _)| lookup_path(document, field).filter(|value| !matches!(value, Bson::Null)))
        .collect()
}

fn duplicate_key(collection: &str, index: &str) -> DocumentStoreError {
    DocumentStoreError::Backend(format!("duplicate key error collection: {collection} index: {index}"))
}

type StoreMap = HashMap<String, MemoryCollection>;

/// Thread-safe in-memory document storage backend.
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, so
/// clones share the same data. Queries scan every document of a collection;
/// indexes only constrain writes.
///
/// # Example
///
/// ```ignore
/// use docmodel_memory::InMemoryStore;
/// use docmodel::backend::StoreBackend;
/// use bson::doc;
///
/// let store = InMemoryStore::new();
/// let id = store.insert_document(doc! { "name": "Alice" }, "users", true).await?;
/// assert_eq!(store.count_documents(None, "users").await?, 1);
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// collection name -> collection
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn find_documents(&self, query: Query, collection: &str) -> DocumentStoreResult<DocumentStream> {
        let matcher = Matcher::new(query.filter.as_ref())?;

        let store = self.store.read().await;
        let Some(memory_collection) = store.get(collection) else {
            return Ok(stream::empty().boxed());
        };

        let mut documents = Vec::new();
        for document in &memory_collection.documents {
            if matcher.matches(document)? {
                documents.push(document.clone());
            }
        }
        drop(store);

        // Stable, so ties keep insertion order.
        if !query.sort.is_empty() {
            documents.sort_by(|a, b| {
                query
                    .sort
                    .iter()
                    .map(|sort| {
                        let ordering = compare_for_sort(lookup_path(a, &sort.field), lookup_path(b, &sort.field));
                        match sort.direction {
                            SortDirection::Asc => ordering,
                            SortDirection::Desc => ordering.reverse(),
                        }
                    })
                    .find(|ordering| ordering.is_ne())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }

        let documents = documents
            .into_iter()
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .collect::<Vec<_>>();

        trace!(collection, returned = documents.len(), "in-memory find");

        Ok(stream::iter(documents.into_iter().map(Ok)).boxed())
    }

    async fn count_documents(&self, filter: Option<Expr>, collection: &str) -> DocumentStoreResult<u64> {
        let matcher = Matcher::new(filter.as_ref())?;

        let store = self.store.read().await;
        let Some(memory_collection) = store.get(collection) else {
            return Ok(0);
        };

        let mut count = 0;
        for document in &memory_collection.documents {
            if matcher.matches(document)? {
                count += 1;
            }
        }

        Ok(count)
    }

    async fn insert_document(
        &self,
        mut document: Document,
        collection: &str,
        _acknowledged: bool,
    ) -> DocumentStoreResult<Bson> {
        let id = match document.get(ID_FIELD) {
            Some(id) => id.clone(),
            None => {
                let id = Bson::ObjectId(ObjectId::new());
                document.insert(ID_FIELD, id.clone());
                id
            }
        };

        let mut store = self.store.write().await;
        let memory_collection = store
            .entry(collection.to_string())
            .or_insert_with(MemoryCollection::new);

        memory_collection.check_unique(&document, None, collection)?;
        memory_collection.documents.push(document);

        trace!(collection, %id, "in-memory insert");

        Ok(id)
    }

    async fn update_document(
        &self,
        filter: Option<Expr>,
        update: Document,
        collection: &str,
        options: WriteOptions,
    ) -> DocumentStoreResult<UpdateOutcome> {
        let operators = is_operator_update(&update)?;
        let matcher = Matcher::new(filter.as_ref())?;

        let mut store = self.store.write().await;

        if !options.upsert && !store.contains_key(collection) {
            return Ok(UpdateOutcome::default());
        }

        let memory_collection = store
            .entry(collection.to_string())
            .or_insert_with(MemoryCollection::new);

        if let Some(position) = memory_collection.position(&matcher)? {
            let existing = &memory_collection.documents[position];

            let updated = if operators {
                let mut updated = existing.clone();
                apply_operators(&mut updated, &update)?;
                updated
            } else {
                replacement(existing, &update)?
            };

            let modified = updated != *existing;
            let matched_id = updated.get(ID_FIELD).cloned();
            memory_collection.check_unique(&updated, Some(position), collection)?;
            memory_collection.documents[position] = updated;

            return Ok(UpdateOutcome {
                matched: 1,
                modified: u64::from(modified),
                matched_id,
                upserted_id: None,
            });
        }

        if !options.upsert {
            return Ok(UpdateOutcome::default());
        }

        let mut seed = upsert_seed(filter.as_ref(), &update, operators)?;
        let id = match seed.get(ID_FIELD) {
            Some(id) => id.clone(),
            None => {
                let id = Bson::ObjectId(ObjectId::new());
                let mut with_id = Document::new();
                with_id.insert(ID_FIELD, id.clone());
                for (key, value) in seed {
                    with_id.insert(key, value);
                }
                seed = with_id;
                id
            }
        };

        memory_collection.check_unique(&seed, None, collection)?;
        memory_collection.documents.push(seed);

        trace!(collection, %id, "in-memory upsert inserted");

        Ok(UpdateOutcome {
            upserted_id: Some(id),
            ..UpdateOutcome::default()
        })
    }

    async fn index_information(&self, collection: &str) -> DocumentStoreResult<BTreeMap<String, IndexInfo>> {
        Ok(self
            .store
            .read()
            .await
            .get(collection)
            .map(|memory_collection| memory_collection.indexes.clone())
            .unwrap_or_default())
    }

    async fn create_index(
        &self,
        collection: &str,
        keys: Vec<(String, SortDirection)>,
        unique: bool,
        name: Option<String>,
    ) -> DocumentStoreResult<String> {
        if keys.is_empty() {
            return Err(DocumentStoreError::InvalidDocument("index has no keys".to_string()));
        }

        let name = name.unwrap_or_else(|| IndexInfo::default_name(&keys));
        let info = IndexInfo { key: keys, unique };

        let mut store = self.store.write().await;
        let memory_collection = store
            .entry(collection.to_string())
            .or_insert_with(MemoryCollection::new);

        if let Some((existing_name, _)) = memory_collection
            .indexes
            .iter()
            .find(|(_, existing)| **existing == info)
        {
            return Ok(existing_name.clone());
        }

        if memory_collection.indexes.contains_key(&name) {
            return Err(DocumentStoreError::Backend(format!(
                "index with name {name} already exists with different options"
            )));
        }

        if unique {
            for (position, document) in memory_collection.documents.iter().enumerate() {
                let collides = memory_collection.documents[position + 1..]
                    .iter()
                    .any(|other| index_key(other, &info) == index_key(document, &info));
                if collides {
                    return Err(duplicate_key(collection, &name));
                }
            }
        }

        trace!(collection, index = %name, unique, "in-memory index created");
        memory_collection.indexes.insert(name.clone(), info);

        Ok(name)
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        let mut names = self
            .store
            .read()
            .await
            .keys()
            .cloned()
            .collect::<Vec<_>>();
        names.sort();

        Ok(names)
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.store.write().await.remove(name);

        Ok(())
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
#[derive(Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}
