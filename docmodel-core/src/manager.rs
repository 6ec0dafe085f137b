//! Entity managers.
//!
//! A [`Manager`] is the entry point for everything done with one entity type:
//! it hands out query sets, creates and upserts entities and looks after the
//! collection's indexes. Managers are cheap to clone; all clones share the same
//! metadata and collection handle.

use std::{fmt, marker::PhantomData, sync::Arc};

use bson::{Bson, Document};
use tracing::{debug, info};

use crate::{
    backend::WriteOptions,
    collection::Collection,
    document::{Entity, EntityType, ID_FIELD},
    error::DocumentStoreResult,
    index::Index,
    lookup::translate_filters,
    options::EntityMeta,
    queryset::{QuerySet, ValueStream},
};

pub struct Manager<E: EntityType> {
    meta: Arc<EntityMeta>,
    collection: Collection,
    _entity: PhantomData<fn() -> E>,
}

impl<E: EntityType> Manager<E> {
    pub fn new(meta: Arc<EntityMeta>, collection: Collection) -> Self {
        Self {
            meta,
            collection,
            _entity: PhantomData,
        }
    }

    pub fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    /// The handle of the collection backing this entity type.
    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    /// An unsaved entity holding `data`.
    pub fn new_entity(&self, data: Document) -> Entity<E> {
        Entity::new(self.clone(), data)
    }

    pub fn all(&self) -> QuerySet<E> {
        QuerySet::new(self.clone())
    }

    pub fn filter(&self, filters: Document) -> QuerySet<E> {
        self.all().filter(filters)
    }

    pub async fn get(&self, filters: Document) -> DocumentStoreResult<Entity<E>> {
        self.all().get(filters).await
    }

    pub async fn count(&self, filters: Document) -> DocumentStoreResult<u64> {
        self.filter(filters).count().await
    }

    /// Builds an entity from `data`, saves it and returns it.
    pub async fn create(&self, data: Document) -> DocumentStoreResult<Entity<E>> {
        let mut entity = self.new_entity(data);
        entity.save().await?;
        Ok(entity)
    }

    pub fn pluck(&self, field: &str, filters: Document) -> ValueStream<Bson> {
        self.filter(filters).pluck(field)
    }

    pub fn pluck_fields(&self, fields: &[&str], filters: Document) -> ValueStream<Vec<Bson>> {
        self.filter(filters).pluck_fields(fields)
    }

    /// Replaces the document matching `filters` with `data`, inserting `data` when
    /// nothing matches.
    ///
    /// With `safe`, the write is acknowledged and the returned entity carries the
    /// `_id` the store reports for the inserted or replaced document. Without it
    /// the write is fire and forget and the entity holds `data` as given.
    pub async fn upsert(&self, mut data: Document, safe: bool, filters: Document) -> DocumentStoreResult<Entity<E>> {
        let outcome = self
            .collection
            .update(
                translate_filters(&filters),
                data.clone(),
                WriteOptions { upsert: true, acknowledged: safe },
            )
            .await?;

        debug!(
            collection = self.collection.name(),
            %filters,
            matched = outcome.matched,
            upserted = outcome.upserted_id.is_some(),
            "upserted document"
        );

        if safe {
            if let Some(id) = outcome.upserted_id.or(outcome.matched_id) {
                data.insert(ID_FIELD, id);
            }
        }

        Ok(self.new_entity(data))
    }

    /// The collection's live indexes.
    pub async fn get_indexes(&self) -> DocumentStoreResult<Vec<Index>> {
        Ok(self
            .collection
            .index_information()
            .await?
            .iter()
            .map(|(name, info)| Index::from_info(name.clone(), info))
            .collect())
    }

    /// Declared indexes that do not exist on the collection yet.
    pub async fn missing_indexes(&self) -> DocumentStoreResult<Vec<Index>> {
        let live = self.get_indexes().await?;

        Ok(self
            .meta
            .indexes
            .iter()
            .filter(|index| !live.contains(index))
            .cloned()
            .collect())
    }

    /// Creates every declared index, returning the index names.
    pub async fn ensure_indexes(&self) -> DocumentStoreResult<Vec<String>> {
        let mut names = Vec::with_capacity(self.meta.indexes.len());

        for index in &self.meta.indexes {
            names.push(index.create_for_collection(&self.collection).await?);
        }

        if !names.is_empty() {
            info!(collection = self.collection.name(), indexes = ?names, "ensured indexes");
        }

        Ok(names)
    }
}

impl<E: EntityType> Clone for Manager<E> {
    fn clone(&self) -> Self {
        Self {
            meta: self.meta.clone(),
            collection: self.collection.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: EntityType> fmt::Debug for Manager<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manager")
            .field("entity", &E::type_name())
            .field("collection", &self.collection.name())
            .field("using", &self.meta.using)
            .finish()
    }
}
