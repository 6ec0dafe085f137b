//! Entity types and entity instances.
//!
//! An entity type is a marker type implementing [`EntityType`], normally through
//! `#[derive(Entity)]`. Its instances are [`Entity`] values: a BSON document
//! bound to the type's [`Manager`]. Entities are schemaless; any fields can be
//! stored and the identity lives in the `_id` field once the entity is saved.
//!
//! ```ignore
//! #[derive(Entity)]
//! #[entity(collection = "albums", index = "-year,title")]
//! pub struct Album;
//!
//! let albums = register::<Album>(&connections).await?;
//! let mut album = albums.new_entity(doc! { "title": "Reign in Blood", "year": 1986 });
//! album.save().await?;
//! assert!(album.is_saved());
//! ```

use std::fmt;

use bson::{
    Bson, Document, de::deserialize_from_bson, doc, ser::serialize_to_bson,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

use crate::{
    backend::WriteOptions,
    error::{DocumentStoreError, DocumentStoreResult},
    manager::Manager,
    options::EntityOptions,
    query::Filter,
};

/// Name of the identity field.
pub const ID_FIELD: &str = "_id";

/// Core trait for entity types.
///
/// Implementors are usually unit structs; all state lives in [`Entity`] values.
pub trait EntityType: Send + Sync + 'static {
    /// The type's name, used for default collection and verbose names.
    fn type_name() -> &'static str;

    fn options() -> EntityOptions {
        EntityOptions::default()
    }
}

/// One document of entity type `E`.
pub struct Entity<E: EntityType> {
    data: Document,
    manager: Manager<E>,
}

impl<E: EntityType> Entity<E> {
    pub fn new(manager: Manager<E>, data: Document) -> Self {
        Self { data, manager }
    }

    /// Builds an unsaved entity from any serializable value.
    pub fn from_serializable<T: Serialize>(manager: Manager<E>, value: &T) -> DocumentStoreResult<Self> {
        match serialize_to_bson(value)? {
            Bson::Document(data) => Ok(Self::new(manager, data)),
            other => Err(DocumentStoreError::InvalidDocument(format!(
                "expected a document, got {:?}",
                other.element_type()
            ))),
        }
    }

    pub fn data(&self) -> &Document {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Document {
        &mut self.data
    }

    pub fn into_data(self) -> Document {
        self.data
    }

    pub fn get(&self, field: &str) -> Option<&Bson> {
        self.data.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Bson>) -> &mut Self {
        self.data.insert(field.into(), value.into());
        self
    }

    /// The identity, absent until the entity has been saved.
    pub fn id(&self) -> Option<&Bson> {
        match self.data.get(ID_FIELD) {
            None | Some(Bson::Null) => None,
            Some(id) => Some(id),
        }
    }

    /// Alias of [`Entity::id`].
    pub fn pk(&self) -> Option<&Bson> {
        self.id()
    }

    pub fn is_saved(&self) -> bool {
        self.id().is_some()
    }

    pub fn manager(&self) -> &Manager<E> {
        &self.manager
    }

    /// Saves the entity, waiting for the store to acknowledge the write.
    pub async fn save(&mut self) -> DocumentStoreResult<&mut Self> {
        self.save_with(true).await
    }

    /// Saves the entity.
    ///
    /// An unsaved entity is inserted and gets its `_id` written back. A saved one
    /// has all its other fields `$set` on the stored document with the same
    /// `_id`; fields removed locally stay in the store.
    pub async fn save_with(&mut self, safe: bool) -> DocumentStoreResult<&mut Self> {
        let collection = self.manager.collection();

        match self.id().cloned() {
            None => {
                let mut data = self.data.clone();
                data.remove(ID_FIELD);

                let id = collection.insert(data, safe).await?;
                trace!(collection = collection.name(), %id, "inserted entity");

                self.data.insert(ID_FIELD, id);
            }
            Some(id) => {
                let mut fields = self.data.clone();
                fields.remove(ID_FIELD);

                if fields.is_empty() {
                    return Ok(self);
                }

                let outcome = collection
                    .update(
                        Some(Filter::eq(ID_FIELD, id.clone())),
                        doc! { "$set": fields },
                        WriteOptions { upsert: false, acknowledged: safe },
                    )
                    .await?;
                trace!(collection = collection.name(), %id, matched = outcome.matched, "updated entity");
            }
        }

        Ok(self)
    }

    /// Deserializes the entity's document into `T`.
    pub fn deserialize<T: for<'de> Deserialize<'de>>(&self) -> DocumentStoreResult<T> {
        Ok(deserialize_from_bson(Bson::Document(self.data.clone()))?)
    }

    pub fn to_json(&self) -> DocumentStoreResult<Value> {
        Ok(serde_json::to_value(&self.data)?)
    }
}

impl<E: EntityType> Clone for Entity<E> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            manager: self.manager.clone(),
        }
    }
}

/// Saved entities compare by identity, unsaved ones by content.
impl<E: EntityType> PartialEq for Entity<E> {
    fn eq(&self, other: &Self) -> bool {
        match self.id() {
            Some(id) => other.id() == Some(id),
            None => self.data == other.data,
        }
    }
}

impl<E: EntityType> fmt::Debug for Entity<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}: {}>", E::type_name(), self.data)
    }
}
