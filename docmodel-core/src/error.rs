//! Error types and result types for document mapper operations.
//!
//! Every fallible operation returns [`DocumentStoreResult<T>`]. Failures raised by a
//! storage backend surface as [`DocumentStoreError::Backend`] and are never retried
//! or swallowed by the mapper.

use bson::{Document, error::Error as BsonError};
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when working with entities and query sets.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// An entity type's connection alias does not resolve to a document store,
    /// or the connection settings are incomplete.
    #[error("Improperly configured: {0}")]
    ImproperlyConfigured(String),
    /// `get` matched no document.
    /// The first field is the entity type name, the second the predicates used.
    #[error("{entity} matching query does not exist (filters: {filters})")]
    DoesNotExist {
        entity: &'static str,
        filters: Document,
    },
    /// `get` matched more than one document.
    #[error("More than one {entity} returned for filters: {filters} (got {count})")]
    MultipleItemsReturned {
        entity: &'static str,
        filters: Document,
        count: usize,
    },
    /// A positional lookup on a query set found no item at the requested position.
    #[error("Query set index out of range: {0}")]
    IndexOutOfRange(usize),
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// The document handed to a backend has an invalid structure.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// A specialized `Result` type for document mapper operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}
