//! Convenient re-exports of commonly used types from docmodel.
//!
//! ```ignore
//! use docmodel::prelude::*;
//! ```

pub use bson::{Bson, Document, doc, oid::ObjectId};
pub use futures::{StreamExt, TryStreamExt};

pub use docmodel_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    collection::Collection,
    connection::{Connections, can_drop_collection},
    document::{Entity, EntityType},
    error::{DocumentStoreError, DocumentStoreResult},
    index::Index,
    manager::Manager,
    options::{EntityMeta, EntityOptions},
    query::{Expr, Filter, FieldOp, Query, QueryVisitor, Sort, SortDirection},
    queryset::{EntityStream, QuerySet, ValueStream},
    registration::register,
    settings::{DatabaseSettings, Engine, Settings},
};
pub use docmodel_macros::Entity;

pub use crate::connect;
