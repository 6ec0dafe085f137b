//! Main docmodel crate: a lightweight object-document mapper.
//!
//! This crate is the primary entry point for users of docmodel. It re-exports the
//! core types from the sub-crates, the `Entity` derive macro and the available
//! storage backends.
//!
//! # Features
//!
//! - **Entity types** - Declare collections, connection aliases and indexes with `#[derive(Entity)]`
//! - **Lazy query sets** - Chain `filter`, `order_by` and `slice` without touching the store
//! - **Django-style lookups** - `year__gte`, `slug__in`, `title__icontains`, ...
//! - **Multiple backends** - In-memory storage and MongoDB (behind the `mongodb` feature)
//!
//! # Quick Start
//!
//! ```ignore
//! use docmodel::prelude::*;
//!
//! #[derive(Entity)]
//! #[entity(collection = "albums", unique_index = "slug")]
//! pub struct Album;
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let settings = Settings::from_json_str(r#"{
//!         "databases": { "default": { "engine": "memory", "name": "music" } }
//!     }"#)?;
//!     let connections = docmodel::connect(&settings).await?;
//!
//!     let albums = register::<Album>(&connections).await?;
//!     albums.create(doc! { "slug": "reign-in-blood", "year": 1986 }).await?;
//!     albums.create(doc! { "slug": "rust-in-peace", "year": 1990 }).await?;
//!
//!     let nineties = albums.filter(doc! { "year__gte": 1990 }).fetch().await?;
//!     println!("{nineties:?}");
//!
//!     connections.shutdown().await
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing
//! - [`mongodb`] - MongoDB backend (requires `mongodb` feature)

pub mod prelude;

pub use docmodel_core::{
    backend, collection, connection, document, error, index, lookup, manager, native, options, ordering, query,
    queryset, registration, settings,
};
pub use docmodel_macros::Entity;

// Re-export BSON types for convenience
pub use bson;

use tracing::{debug, warn};

use docmodel_core::{
    backend::StoreBackendBuilder,
    connection::Connections,
    error::DocumentStoreResult,
    settings::{DatabaseSettings, Engine, Settings},
};

/// In-memory storage backend implementations.
pub mod memory {
    pub use docmodel_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docmodel_mongodb::{MongoDbStore, MongoDbStoreBuilder};
}

/// Opens a backend for every configured database.
///
/// Databases whose engine is not a document store are skipped; entity types
/// using their alias fail to register with `ImproperlyConfigured`.
pub async fn connect(settings: &Settings) -> DocumentStoreResult<Connections> {
    let mut connections = Connections::new();

    for (alias, database) in &settings.databases {
        match database.engine {
            Engine::Memory => {
                database.name()?;
                connections.register(alias.clone(), memory::InMemoryStore::builder().build().await?);
            }
            Engine::Mongodb => connect_mongodb(&mut connections, alias, database).await?,
            Engine::Unsupported => {
                warn!(alias = %alias, "skipping connection that is not a document store");
                continue;
            }
        }

        debug!(alias = %alias, engine = ?database.engine, "connected");
    }

    Ok(connections)
}

#[cfg(feature = "mongodb")]
async fn connect_mongodb(
    connections: &mut Connections,
    alias: &str,
    database: &DatabaseSettings,
) -> DocumentStoreResult<()> {
    let store = mongodb::MongoDbStoreBuilder::new(&database.connection_uri()?, database.name()?)
        .build()
        .await?;
    connections.register(alias, store);

    Ok(())
}

#[cfg(not(feature = "mongodb"))]
async fn connect_mongodb(
    _connections: &mut Connections,
    alias: &str,
    _database: &DatabaseSettings,
) -> DocumentStoreResult<()> {
    Err(docmodel_core::error::DocumentStoreError::ImproperlyConfigured(format!(
        "The connection '{alias}' uses the mongodb engine, which requires the `mongodb` feature"
    )))
}
