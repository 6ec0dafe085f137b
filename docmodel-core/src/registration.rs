//! Entity type registration.

use std::sync::Arc;

use tracing::debug;

use crate::{
    connection::Connections,
    document::EntityType,
    error::DocumentStoreResult,
    manager::Manager,
    options::EntityMeta,
};

/// Registers entity type `E` against `connections` and returns its manager.
///
/// The type's connection alias must resolve, otherwise registration fails with
/// `ImproperlyConfigured`. Declared indexes are created right away unless the
/// type opted out with `auto_ensure_indexes = false`.
pub async fn register<E: EntityType>(connections: &Connections) -> DocumentStoreResult<Manager<E>> {
    let meta = EntityMeta::from_options(E::type_name(), E::options());
    let collection = connections.collection(&meta.using, meta.collection_name.clone())?;

    debug!(
        entity = meta.object_name,
        collection = %meta.collection_name,
        using = %meta.using,
        "registering entity type"
    );

    let manager = Manager::new(Arc::new(meta), collection);

    if manager.meta().auto_ensure_indexes {
        manager.ensure_indexes().await?;
    }

    Ok(manager)
}
