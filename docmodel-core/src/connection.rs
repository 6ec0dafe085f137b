//! Connection registry.
//!
//! [`Connections`] maps aliases (`"default"`, `"analytics"`, ...) to shared store
//! backends. Entity types name the alias they live on and resolve their
//! collection handle through it when they are registered.

use std::{collections::BTreeMap, sync::Arc};

use tracing::{debug, info};

use crate::{
    backend::StoreBackend,
    collection::Collection,
    error::{DocumentStoreError, DocumentStoreResult},
};

/// The alias used by entity types that do not name one.
pub const DEFAULT_CONNECTION: &str = "default";

const SYSTEM_COLLECTION_PREFIX: &str = "system.";

/// Whether a collection may be dropped by test clean-up.
///
/// Only collections starting with `prefix` qualify, and never the store's own
/// `system.` collections.
pub fn can_drop_collection(name: &str, prefix: &str) -> bool {
    name.starts_with(prefix) && !name.starts_with(SYSTEM_COLLECTION_PREFIX)
}

#[derive(Debug, Clone, Default)]
pub struct Connections {
    backends: BTreeMap<String, Arc<dyn StoreBackend>>,
}

impl Connections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `backend` under `alias`, replacing any previous registration.
    pub fn register(&mut self, alias: impl Into<String>, backend: impl StoreBackend + 'static) {
        self.register_shared(alias, Arc::new(backend));
    }

    pub fn register_shared(&mut self, alias: impl Into<String>, backend: Arc<dyn StoreBackend>) {
        let alias = alias.into();
        debug!(alias = %alias, ?backend, "registering connection");
        self.backends.insert(alias, backend);
    }

    pub fn with_backend(mut self, alias: impl Into<String>, backend: impl StoreBackend + 'static) -> Self {
        self.register(alias, backend);
        self
    }

    /// Resolves an alias to its backend.
    pub fn resolve(&self, alias: &str) -> DocumentStoreResult<Arc<dyn StoreBackend>> {
        self.backends
            .get(alias)
            .cloned()
            .ok_or_else(|| {
                DocumentStoreError::ImproperlyConfigured(format!(
                    "The connection '{alias}' doesn't exist or is not a document store connection"
                ))
            })
    }

    /// A handle to collection `name` on the connection named `alias`.
    pub fn collection(&self, alias: &str, name: impl Into<String>) -> DocumentStoreResult<Collection> {
        Ok(Collection::new(name, self.resolve(alias)?))
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.backends.keys().map(String::as_str)
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.backends.contains_key(alias)
    }

    /// Drops every collection that [`can_drop_collection`] allows, on every connection.
    ///
    /// Returns the dropped collection names.
    pub async fn clear_all_collections(&self, prefix: &str) -> DocumentStoreResult<Vec<String>> {
        let mut dropped = Vec::new();

        for (alias, backend) in &self.backends {
            for name in backend.list_collections().await? {
                if !can_drop_collection(&name, prefix) {
                    continue;
                }

                backend.drop_collection(&name).await?;
                debug!(alias = %alias, collection = %name, "dropped collection");
                dropped.push(name);
            }
        }

        info!(prefix, count = dropped.len(), "cleared collections");

        Ok(dropped)
    }

    /// Shuts down every registered backend.
    pub async fn shutdown(self) -> DocumentStoreResult<()> {
        for (alias, backend) in self.backends {
            debug!(alias = %alias, "shutting down connection");
            backend.shutdown().await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_prefixed_collections_can_be_dropped() {
        assert!(!can_drop_collection("foobar", "test"));
        assert!(!can_drop_collection("foo.bar", "test"));
        assert!(can_drop_collection("test_foobar", "test"));
        assert!(can_drop_collection("test.foo", "test"));
    }

    #[test]
    fn test_system_collections_are_never_dropped() {
        assert!(!can_drop_collection("system.indexes", "system"));
        assert!(can_drop_collection("systemic", "system"));
    }

    #[test]
    fn test_unknown_alias_is_improperly_configured() {
        let connections = Connections::new();

        assert!(matches!(
            connections.resolve("default"),
            Err(DocumentStoreError::ImproperlyConfigured(_)),
        ));
        assert_eq!(connections.aliases().count(), 0);
    }
}
