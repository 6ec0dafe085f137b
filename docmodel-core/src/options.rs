//! Entity type options and the metadata derived from them.

use crate::{connection::DEFAULT_CONNECTION, index::Index};

/// Options an entity type declares; everything left unset gets a default
/// when the type is registered.
#[derive(Debug, Clone)]
pub struct EntityOptions {
    pub collection_name: Option<String>,
    pub using: Option<String>,
    pub indexes: Vec<Index>,
    pub verbose_name: Option<String>,
    pub verbose_name_plural: Option<String>,
    pub auto_ensure_indexes: bool,
}

impl Default for EntityOptions {
    fn default() -> Self {
        Self {
            collection_name: None,
            using: None,
            indexes: Vec::new(),
            verbose_name: None,
            verbose_name_plural: None,
            auto_ensure_indexes: true,
        }
    }
}

impl EntityOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collection_name(mut self, name: impl Into<String>) -> Self {
        self.collection_name = Some(name.into());
        self
    }

    pub fn using(mut self, alias: impl Into<String>) -> Self {
        self.using = Some(alias.into());
        self
    }

    pub fn index(mut self, index: Index) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn verbose_name(mut self, name: impl Into<String>) -> Self {
        self.verbose_name = Some(name.into());
        self
    }

    pub fn verbose_name_plural(mut self, name: impl Into<String>) -> Self {
        self.verbose_name_plural = Some(name.into());
        self
    }

    pub fn auto_ensure_indexes(mut self, enabled: bool) -> Self {
        self.auto_ensure_indexes = enabled;
        self
    }
}

/// Resolved metadata of a registered entity type.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityMeta {
    /// Type name, e.g. `MusicAlbum`.
    pub object_name: &'static str,
    /// Lower-cased type name without underscores.
    pub module_name: String,
    pub collection_name: String,
    pub using: String,
    pub indexes: Vec<Index>,
    pub verbose_name: String,
    pub verbose_name_plural: String,
    pub auto_ensure_indexes: bool,
}

impl EntityMeta {
    pub fn from_options(type_name: &'static str, options: EntityOptions) -> Self {
        let verbose_name = options.verbose_name.unwrap_or_else(|| type_name.to_string());
        let verbose_name_plural = options
            .verbose_name_plural
            .unwrap_or_else(|| format!("{verbose_name}s"));

        Self {
            object_name: type_name,
            module_name: type_name.to_lowercase().replace('_', ""),
            collection_name: options
                .collection_name
                .unwrap_or_else(|| type_name.to_lowercase()),
            using: options
                .using
                .unwrap_or_else(|| DEFAULT_CONNECTION.to_string()),
            indexes: options.indexes,
            verbose_name,
            verbose_name_plural,
            auto_ensure_indexes: options.auto_ensure_indexes,
        }
    }
}
