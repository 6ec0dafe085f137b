//! Index descriptors.
//!
//! An [`Index`] describes an index an entity type wants on its collection. Two
//! descriptors are equal when they cover the same (field, direction) pairs with the
//! same uniqueness; the name and the order the keys were given in do not matter.
//! Descriptors are totally ordered by their canonical string form, which makes the
//! declared and the live index sets of a collection directly comparable after
//! sorting.
//!
//! ```ignore
//! use docmodel::index::Index;
//! use docmodel::query::SortDirection;
//!
//! let by_slug = Index::new("slug").unique();
//! let compound = Index::with_keys([("titles", SortDirection::Desc), ("val", SortDirection::Asc)]);
//! assert_eq!(compound, Index::parse("val,-titles"));
//! ```

use std::{
    cmp::Ordering,
    collections::BTreeSet,
    fmt,
    hash::{Hash, Hasher},
};

use tracing::debug;

use crate::{
    backend::IndexInfo,
    collection::Collection,
    error::DocumentStoreResult,
    ordering::parse_order_key,
    query::SortDirection,
};

#[derive(Debug, Clone)]
pub struct Index {
    keys: Vec<(String, SortDirection)>,
    unique: bool,
    name: Option<String>,
}

impl Index {
    /// An ascending, non-unique index on a single field.
    pub fn new(field: impl Into<String>) -> Self {
        Self::with_keys([(field.into(), SortDirection::Asc)])
    }

    /// An index over explicit (field, direction) pairs.
    ///
    /// Declaration order is kept for index creation; a field given twice keeps
    /// its first direction.
    pub fn with_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = (S, SortDirection)>,
        S: Into<String>,
    {
        let mut unique_keys: Vec<(String, SortDirection)> = Vec::new();

        for (field, direction) in keys {
            let field = field.into();
            if !unique_keys.iter().any(|(existing, _)| *existing == field) {
                unique_keys.push((field, direction));
            }
        }

        Self {
            keys: unique_keys,
            unique: false,
            name: None,
        }
    }

    /// Parses comma separated ordering keys, e.g. `"-titles,val"`.
    pub fn parse(spec: &str) -> Self {
        Self::with_keys(
            spec.split(',')
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(parse_order_key),
        )
    }

    /// Rebuilds a descriptor from a collection's live index information.
    pub fn from_info(name: impl Into<String>, info: &IndexInfo) -> Self {
        Self {
            unique: info.unique,
            name: Some(name.into()),
            ..Self::with_keys(info.key.iter().cloned())
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn keys(&self) -> &[(String, SortDirection)] {
        &self.keys
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The key set, independent of declaration order.
    pub fn canonical_keys(&self) -> BTreeSet<(&str, SortDirection)> {
        self.keys
            .iter()
            .map(|(field, direction)| (field.as_str(), *direction))
            .collect()
    }

    /// Keys sorted by field, with readable directions.
    pub fn descriptive_keys(&self) -> Vec<(&str, &'static str)> {
        self.canonical_keys()
            .into_iter()
            .map(|(field, direction)| (field, direction.describe()))
            .collect()
    }

    /// Creates this index on `collection`.
    ///
    /// Returns the name the store gave the index. Store failures are returned
    /// unchanged.
    pub async fn create_for_collection(&self, collection: &Collection) -> DocumentStoreResult<String> {
        debug!(collection = collection.name(), index = %self, "creating index");

        collection
            .create_index(self.keys.clone(), self.unique, self.name.clone())
            .await
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys = self
            .descriptive_keys()
            .into_iter()
            .map(|(field, direction)| format!("({field}, {direction})"))
            .collect::<Vec<_>>()
            .join(", ");

        write!(f, "<Index: [{keys}]")?;
        if self.unique {
            write!(f, " | UNIQUE")?;
        }
        write!(f, ">")
    }
}

impl PartialEq for Index {
    fn eq(&self, other: &Self) -> bool {
        self.unique == other.unique && self.canonical_keys() == other.canonical_keys()
    }
}

impl Eq for Index {}

impl Hash for Index {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical_keys().hash(state);
        self.unique.hash(state);
    }
}

impl PartialOrd for Index {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Index {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_string().cmp(&other.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{Bson, doc};
    use std::collections::BTreeMap;

    #[test]
    fn test_single_field_defaults() {
        let index = Index::new("title");
        assert_eq!(index.keys(), [("title".to_string(), SortDirection::Asc)]);
        assert!(!index.is_unique());
        assert_eq!(index.name(), None);
    }

    #[test]
    fn test_equality_ignores_name_and_key_order() {
        let a = Index::with_keys([("ID", SortDirection::Asc), ("title", SortDirection::Desc)]).named("first");
        let b = Index::with_keys([("title", SortDirection::Desc), ("ID", SortDirection::Asc)]).named("second");
        assert_eq!(a, b);
        assert_eq!(a.cmp(&b), Ordering::Equal);
    }

    #[test]
    fn test_uniqueness_and_direction_matter() {
        assert_ne!(Index::new("val"), Index::new("val").unique());
        assert_ne!(Index::new("val"), Index::parse("-val"));
    }

    #[test]
    fn test_parse_ordering_notation() {
        assert_eq!(
            Index::parse("-titles, val"),
            Index::with_keys([("titles", SortDirection::Desc), ("val", SortDirection::Asc)]),
        );
    }

    #[test]
    fn test_display_is_canonical() {
        let index = Index::parse("val,-titles").unique();
        assert_eq!(index.to_string(), "<Index: [(titles, Descending), (val, Ascending)] | UNIQUE>");
    }

    #[test]
    fn test_rebuild_from_index_information() {
        let live = BTreeMap::from([
            ("_id_".to_string(), IndexInfo::from_keys(&doc! { "_id": 1 }, false)),
            ("titles_-1".to_string(), IndexInfo::from_keys(&doc! { "titles": -1 }, false)),
            ("titles_-1_val_1".to_string(), IndexInfo::from_keys(&doc! { "titles": -1, "val": 1 }, false)),
            ("titles_1".to_string(), IndexInfo::from_keys(&doc! { "titles": 1 }, false)),
            ("val_1".to_string(), IndexInfo::from_keys(&doc! { "val": Bson::Int64(1) }, true)),
        ]);

        let mut found = live
            .iter()
            .map(|(name, info)| Index::from_info(name.clone(), info))
            .collect::<Vec<_>>();
        found.sort();

        let mut expected = vec![
            Index::new("titles"),
            Index::new("_id"),
            Index::new("val").unique(),
            Index::with_keys([("titles", SortDirection::Desc), ("val", SortDirection::Asc)]),
            Index::with_keys([("titles", SortDirection::Desc)]),
        ];
        expected.sort();

        assert_eq!(found, expected);
        assert_eq!(found[0].name(), Some("_id_"));
    }
}
