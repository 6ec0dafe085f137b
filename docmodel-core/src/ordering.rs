//! Ordering keys.
//!
//! Query sets are ordered with field names, a leading `-` meaning descending
//! (`"-year"`). [`OrderBy`] accumulates those keys and [`translate_ordering`] turns
//! them into [`Sort`] specifications, keeping the first occurrence of each field.

use bson::{Bson, Document};

use crate::query::{Sort, SortDirection};

/// Prefix marking a descending ordering key.
pub const DESCENDING_PREFIX: char = '-';

/// Splits an ordering key into its field name and direction.
pub fn parse_order_key(key: &str) -> (&str, SortDirection) {
    match key.strip_prefix(DESCENDING_PREFIX) {
        Some(field) => (field, SortDirection::Desc),
        None => (key, SortDirection::Asc),
    }
}

/// Translates ordering keys into sort specifications.
///
/// First-seen order is preserved and a field that appears again is ignored,
/// whatever its direction. Empty input yields an empty list.
pub fn translate_ordering<I, S>(keys: I) -> Vec<Sort>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut sorts: Vec<Sort> = Vec::new();

    for key in keys {
        let (field, direction) = parse_order_key(key.as_ref());

        if !sorts.iter().any(|sort| sort.field == field) {
            sorts.push(Sort::new(field, direction));
        }
    }

    sorts
}

/// Renders sort specifications as a store sort document (`{field: 1 | -1}`).
pub fn sort_document(sorts: &[Sort]) -> Document {
    sorts
        .iter()
        .map(|sort| (sort.field.clone(), Bson::Int32(sort.direction.as_i32())))
        .collect()
}

/// The ordering state of a query set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderBy {
    keys: Vec<String>,
}

impl OrderBy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `key` unless its field is already ordered on.
    pub fn add(&mut self, key: impl Into<String>) {
        let key = key.into();
        let (field, _) = parse_order_key(&key);

        if !self.keys.iter().any(|existing| parse_order_key(existing).0 == field) {
            self.keys.push(key);
        }
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn sorts(&self) -> Vec<Sort> {
        translate_ordering(&self.keys)
    }
}
