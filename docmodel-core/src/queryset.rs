//! Lazy, chainable query sets.
//!
//! A [`QuerySet`] describes which entities to fetch: accumulated lookup
//! predicates, ordering keys and an offset/limit window. Building a query set
//! never touches the store; every refinement returns a new query set and leaves
//! the receiver untouched, so partially built query sets can be shared and
//! reused:
//!
//! ```ignore
//! let thrash = albums.filter(doc! { "genre": "thrash" });
//! let recent = thrash.filter(doc! { "year__gte": 1990 }).order_by(["-year"]);
//! let top_five = recent.slice(..5).fetch().await?;
//! let total = thrash.count().await?;
//! ```
//!
//! The store is queried by the terminal operations: [`QuerySet::iter`],
//! [`QuerySet::pluck`] and [`QuerySet::pluck_fields`] (on first poll of the
//! returned stream), [`QuerySet::fetch`], [`QuerySet::nth`], [`QuerySet::count`]
//! and [`QuerySet::get`]. Each of them issues a fresh query; results are never
//! cached.

use std::{
    fmt,
    ops::{Bound, RangeBounds},
};

use bson::{Bson, Document};
use futures::{
    StreamExt, TryStreamExt,
    stream::{self, BoxStream},
};
use tracing::debug;

use crate::{
    backend::DocumentStream,
    document::{Entity, EntityType},
    error::{DocumentStoreError, DocumentStoreResult},
    lookup::translate_filters,
    manager::Manager,
    native,
    ordering::{self, OrderBy},
    query::Query,
};

/// A lazily consumed sequence of entities.
pub type EntityStream<E> = BoxStream<'static, DocumentStoreResult<Entity<E>>>;

/// A lazily consumed sequence of plucked values.
pub type ValueStream<T> = BoxStream<'static, DocumentStoreResult<T>>;

pub struct QuerySet<E: EntityType> {
    manager: Manager<E>,
    filters: Document,
    ordering: OrderBy,
    offset: Option<usize>,
    limit: Option<usize>,
}

impl<E: EntityType> QuerySet<E> {
    /// An unfiltered, unordered query set over the manager's collection.
    pub fn new(manager: Manager<E>) -> Self {
        Self {
            manager,
            filters: Document::new(),
            ordering: OrderBy::new(),
            offset: None,
            limit: None,
        }
    }

    /// Narrows the query set with more lookup predicates.
    ///
    /// Predicates accumulate; a key given again replaces its earlier value.
    pub fn filter(&self, filters: Document) -> Self {
        let mut next = self.clone();
        for (key, value) in filters {
            next.filters.insert(key, value);
        }
        next
    }

    /// Appends ordering keys (`"year"`, `"-year"`).
    ///
    /// A field that is already ordered on keeps its first direction.
    pub fn order_by<I, S>(&self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut next = self.clone();
        for key in keys {
            next.ordering.add(key);
        }
        next
    }

    /// An identical copy of this query set.
    pub fn all(&self) -> Self {
        self.clone()
    }

    /// Restricts the query set to a window of its results.
    ///
    /// Positions are relative to the current window, so slicing twice narrows
    /// the first window: `qs.slice(10..20).slice(2..5)` covers positions 12 to 14
    /// of `qs`.
    pub fn slice<R: RangeBounds<usize>>(&self, range: R) -> Self {
        let start = match range.start_bound() {
            Bound::Included(&start) => start,
            Bound::Excluded(&start) => start.saturating_add(1),
            Bound::Unbounded => 0,
        };
        let end = match range.end_bound() {
            Bound::Included(&end) => Some(end.saturating_add(1)),
            Bound::Excluded(&end) => Some(end),
            Bound::Unbounded => None,
        };

        let window = end.map(|end| end.saturating_sub(start));
        let remaining = self.limit.map(|limit| limit.saturating_sub(start));
        let offset = self.offset.unwrap_or(0).saturating_add(start);

        let mut next = self.clone();
        next.offset = (offset > 0).then_some(offset);
        next.limit = match (window, remaining) {
            (Some(window), Some(remaining)) => Some(window.min(remaining)),
            (window, remaining) => window.or(remaining),
        };
        next
    }

    pub fn filters(&self) -> &Document {
        &self.filters
    }

    pub fn ordering(&self) -> &OrderBy {
        &self.ordering
    }

    pub fn offset(&self) -> Option<usize> {
        self.offset
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn manager(&self) -> &Manager<E> {
        &self.manager
    }

    /// The backend query this query set evaluates to.
    pub fn to_query(&self) -> Query {
        Query {
            filter: translate_filters(&self.filters),
            sort: self.ordering.sorts(),
            offset: self.offset,
            limit: self.limit,
        }
    }

    /// The filter rendered as a store query document.
    pub fn filter_document(&self) -> DocumentStoreResult<Document> {
        native::filter_document(translate_filters(&self.filters).as_ref())
    }

    /// The ordering rendered as a store sort document.
    pub fn sort_document(&self) -> Document {
        ordering::sort_document(&self.ordering.sorts())
    }

    /// Streams the raw documents of this query set.
    ///
    /// The store is queried when the stream is first polled. An empty window
    /// yields nothing without querying at all.
    pub fn documents(&self) -> DocumentStream {
        if self.limit == Some(0) {
            return stream::empty().boxed();
        }

        let collection = self.manager.collection().clone();
        let query = self.to_query();

        stream::once(async move {
            debug!(
                collection = collection.name(),
                filter = ?query.filter,
                sort = ?query.sort,
                offset = ?query.offset,
                limit = ?query.limit,
                "executing query"
            );
            collection.find(query).await
        })
        .try_flatten()
        .boxed()
    }

    /// Streams the entities of this query set.
    pub fn iter(&self) -> EntityStream<E> {
        let manager = self.manager.clone();

        self.documents()
            .map_ok(move |data| Entity::new(manager.clone(), data))
            .boxed()
    }

    /// Evaluates the query set into a list.
    pub async fn fetch(&self) -> DocumentStoreResult<Vec<Entity<E>>> {
        self.iter().try_collect().await
    }

    /// The entity at `index`, relative to the current window.
    pub async fn nth(&self, index: usize) -> DocumentStoreResult<Entity<E>> {
        self.slice(index..=index)
            .iter()
            .try_next()
            .await?
            .ok_or(DocumentStoreError::IndexOutOfRange(index))
    }

    pub async fn first(&self) -> DocumentStoreResult<Entity<E>> {
        self.nth(0).await
    }

    /// Counts the documents matching the filters.
    ///
    /// Ordering and the offset/limit window are ignored.
    pub async fn count(&self) -> DocumentStoreResult<u64> {
        let filter = translate_filters(&self.filters);
        debug!(collection = self.manager.collection().name(), ?filter, "counting documents");

        self.manager.collection().count(filter).await
    }

    /// Streams the value of `field` for every result, `Null` where it is missing.
    ///
    /// Like [`QuerySet::iter`], the store is queried on first poll.
    pub fn pluck(&self, field: &str) -> ValueStream<Bson> {
        let field = field.to_string();

        self.documents()
            .map_ok(move |data| data.get(&field).cloned().unwrap_or(Bson::Null))
            .boxed()
    }

    /// Streams the values of `fields`, in the given order, for every result.
    pub fn pluck_fields(&self, fields: &[&str]) -> ValueStream<Vec<Bson>> {
        let fields = fields.iter().map(|field| field.to_string()).collect::<Vec<_>>();

        self.documents()
            .map_ok(move |data| {
                fields
                    .iter()
                    .map(|field| data.get(field).cloned().unwrap_or(Bson::Null))
                    .collect::<Vec<_>>()
            })
            .boxed()
    }

    /// The single entity matching `filters` on top of this query set.
    ///
    /// Fails with `DoesNotExist` when nothing matches and with
    /// `MultipleItemsReturned` when more than one entity does.
    pub async fn get(&self, filters: Document) -> DocumentStoreResult<Entity<E>> {
        let query_set = self.filter(filters);
        let mut entities = query_set.fetch().await?;

        match entities.len() {
            0 => Err(DocumentStoreError::DoesNotExist {
                entity: E::type_name(),
                filters: query_set.filters,
            }),
            1 => Ok(entities.remove(0)),
            count => Err(DocumentStoreError::MultipleItemsReturned {
                entity: E::type_name(),
                filters: query_set.filters,
                count,
            }),
        }
    }
}

impl<E: EntityType> Clone for QuerySet<E> {
    fn clone(&self) -> Self {
        Self {
            manager: self.manager.clone(),
            filters: self.filters.clone(),
            ordering: self.ordering.clone(),
            offset: self.offset,
            limit: self.limit,
        }
    }
}

impl<E: EntityType> fmt::Debug for QuerySet<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuerySet")
            .field("entity", &E::type_name())
            .field("filters", &self.filters)
            .field("ordering", &self.ordering.keys())
            .field("offset", &self.offset)
            .field("limit", &self.limit)
            .finish()
    }
}
