//! Backend-neutral query representation.
//!
//! A [`Query`] is what a query set hands to a storage backend: an optional filter
//! expression, a list of sort keys and an offset/limit window. Backends either
//! evaluate the [`Expr`] tree directly (the in-memory store) or render it into
//! their own query language through a [`QueryVisitor`] (see [`crate::native`]).
//!
//! Expressions are normally produced by the lookup translator in [`crate::lookup`]
//! from Django-style predicate keys, but they can also be built by hand:
//!
//! ```ignore
//! use docmodel::query::{Filter, Query, Sort, SortDirection};
//!
//! let query = Query {
//!     filter: Some(Filter::gte("year", 1990).and(Filter::eq("genre", "thrash"))),
//!     sort: vec![Sort::new("year", SortDirection::Desc)],
//!     offset: None,
//!     limit: Some(10),
//! };
//! ```

use bson::Bson;

use crate::error::DocumentStoreError;

/// Sort direction for query results and index keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    Desc,
}

impl SortDirection {
    /// The numeric form used by document stores (`1` / `-1`).
    pub fn as_i32(self) -> i32 {
        match self {
            SortDirection::Asc => 1,
            SortDirection::Desc => -1,
        }
    }

    /// Reads a direction back from a stored index key.
    ///
    /// Negative numbers are descending. Anything else, including special index
    /// types such as `"text"`, is treated as ascending.
    pub fn from_bson(value: &Bson) -> Self {
        match value {
            Bson::Int32(n) if *n < 0 => SortDirection::Desc,
            Bson::Int64(n) if *n < 0 => SortDirection::Desc,
            Bson::Double(n) if *n < 0.0 => SortDirection::Desc,
            _ => SortDirection::Asc,
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            SortDirection::Asc => "Ascending",
            SortDirection::Desc => "Descending",
        }
    }
}

/// Sort specification for query results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    /// The field name to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

impl Sort {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self { field: field.into(), direction }
    }
}

/// Field comparison operators for filter expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    /// Equal to (exact match, or membership when the field holds an array).
    Eq,
    /// Field value is one of the values of an array.
    In,
    /// Greater than.
    Gt,
    /// Greater than or equal to.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal to.
    Lte,
    /// Case-sensitive substring match.
    Contains,
    /// Case-insensitive substring match.
    IContains,
}

/// A filter expression for querying documents.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Logical AND of multiple expressions (all must match).
    And(Vec<Expr>),
    /// Field comparison expression.
    Field {
        /// The field name to compare.
        field: String,
        /// The comparison operator.
        op: FieldOp,
        /// The value to compare against.
        value: Bson,
    },
}

impl Expr {
    /// Creates a field comparison expression.
    pub fn field(field: String, op: FieldOp, value: Bson) -> Self {
        Expr::Field { field, op, value }
    }

    /// Combines this expression with another using logical AND.
    ///
    /// If this expression is already an AND, the other expression is appended
    /// to the list. Otherwise, a new AND expression is created.
    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(mut list) => {
                list.push(other);
                Expr::And(list)
            }
            _ => Expr::And(vec![self, other]),
        }
    }
}

/// A structured query for retrieving documents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Optional filter expression to match documents.
    pub filter: Option<Expr>,
    /// Sort keys, applied in order. Empty means natural order.
    pub sort: Vec<Sort>,
    /// Number of documents to skip.
    pub offset: Option<usize>,
    /// Maximum number of documents to return.
    pub limit: Option<usize>,
}

impl Query {
    /// Creates a new empty query with no filters or limits.
    pub fn new() -> Self {
        Query::default()
    }

    /// A query matching the given filter, without ordering or window.
    pub fn filtered(filter: Option<Expr>) -> Self {
        Query { filter, ..Query::default() }
    }
}

/// Helper struct for constructing filter expressions.
pub struct Filter;

impl Filter {
    /// Matches documents where the field equals the specified value.
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Eq, value.into())
    }

    /// Matches documents where the field is one of the given values.
    pub fn is_in(field: impl Into<String>, values: Vec<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::In, Bson::Array(values))
    }

    /// Matches documents where the field is greater than the specified value.
    pub fn gt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gt, value.into())
    }

    /// Matches documents where the field is greater than or equal to the specified value.
    pub fn gte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gte, value.into())
    }

    /// Matches documents where the field is less than the specified value.
    pub fn lt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lt, value.into())
    }

    /// Matches documents where the field is less than or equal to the specified value.
    pub fn lte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lte, value.into())
    }

    /// Matches documents where the string field contains `needle`.
    pub fn contains(field: impl Into<String>, needle: impl Into<String>) -> Expr {
        Expr::field(field.into(), FieldOp::Contains, Bson::String(needle.into()))
    }

    /// Matches documents where the string field contains `needle`, ignoring case.
    pub fn icontains(field: impl Into<String>, needle: impl Into<String>) -> Expr {
        Expr::field(field.into(), FieldOp::IContains, Bson::String(needle.into()))
    }

    /// Combines multiple expressions such that all must match.
    pub fn and(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::And(exprs.into_iter().collect())
    }
}

pub trait QueryVisitor {
    type Output;
    type Error: Into<DocumentStoreError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_field(
        &mut self,
        field: &str,
        op: FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Field { field, op, value } => self.visit_field(field, *op, value),
        }
    }
}
