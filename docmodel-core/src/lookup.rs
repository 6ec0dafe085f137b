//! Django-style lookup keys.
//!
//! Query sets accept predicates as a BSON document whose keys are field names,
//! optionally joined to an operator by a double underscore:
//!
//! ```ignore
//! use bson::doc;
//!
//! let predicates = doc! {
//!     "genre": "thrash",          // equality
//!     "year__gte": 1983,          // relational
//!     "slug__in": ["slayer", "exodus"],
//!     "title__icontains": "metal",
//! };
//! ```
//!
//! [`Lookup::parse`] tokenizes a single key and [`translate_filters`] turns a
//! whole predicate document into an [`Expr`]. Keys with an unrecognised suffix are
//! kept verbatim and compared for equality, so a literal field called
//! `created__by` still works.

use bson::{Bson, Document};

use crate::query::{Expr, FieldOp};

/// Separator between a field name and its lookup operator.
pub const LOOKUP_SEPARATOR: &str = "__";

/// A tokenized predicate key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<'a> {
    Equals(&'a str),
    In(&'a str),
    Gt(&'a str),
    Gte(&'a str),
    Lt(&'a str),
    Lte(&'a str),
    Contains(&'a str),
    IContains(&'a str),
    /// Unrecognised operator; holds the whole key.
    Unknown(&'a str),
}

impl<'a> Lookup<'a> {
    /// Splits `key` on the first separator and classifies the operator.
    pub fn parse(key: &'a str) -> Self {
        let Some((field, operator)) = key.split_once(LOOKUP_SEPARATOR) else {
            return Lookup::Equals(key);
        };

        match operator {
            "in" => Lookup::In(field),
            "gt" => Lookup::Gt(field),
            "gte" => Lookup::Gte(field),
            "lt" => Lookup::Lt(field),
            "lte" => Lookup::Lte(field),
            "contains" => Lookup::Contains(field),
            "icontains" => Lookup::IContains(field),
            _ => Lookup::Unknown(key),
        }
    }

    /// The document field this lookup applies to.
    pub fn field(&self) -> &'a str {
        match *self {
            Lookup::Equals(field)
            | Lookup::In(field)
            | Lookup::Gt(field)
            | Lookup::Gte(field)
            | Lookup::Lt(field)
            | Lookup::Lte(field)
            | Lookup::Contains(field)
            | Lookup::IContains(field)
            | Lookup::Unknown(field) => field,
        }
    }

    /// Builds the filter expression for this lookup against `value`.
    ///
    /// `in` values are materialized into an array (a scalar becomes a one-element
    /// list) and `contains`/`icontains` values into their string form.
    pub fn to_expr(&self, value: &Bson) -> Expr {
        let field = self.field().to_string();

        match self {
            Lookup::Equals(_) | Lookup::Unknown(_) => Expr::field(field, FieldOp::Eq, value.clone()),
            Lookup::In(_) => Expr::field(field, FieldOp::In, Bson::Array(members(value))),
            Lookup::Gt(_) => Expr::field(field, FieldOp::Gt, value.clone()),
            Lookup::Gte(_) => Expr::field(field, FieldOp::Gte, value.clone()),
            Lookup::Lt(_) => Expr::field(field, FieldOp::Lt, value.clone()),
            Lookup::Lte(_) => Expr::field(field, FieldOp::Lte, value.clone()),
            Lookup::Contains(_) => Expr::field(field, FieldOp::Contains, Bson::String(needle(value))),
            Lookup::IContains(_) => Expr::field(field, FieldOp::IContains, Bson::String(needle(value))),
        }
    }
}

/// Translates a predicate document into a filter expression.
///
/// Returns `None` for an empty document. The input is only read, so translating
/// the same predicates twice yields the same expression.
pub fn translate_filters(filters: &Document) -> Option<Expr> {
    let mut exprs = filters
        .iter()
        .map(|(key, value)| Lookup::parse(key).to_expr(value))
        .collect::<Vec<_>>();

    match exprs.len() {
        0 => None,
        1 => exprs.pop(),
        _ => Some(Expr::And(exprs)),
    }
}

fn members(value: &Bson) -> Vec<Bson> {
    match value {
        Bson::Array(values) => values.clone(),
        other => vec![other.clone()],
    }
}

fn needle(value: &Bson) -> String {
    match value {
        Bson::String(s) => s.clone(),
        Bson::Int32(n) => n.to_string(),
        Bson::Int64(n) => n.to_string(),
        Bson::Double(n) => n.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn test_parse_plain_key_is_equality() {
        assert_eq!(Lookup::parse("title"), Lookup::Equals("title"));
    }

    #[test]
    fn test_parse_known_operators() {
        assert_eq!(Lookup::parse("slug__in"), Lookup::In("slug"));
        assert_eq!(Lookup::parse("year__gt"), Lookup::Gt("year"));
        assert_eq!(Lookup::parse("year__gte"), Lookup::Gte("year"));
        assert_eq!(Lookup::parse("year__lt"), Lookup::Lt("year"));
        assert_eq!(Lookup::parse("year__lte"), Lookup::Lte("year"));
        assert_eq!(Lookup::parse("title__contains"), Lookup::Contains("title"));
        assert_eq!(Lookup::parse("title__icontains"), Lookup::IContains("title"));
    }

    #[test]
    fn test_unknown_operator_keeps_key_verbatim() {
        let lookup = Lookup::parse("created__by");
        assert_eq!(lookup, Lookup::Unknown("created__by"));
        assert_eq!(
            lookup.to_expr(&Bson::from("alice")),
            Expr::field("created__by".into(), FieldOp::Eq, Bson::from("alice")),
        );
    }

    #[test]
    fn test_only_first_separator_splits() {
        assert_eq!(Lookup::parse("a__b__gt"), Lookup::Unknown("a__b__gt"));
    }

    #[test]
    fn test_in_scalar_becomes_single_member() {
        assert_eq!(
            Lookup::parse("id__in").to_expr(&Bson::Int32(4)),
            Expr::field("id".into(), FieldOp::In, Bson::Array(vec![Bson::Int32(4)])),
        );
    }

    #[test]
    fn test_contains_value_is_stringified() {
        assert_eq!(
            Lookup::parse("code__contains").to_expr(&Bson::Int32(42)),
            Expr::field("code".into(), FieldOp::Contains, Bson::from("42")),
        );
    }

    #[test]
    fn test_translate_empty_is_none() {
        assert_eq!(translate_filters(&doc! {}), None);
    }

    #[test]
    fn test_translate_single_predicate_is_not_wrapped() {
        assert_eq!(
            translate_filters(&doc! { "tag": "baz" }),
            Some(Expr::field("tag".into(), FieldOp::Eq, Bson::from("baz"))),
        );
    }

    #[test]
    fn test_translate_is_repeatable() {
        let filters = doc! { "slug__in": ["foo", "bar"], "tag": "baz" };
        let first = translate_filters(&filters);
        let second = translate_filters(&filters);

        assert_eq!(first, second);
        assert_eq!(filters, doc! { "slug__in": ["foo", "bar"], "tag": "baz" });
    }
}
