//! Query expression evaluation for in-memory document filtering.
//!
//! Matching follows document store semantics rather than plain value equality:
//! a missing field equals `null`, an array field matches when any of its
//! elements does, and fields may be addressed with dotted paths
//! (`"band.name"`). Relational operators only compare values of the same kind.

use std::{cmp::Ordering, collections::HashMap};

use bson::{Bson, Document, datetime::DateTime, oid::ObjectId};
use regex::{Regex, RegexBuilder};

use docmodel_core::{
    error::{DocumentStoreError, DocumentStoreResult},
    native::contains_pattern,
    query::{Expr, FieldOp, QueryVisitor},
};

/// Comparable representation of BSON values.
///
/// Integers and floats are normalized to `f64`, so `1` and `1.0` compare equal.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    ObjectId(ObjectId),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
    /// Any other BSON type, compared structurally.
    Other(&'a Bson),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null | Bson::Undefined => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>()
            ),
            other => Comparable::Other(other),
        }
    }
}

impl<'a> Comparable<'a> {
    /// Position of the value's type in the cross-type sort order.
    fn type_rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Number(_) => 1,
            Comparable::String(_) => 2,
            Comparable::Map(_) => 3,
            Comparable::Array(_) => 4,
            Comparable::Other(_) => 5,
            Comparable::ObjectId(_) => 6,
            Comparable::Bool(_) => 7,
            Comparable::DateTime(_) => 8,
        }
    }

    /// Total order used for sorting; values of different types are ordered by type.
    pub(crate) fn sort_cmp(&self, other: &Self) -> Ordering {
        self.partial_cmp(other)
            .unwrap_or_else(|| self.type_rank().cmp(&other.type_rank()))
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            (Comparable::Other(a), Comparable::Other(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Some(Ordering::Equal),
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Resolves a possibly dotted field path.
pub(crate) fn lookup_path<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let mut current = document.get(parts.next()?)?;

    for part in parts {
        current = current.as_document()?.get(part)?;
    }

    Some(current)
}

/// Sort comparison of two field values, a missing field sorting as `null`.
pub(crate) fn compare_for_sort(left: Option<&Bson>, right: Option<&Bson>) -> Ordering {
    let left = left.map(Comparable::from).unwrap_or(Comparable::Null);
    let right = right.map(Comparable::from).unwrap_or(Comparable::Null);

    left.sort_cmp(&right)
}

/// Substring patterns of a filter, compiled once and reused for every
/// document a query scans.
#[derive(Debug, Default)]
pub(crate) struct CompiledPatterns {
    /// (escaped pattern, case insensitive) -> regex
    patterns: HashMap<(String, bool), Regex>,
}

impl CompiledPatterns {
    pub fn compile(expr: &Expr) -> DocumentStoreResult<Self> {
        let mut compiled = Self::default();
        compiled.collect(expr)?;
        Ok(compiled)
    }

    fn collect(&mut self, expr: &Expr) -> DocumentStoreResult<()> {
        match expr {
            Expr::And(exprs) => {
                for expr in exprs {
                    self.collect(expr)?;
                }
            }
            Expr::Field { op: op @ (FieldOp::Contains | FieldOp::IContains), value, .. } => {
                let key = (contains_pattern(value), *op == FieldOp::IContains);
                if !self.patterns.contains_key(&key) {
                    let regex = substring_regex(&key.0, key.1)?;
                    self.patterns.insert(key, regex);
                }
            }
            Expr::Field { .. } => {}
        }

        Ok(())
    }

    fn get(&self, value: &Bson, case_insensitive: bool) -> Option<&Regex> {
        self.patterns.get(&(contains_pattern(value), case_insensitive))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }
}

/// A filter prepared for scanning many documents.
pub(crate) struct Matcher<'e> {
    expr: Option<&'e Expr>,
    patterns: CompiledPatterns,
}

impl<'e> Matcher<'e> {
    /// Compiles the filter's patterns; an absent expression matches everything.
    pub fn new(expr: Option<&'e Expr>) -> DocumentStoreResult<Self> {
        let patterns = match expr {
            Some(expr) => CompiledPatterns::compile(expr)?,
            None => CompiledPatterns::default(),
        };

        Ok(Self { expr, patterns })
    }

    pub fn matches(&self, document: &Document) -> DocumentStoreResult<bool> {
        match self.expr {
            Some(expr) => DocumentEvaluator::new(document, &self.patterns).evaluate(expr),
            None => Ok(true),
        }
    }

    pub fn patterns(&self) -> &CompiledPatterns {
        &self.patterns
    }
}

pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
    patterns: &'a CompiledPatterns,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document, patterns: &'a CompiledPatterns) -> Self {
        Self { document, patterns }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> DocumentStoreResult<bool> {
        self.visit_expr(expr)
    }
}

/// Equality against a field value, an array field matching on any element.
fn equals(field_value: Option<&Bson>, value: &Bson) -> bool {
    let expected = Comparable::from(value);

    match field_value.map(Comparable::from) {
        None => expected == Comparable::Null,
        Some(Comparable::Array(items)) => {
            items.iter().any(|item| *item == expected) || Comparable::Array(items) == expected
        }
        Some(actual) => actual == expected,
    }
}

fn compare(field_value: &Bson, value: &Bson, op: FieldOp) -> bool {
    let expected = Comparable::from(value);
    let accepts = |actual: &Comparable<'_>| match actual.partial_cmp(&expected) {
        Some(ordering) => match op {
            FieldOp::Gt => ordering == Ordering::Greater,
            FieldOp::Gte => ordering != Ordering::Less,
            FieldOp::Lt => ordering == Ordering::Less,
            FieldOp::Lte => ordering != Ordering::Greater,
            _ => false,
        },
        None => false,
    };

    match Comparable::from(field_value) {
        Comparable::Array(items) => items.iter().any(accepts),
        actual => accepts(&actual),
    }
}

fn substring_regex(pattern: &str, case_insensitive: bool) -> DocumentStoreResult<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .build()
        .map_err(|e| DocumentStoreError::Backend(format!("invalid pattern: {e}")))
}

fn matches_pattern(field_value: &Bson, pattern: &Regex) -> bool {
    match field_value {
        Bson::String(text) => pattern.is_match(text),
        Bson::Array(items) => items.iter().any(|item| matches_pattern(item, pattern)),
        _ => false,
    }
}

impl<'a> QueryVisitor for DocumentEvaluator<'a> {
    type Output = bool;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_field(&mut self, field: &str, op: FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let field_value = lookup_path(self.document, field);

        match op {
            FieldOp::Eq => Ok(equals(field_value, value)),
            FieldOp::In => match value {
                Bson::Array(candidates) => Ok(candidates.iter().any(|candidate| equals(field_value, candidate))),
                single => Ok(equals(field_value, single)),
            },
            FieldOp::Gt | FieldOp::Gte | FieldOp::Lt | FieldOp::Lte => {
                Ok(field_value.is_some_and(|field_value| compare(field_value, value, op)))
            }
            FieldOp::Contains | FieldOp::IContains => {
                let case_insensitive = op == FieldOp::IContains;
                let Some(field_value) = field_value else {
                    return Ok(false);
                };

                match self.patterns.get(value, case_insensitive) {
                    Some(pattern) => Ok(matches_pattern(field_value, pattern)),
                    None => {
                        let pattern = substring_regex(&contains_pattern(value), case_insensitive)?;
                        Ok(matches_pattern(field_value, &pattern))
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use docmodel_core::{lookup::translate_filters, query::Filter};

    fn matches(document: &Document, filters: Document) -> bool {
        let filter = translate_filters(&filters);
        Matcher::new(filter.as_ref()).unwrap().matches(document).unwrap()
    }

    #[test]
    fn test_equality_normalizes_numbers() {
        let document = doc! { "year": 1986 };
        assert!(matches(&document, doc! { "year": 1986_i64 }));
        assert!(matches(&document, doc! { "year": 1986.0 }));
        assert!(!matches(&document, doc! { "year": "1986" }));
    }

    #[test]
    fn test_missing_field_equals_null() {
        let document = doc! { "title": "Peace Sells" };
        assert!(matches(&document, doc! { "year": Bson::Null }));
        assert!(!matches(&document, doc! { "year": 1986 }));
    }

    #[test]
    fn test_array_field_matches_any_element() {
        let document = doc! { "tags": ["thrash", "metal"] };
        assert!(matches(&document, doc! { "tags": "metal" }));
        assert!(matches(&document, doc! { "tags__in": ["punk", "thrash"] }));
        assert!(!matches(&document, doc! { "tags": "punk" }));
    }

    #[test]
    fn test_in_lookup() {
        let document = doc! { "number": 1 };
        assert!(matches(&document, doc! { "number__in": [0, 1] }));
        assert!(!matches(&document, doc! { "number__in": [2, 3] }));
        assert!(!matches(&document, doc! { "number__in": [] }));
    }

    #[test]
    fn test_relational_lookups() {
        let document = doc! { "year": 1986 };
        assert!(matches(&document, doc! { "year__gt": 1985, "year__lte": 1986 }));
        assert!(!matches(&document, doc! { "year__lt": 1986 }));
        assert!(!matches(&document, doc! { "year__gte": "1900" }));
        assert!(!matches(&doc! {}, doc! { "year__gte": 0 }));
    }

    #[test]
    fn test_contains_lookups() {
        let document = doc! { "title": "Master of Puppets (Remastered)" };
        assert!(matches(&document, doc! { "title__contains": "of Pup" }));
        assert!(!matches(&document, doc! { "title__contains": "of pup" }));
        assert!(matches(&document, doc! { "title__icontains": "OF PUP" }));
        assert!(matches(&document, doc! { "title__contains": "(Remastered)" }));
        assert!(!matches(&doc! { "title": 42 }, doc! { "title__contains": "4" }));
    }

    #[test]
    fn test_dotted_paths() {
        let document = doc! { "band": { "name": "Slayer", "founded": 1981 } };
        let expr = Filter::eq("band.name", "Slayer").and(Filter::lt("band.founded", 1990));
        assert!(Matcher::new(Some(&expr)).unwrap().matches(&document).unwrap());
    }

    #[test]
    fn test_patterns_are_compiled_once_per_filter() {
        let expr = Filter::contains("title", "of")
            .and(Filter::icontains("title", "of"))
            .and(Filter::contains("band", "of"))
            .and(Filter::gte("year", 1980));
        let matcher = Matcher::new(Some(&expr)).unwrap();

        assert_eq!(matcher.patterns().len(), 2);
        assert!(matcher.matches(&doc! { "title": "Master of Puppets", "band": "Sons of Liberty", "year": 1986 }).unwrap());
        assert!(!matcher.matches(&doc! { "title": "Master OF Puppets", "band": "Sons of Liberty", "year": 1986 }).unwrap());
        assert!(!matcher.matches(&doc! { "title": "Master of Puppets", "band": "Metallica", "year": 1986 }).unwrap());
    }

    #[test]
    fn test_filter_without_patterns_matches_everything_it_should() {
        let expr = Filter::lte("year", 1990).and(Filter::is_in("genre", vec![Bson::from("thrash")]));
        let matcher = Matcher::new(Some(&expr)).unwrap();

        assert_eq!(matcher.patterns().len(), 0);
        assert!(matcher.matches(&doc! { "year": 1986, "genre": "thrash" }).unwrap());
        assert!(!matcher.matches(&doc! { "year": 1994, "genre": "thrash" }).unwrap());
        assert!(Matcher::new(None).unwrap().matches(&doc! {}).unwrap());
    }

    #[test]
    fn test_sort_order_across_types() {
        let number = Bson::Int32(5);
        let text = Bson::String("a".into());

        assert_eq!(compare_for_sort(None, Some(&number)), Ordering::Less);
        assert_eq!(compare_for_sort(Some(&number), Some(&text)), Ordering::Less);
        assert_eq!(compare_for_sort(Some(&Bson::Int64(5)), Some(&Bson::Double(5.0))), Ordering::Equal);
    }
}
