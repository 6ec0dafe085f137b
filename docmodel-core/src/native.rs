//! Store-native rendering of filter expressions.
//!
//! Renders [`Expr`] trees as BSON query documents in MongoDB syntax. Predicates on
//! distinct fields are flattened into a single document, several operators on the
//! same field are merged, and conflicting clauses fall back to `$and`:
//!
//! ```ignore
//! // {"slug": {"$in": ["foo", "bar"]}, "tag": "baz"}
//! let document = filter_document(translate_filters(&doc! {
//!     "slug__in": ["foo", "bar"],
//!     "tag": "baz",
//! }).as_ref())?;
//! ```

use bson::{Bson, Document, doc};

use crate::{
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, FieldOp, QueryVisitor},
};

/// Translates filter expressions into store query documents.
pub struct NativeQueryTranslator;

impl QueryVisitor for NativeQueryTranslator {
    type Output = Document;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        let mut merged = Document::new();
        let mut conflicts = Vec::new();

        for expr in exprs {
            for (key, value) in self.visit_expr(expr)? {
                if !merged.contains_key(&key) {
                    merged.insert(key, value);
                    continue;
                }

                if let (Some(Bson::Document(existing)), Bson::Document(operators)) = (merged.get_mut(&key), &value) {
                    if is_operator_document(existing) && is_operator_document(operators) {
                        for (operator, operand) in operators {
                            existing.insert(operator.clone(), operand.clone());
                        }
                        continue;
                    }
                }

                conflicts.push(doc! { key: value });
            }
        }

        if conflicts.is_empty() {
            return Ok(merged);
        }

        let mut clauses = vec![Bson::Document(merged)];
        clauses.extend(conflicts.into_iter().map(Bson::Document));

        Ok(doc! { "$and": clauses })
    }

    fn visit_field(&mut self, field: &str, op: FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field: match op {
                FieldOp::Eq => value.clone(),
                FieldOp::In => doc! { "$in": value }.into(),
                FieldOp::Gt => doc! { "$gt": value }.into(),
                FieldOp::Gte => doc! { "$gte": value }.into(),
                FieldOp::Lt => doc! { "$lt": value }.into(),
                FieldOp::Lte => doc! { "$lte": value }.into(),
                FieldOp::Contains => doc! { "$regex": contains_pattern(value) }.into(),
                FieldOp::IContains => doc! { "$regex": contains_pattern(value), "$options": "i" }.into(),
            }
        })
    }
}

/// Renders an optional filter expression, an absent filter matching everything.
pub fn filter_document(filter: Option<&Expr>) -> DocumentStoreResult<Document> {
    match filter {
        Some(expr) => NativeQueryTranslator.visit_expr(expr),
        None => Ok(Document::new()),
    }
}

/// The escaped substring pattern used by `contains` lookups.
pub fn contains_pattern(value: &Bson) -> String {
    match value {
        Bson::String(needle) => format!(".*{}.*", regex::escape(needle)),
        other => format!(".*{}.*", regex::escape(&other.to_string())),
    }
}

fn is_operator_document(document: &Document) -> bool {
    !document.is_empty() && document.keys().all(|key| key.starts_with('$'))
}
