//! Update documents applied to stored documents.
//!
//! Supports full replacement and the `$set`, `$unset` and `$rename` operators.
//! Operator paths may be dotted; intermediate documents are created by `$set`.

use bson::{Bson, Document};

use docmodel_core::{
    document::ID_FIELD,
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, FieldOp},
};

/// Whether `update` is an operator update rather than a replacement.
///
/// Mixing operators and plain fields is rejected.
pub(crate) fn is_operator_update(update: &Document) -> DocumentStoreResult<bool> {
    let operators = update.keys().filter(|key| key.starts_with('$')).count();

    match operators {
        0 => Ok(false),
        n if n == update.len() => Ok(true),
        _ => Err(DocumentStoreError::InvalidDocument(
            "update document mixes operators and fields".to_string(),
        )),
    }
}

/// Applies an operator update to `target` in place.
pub(crate) fn apply_operators(target: &mut Document, update: &Document) -> DocumentStoreResult<()> {
    for (operator, arguments) in update {
        let arguments = arguments.as_document().ok_or_else(|| {
            DocumentStoreError::InvalidDocument(format!("{operator} expects a document"))
        })?;

        for (path, value) in arguments {
            if path == ID_FIELD {
                return Err(DocumentStoreError::InvalidDocument(format!(
                    "{operator} would modify the immutable field '{ID_FIELD}'"
                )));
            }

            match operator.as_str() {
                "$set" => set_path(target, path, value.clone()),
                "$unset" => {
                    remove_path(target, path);
                }
                "$rename" => {
                    let new_path = value.as_str().ok_or_else(|| {
                        DocumentStoreError::InvalidDocument("$rename expects string targets".to_string())
                    })?;
                    if let Some(moved) = remove_path(target, path) {
                        set_path(target, new_path, moved);
                    }
                }
                other => {
                    return Err(DocumentStoreError::InvalidDocument(format!(
                        "unsupported update operator {other}"
                    )));
                }
            }
        }
    }

    Ok(())
}

/// Builds the document replacing `existing`, which keeps its `_id`.
pub(crate) fn replacement(existing: &Document, update: &Document) -> DocumentStoreResult<Document> {
    let id = existing.get(ID_FIELD).cloned().unwrap_or(Bson::Null);

    if let Some(new_id) = update.get(ID_FIELD) {
        if *new_id != id {
            return Err(DocumentStoreError::InvalidDocument(format!(
                "replacement would modify the immutable field '{ID_FIELD}'"
            )));
        }
    }

    let mut replaced = Document::new();
    replaced.insert(ID_FIELD, id);
    for (key, value) in update {
        if key != ID_FIELD {
            replaced.insert(key.clone(), value.clone());
        }
    }

    Ok(replaced)
}

/// The document an upsert inserts when nothing matched.
///
/// Operator updates start from the equality predicates of the filter, a
/// replacement only inherits an `_id` equality.
pub(crate) fn upsert_seed(filter: Option<&Expr>, update: &Document, operators: bool) -> DocumentStoreResult<Document> {
    let mut equalities = Document::new();
    if let Some(filter) = filter {
        collect_equalities(filter, &mut equalities);
    }

    if operators {
        let mut seed = Document::new();
        for (path, value) in equalities {
            set_path(&mut seed, &path, value);
        }
        apply_operators(&mut seed, update)?;
        return Ok(seed);
    }

    let mut seed = Document::new();
    if let Some(id) = update.get(ID_FIELD).or_else(|| equalities.get(ID_FIELD)) {
        seed.insert(ID_FIELD, id.clone());
    }
    for (key, value) in update {
        if key != ID_FIELD {
            seed.insert(key.clone(), value.clone());
        }
    }

    Ok(seed)
}

fn collect_equalities(expr: &Expr, into: &mut Document) {
    match expr {
        Expr::And(exprs) => exprs.iter().for_each(|expr| collect_equalities(expr, into)),
        Expr::Field { field, op: FieldOp::Eq, value } => {
            into.insert(field.clone(), value.clone());
        }
        Expr::Field { .. } => {}
    }
}

fn set_path(target: &mut Document, path: &str, value: Bson) {
    match path.split_once('.') {
        None => {
            target.insert(path, value);
        }
        Some((head, rest)) => {
            if !matches!(target.get(head), Some(Bson::Document(_))) {
                target.insert(head, Document::new());
            }
            if let Some(Bson::Document(child)) = target.get_mut(head) {
                set_path(child, rest, value);
            }
        }
    }
}

fn remove_path(target: &mut Document, path: &str) -> Option<Bson> {
    match path.split_once('.') {
        None => target.remove(path),
        Some((head, rest)) => match target.get_mut(head) {
            Some(Bson::Document(child)) => remove_path(child, rest),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use docmodel_core::query::Filter;

    #[test]
    fn test_operator_detection() {
        assert!(is_operator_update(&doc! { "$set": { "a": 1 } }).unwrap());
        assert!(!is_operator_update(&doc! { "a": 1 }).unwrap());
        assert!(is_operator_update(&doc! { "$set": { "a": 1 }, "b": 2 }).is_err());
    }

    #[test]
    fn test_set_unset_rename() {
        let mut document = doc! { "_id": 1, "genre": "rock", "old": true, "name": "x" };
        apply_operators(
            &mut document,
            &doc! {
                "$set": { "genre": "metal", "band.name": "Slayer" },
                "$unset": { "old": "" },
                "$rename": { "name": "title" },
            },
        )
        .unwrap();

        assert_eq!(
            document,
            doc! { "_id": 1, "genre": "metal", "band": { "name": "Slayer" }, "title": "x" },
        );
    }

    #[test]
    fn test_id_is_immutable() {
        let mut document = doc! { "_id": 1 };
        assert!(apply_operators(&mut document, &doc! { "$set": { "_id": 2 } }).is_err());
        assert!(replacement(&document, &doc! { "_id": 2, "a": 1 }).is_err());
        assert_eq!(replacement(&document, &doc! { "a": 1 }).unwrap(), doc! { "_id": 1, "a": 1 });
    }

    #[test]
    fn test_upsert_seed() {
        let filter = Filter::eq("slug", "a").and(Filter::gt("year", 1980));

        assert_eq!(
            upsert_seed(Some(&filter), &doc! { "$set": { "title": "A" } }, true).unwrap(),
            doc! { "slug": "a", "title": "A" },
        );
        assert_eq!(
            upsert_seed(Some(&filter), &doc! { "title": "A" }, false).unwrap(),
            doc! { "title": "A" },
        );
    }
}
