use std::collections::BTreeMap;

use async_trait::async_trait;
use bson::{Bson, Document, doc, oid::ObjectId};
use futures::{StreamExt, TryStreamExt};
use mongodb::{
    Client, Collection as MongoCollection, IndexModel,
    error::{Error as MongoError, ErrorKind},
    options::{
        Acknowledgment, ClientOptions, FindOptions, IndexOptions, InsertOneOptions, ReplaceOptions, UpdateOptions,
        WriteConcern,
    },
};
use tracing::{debug, trace};

use docmodel_core::{
    backend::{DocumentStream, IndexInfo, StoreBackend, StoreBackendBuilder, UpdateOutcome, WriteOptions},
    document::ID_FIELD,
    error::{DocumentStoreError, DocumentStoreResult},
    native::filter_document,
    ordering::sort_document,
    query::{Expr, Query, SortDirection},
};

/// Server error code for a namespace (collection) that does not exist.
const NAMESPACE_NOT_FOUND: i32 = 26;

fn backend_error(e: MongoError) -> DocumentStoreError {
    DocumentStoreError::Backend(e.to_string())
}

fn is_namespace_not_found(e: &MongoError) -> bool {
    matches!(*e.kind, ErrorKind::Command(ref command_error) if command_error.code == NAMESPACE_NOT_FOUND)
}

/// Write concern for a write that may or may not wait for acknowledgment.
fn write_concern(acknowledged: bool) -> Option<WriteConcern> {
    if acknowledged {
        return None;
    }

    let mut concern = WriteConcern::default();
    concern.w = Some(Acknowledgment::Nodes(0));
    Some(concern)
}

fn index_info(model: &IndexModel) -> (Option<String>, IndexInfo) {
    let options = model.options.as_ref();

    (
        options.and_then(|options| options.name.clone()),
        IndexInfo::from_keys(
            &model.keys,
            options.and_then(|options| options.unique).unwrap_or(false),
        ),
    )
}

/// Reads a `findAndModify` reply.
///
/// The command does not say whether a matched document changed, so a matched
/// document counts as modified.
fn find_and_modify_outcome(response: &Document) -> DocumentStoreResult<UpdateOutcome> {
    let last_error = response.get_document("lastErrorObject")?;

    if let Some(upserted) = last_error.get("upserted") {
        return Ok(UpdateOutcome {
            upserted_id: Some(upserted.clone()),
            ..UpdateOutcome::default()
        });
    }

    if !last_error.get_bool("updatedExisting").unwrap_or(false) {
        return Ok(UpdateOutcome::default());
    }

    let matched_id = match response.get("value") {
        Some(Bson::Document(value)) => value.get(ID_FIELD).cloned(),
        _ => None,
    };

    Ok(UpdateOutcome {
        matched: 1,
        modified: 1,
        matched_id,
        upserted_id: None,
    })
}

#[derive(Debug, Clone)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    pub fn database_name(&self) -> &str {
        &self.database
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(collection_name)
    }

    /// Applies an update or replacement in one `findAndModify` round trip, so the
    /// outcome names the document that was actually written.
    async fn find_and_modify(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        upsert: bool,
    ) -> DocumentStoreResult<UpdateOutcome> {
        let response = self
            .client
            .database(&self.database)
            .run_command(doc! {
                "findAndModify": collection,
                "query": filter,
                "update": update,
                "upsert": upsert,
                "new": true,
            })
            .await
            .map_err(backend_error)?;

        find_and_modify_outcome(&response)
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn find_documents(&self, query: Query, collection: &str) -> DocumentStoreResult<DocumentStream> {
        let mut options = FindOptions::default();

        if let Some(limit) = query.limit {
            options.limit = Some(limit as i64);
        }
        if let Some(skip) = query.offset {
            options.skip = Some(skip as u64);
        }
        if !query.sort.is_empty() {
            options.sort = Some(sort_document(&query.sort));
        }

        let filter = filter_document(query.filter.as_ref())?;
        trace!(collection, %filter, "mongodb find");

        Ok(self
            .get_collection(collection)
            .find(filter)
            .with_options(options)
            .await
            .map_err(backend_error)?
            .map_err(backend_error)
            .boxed())
    }

    async fn count_documents(&self, filter: Option<Expr>, collection: &str) -> DocumentStoreResult<u64> {
        self.get_collection(collection)
            .count_documents(filter_document(filter.as_ref())?)
            .await
            .map_err(backend_error)
    }

    async fn insert_document(
        &self,
        mut document: Document,
        collection: &str,
        acknowledged: bool,
    ) -> DocumentStoreResult<Bson> {
        let id = match document.get(ID_FIELD) {
            Some(id) => id.clone(),
            None => {
                let id = Bson::ObjectId(ObjectId::new());
                document.insert(ID_FIELD, id.clone());
                id
            }
        };

        let mut options = InsertOneOptions::default();
        options.write_concern = write_concern(acknowledged);

        self.get_collection(collection)
            .insert_one(document)
            .with_options(options)
            .await
            .map_err(backend_error)?;

        Ok(id)
    }

    async fn update_document(
        &self,
        filter: Option<Expr>,
        update: Document,
        collection: &str,
        options: WriteOptions,
    ) -> DocumentStoreResult<UpdateOutcome> {
        let filter = filter_document(filter.as_ref())?;
        let operators = update.keys().next().is_some_and(|key| key.starts_with('$'));

        trace!(collection, %filter, operators, upsert = options.upsert, "mongodb update");

        if options.acknowledged {
            return self.find_and_modify(collection, filter, update, options.upsert).await;
        }

        let result = if operators {
            let mut update_options = UpdateOptions::default();
            update_options.upsert = Some(options.upsert);
            update_options.write_concern = write_concern(false);

            self.get_collection(collection)
                .update_one(filter, update)
                .with_options(update_options)
                .await
        } else {
            let mut replace_options = ReplaceOptions::default();
            replace_options.upsert = Some(options.upsert);
            replace_options.write_concern = write_concern(false);

            self.get_collection(collection)
                .replace_one(filter, update)
                .with_options(replace_options)
                .await
        }
        .map_err(backend_error)?;

        Ok(UpdateOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
            matched_id: None,
            upserted_id: result.upserted_id,
        })
    }

    async fn index_information(&self, collection: &str) -> DocumentStoreResult<BTreeMap<String, IndexInfo>> {
        let cursor = match self.get_collection(collection).list_indexes().await {
            Ok(cursor) => cursor,
            Err(e) if is_namespace_not_found(&e) => return Ok(BTreeMap::new()),
            Err(e) => return Err(backend_error(e)),
        };

        let models = cursor
            .try_collect::<Vec<IndexModel>>()
            .await
            .map_err(backend_error)?;

        Ok(models
            .iter()
            .map(index_info)
            .map(|(name, info)| (name.unwrap_or_else(|| IndexInfo::default_name(&info.key)), info))
            .collect())
    }

    async fn create_index(
        &self,
        collection: &str,
        keys: Vec<(String, SortDirection)>,
        unique: bool,
        name: Option<String>,
    ) -> DocumentStoreResult<String> {
        let key_document = keys
            .iter()
            .map(|(field, direction)| (field.clone(), Bson::Int32(direction.as_i32())))
            .collect::<Document>();

        let mut options = IndexOptions::default();
        options.unique = Some(unique);
        options.name = name;

        let model = IndexModel::builder()
            .keys(key_document)
            .options(options)
            .build();

        let result = self
            .get_collection(collection)
            .create_index(model)
            .await
            .map_err(backend_error)?;

        debug!(collection, index = %result.index_name, unique, "mongodb index created");

        Ok(result.index_name)
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        self.client
            .database(&self.database)
            .list_collection_names()
            .await
            .map_err(backend_error)
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.get_collection(name)
            .drop()
            .await
            .map_err(backend_error)
    }

    async fn shutdown(&self) -> DocumentStoreResult<()> {
        self.client.clone().shutdown().await;

        Ok(())
    }
}

pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
        }
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        let options = ClientOptions::parse(&self.dsn)
            .await
            .map_err(|e| DocumentStoreError::ImproperlyConfigured(e.to_string()))?;

        Ok(MongoDbStore::new(
            Client::with_options(options).map_err(|e| DocumentStoreError::ImproperlyConfigured(e.to_string()))?,
            self.database,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_concern() {
        assert!(write_concern(true).is_none());
        assert_eq!(
            write_concern(false).and_then(|concern| concern.w),
            Some(Acknowledgment::Nodes(0)),
        );
    }

    #[test]
    fn test_find_and_modify_reports_replaced_document() {
        let response = doc! {
            "lastErrorObject": { "n": 1, "updatedExisting": true },
            "value": { "_id": 7, "genre": "doom" },
            "ok": 1.0,
        };

        assert_eq!(
            find_and_modify_outcome(&response).unwrap(),
            UpdateOutcome { matched: 1, modified: 1, matched_id: Some(Bson::Int32(7)), upserted_id: None },
        );
    }

    #[test]
    fn test_find_and_modify_reports_upserted_document() {
        let response = doc! {
            "lastErrorObject": { "n": 1, "updatedExisting": false, "upserted": 8 },
            "value": { "_id": 8, "genre": "doom" },
            "ok": 1.0,
        };

        assert_eq!(
            find_and_modify_outcome(&response).unwrap(),
            UpdateOutcome { upserted_id: Some(Bson::Int32(8)), ..UpdateOutcome::default() },
        );
    }

    #[test]
    fn test_find_and_modify_without_match() {
        let response = doc! {
            "lastErrorObject": { "n": 0, "updatedExisting": false },
            "value": Bson::Null,
            "ok": 1.0,
        };

        assert_eq!(find_and_modify_outcome(&response).unwrap(), UpdateOutcome::default());
        assert!(find_and_modify_outcome(&doc! { "ok": 1.0 }).is_err());
    }

    #[test]
    fn test_index_info_from_model() {
        let mut options = IndexOptions::default();
        options.unique = Some(true);
        options.name = Some("by_slug".to_string());

        let model = IndexModel::builder()
            .keys(doc! { "slug": 1, "year": -1 })
            .options(options)
            .build();

        let (name, info) = index_info(&model);
        assert_eq!(name.as_deref(), Some("by_slug"));
        assert!(info.unique);
        assert_eq!(
            info.key,
            vec![("slug".to_string(), SortDirection::Asc), ("year".to_string(), SortDirection::Desc)],
        );
    }
}
