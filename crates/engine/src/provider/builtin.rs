use std::sync::Arc;

use async_trait::async_trait;
use docflow_api::{StoreBackend, StoreQuery};
use docflow_types::{ActivityFailure, ClassifiedError};
use futures_util::future::try_join_all;
use serde_json::Value;
use tracing::debug;

use super::{
    DataProvider, FetchSpec,
    identifier::{BACKEND_ID_FIELD, id_filter_values, normalize_id_filter},
};

/// Queryable provider over one content store collection.
pub struct CollectionProvider {
    id: &'static str,
    collection: &'static str,
    client: Arc<dyn StoreBackend>,
}

impl CollectionProvider {
    pub fn new(id: &'static str, collection: &'static str, client: Arc<dyn StoreBackend>) -> Self {
        Self { id, collection, client }
    }

    pub fn documents(client: Arc<dyn StoreBackend>) -> Self {
        Self::new("document", "objects", client)
    }

    pub fn document_types(client: Arc<dyn StoreBackend>) -> Self {
        Self::new("document_type", "types", client)
    }
}

#[async_trait]
impl DataProvider for CollectionProvider {
    fn id(&self) -> &str {
        self.id
    }

    fn supports_query(&self) -> bool {
        true
    }

    async fn fetch(&self, spec: &FetchSpec) -> Result<Vec<Value>, ActivityFailure> {
        let query = StoreQuery {
            query: normalize_id_filter(&spec.query),
            limit: spec.limit,
            select: spec.select.clone(),
        };
        let records = self.client.find(self.collection, &query).await?;
        debug!(provider = self.id, collection = self.collection, record_count = records.len(), "provider fetch completed");
        Ok(records)
    }
}

/// Identifier-only provider for interaction runs.
///
/// Runs are retrieved one by one; any filter other than the identifier is rejected.
pub struct InteractionRunProvider {
    client: Arc<dyn StoreBackend>,
}

impl InteractionRunProvider {
    const ID: &'static str = "interaction_run";
    const COLLECTION: &'static str = "runs";

    pub fn new(client: Arc<dyn StoreBackend>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DataProvider for InteractionRunProvider {
    fn id(&self) -> &str {
        Self::ID
    }

    fn supports_query(&self) -> bool {
        false
    }

    async fn fetch(&self, spec: &FetchSpec) -> Result<Vec<Value>, ActivityFailure> {
        let query = normalize_id_filter(&spec.query);
        if let Some(key) = query.keys().find(|key| key.as_str() != BACKEND_ID_FIELD) {
            return Err(ClassifiedError::activity_param_invalid(
                Self::ID,
                "query",
                format!("unsupported filter '{}'; only id lookups are allowed", key),
            )
            .into());
        }
        let mut ids = match id_filter_values(&query) {
            Some(ids) => ids,
            None if query.contains_key(BACKEND_ID_FIELD) => {
                return Err(ClassifiedError::activity_param_invalid(Self::ID, "id", "expected a string or an array of strings").into());
            }
            None => return Err(ClassifiedError::activity_param_not_found(Self::ID, "id").into()),
        };
        if let Some(limit) = spec.limit {
            ids.truncate(limit);
        }

        let select = spec.select.as_deref();
        let records = try_join_all(ids.iter().map(|id| self.client.retrieve(Self::COLLECTION, id, select))).await?;
        debug!(provider = Self::ID, record_count = records.len(), "provider fetch completed");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use docflow_types::ErrorKind;
    use serde_json::{Map as JsonMap, json};

    #[derive(Default)]
    struct RecordingBackend {
        finds: Mutex<Vec<(String, StoreQuery)>>,
        retrieves: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl StoreBackend for RecordingBackend {
        async fn find(&self, collection: &str, query: &StoreQuery) -> Result<Vec<Value>, ActivityFailure> {
            if let Ok(mut finds) = self.finds.lock() {
                finds.push((collection.to_string(), query.clone()));
            }
            Ok(vec![json!({ "_id": "doc-1" })])
        }

        async fn retrieve(&self, collection: &str, id: &str, _select: Option<&str>) -> Result<Value, ActivityFailure> {
            if let Ok(mut retrieves) = self.retrieves.lock() {
                retrieves.push((collection.to_string(), id.to_string()));
            }
            Ok(json!({ "_id": id }))
        }

        async fn update(&self, _collection: &str, _id: &str, patch: &Value) -> Result<Value, ActivityFailure> {
            Ok(patch.clone())
        }
    }

    fn query(value: Value) -> JsonMap<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn documents_query_the_objects_collection_with_normalized_ids() {
        let backend = Arc::new(RecordingBackend::default());
        let provider = CollectionProvider::documents(backend.clone());
        let spec = FetchSpec::new("document").with_query(query(json!({ "id": "doc-1", "status": "ready" }))).with_limit(5);
        let records = provider.fetch(&spec).await.expect("fetch");
        assert_eq!(records.len(), 1);

        let finds = backend.finds.lock().map(|finds| finds.clone()).unwrap_or_default();
        assert_eq!(finds[0].0, "objects");
        assert_eq!(finds[0].1.query, query(json!({ "_id": "doc-1", "status": "ready" })));
        assert_eq!(finds[0].1.limit, Some(5));
    }

    #[tokio::test]
    async fn interaction_runs_are_retrieved_by_id() {
        let backend = Arc::new(RecordingBackend::default());
        let provider = InteractionRunProvider::new(backend.clone());
        let spec = FetchSpec::new("interaction_run").with_query(query(json!({ "id": ["run-1", "run-2", "run-3"] }))).with_limit(2);
        let records = provider.fetch(&spec).await.expect("fetch");
        assert_eq!(records, vec![json!({ "_id": "run-1" }), json!({ "_id": "run-2" })]);
        let retrieves = backend.retrieves.lock().map(|retrieves| retrieves.len()).unwrap_or_default();
        assert_eq!(retrieves, 2);
    }

    #[tokio::test]
    async fn interaction_runs_reject_other_filters() {
        let provider = InteractionRunProvider::new(Arc::new(RecordingBackend::default()));
        let spec = FetchSpec::new("interaction_run").with_query(query(json!({ "id": "run-1", "status": "done" })));
        let failure = provider.fetch(&spec).await.expect_err("filter rejected");
        assert_eq!(failure.kind(), Some(ErrorKind::ActivityParamInvalid));
    }

    #[tokio::test]
    async fn interaction_runs_require_an_id() {
        let provider = InteractionRunProvider::new(Arc::new(RecordingBackend::default()));
        let failure = provider.fetch(&FetchSpec::new("interaction_run")).await.expect_err("id required");
        assert_eq!(failure.kind(), Some(ErrorKind::ActivityParamNotFound));
    }
}
