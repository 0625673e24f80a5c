use async_trait::async_trait;
use docflow_types::ActivityFailure;
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value};

/// Query forwarded to a collection `find` endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreQuery {
    #[serde(default)]
    pub query: JsonMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    /// Space-separated projection understood by the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<String>,
}

/// Backend operations data providers are built on.
///
/// [`crate::ContentStoreClient`] is the production implementation; tests substitute in-memory
/// backends.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    async fn find(&self, collection: &str, query: &StoreQuery) -> Result<Vec<Value>, ActivityFailure>;

    async fn retrieve(&self, collection: &str, id: &str, select: Option<&str>) -> Result<Value, ActivityFailure>;

    async fn update(&self, collection: &str, id: &str, patch: &Value) -> Result<Value, ActivityFailure>;
}
