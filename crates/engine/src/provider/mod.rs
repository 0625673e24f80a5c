//! Data provider registry and uniform fetch contract.
//!
//! Modules:
//! - `identifier`: normalization of generic `id` filters into the backend identifier field
//! - `registry`: name-keyed provider factories and the process-wide default registry
//! - `builtin`: providers for documents, document types, and interaction runs
//! - `fetch`: an activity fetching records through the registry

mod builtin;
mod fetch;
mod identifier;
mod registry;

use async_trait::async_trait;
use docflow_types::ActivityFailure;
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value};

pub use builtin::{CollectionProvider, InteractionRunProvider};
pub use fetch::FetchActivity;
pub use identifier::{BACKEND_ID_FIELD, GENERIC_ID_FIELD, id_filter_values, normalize_id_filter};
pub use registry::{DEFAULT_PROVIDERS, ProviderFactory, ProviderRegistry, fetch_provider};

/// A fetch backend for one entity type, built per client handle.
#[async_trait]
pub trait DataProvider: Send + Sync {
    fn id(&self) -> &str;

    /// Whether arbitrary query filters are accepted, or only identifier lookups.
    fn supports_query(&self) -> bool;

    async fn fetch(&self, spec: &FetchSpec) -> Result<Vec<Value>, ActivityFailure>;
}

/// What to fetch and from which provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchSpec {
    /// Registered provider id.
    #[serde(rename = "type")]
    pub provider_type: String,
    #[serde(default)]
    pub query: JsonMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<String>,
}

impl FetchSpec {
    pub fn new(provider_type: impl Into<String>) -> Self {
        Self {
            provider_type: provider_type.into(),
            ..Default::default()
        }
    }

    pub fn with_query(mut self, query: JsonMap<String, Value>) -> Self {
        self.query = query;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}
