use std::sync::Arc;

use async_trait::async_trait;
use docflow_api::StoreBackend;
use docflow_types::{ActivityCall, ActivityFailure, ClassifiedError};
use serde_json::Value;

use super::{DEFAULT_PROVIDERS, FetchSpec, ProviderRegistry};
use crate::{context::content_store, executor::Activity};

/// Activity fetching records through a data provider.
///
/// Parameters mirror [`FetchSpec`]: `type` (required), `query`, `limit`, and `select`. The
/// backend is the content store described by the execution context unless one was supplied.
#[derive(Clone)]
pub struct FetchActivity {
    providers: ProviderRegistry,
    backend: Option<Arc<dyn StoreBackend>>,
}

impl Default for FetchActivity {
    fn default() -> Self {
        Self {
            providers: DEFAULT_PROVIDERS.clone(),
            backend: None,
        }
    }
}

impl FetchActivity {
    pub fn new(providers: ProviderRegistry) -> Self {
        Self { providers, backend: None }
    }

    pub fn with_backend(mut self, backend: Arc<dyn StoreBackend>) -> Self {
        self.backend = Some(backend);
        self
    }
}

#[async_trait]
impl Activity for FetchActivity {
    async fn run(&self, call: ActivityCall) -> Result<Value, ActivityFailure> {
        let activity = call.activity.name.as_str();
        call.require_str("type")?;
        let spec: FetchSpec = serde_json::from_value(Value::Object(call.params.clone()))
            .map_err(|error| ClassifiedError::activity_param_invalid(activity, "params", error.to_string()))?;
        let backend: Arc<dyn StoreBackend> = match &self.backend {
            Some(backend) => Arc::clone(backend),
            None => Arc::new(content_store(&call.payload)?),
        };
        let provider = self
            .providers
            .fetch_provider(backend, &spec)
            .map_err(|error| ClassifiedError::activity_param_invalid(activity, "type", error.to_string()))?;
        let records = provider.fetch(&spec).await?;
        Ok(Value::Array(records))
    }
}
