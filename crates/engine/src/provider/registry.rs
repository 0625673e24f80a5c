use std::{fmt, sync::Arc};

use docflow_api::StoreBackend;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use tracing::debug;

use super::{
    DataProvider, FetchSpec,
    builtin::{CollectionProvider, InteractionRunProvider},
};
use crate::error::EngineError;

/// Builds a provider bound to one backend client.
pub type ProviderFactory = Arc<dyn Fn(Arc<dyn StoreBackend>) -> Box<dyn DataProvider> + Send + Sync>;

/// Name-keyed provider factories.
///
/// Factories are registered once at initialization. Providers are cheap, built per lookup, and
/// dropped after use.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    factories: IndexMap<String, ProviderFactory>,
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with `document`, `document_type`, and `interaction_run`.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.insert("document", |client| Box::new(CollectionProvider::documents(client)));
        registry.insert("document_type", |client| Box::new(CollectionProvider::document_types(client)));
        registry.insert("interaction_run", |client| Box::new(InteractionRunProvider::new(client)));
        registry
    }

    pub fn register<F>(&mut self, id: impl Into<String>, factory: F) -> Result<(), EngineError>
    where
        F: Fn(Arc<dyn StoreBackend>) -> Box<dyn DataProvider> + Send + Sync + 'static,
    {
        let id = id.into();
        if self.factories.contains_key(&id) {
            return Err(EngineError::DuplicateProvider(id));
        }
        self.insert(id, factory);
        Ok(())
    }

    fn insert<F>(&mut self, id: impl Into<String>, factory: F)
    where
        F: Fn(Arc<dyn StoreBackend>) -> Box<dyn DataProvider> + Send + Sync + 'static,
    {
        self.factories.insert(id.into(), Arc::new(factory));
    }

    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Build the provider named by `spec.provider_type` for `client`.
    pub fn fetch_provider(&self, client: Arc<dyn StoreBackend>, spec: &FetchSpec) -> Result<Box<dyn DataProvider>, EngineError> {
        let factory = self
            .factories
            .get(&spec.provider_type)
            .ok_or_else(|| EngineError::UnknownProvider(spec.provider_type.clone()))?;
        let provider = factory(client);
        debug!(provider = %provider.id(), supports_query = provider.supports_query(), "data provider constructed");
        Ok(provider)
    }
}

/// Process-wide registry holding the built-in providers.
pub static DEFAULT_PROVIDERS: Lazy<ProviderRegistry> = Lazy::new(ProviderRegistry::with_builtin);

/// Look up `spec.provider_type` in [`DEFAULT_PROVIDERS`].
pub fn fetch_provider(client: Arc<dyn StoreBackend>, spec: &FetchSpec) -> Result<Box<dyn DataProvider>, EngineError> {
    DEFAULT_PROVIDERS.fetch_provider(client, spec)
}
