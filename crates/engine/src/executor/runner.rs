use std::{fmt, future::Future, sync::Arc};

use async_trait::async_trait;
use docflow_types::{ActivityCall, ActivityFailure};
use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use crate::error::EngineError;

/// A unit of business work invoked through the proxy layer.
///
/// Implementations perform all I/O on behalf of a workflow and report failures either as a
/// classified error or as an unclassified one the retry policy may attempt again.
#[async_trait]
pub trait Activity: Send + Sync {
    async fn run(&self, call: ActivityCall) -> Result<Value, ActivityFailure>;
}

/// Adapter turning an async closure into an [`Activity`].
pub struct FnActivity<F>(F);

impl<F> FnActivity<F> {
    pub fn new(handler: F) -> Self {
        Self(handler)
    }
}

#[async_trait]
impl<F, Fut> Activity for FnActivity<F>
where
    F: Fn(ActivityCall) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, ActivityFailure>> + Send + 'static,
{
    async fn run(&self, call: ActivityCall) -> Result<Value, ActivityFailure> {
        (self.0)(call).await
    }
}

/// Activity that returns its effective parameters, for previews and dry runs.
pub struct EchoActivity;

#[async_trait]
impl Activity for EchoActivity {
    async fn run(&self, call: ActivityCall) -> Result<Value, ActivityFailure> {
        Ok(Value::Object(call.params))
    }
}

/// Static table of activity implementations, keyed by name.
#[derive(Clone, Default)]
pub struct ActivityRegistry {
    activities: IndexMap<String, Arc<dyn Activity>>,
}

impl fmt::Debug for ActivityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivityRegistry")
            .field("activities", &self.activities.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ActivityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, activity: impl Activity + 'static) -> Result<(), EngineError> {
        self.register_arc(name, Arc::new(activity))
    }

    pub fn register_arc(&mut self, name: impl Into<String>, activity: Arc<dyn Activity>) -> Result<(), EngineError> {
        let name = name.into();
        if self.activities.contains_key(&name) {
            return Err(EngineError::DuplicateActivity(name));
        }
        debug!(activity = %name, "activity registered");
        self.activities.insert(name, activity);
        Ok(())
    }

    /// Register an async closure under `name`.
    pub fn register_fn<F, Fut>(&mut self, name: impl Into<String>, handler: F) -> Result<(), EngineError>
    where
        F: Fn(ActivityCall) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ActivityFailure>> + Send + 'static,
    {
        self.register(name, FnActivity::new(handler))
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Activity>> {
        self.activities.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.activities.contains_key(name)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.activities.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.activities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.activities.is_empty()
    }
}
