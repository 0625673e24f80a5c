//! DSL proxy layer.
//!
//! [`ActivityProxies`] turns the activity table plus per-group options into DSL-callable
//! [`ActivityProxy`] values. Every name is resolved against the registry when the table is built,
//! so a typo in a group definition fails before any workflow runs.

use std::{fmt, sync::Arc};

use docflow_types::{ActivityCall, ActivityFailure, ExecutionPayload, Params};
use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use super::{
    retry::ActivityOptions,
    runner::{Activity, ActivityRegistry},
    scheduler::ActivityScheduler,
};
use crate::{config::EngineConfig, error::EngineError};

/// A single activity bound to its options and scheduler.
#[derive(Clone)]
pub struct ActivityProxy {
    name: String,
    workflow_name: String,
    activity: Arc<dyn Activity>,
    options: ActivityOptions,
    scheduler: Arc<dyn ActivityScheduler>,
}

impl fmt::Debug for ActivityProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivityProxy")
            .field("name", &self.name)
            .field("workflow_name", &self.workflow_name)
            .field("options", &self.options)
            .finish()
    }
}

impl ActivityProxy {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &ActivityOptions {
        &self.options
    }

    /// Invoke the activity on behalf of the workflow the table was built for.
    pub async fn call(&self, payload: &ExecutionPayload, params: Params) -> Result<Value, ActivityFailure> {
        self.call_in(&self.workflow_name, payload, params).await
    }

    /// Invoke the activity, stamping `workflow_name` into the envelope.
    ///
    /// The result is returned unchanged; failures propagate with their classification intact.
    pub async fn call_in(&self, workflow_name: &str, payload: &ExecutionPayload, params: Params) -> Result<Value, ActivityFailure> {
        let call = ActivityCall::new(payload.clone(), workflow_name, self.name.clone(), params);
        debug!(activity = %self.name, workflow = %workflow_name, param_count = call.params.len(), "proxy dispatching activity");
        self.scheduler.schedule(Arc::clone(&self.activity), call, &self.options).await
    }
}

/// Name-keyed table of proxies for one workflow.
#[derive(Debug, Clone, Default)]
pub struct ActivityProxies {
    workflow_name: String,
    proxies: IndexMap<String, ActivityProxy>,
}

impl ActivityProxies {
    pub fn builder(registry: &ActivityRegistry, scheduler: Arc<dyn ActivityScheduler>) -> ActivityProxiesBuilder {
        ActivityProxiesBuilder {
            registry: registry.clone(),
            scheduler,
            workflow_name: String::new(),
            groups: Vec::new(),
        }
    }

    /// Bind every registered activity using the configured groups.
    ///
    /// Activities listed under a group get that group's options; the rest fall back to the
    /// `default` group. Listed names missing from the registry are ignored.
    pub fn from_config(
        registry: &ActivityRegistry,
        scheduler: Arc<dyn ActivityScheduler>,
        config: &EngineConfig,
        workflow_name: impl Into<String>,
    ) -> Result<Self, EngineError> {
        let mut builder = Self::builder(registry, scheduler).workflow_name(workflow_name);
        let mut listed: Vec<&str> = Vec::new();
        for group in config.groups.values() {
            let names: Vec<&str> = group
                .activities
                .iter()
                .map(String::as_str)
                .filter(|name| registry.contains(name))
                .collect();
            if names.is_empty() {
                continue;
            }
            listed.extend(names.iter().copied());
            builder = builder.group(group.options.clone(), names);
        }
        let remaining: Vec<&str> = registry.names().filter(|name| !listed.contains(name)).collect();
        builder.group(config.options(EngineConfig::DEFAULT_GROUP)?.clone(), remaining).build()
    }

    pub fn workflow_name(&self) -> &str {
        &self.workflow_name
    }

    pub fn get(&self, name: &str) -> Option<&ActivityProxy> {
        self.proxies.get(name)
    }

    pub fn require(&self, name: &str) -> Result<&ActivityProxy, EngineError> {
        self.get(name).ok_or_else(|| EngineError::UnknownActivity(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.proxies.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.proxies.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    /// Call a named activity; an unbound name is reported as an unclassified failure.
    pub async fn call(&self, name: &str, payload: &ExecutionPayload, params: Params) -> Result<Value, ActivityFailure> {
        let proxy = self.require(name).map_err(ActivityFailure::unclassified)?;
        proxy.call(payload, params).await
    }
}

pub struct ActivityProxiesBuilder {
    registry: ActivityRegistry,
    scheduler: Arc<dyn ActivityScheduler>,
    workflow_name: String,
    groups: Vec<(ActivityOptions, Vec<String>)>,
}

impl ActivityProxiesBuilder {
    pub fn workflow_name(mut self, name: impl Into<String>) -> Self {
        self.workflow_name = name.into();
        self
    }

    /// Bind `names` to one set of options.
    pub fn group<I, S>(mut self, options: ActivityOptions, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups.push((options, names.into_iter().map(Into::into).collect()));
        self
    }

    pub fn build(self) -> Result<ActivityProxies, EngineError> {
        let mut proxies = IndexMap::new();
        for (options, names) in self.groups {
            options.retry.validate()?;
            for name in names {
                if proxies.contains_key(&name) {
                    return Err(EngineError::DuplicateBinding(name));
                }
                let activity = self.registry.get(&name).ok_or_else(|| EngineError::UnknownActivity(name.clone()))?;
                let proxy = ActivityProxy {
                    name: name.clone(),
                    workflow_name: self.workflow_name.clone(),
                    activity,
                    options: options.clone(),
                    scheduler: Arc::clone(&self.scheduler),
                };
                proxies.insert(name, proxy);
            }
        }
        debug!(workflow = %self.workflow_name, proxy_count = proxies.len(), "activity proxies built");
        Ok(ActivityProxies {
            workflow_name: self.workflow_name,
            proxies,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{EchoActivity, LocalScheduler};
    use serde_json::json;

    fn registry(names: &[&str]) -> ActivityRegistry {
        let mut registry = ActivityRegistry::new();
        for name in names {
            registry.register(*name, EchoActivity).expect("register");
        }
        registry
    }

    #[test]
    fn unknown_names_fail_at_build_time() {
        let error = ActivityProxies::builder(&registry(&["a"]), Arc::new(LocalScheduler::new()))
            .group(ActivityOptions::default(), ["a", "missing"])
            .build()
            .expect_err("missing is unregistered");
        assert_eq!(error, EngineError::UnknownActivity("missing".into()));
    }

    #[test]
    fn binding_a_name_twice_is_rejected() {
        let error = ActivityProxies::builder(&registry(&["a"]), Arc::new(LocalScheduler::new()))
            .group(ActivityOptions::default(), ["a"])
            .group(ActivityOptions::long_running(), ["a"])
            .build()
            .expect_err("duplicate binding");
        assert_eq!(error, EngineError::DuplicateBinding("a".into()));
    }

    #[test]
    fn groups_carry_their_own_options() {
        let proxies = ActivityProxies::builder(&registry(&["quick", "slow"]), Arc::new(LocalScheduler::new()))
            .group(ActivityOptions::default(), ["quick"])
            .group(ActivityOptions::long_running(), ["slow"])
            .build()
            .expect("build");
        assert_eq!(proxies.require("quick").expect("quick").options(), &ActivityOptions::default());
        assert_eq!(proxies.require("slow").expect("slow").options(), &ActivityOptions::long_running());
    }

    #[test]
    fn from_config_binds_unlisted_activities_to_default() {
        let mut config = EngineConfig::default();
        if let Some(group) = config.groups.get_mut(EngineConfig::LONG_RUNNING_GROUP) {
            group.activities = vec!["transcribe_media".into()];
        }
        let proxies = ActivityProxies::from_config(
            &registry(&["extract_text", "transcribe_media"]),
            Arc::new(LocalScheduler::new()),
            &config,
            "extract",
        )
        .expect("build");
        assert_eq!(proxies.len(), 2);
        assert_eq!(
            proxies.require("transcribe_media").expect("bound").options(),
            &ActivityOptions::long_running()
        );
        assert_eq!(proxies.require("extract_text").expect("bound").options(), &ActivityOptions::default());
    }

    #[tokio::test]
    async fn call_builds_the_envelope() {
        let mut registry = ActivityRegistry::new();
        registry
            .register_fn("inspect", |call: ActivityCall| async move {
                Ok::<_, ActivityFailure>(json!({
                    "activity": call.activity.name,
                    "workflow": call.workflow_name,
                    "event": call.payload.event,
                    "params": call.params,
                }))
            })
            .expect("register");
        let proxies = ActivityProxies::builder(&registry, Arc::new(LocalScheduler::new()))
            .workflow_name("ingest")
            .group(ActivityOptions::default(), ["inspect"])
            .build()
            .expect("build");

        let payload = ExecutionPayload {
            event: "create".into(),
            ..Default::default()
        };
        let mut params = Params::new();
        params.insert("object_id".into(), json!("doc-1"));
        let value = proxies.call("inspect", &payload, params).await.expect("call");
        assert_eq!(
            value,
            json!({ "activity": "inspect", "workflow": "ingest", "event": "create", "params": { "object_id": "doc-1" } })
        );
    }
}
