//! Execution envelope passed to every activity.
//!
//! An [`ExecutionPayload`] is assembled once per workflow run from the inbound message and is
//! never mutated afterwards. Each activity invocation receives its own [`ActivityCall`], a
//! shallow copy of the payload extended with the activity descriptor, the enclosing workflow
//! name, and the effective parameters.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value};

use crate::error::{ClassifiedError, require_param};

/// Workflow-scoped variables; key order carries no meaning.
pub type Vars = JsonMap<String, Value>;

/// Effective parameters handed to a single activity invocation.
pub type Params = JsonMap<String, Value>;

/// Endpoint configuration carried by the payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PayloadConfig {
    /// Studio (API server) endpoint; required to reach the content store.
    #[serde(default)]
    pub studio_url: Option<String>,
    /// Content store endpoint; required to reach the content store.
    #[serde(default)]
    pub store_url: Option<String>,
    /// Additional endpoints or settings forwarded untouched to activities.
    #[serde(flatten)]
    pub extra: JsonMap<String, Value>,
}

/// The value threaded through every activity call of a workflow run.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPayload {
    /// Opaque credential for the content store.
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default)]
    pub account_id: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub config: PayloadConfig,
    /// Target entity identifiers, in the order supplied by the trigger.
    #[serde(default, rename = "objectIds", alias = "object_ids")]
    pub object_ids: Vec<String>,
    #[serde(default)]
    pub vars: Vars,
    /// Triggering event name; opaque to the core.
    #[serde(default)]
    pub event: String,
}

impl fmt::Debug for ExecutionPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionPayload")
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .field("account_id", &self.account_id)
            .field("project_id", &self.project_id)
            .field("config", &self.config)
            .field("object_ids", &self.object_ids)
            .field("vars", &self.vars)
            .field("event", &self.event)
            .finish()
    }
}

impl ExecutionPayload {
    /// Shallow copy of this payload carrying a different variable map.
    pub fn with_vars(&self, vars: Vars) -> Self {
        Self { vars, ..self.clone() }
    }
}

/// Identifies the activity an envelope is addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityDescriptor {
    pub name: String,
}

/// Envelope received by an activity: the payload plus `params`, `activity`, and `workflow_name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityCall {
    #[serde(flatten)]
    pub payload: ExecutionPayload,
    #[serde(default)]
    pub params: Params,
    pub activity: ActivityDescriptor,
    pub workflow_name: String,
}

impl ActivityCall {
    pub fn new(payload: ExecutionPayload, workflow_name: impl Into<String>, activity_name: impl Into<String>, params: Params) -> Self {
        Self {
            payload,
            params,
            activity: ActivityDescriptor { name: activity_name.into() },
            workflow_name: workflow_name.into(),
        }
    }

    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    /// Fetch a parameter the activity cannot run without.
    pub fn require_param(&self, name: &str) -> Result<&Value, ClassifiedError> {
        require_param(&self.params, &self.activity.name, name)
    }

    /// Fetch a required string parameter, rejecting non-string values.
    pub fn require_str(&self, name: &str) -> Result<&str, ClassifiedError> {
        self.require_param(name)?
            .as_str()
            .ok_or_else(|| ClassifiedError::activity_param_invalid(&self.activity.name, name, "expected a string"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn payload_debug_redacts_token() {
        let payload = ExecutionPayload {
            auth_token: Some("secret-token".into()),
            ..Default::default()
        };
        let rendered = format!("{:?}", payload);
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn payload_accepts_camel_case_object_ids() {
        let payload: ExecutionPayload = serde_json::from_value(json!({
            "auth_token": "t",
            "objectIds": ["o1", "o2"],
            "config": { "studio_url": "http://studio", "store_url": "http://store", "region": "eu" }
        }))
        .expect("deserialize payload");
        assert_eq!(payload.object_ids, vec!["o1", "o2"]);
        assert_eq!(payload.config.extra["region"], "eu");
    }

    #[test]
    fn with_vars_leaves_original_untouched() {
        let mut vars = Vars::new();
        vars.insert("a".into(), json!(1));
        let original = ExecutionPayload {
            vars,
            ..Default::default()
        };
        let mut next_vars = original.vars.clone();
        next_vars.insert("b".into(), json!(2));
        let copy = original.with_vars(next_vars);
        assert!(!original.vars.contains_key("b"));
        assert_eq!(copy.vars["b"], 2);
    }

    #[test]
    fn call_envelope_flattens_payload() {
        let payload = ExecutionPayload {
            event: "create".into(),
            ..Default::default()
        };
        let mut params = Params::new();
        params.insert("object_name".into(), json!("foo"));
        let call = ActivityCall::new(payload, "ingest", "x", params);
        let value = serde_json::to_value(&call).expect("serialize call");
        assert_eq!(value["event"], "create");
        assert_eq!(value["activity"]["name"], "x");
        assert_eq!(value["workflow_name"], "ingest");
        assert_eq!(value["params"]["object_name"], "foo");
    }

    #[test]
    fn require_str_rejects_non_strings() {
        let mut params = Params::new();
        params.insert("count".into(), json!(3));
        let call = ActivityCall::new(ExecutionPayload::default(), "wf", "act", params);
        let error = call.require_str("count").expect_err("number is not a string");
        assert_eq!(error.kind, ErrorKind::ActivityParamInvalid);
    }
}
