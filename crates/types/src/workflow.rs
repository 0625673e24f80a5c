//! Declarative workflow DSL.
//!
//! A [`WorkflowSpec`] is an ordered list of [`ActivitySpec`] entries plus initial variables.
//! Authors reference activities by name; the engine resolves every name against its registry
//! before the first activity runs.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::payload::{ExecutionPayload, Params, Vars};

/// One DSL-driven step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActivitySpec {
    /// Registered activity identifier.
    pub name: String,
    /// Static parameters; explicit values always win over imports.
    #[serde(default)]
    pub params: Params,
    /// Workflow variables copied into `params` before invocation, in order.
    #[serde(default)]
    pub import: Vec<String>,
    /// Variable receiving the activity result for later steps.
    #[serde(default)]
    pub output: Option<String>,
}

/// Complete DSL workflow definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkflowSpec {
    #[serde(default)]
    pub name: String,
    /// Executed in declaration order.
    #[serde(default)]
    pub activities: Vec<ActivitySpec>,
    /// Initial variable bindings; payload variables override them at run start.
    #[serde(default)]
    pub vars: Vars,
}

/// A document holding several named workflows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowBundle {
    pub workflows: IndexMap<String, WorkflowSpec>,
}

/// Inbound message that triggers a DSL workflow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowMessage {
    #[serde(flatten)]
    pub payload: ExecutionPayload,
    pub workflow: WorkflowSpec,
}

impl WorkflowMessage {
    pub fn into_parts(self) -> (ExecutionPayload, WorkflowSpec) {
        (self.payload, self.workflow)
    }
}
