//! Sequential DSL workflow runner.

use chrono::{DateTime, Utc};
use docflow_types::{ExecutionPayload, Params, Vars, WorkflowMessage, WorkflowSpec};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use super::bindings::resolve_params;
use crate::{
    context::validate_context,
    error::{EngineError, WorkflowFailure},
    executor::ActivityProxies,
};

/// Record of one executed step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRecord {
    pub index: usize,
    pub activity: String,
    pub params: Params,
    pub output: Value,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Result of a completed workflow run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowOutcome {
    pub workflow: String,
    /// Output of the last step, or `null` for an empty workflow.
    pub result: Value,
    pub vars: Vars,
    pub steps: Vec<StepRecord>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// A workflow spec whose every activity name resolved against the proxy table.
#[derive(Debug, Clone)]
pub struct DslWorkflow {
    spec: WorkflowSpec,
    proxies: ActivityProxies,
}

impl DslWorkflow {
    pub fn new(spec: WorkflowSpec, proxies: ActivityProxies) -> Result<Self, EngineError> {
        if let Some((step, activity)) = spec
            .activities
            .iter()
            .enumerate()
            .find(|(_, activity)| !proxies.contains(&activity.name))
        {
            return Err(EngineError::UnresolvedStep {
                workflow: spec.name.clone(),
                step,
                activity: activity.name.clone(),
            });
        }
        Ok(Self { spec, proxies })
    }

    pub fn spec(&self) -> &WorkflowSpec {
        &self.spec
    }

    /// Run every activity in declaration order.
    ///
    /// Initial variables are the workflow's `vars` overlaid by the payload's. Each step sees a copy of
    /// the variables as they stood when it started; a step's `output` becomes visible to later
    /// steps only.
    pub async fn run(&self, payload: &ExecutionPayload) -> Result<WorkflowOutcome, WorkflowFailure> {
        let workflow = self.spec.name.as_str();
        let started_at = Utc::now();
        let mut vars = self.spec.vars.clone();
        for (key, value) in &payload.vars {
            vars.insert(key.clone(), value.clone());
        }

        info!(workflow, step_count = self.spec.activities.len(), "workflow started");
        let mut steps = Vec::with_capacity(self.spec.activities.len());
        let mut result = Value::Null;

        for (index, activity) in self.spec.activities.iter().enumerate() {
            let proxy = self.proxies.require(&activity.name)?;
            let params = resolve_params(activity, &vars);
            let step_payload = payload.with_vars(vars.clone());
            let step_started = Utc::now();
            info!(workflow, step = index, activity = %activity.name, "workflow step started");

            let output = match proxy.call_in(workflow, &step_payload, params.clone()).await {
                Ok(output) => output,
                Err(failure) => {
                    warn!(workflow, step = index, activity = %activity.name, error = %failure, "workflow step failed");
                    return Err(WorkflowFailure::activity(workflow, index, &activity.name, failure));
                }
            };

            if let Some(variable) = &activity.output {
                vars.insert(variable.clone(), output.clone());
            }
            info!(workflow, step = index, activity = %activity.name, "workflow step finished");
            steps.push(StepRecord {
                index,
                activity: activity.name.clone(),
                params,
                output: output.clone(),
                started_at: step_started,
                finished_at: Utc::now(),
            });
            result = output;
        }

        info!(workflow, "workflow finished");
        Ok(WorkflowOutcome {
            workflow: workflow.to_string(),
            result,
            vars,
            steps,
            started_at,
            finished_at: Utc::now(),
        })
    }
}

/// Entry point for an inbound workflow message.
///
/// Every activity name is resolved and the execution context validated before the first
/// activity runs.
pub async fn run_dsl_workflow(message: WorkflowMessage, proxies: ActivityProxies) -> Result<WorkflowOutcome, WorkflowFailure> {
    let (payload, spec) = message.into_parts();
    let workflow = DslWorkflow::new(spec, proxies)?;
    validate_context(&payload).map_err(|error| WorkflowFailure::rejected(&workflow.spec.name, error))?;
    workflow.run(&payload).await
}
