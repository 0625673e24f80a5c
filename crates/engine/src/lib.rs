//! # Docflow Engine
//!
//! The activity-dispatch and workflow-orchestration core. A workflow is a declarative list of
//! named activity invocations; the engine turns that declaration into calls through a narrow
//! proxy layer that applies per-group timeouts and retry policies.
//!
//! ## Key Features
//!
//! - **Workflow Parsing**: Loads YAML/JSON workflow specs (single or multi-workflow)
//! - **Proxy Layer**: Binds registered activities to option groups, validated at construction
//! - **Parameter Import**: Merges workflow variables into activity parameters
//! - **Conditional Dispatch**: Chooses an activity by a runtime attribute such as media type
//! - **Data Providers**: A uniform fetch contract over content store entity types
//!
//! ## Usage
//!
//! ```rust
//! use docflow_engine::parse_workflow_file;
//!
//! let temp_dir = tempfile::tempdir()?;
//! let workflow_path = temp_dir.path().join("workflow.yaml");
//! std::fs::write(&workflow_path, r#"
//! name: "ingest"
//! activities:
//!   - name: "extract_text"
//!     import: ["object_name"]
//!     output: "text"
//! "#)?;
//!
//! let workflow_bundle = parse_workflow_file(&workflow_path)?;
//! for (name, spec) in &workflow_bundle.workflows {
//!     println!("Workflow: {} ({} activities)", name, spec.activities.len());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! - **`executor`**: activity registry, retry policy, scheduler, and proxies
//! - **`workflow`**: parameter binding, dispatch, fan-out, and the DSL runner
//! - **`provider`**: data provider registry and built-in providers
//! - **`context`**: execution context validation and content store access
//! - **`config`**: proxy group configuration

use std::{fs, path::Path};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::Deserialize;

pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod provider;
pub mod workflow;

pub use config::{EngineConfig, GroupConfig, parse_duration};
pub use context::{client_settings, content_store, validate_context};
pub use docflow_types::{ActivitySpec, WorkflowBundle, WorkflowMessage, WorkflowSpec};
pub use error::{EngineError, WorkflowFailure};
pub use executor::{
    Activity, ActivityOptions, ActivityProxies, ActivityProxy, ActivityRegistry, ActivityScheduler, AttemptState, AttemptTracker,
    EchoActivity, LocalScheduler, RetryPolicy,
};
pub use provider::{DataProvider, FetchActivity, FetchSpec, ProviderRegistry, fetch_provider, normalize_id_filter};
pub use workflow::bindings::resolve_params;
pub use workflow::dispatch::{ActivitySelector, Candidate, ConditionalDispatcher, Predicate};
pub use workflow::fanout::{FanOutReport, join_all_or_nothing, join_settled};
pub use workflow::orchestrations::{extract_content, notify_webhooks, recalculate_embeddings};
pub use workflow::runner::{DslWorkflow, StepRecord, WorkflowOutcome, run_dsl_workflow};

/// Loads a workflow file from the filesystem.
///
/// YAML is a superset of JSON, so both formats go through the same parser. Two document shapes
/// are accepted:
///
/// - a multi-workflow document with workflows under a `workflows` key
/// - a single workflow specification with `name`, `activities`, and `vars`
///
/// A single workflow without a `name` is keyed as `default`.
///
/// # Errors
///
/// This function will return an error if:
/// - The file cannot be read from the filesystem
/// - The file content matches neither document shape
pub fn parse_workflow_file(file_path: impl AsRef<Path>) -> Result<WorkflowBundle> {
    let file_path = file_path.as_ref();
    let file_content = fs::read(file_path).with_context(|| format!("Failed to read workflow file: {}", file_path.display()))?;

    let content_string = String::from_utf8_lossy(&file_content);

    // Try the multi-workflow shape first so bundles are not read as a single spec with
    // ignored fields.
    #[derive(Deserialize)]
    struct MultiWorkflowDocument {
        workflows: IndexMap<String, WorkflowSpec>,
    }

    if let Ok(multi_workflow_document) = serde_yaml::from_str::<MultiWorkflowDocument>(&content_string) {
        let workflows = multi_workflow_document
            .workflows
            .into_iter()
            .map(|(key, mut spec)| {
                if spec.name.is_empty() {
                    spec.name = key.clone();
                }
                (key, spec)
            })
            .collect();
        return Ok(WorkflowBundle { workflows });
    }

    let single_workflow_error = match serde_yaml::from_str::<WorkflowSpec>(&content_string) {
        Ok(mut workflow_specification) => {
            if workflow_specification.name.is_empty() {
                workflow_specification.name = "default".to_string();
            }
            let mut workflows = IndexMap::new();
            workflows.insert(workflow_specification.name.clone(), workflow_specification);
            return Ok(WorkflowBundle { workflows });
        }
        Err(error) => error,
    };

    anyhow::bail!(
        "Unsupported workflow document format in {}: {}. Expected one of:\n\
         - Single workflow specification with 'name', 'activities', and 'vars' fields\n\
         - Multi-workflow document with workflows under 'workflows' key",
        file_path.display(),
        single_workflow_error
    );
}
