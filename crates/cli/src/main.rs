use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use docflow_engine::{
    ActivityProxies, ActivityRegistry, DslWorkflow, EchoActivity, EngineConfig, LocalScheduler, WorkflowOutcome, parse_workflow_file,
};
use docflow_types::{ExecutionPayload, WorkflowBundle, WorkflowSpec};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "docflow", version, about = "Validate and preview docflow DSL workflows")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check that every workflow in a file resolves its activities.
    Validate {
        /// Path to a workflow YAML/JSON file
        file: PathBuf,
        /// Registered activity name; repeat to list several. Without any, names are not checked.
        #[arg(long = "activity", value_name = "NAME")]
        activities: Vec<String>,
    },
    /// Run a workflow with echo activities and print the outcome.
    Preview {
        /// Path to a workflow YAML/JSON file
        file: PathBuf,
        /// Execution payload as inline JSON, or `@path` to read it from a file
        #[arg(long, default_value = "{}")]
        payload: String,
        /// Workflow name within the file; defaults to the first one
        #[arg(long)]
        workflow: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Validate { file, activities } => {
            let bundle = parse_workflow_file(&file)?;
            for line in validate_bundle(&bundle, &activities)? {
                println!("{line}");
            }
        }
        Command::Preview { file, payload, workflow } => {
            let bundle = parse_workflow_file(&file)?;
            let payload = parse_payload(&payload)?;
            let spec = select_workflow(&bundle, workflow.as_deref())?;
            let outcome = preview(spec.clone(), &payload, &EngineConfig::from_env()?).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
    }
    Ok(())
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .try_init();
}

/// Registry of echo activities for the given names.
fn echo_registry<'a>(names: impl IntoIterator<Item = &'a str>) -> Result<ActivityRegistry> {
    let mut registry = ActivityRegistry::new();
    for name in names {
        if !registry.contains(name) {
            registry.register(name, EchoActivity)?;
        }
    }
    Ok(registry)
}

/// Resolve each workflow against `activities` (or its own names when empty) and summarize.
fn validate_bundle(bundle: &WorkflowBundle, activities: &[String]) -> Result<Vec<String>> {
    let config = EngineConfig::default();
    let mut summary = Vec::with_capacity(bundle.workflows.len());
    for (key, spec) in &bundle.workflows {
        let registry = if activities.is_empty() {
            echo_registry(spec.activities.iter().map(|activity| activity.name.as_str()))?
        } else {
            echo_registry(activities.iter().map(String::as_str))?
        };
        let proxies = ActivityProxies::from_config(&registry, Arc::new(LocalScheduler::new()), &config, &spec.name)?;
        DslWorkflow::new(spec.clone(), proxies).with_context(|| format!("workflow '{key}' is invalid"))?;

        let outputs = spec.activities.iter().filter(|activity| activity.output.is_some()).count();
        debug!(workflow = %key, step_count = spec.activities.len(), "workflow validated");
        summary.push(format!("{key}: {} activities, {outputs} outputs, {} vars", spec.activities.len(), spec.vars.len()));
    }
    Ok(summary)
}

fn select_workflow<'a>(bundle: &'a WorkflowBundle, name: Option<&str>) -> Result<&'a WorkflowSpec> {
    match name {
        Some(name) => bundle.workflows.get(name).with_context(|| format!("workflow '{name}' not found in file")),
        None => bundle.workflows.values().next().context("workflow file contains no workflows"),
    }
}

fn parse_payload(raw: &str) -> Result<ExecutionPayload> {
    let content = match raw.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("Failed to read payload file: {path}"))?,
        None => raw.to_string(),
    };
    serde_json::from_str(&content).context("payload is not a valid execution payload")
}

/// Run `spec` with an echo activity behind every step name.
async fn preview(spec: WorkflowSpec, payload: &ExecutionPayload, config: &EngineConfig) -> Result<WorkflowOutcome> {
    let registry = echo_registry(spec.activities.iter().map(|activity| activity.name.as_str()))?;
    let proxies = ActivityProxies::from_config(&registry, Arc::new(LocalScheduler::new()), config, &spec.name)?;
    info!(workflow = %spec.name, "previewing workflow with echo activities");
    let outcome = DslWorkflow::new(spec, proxies)?.run(payload).await?;
    Ok(outcome)
}
