use docflow_types::{ActivityFailure, ClassifiedError, ErrorKind};
use thiserror::Error;

/// Failures detected while assembling registries, proxies, dispatchers, or workflows.
///
/// These surface before any activity runs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("activity '{0}' is already registered")]
    DuplicateActivity(String),

    #[error("activity '{0}' is not registered")]
    UnknownActivity(String),

    #[error("workflow '{workflow}' step {step} references unregistered activity '{activity}'")]
    UnresolvedStep { workflow: String, step: usize, activity: String },

    #[error("activity '{0}' is bound to more than one proxy group")]
    DuplicateBinding(String),

    #[error("proxy group '{0}' is not configured")]
    UnknownGroup(String),

    #[error("data provider '{0}' is already registered")]
    DuplicateProvider(String),

    #[error("no data provider registered for type '{0}'")]
    UnknownProvider(String),

    #[error("dispatcher '{0}' must end with a catch-all candidate")]
    MissingFallback(String),

    #[error("invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("invalid retry policy: {0}")]
    InvalidRetryPolicy(String),
}

/// Terminal failure of a workflow run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorkflowFailure {
    #[error(transparent)]
    Construction(#[from] EngineError),

    #[error("workflow '{workflow}' rejected its input: {error}")]
    Rejected { workflow: String, error: ClassifiedError },

    #[error("workflow '{workflow}' failed at step {step} ('{activity}'): {failure}")]
    Activity {
        workflow: String,
        step: usize,
        activity: String,
        failure: ActivityFailure,
    },
}

impl WorkflowFailure {
    pub fn rejected(workflow: impl Into<String>, error: ClassifiedError) -> Self {
        Self::Rejected {
            workflow: workflow.into(),
            error,
        }
    }

    pub fn activity(workflow: impl Into<String>, step: usize, activity: impl Into<String>, failure: ActivityFailure) -> Self {
        Self::Activity {
            workflow: workflow.into(),
            step,
            activity: activity.into(),
            failure,
        }
    }

    /// Taxonomy kind of the underlying failure, when it was classified.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            WorkflowFailure::Construction(_) => None,
            WorkflowFailure::Rejected { error, .. } => Some(error.kind),
            WorkflowFailure::Activity { failure, .. } => failure.kind(),
        }
    }

    pub fn activity_failure(&self) -> Option<&ActivityFailure> {
        match self {
            WorkflowFailure::Activity { failure, .. } => Some(failure),
            _ => None,
        }
    }
}
