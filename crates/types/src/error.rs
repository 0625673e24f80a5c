//! Classified failure taxonomy.
//!
//! Every failure an activity raises on purpose is a [`ClassifiedError`] tagged with one of the
//! [`ErrorKind`] variants. The kind decides retry eligibility through [`is_retryable`], which is
//! a pure function and knows nothing about the scheduler that eventually consumes it.
//!
//! Anything an activity did not classify (transport failures, unexpected panics surfaced as
//! errors, timeouts) is carried as [`ActivityFailure::Unclassified`] or
//! [`ActivityFailure::TimedOut`] and stays retryable until the bound policy runs out of attempts.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value};
use thiserror::Error;

use crate::payload::{Params, Vars};

/// Closed set of failure kinds recognised by the workflow core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Target entity absent, of the wrong type, or missing its content/source.
    #[serde(rename = "DocumentNotFoundError")]
    DocumentNotFound,
    /// A required parameter is absent after import and merge.
    #[serde(rename = "ActivityParamNotFoundError")]
    ActivityParamNotFound,
    /// A present parameter failed validation.
    #[serde(rename = "ActivityParamInvalidError")]
    ActivityParamInvalid,
    /// A workflow-level required variable is absent.
    #[serde(rename = "WorkflowParamNotFoundError")]
    WorkflowParamNotFound,
    /// Upstream rate limit or quota signal.
    #[serde(rename = "ResourceExhaustedError")]
    ResourceExhausted,
    /// Entity content type does not match what the selected activity expects.
    #[serde(rename = "InvalidContentTypeError")]
    InvalidContentType,
    /// Authentication credential rejected or expired.
    #[serde(rename = "TokenExpiredError")]
    TokenExpired,
}

impl ErrorKind {
    /// Every kind in the taxonomy, in declaration order.
    pub const ALL: [ErrorKind; 7] = [
        ErrorKind::DocumentNotFound,
        ErrorKind::ActivityParamNotFound,
        ErrorKind::ActivityParamInvalid,
        ErrorKind::WorkflowParamNotFound,
        ErrorKind::ResourceExhausted,
        ErrorKind::InvalidContentType,
        ErrorKind::TokenExpired,
    ];

    /// Stable tag surfaced to operators and used in retry policy configuration.
    pub fn tag(self) -> &'static str {
        match self {
            ErrorKind::DocumentNotFound => "DocumentNotFoundError",
            ErrorKind::ActivityParamNotFound => "ActivityParamNotFoundError",
            ErrorKind::ActivityParamInvalid => "ActivityParamInvalidError",
            ErrorKind::WorkflowParamNotFound => "WorkflowParamNotFoundError",
            ErrorKind::ResourceExhausted => "ResourceExhaustedError",
            ErrorKind::InvalidContentType => "InvalidContentTypeError",
            ErrorKind::TokenExpired => "TokenExpiredError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Error returned when parsing an unknown error kind tag.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown error kind '{0}'")]
pub struct UnknownErrorKind(pub String);

impl FromStr for ErrorKind {
    type Err = UnknownErrorKind;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        ErrorKind::ALL
            .into_iter()
            .find(|kind| kind.tag() == tag)
            .ok_or_else(|| UnknownErrorKind(tag.to_string()))
    }
}

/// Whether a failure of the given kind may be attempted again.
///
/// All classified kinds describe configuration or logic problems, so none of them are retried.
pub fn is_retryable(kind: ErrorKind) -> bool {
    match kind {
        ErrorKind::DocumentNotFound
        | ErrorKind::ActivityParamNotFound
        | ErrorKind::ActivityParamInvalid
        | ErrorKind::WorkflowParamNotFound
        | ErrorKind::ResourceExhausted
        | ErrorKind::InvalidContentType
        | ErrorKind::TokenExpired => false,
    }
}

/// A failure tagged with a taxonomy kind and kind-specific structured fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("{}: {}{}", .kind, .message, render_fields(.fields))]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub message: String,
    /// Derived from `kind` at construction.
    #[serde(default)]
    pub retryable: bool,
    /// Structured triage data (entity ids, parameter name, expected/actual type).
    #[serde(default)]
    pub fields: JsonMap<String, Value>,
}

fn render_fields(fields: &JsonMap<String, Value>) -> String {
    if fields.is_empty() {
        String::new()
    } else {
        format!(" {}", Value::Object(fields.clone()))
    }
}

impl ClassifiedError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable: is_retryable(kind),
            fields: JsonMap::new(),
        }
    }

    /// Attach a structured field to the error.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn document_not_found<S: AsRef<str>>(object_ids: &[S], message: impl Into<String>) -> Self {
        let ids: Vec<Value> = object_ids.iter().map(|id| Value::String(id.as_ref().to_string())).collect();
        Self::new(ErrorKind::DocumentNotFound, message).with_field("object_ids", ids)
    }

    pub fn activity_param_not_found(activity: &str, param: &str) -> Self {
        Self::new(
            ErrorKind::ActivityParamNotFound,
            format!("missing required parameter '{}' for activity '{}'", param, activity),
        )
        .with_field("activity", activity)
        .with_field("param", param)
    }

    pub fn activity_param_invalid(activity: &str, param: &str, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::new(
            ErrorKind::ActivityParamInvalid,
            format!("invalid parameter '{}' for activity '{}': {}", param, activity, reason),
        )
        .with_field("activity", activity)
        .with_field("param", param)
        .with_field("reason", reason)
    }

    pub fn workflow_param_not_found(param: &str) -> Self {
        Self::new(ErrorKind::WorkflowParamNotFound, format!("missing required workflow variable '{}'", param)).with_field("param", param)
    }

    pub fn resource_exhausted(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ResourceExhausted, message)
    }

    pub fn invalid_content_type(object_id: &str, expected: &str, actual: &str) -> Self {
        Self::new(
            ErrorKind::InvalidContentType,
            format!("object '{}' has content type '{}', expected '{}'", object_id, actual, expected),
        )
        .with_field("object_id", object_id)
        .with_field("expected", expected)
        .with_field("actual", actual)
    }

    pub fn token_expired(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TokenExpired, message)
    }
}

/// Outcome of a failed activity attempt as seen by the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActivityFailure {
    #[error(transparent)]
    Classified(ClassifiedError),

    #[error("activity failed: {message}")]
    Unclassified { message: String },

    #[error("activity attempt exceeded its start-to-close timeout of {timeout_ms}ms")]
    TimedOut { timeout_ms: u64 },
}

impl ActivityFailure {
    /// Wrap any error an activity did not classify.
    pub fn unclassified(error: impl fmt::Display) -> Self {
        Self::Unclassified { message: error.to_string() }
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ActivityFailure::Classified(error) => Some(error.kind),
            _ => None,
        }
    }

    /// Unclassified failures and timeouts are retryable by omission.
    pub fn is_retryable(&self) -> bool {
        match self {
            ActivityFailure::Classified(error) => is_retryable(error.kind),
            ActivityFailure::Unclassified { .. } | ActivityFailure::TimedOut { .. } => true,
        }
    }
}

impl From<ClassifiedError> for ActivityFailure {
    fn from(error: ClassifiedError) -> Self {
        ActivityFailure::Classified(error)
    }
}

/// Look up a required activity parameter; `null` counts as absent.
pub fn require_param<'a>(params: &'a Params, activity: &str, name: &str) -> Result<&'a Value, ClassifiedError> {
    match params.get(name) {
        Some(Value::Null) | None => Err(ClassifiedError::activity_param_not_found(activity, name)),
        Some(value) => Ok(value),
    }
}

/// Look up a required workflow variable; `null` counts as absent.
pub fn require_var<'a>(vars: &'a Vars, name: &str) -> Result<&'a Value, ClassifiedError> {
    match vars.get(name) {
        Some(Value::Null) | None => Err(ClassifiedError::workflow_param_not_found(name)),
        Some(value) => Ok(value),
    }
}
