//! Shared type definitions for the docflow workflow core.
//!
//! - `payload`: the execution envelope threaded through every activity call
//! - `workflow`: the declarative DSL (`WorkflowSpec` / `ActivitySpec`) and the inbound message
//! - `error`: the closed failure taxonomy and the activity failure envelope

pub mod error;
pub mod payload;
pub mod workflow;

pub use error::{ActivityFailure, ClassifiedError, ErrorKind, is_retryable, require_param, require_var};
pub use payload::{ActivityCall, ActivityDescriptor, ExecutionPayload, Params, PayloadConfig, Vars};
pub use workflow::{ActivitySpec, WorkflowBundle, WorkflowMessage, WorkflowSpec};
