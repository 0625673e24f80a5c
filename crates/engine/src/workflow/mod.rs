//! Workflow-level runtime: everything that interprets a declaration and drives proxies.
//!
//! - `bindings`: parameter import from workflow variables
//! - `dispatch`: content-based activity selection
//! - `fanout`: parallel activity calls
//! - `runner`: the sequential DSL runner
//! - `orchestrations`: built-in workflows composed from the pieces above

pub mod bindings;
pub mod dispatch;
pub mod fanout;
pub mod orchestrations;
pub mod runner;
