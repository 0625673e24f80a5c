//! Activity execution: registry, retry policy, scheduler, and the DSL proxy layer.
//!
//! Modules:
//! - `runner`: the [`Activity`] trait and the static [`ActivityRegistry`]
//! - `retry`: [`RetryPolicy`], [`ActivityOptions`], and the attempt state machine
//! - `scheduler`: the substrate boundary and the in-process [`LocalScheduler`]
//! - `proxy`: DSL-callable [`ActivityProxy`] values grouped by options

mod proxy;
mod retry;
mod runner;
mod scheduler;

pub use proxy::{ActivityProxies, ActivityProxiesBuilder, ActivityProxy};
pub use retry::{ActivityOptions, AttemptState, AttemptTracker, RetryPolicy};
pub use runner::{Activity, ActivityRegistry, EchoActivity, FnActivity};
pub use scheduler::{ActivityScheduler, DEFAULT_HISTORY_LIMIT, LocalScheduler};
