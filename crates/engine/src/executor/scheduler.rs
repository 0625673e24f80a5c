//! Substrate boundary: run an activity under a timeout and retry policy.

use std::{collections::VecDeque, sync::Arc};

use async_trait::async_trait;
use docflow_types::{ActivityCall, ActivityFailure};
use serde_json::Value;
use tokio::{sync::Mutex, time};
use tracing::{debug, info, warn};

use super::{
    retry::{ActivityOptions, AttemptTracker},
    runner::Activity,
};

/// Executes activities on behalf of proxies.
///
/// A durable-execution substrate implements this to persist attempts across process restarts;
/// [`LocalScheduler`] runs them in-process.
#[async_trait]
pub trait ActivityScheduler: Send + Sync {
    async fn schedule(&self, activity: Arc<dyn Activity>, call: ActivityCall, options: &ActivityOptions) -> Result<Value, ActivityFailure>;
}

/// Attempt histories kept by a [`LocalScheduler`] unless configured otherwise.
pub const DEFAULT_HISTORY_LIMIT: usize = 256;

/// In-process scheduler applying `start_to_close_timeout`, backoff, and the non-retryable set.
///
/// The most recent finished invocations are kept for inspection; older ones are dropped once
/// the history limit is reached.
#[derive(Debug)]
pub struct LocalScheduler {
    history: Mutex<VecDeque<AttemptTracker>>,
    history_limit: usize,
}

impl Default for LocalScheduler {
    fn default() -> Self {
        Self::with_history_limit(DEFAULT_HISTORY_LIMIT)
    }
}

impl LocalScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `limit` histories; `0` disables recording.
    pub fn with_history_limit(limit: usize) -> Self {
        Self {
            history: Mutex::new(VecDeque::new()),
            history_limit: limit,
        }
    }

    /// Attempt histories of recent finished invocations, oldest first.
    pub async fn history(&self) -> Vec<AttemptTracker> {
        self.history.lock().await.iter().cloned().collect()
    }

    /// Drain the recorded histories, oldest first.
    pub async fn take_history(&self) -> Vec<AttemptTracker> {
        self.history.lock().await.drain(..).collect()
    }

    async fn record(&self, tracker: AttemptTracker) {
        if self.history_limit == 0 {
            return;
        }
        let mut history = self.history.lock().await;
        while history.len() >= self.history_limit {
            history.pop_front();
        }
        history.push_back(tracker);
    }
}

#[async_trait]
impl ActivityScheduler for LocalScheduler {
    async fn schedule(&self, activity: Arc<dyn Activity>, call: ActivityCall, options: &ActivityOptions) -> Result<Value, ActivityFailure> {
        let mut tracker = AttemptTracker::new(call.activity.name.clone());
        let timeout = options.start_to_close_timeout;

        loop {
            let attempt = tracker.start_attempt();
            debug!(
                activity = %call.activity.name,
                workflow = %call.workflow_name,
                attempt,
                "activity attempt started"
            );

            let outcome = match time::timeout(timeout, activity.run(call.clone())).await {
                Ok(outcome) => outcome,
                Err(_) => Err(ActivityFailure::TimedOut {
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                }),
            };

            match outcome {
                Ok(value) => {
                    tracker.succeed();
                    info!(activity = %call.activity.name, attempts = attempt, "activity succeeded");
                    self.record(tracker).await;
                    return Ok(value);
                }
                Err(failure) if options.retry.should_retry(&failure, attempt) => {
                    let delay = options.retry.delay_for_attempt(attempt);
                    tracker.schedule_retry();
                    warn!(
                        activity = %call.activity.name,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %failure,
                        "activity attempt failed; retrying"
                    );
                    time::sleep(delay).await;
                }
                Err(failure) => {
                    tracker.fail();
                    warn!(
                        activity = %call.activity.name,
                        attempts = attempt,
                        kind = failure.kind().map(|kind| kind.tag()).unwrap_or("unclassified"),
                        error = %failure,
                        "activity failed terminally"
                    );
                    self.record(tracker).await;
                    return Err(failure);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicU32, Ordering},
        time::Duration,
    };

    use super::*;
    use crate::executor::retry::{AttemptState, RetryPolicy};
    use docflow_types::{ClassifiedError, ErrorKind, ExecutionPayload, Params};
    use serde_json::json;

    struct FlakyActivity {
        calls: AtomicU32,
        fail_times: u32,
    }

    #[async_trait]
    impl Activity for FlakyActivity {
        async fn run(&self, _call: ActivityCall) -> Result<Value, ActivityFailure> {
            let call_number = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call_number <= self.fail_times {
                return Err(ActivityFailure::unclassified("connection reset"));
            }
            Ok(json!({ "call": call_number }))
        }
    }

    struct SlowActivity;

    #[async_trait]
    impl Activity for SlowActivity {
        async fn run(&self, _call: ActivityCall) -> Result<Value, ActivityFailure> {
            time::sleep(Duration::from_secs(5)).await;
            Ok(Value::Null)
        }
    }

    fn quick_options(maximum_attempts: u32) -> ActivityOptions {
        ActivityOptions {
            start_to_close_timeout: Duration::from_millis(200),
            retry: RetryPolicy {
                initial_interval: Duration::from_millis(1),
                maximum_interval: Duration::from_millis(4),
                maximum_attempts,
                ..RetryPolicy::default()
            },
        }
    }

    fn call(name: &str) -> ActivityCall {
        ActivityCall::new(ExecutionPayload::default(), "wf", name, Params::new())
    }

    #[tokio::test]
    async fn retries_unclassified_failures_until_success() {
        let scheduler = LocalScheduler::new();
        let activity = Arc::new(FlakyActivity {
            calls: AtomicU32::new(0),
            fail_times: 2,
        });
        let value = scheduler
            .schedule(activity.clone(), call("flaky"), &quick_options(5))
            .await
            .expect("third attempt succeeds");
        assert_eq!(value, json!({ "call": 3 }));

        let history = scheduler.history().await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].attempts, 3);
        assert_eq!(history[0].state(), AttemptState::Succeeded);
    }

    #[tokio::test]
    async fn classified_failure_is_attempted_once() {
        let scheduler = LocalScheduler::new();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let mut registry = crate::executor::ActivityRegistry::new();
        registry
            .register_fn("strict", move |_call| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<Value, ActivityFailure>(ClassifiedError::token_expired("expired").into())
                }
            })
            .expect("register");
        let activity = registry.get("strict").expect("registered");

        let failure = scheduler.schedule(activity, call("strict"), &quick_options(5)).await.expect_err("fails");
        assert_eq!(failure.kind(), Some(ErrorKind::TokenExpired));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.history().await[0].state(), AttemptState::FailedTerminal);
    }

    #[tokio::test]
    async fn timeout_counts_as_an_attempt() {
        let scheduler = LocalScheduler::new();
        let failure = scheduler
            .schedule(Arc::new(SlowActivity), call("slow"), &quick_options(2))
            .await
            .expect_err("times out");
        assert_eq!(failure, ActivityFailure::TimedOut { timeout_ms: 200 });
        assert_eq!(scheduler.history().await[0].attempts, 2);
    }

    #[tokio::test]
    async fn history_is_bounded_and_drainable() {
        let scheduler = LocalScheduler::with_history_limit(3);
        let activity: Arc<dyn Activity> = Arc::new(FlakyActivity {
            calls: AtomicU32::new(0),
            fail_times: 0,
        });
        for _ in 0..10 {
            scheduler.schedule(activity.clone(), call("steady"), &quick_options(1)).await.expect("run");
        }
        assert_eq!(scheduler.history().await.len(), 3);

        let drained = scheduler.take_history().await;
        assert_eq!(drained.len(), 3);
        assert!(drained.iter().all(|tracker| tracker.state() == AttemptState::Succeeded));
        assert!(scheduler.history().await.is_empty());
    }

    #[tokio::test]
    async fn zero_limit_records_nothing() {
        let scheduler = LocalScheduler::with_history_limit(0);
        let activity = Arc::new(FlakyActivity {
            calls: AtomicU32::new(0),
            fail_times: 0,
        });
        scheduler.schedule(activity, call("steady"), &quick_options(1)).await.expect("run");
        assert!(scheduler.take_history().await.is_empty());
    }
}
