//! Retry policy and attempt bookkeeping.
//!
//! A [`RetryPolicy`] is bound per proxy group. It decides whether a failed attempt is retried and
//! how long to wait before the next one. [`AttemptTracker`] records the attempt state machine:
//!
//! ```text
//! Pending -> Attempting -> Succeeded
//!                      \-> Retrying -> Attempting
//!                      \-> FailedTerminal
//! ```

use std::{collections::BTreeSet, time::Duration};

use docflow_types::{ActivityFailure, ErrorKind};
use serde::{Deserialize, Serialize};

use crate::{config::duration, error::EngineError};

/// Retry settings applied to every activity of a proxy group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    #[serde(with = "duration")]
    pub initial_interval: Duration,
    pub backoff_coefficient: f64,
    /// Upper bound on attempts, first attempt included; `0` means unlimited.
    pub maximum_attempts: u32,
    #[serde(with = "duration")]
    pub maximum_interval: Duration,
    /// Classified kinds that end the activity after a single attempt.
    pub non_retryable_error_kinds: BTreeSet<ErrorKind>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            backoff_coefficient: 2.0,
            maximum_attempts: 10,
            maximum_interval: Duration::from_secs(100),
            non_retryable_error_kinds: ErrorKind::ALL.into_iter().collect(),
        }
    }
}

impl RetryPolicy {
    /// Policy that gives up after the first failure.
    pub fn no_retry() -> Self {
        Self {
            maximum_attempts: 1,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.backoff_coefficient.is_finite() || self.backoff_coefficient < 1.0 {
            return Err(EngineError::InvalidRetryPolicy(format!(
                "backoff_coefficient must be a finite number >= 1.0, got {}",
                self.backoff_coefficient
            )));
        }
        if self.maximum_interval < self.initial_interval {
            return Err(EngineError::InvalidRetryPolicy(format!(
                "maximum_interval ({:?}) is shorter than initial_interval ({:?})",
                self.maximum_interval, self.initial_interval
            )));
        }
        Ok(())
    }

    /// Delay before the attempt following the `attempt`-th failure (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let seconds = self.initial_interval.as_secs_f64() * self.backoff_coefficient.powi(exponent);
        let capped = seconds.min(self.maximum_interval.as_secs_f64());
        Duration::try_from_secs_f64(capped).unwrap_or(self.maximum_interval)
    }

    /// Whether the `attempt`-th failure (1-based) should be followed by another attempt.
    pub fn should_retry(&self, failure: &ActivityFailure, attempt: u32) -> bool {
        if let Some(kind) = failure.kind()
            && self.non_retryable_error_kinds.contains(&kind)
        {
            return false;
        }
        self.maximum_attempts == 0 || attempt < self.maximum_attempts
    }
}

/// Per-group activity options handed to the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityOptions {
    /// Bound on a single attempt; exceeding it counts as a failed attempt.
    #[serde(with = "duration")]
    pub start_to_close_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for ActivityOptions {
    fn default() -> Self {
        Self {
            start_to_close_timeout: Duration::from_secs(5 * 60),
            retry: RetryPolicy::default(),
        }
    }
}

impl ActivityOptions {
    /// Options for activities expected to run for hours, such as bulk extraction.
    pub fn long_running() -> Self {
        Self {
            start_to_close_timeout: Duration::from_secs(2 * 60 * 60),
            retry: RetryPolicy {
                initial_interval: Duration::from_secs(5),
                maximum_attempts: 20,
                maximum_interval: Duration::from_secs(10 * 60),
                ..RetryPolicy::default()
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptState {
    Pending,
    Attempting,
    Retrying,
    Succeeded,
    FailedTerminal,
}

impl AttemptState {
    pub fn can_transition_to(self, next: AttemptState) -> bool {
        use AttemptState::*;
        matches!(
            (self, next),
            (Pending, Attempting) | (Attempting, Succeeded) | (Attempting, Retrying) | (Attempting, FailedTerminal) | (Retrying, Attempting)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, AttemptState::Succeeded | AttemptState::FailedTerminal)
    }
}

/// Attempt history of one scheduled activity invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptTracker {
    pub activity: String,
    pub attempts: u32,
    pub transitions: Vec<AttemptState>,
}

impl AttemptTracker {
    pub fn new(activity: impl Into<String>) -> Self {
        Self {
            activity: activity.into(),
            attempts: 0,
            transitions: vec![AttemptState::Pending],
        }
    }

    pub fn state(&self) -> AttemptState {
        self.transitions.last().copied().unwrap_or(AttemptState::Pending)
    }

    /// Enter `Attempting` and return the 1-based attempt number.
    pub fn start_attempt(&mut self) -> u32 {
        self.advance(AttemptState::Attempting);
        self.attempts += 1;
        self.attempts
    }

    pub fn schedule_retry(&mut self) {
        self.advance(AttemptState::Retrying);
    }

    pub fn succeed(&mut self) {
        self.advance(AttemptState::Succeeded);
    }

    pub fn fail(&mut self) {
        self.advance(AttemptState::FailedTerminal);
    }

    fn advance(&mut self, next: AttemptState) {
        debug_assert!(
            self.state().can_transition_to(next),
            "illegal attempt transition {:?} -> {:?}",
            self.state(),
            next
        );
        self.transitions.push(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docflow_types::ClassifiedError;

    #[test]
    fn delay_grows_exponentially_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_secs(8));
        assert_eq!(policy.delay_for_attempt(8), Duration::from_secs(100));
        assert_eq!(policy.delay_for_attempt(u32::MAX), Duration::from_secs(100));
    }

    #[test]
    fn classified_kinds_in_the_set_stop_immediately() {
        let policy = RetryPolicy::default();
        for kind in ErrorKind::ALL {
            let failure: ActivityFailure = ClassifiedError::new(kind, "boom").into();
            assert!(!policy.should_retry(&failure, 1), "{kind} must not be retried");
        }
    }

    #[test]
    fn unclassified_failures_retry_until_the_bound() {
        let policy = RetryPolicy {
            maximum_attempts: 3,
            ..RetryPolicy::default()
        };
        let failure = ActivityFailure::unclassified("flaky");
        assert!(policy.should_retry(&failure, 1));
        assert!(policy.should_retry(&failure, 2));
        assert!(!policy.should_retry(&failure, 3));
    }

    #[test]
    fn zero_maximum_attempts_is_unlimited() {
        let policy = RetryPolicy {
            maximum_attempts: 0,
            ..RetryPolicy::default()
        };
        assert!(policy.should_retry(&ActivityFailure::TimedOut { timeout_ms: 5 }, 10_000));
    }

    #[test]
    fn validate_rejects_shrinking_backoff() {
        let policy = RetryPolicy {
            backoff_coefficient: 0.5,
            ..RetryPolicy::default()
        };
        assert!(matches!(policy.validate(), Err(EngineError::InvalidRetryPolicy(_))));
        assert!(RetryPolicy::default().validate().is_ok());
        assert!(ActivityOptions::long_running().retry.validate().is_ok());
    }

    #[test]
    fn tracker_records_retry_cycle() {
        let mut tracker = AttemptTracker::new("extract_text");
        assert_eq!(tracker.start_attempt(), 1);
        tracker.schedule_retry();
        assert_eq!(tracker.start_attempt(), 2);
        tracker.succeed();
        assert_eq!(
            tracker.transitions,
            vec![
                AttemptState::Pending,
                AttemptState::Attempting,
                AttemptState::Retrying,
                AttemptState::Attempting,
                AttemptState::Succeeded
            ]
        );
        assert!(tracker.state().is_terminal());
    }

    #[test]
    fn terminal_states_have_no_exits() {
        assert!(!AttemptState::Succeeded.can_transition_to(AttemptState::Attempting));
        assert!(!AttemptState::FailedTerminal.can_transition_to(AttemptState::Retrying));
        assert!(!AttemptState::Pending.can_transition_to(AttemptState::Succeeded));
    }
}
