//! Parallel fan-out over activity calls.
//!
//! Fanned-out calls have no ordering among themselves. Results are always reported in input
//! order.

use std::future::Future;

use futures_util::future::{join_all, try_join_all};
use serde::Serialize;

/// Await every future; the first failure cancels the rest and is returned.
pub async fn join_all_or_nothing<I, F, T, E>(futures: I) -> Result<Vec<T>, E>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T, E>>,
{
    try_join_all(futures).await
}

/// Outcome of a best-effort fan-out; each entry keeps its input index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FanOutReport<T, E> {
    pub successes: Vec<(usize, T)>,
    pub failures: Vec<(usize, E)>,
}

impl<T, E> FanOutReport<T, E> {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn total(&self) -> usize {
        self.successes.len() + self.failures.len()
    }
}

/// Await every future to completion and partition the outcomes.
pub async fn join_settled<I, F, T, E>(futures: I) -> FanOutReport<T, E>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T, E>>,
{
    let mut report = FanOutReport {
        successes: Vec::new(),
        failures: Vec::new(),
    };
    for (index, outcome) in join_all(futures).await.into_iter().enumerate() {
        match outcome {
            Ok(value) => report.successes.push((index, value)),
            Err(error) => report.failures.push((index, error)),
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    async fn delayed(index: u64, fail: bool) -> Result<u64, String> {
        tokio::time::sleep(Duration::from_millis(10 * (3 - index))).await;
        if fail { Err(format!("call {index} failed")) } else { Ok(index) }
    }

    #[tokio::test]
    async fn all_or_nothing_keeps_input_order() {
        let results = join_all_or_nothing((0..3).map(|index| delayed(index, false))).await;
        assert_eq!(results, Ok(vec![0, 1, 2]));
    }

    #[tokio::test]
    async fn all_or_nothing_surfaces_the_failure() {
        let results = join_all_or_nothing((0..3).map(|index| delayed(index, index == 1))).await;
        assert_eq!(results, Err("call 1 failed".to_string()));
    }

    #[tokio::test]
    async fn settled_reports_every_outcome() {
        let report = join_settled((0..3).map(|index| delayed(index, index == 1))).await;
        assert_eq!(report.successes, vec![(0, 0), (2, 2)]);
        assert_eq!(report.failures, vec![(1, "call 1 failed".to_string())]);
        assert!(!report.is_complete());
        assert_eq!(report.total(), 3);
    }
}
