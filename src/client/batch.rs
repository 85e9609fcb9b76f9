//! # Batch Executor
//!
//! Runs a list of async operations in chunks of bounded concurrency with a
//! configurable delay between chunks. Individual failures are captured per
//! item and never cancel sibling operations; the aggregate outcome is
//! returned regardless of partial failure.

use crate::config::BatchConfig;
use futures::future::join_all;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

/// Per-item failure within a batch
#[derive(Debug, Clone, PartialEq)]
pub struct BatchItemFailure {
    /// Position of the failed operation in the input list
    pub index: usize,
    pub message: String,
}

/// Aggregate result of a batch run; one entry per input operation, in order
#[derive(Debug)]
pub struct BatchOutcome<T> {
    pub results: Vec<Result<T, BatchItemFailure>>,
    pub success_count: usize,
    pub failure_count: usize,
}

/// Executor-level misconfiguration; the only way `run_batch` itself fails
#[derive(Debug, thiserror::Error)]
#[error("Invalid batch configuration: {0}")]
pub struct BatchConfigError(String);

/// Bounded-concurrency batch runner
#[derive(Debug, Clone)]
pub struct BatchExecutor {
    batch_size: usize,
    batch_delay: Duration,
}

impl BatchExecutor {
    pub fn new(batch_size: usize, batch_delay: Duration) -> Self {
        Self {
            batch_size,
            batch_delay,
        }
    }

    pub fn from_config(config: &BatchConfig) -> Self {
        Self::new(config.batch_size, config.batch_delay())
    }

    /// Execute `operations` in chunks of `batch_size`. At most `batch_size`
    /// operations are in flight at any moment; chunks are separated by the
    /// configured delay. Every input operation produces exactly one entry in
    /// the outcome, success or failure.
    pub async fn run_batch<T, E, Fut>(
        &self,
        operations: Vec<Fut>,
    ) -> Result<BatchOutcome<T>, BatchConfigError>
    where
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        if self.batch_size == 0 {
            return Err(BatchConfigError(
                "batch_size must be greater than zero".to_string(),
            ));
        }

        let total = operations.len();
        let mut results: Vec<Result<T, BatchItemFailure>> = Vec::with_capacity(total);
        let mut success_count = 0;
        let mut failure_count = 0;

        let mut remaining = operations.into_iter().enumerate();
        let mut first_chunk = true;

        loop {
            let chunk: Vec<_> = remaining.by_ref().take(self.batch_size).collect();
            if chunk.is_empty() {
                break;
            }

            if !first_chunk && !self.batch_delay.is_zero() {
                tokio::time::sleep(self.batch_delay).await;
            }
            first_chunk = false;

            debug!(
                chunk_size = chunk.len(),
                completed = results.len(),
                total,
                "Executing batch chunk"
            );

            let chunk_results =
                join_all(chunk.into_iter().map(|(index, fut)| async move {
                    (index, fut.await)
                }))
                .await;

            // join_all preserves input order within the chunk
            for (index, result) in chunk_results {
                match result {
                    Ok(value) => {
                        success_count += 1;
                        results.push(Ok(value));
                    }
                    Err(err) => {
                        failure_count += 1;
                        results.push(Err(BatchItemFailure {
                            index,
                            message: err.to_string(),
                        }));
                    }
                }
            }
        }

        info!(
            total,
            success_count, failure_count, "📦 Batch execution complete"
        );

        Ok(BatchOutcome {
            results,
            success_count,
            failure_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_all_operations_accounted_for() {
        let executor = BatchExecutor::new(3, Duration::from_millis(0));
        let operations: Vec<_> = (0..10)
            .map(|i| async move {
                if i % 2 == 0 {
                    Ok::<_, String>(i)
                } else {
                    Err(format!("boom {i}"))
                }
            })
            .collect();

        let outcome = executor.run_batch(operations).await.unwrap();
        assert_eq!(outcome.results.len(), 10);
        assert_eq!(outcome.success_count, 5);
        assert_eq!(outcome.failure_count, 5);
    }

    #[tokio::test]
    async fn test_failure_does_not_cancel_siblings() {
        let executor = BatchExecutor::new(4, Duration::from_millis(0));
        let completed = Arc::new(AtomicUsize::new(0));

        let operations: Vec<_> = (0..4)
            .map(|i| {
                let completed = Arc::clone(&completed);
                async move {
                    completed.fetch_add(1, Ordering::SeqCst);
                    if i == 0 {
                        Err("first fails".to_string())
                    } else {
                        Ok(i)
                    }
                }
            })
            .collect();

        let outcome = executor.run_batch(operations).await.unwrap();
        assert_eq!(completed.load(Ordering::SeqCst), 4);
        assert_eq!(outcome.failure_count, 1);
        assert_eq!(outcome.results[0].as_ref().unwrap_err().index, 0);
    }

    #[tokio::test]
    async fn test_bounded_parallelism() {
        let executor = BatchExecutor::new(2, Duration::from_millis(0));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_observed = Arc::new(AtomicUsize::new(0));

        let operations: Vec<_> = (0..8)
            .map(|i| {
                let in_flight = Arc::clone(&in_flight);
                let max_observed = Arc::clone(&max_observed);
                async move {
                    let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    max_observed.fetch_max(current, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, String>(i)
                }
            })
            .collect();

        let outcome = executor.run_batch(operations).await.unwrap();
        assert_eq!(outcome.success_count, 8);
        assert!(max_observed.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_zero_batch_size_is_misconfiguration() {
        let executor = BatchExecutor::new(0, Duration::from_millis(0));
        let operations: Vec<_> = vec![async { Ok::<_, String>(1) }];
        assert!(executor.run_batch(operations).await.is_err());
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let executor = BatchExecutor::new(5, Duration::from_millis(0));
        let operations: Vec<futures::future::Ready<Result<i32, String>>> = vec![];
        let outcome = executor.run_batch(operations).await.unwrap();
        assert!(outcome.results.is_empty());
        assert_eq!(outcome.success_count, 0);
    }
}
