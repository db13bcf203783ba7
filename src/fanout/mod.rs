//! Bounded fan-out of icon uploads.
//!
//! Every item is admitted through a semaphore holding `concurrency` permits, in input order,
//! and handed to a task on a [`JoinSet`]. The task runs the work, records its outcome into
//! the shared [`ResultAggregator`] and then releases its permit. The caller waits on the join
//! set until every task has reported.
//!
//! ```text
//! items ──acquire permit──> spawn worker ──work(item)──> aggregator.record() ──drop permit
//!                                                                   │
//! caller ───────────────────────────── join_next() until empty <────┘
//! ```
//!
//! A cancellation token fired while the caller is waiting for a permit or joining aborts the
//! fan-out with [`VolleyError::Interrupted`]. In-flight workers are detached rather than
//! aborted: they run to completion but nobody reads their outcomes.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::domain::UploadOutcome;
use crate::error::{Result, VolleyError, panic_message};
use crate::metrics;

pub mod aggregator;

pub use aggregator::ResultAggregator;

/// Runs one unit of work per item with at most `concurrency` executing at once.
#[derive(Debug, Clone)]
pub struct FanOut {
    concurrency: usize,
    cancellation: CancellationToken,
}

impl FanOut {
    /// A `concurrency` of zero is treated as one.
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run `work` for every item and wait for all of them.
    ///
    /// Each item produces exactly one outcome in `aggregator`; a panicking worker is recorded
    /// as a failure.
    #[tracing::instrument(skip_all, fields(items = items.len(), concurrency = self.concurrency))]
    pub async fn run<T, F, Fut>(
        &self,
        items: Vec<T>,
        aggregator: Arc<ResultAggregator>,
        work: F,
    ) -> Result<()>
    where
        T: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = UploadOutcome> + Send + 'static,
    {
        let total = items.len();
        let gate = Arc::new(Semaphore::new(self.concurrency));
        let work = Arc::new(work);
        let mut join_set: JoinSet<()> = JoinSet::new();

        for (index, item) in items.into_iter().enumerate() {
            let permit = tokio::select! {
                biased;
                _ = self.cancellation.cancelled() => {
                    return Err(interrupt(&mut join_set, index, total));
                }
                permit = gate.clone().acquire_owned() => {
                    permit.map_err(|_| VolleyError::Interrupted)?
                }
            };

            tracing::trace!(index, "Admitted upload");

            let aggregator = aggregator.clone();
            let work = work.clone();
            join_set.spawn(async move {
                // Released after the outcome is recorded
                let _permit = permit;

                metrics::icon_upload_started();
                let _in_flight = scopeguard::guard((), |_| metrics::icon_upload_finished());
                let started = Instant::now();

                let outcome = match AssertUnwindSafe(async move { (*work)(item).await })
                    .catch_unwind()
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(payload) => UploadOutcome::failure(format!(
                        "Request failed: {}",
                        panic_message(payload.as_ref())
                    )),
                };

                if let UploadOutcome::Failure(message) = &outcome {
                    tracing::warn!(index, error = %message, "Icon upload failed");
                }
                metrics::record_icon_upload(outcome.status(), started.elapsed());
                aggregator.record(outcome);
            });
        }

        tracing::debug!(dispatched = total, "All uploads admitted, waiting for completion");

        loop {
            tokio::select! {
                biased;
                _ = self.cancellation.cancelled() => {
                    return Err(interrupt(&mut join_set, total, total));
                }
                joined = join_set.join_next() => match joined {
                    None => break,
                    Some(Ok(())) => {}
                    Some(Err(e)) => {
                        tracing::error!(error = %e, "Upload worker terminated unexpectedly");
                        aggregator.record_failure(format!("Request failed: {}", e));
                    }
                },
            }
        }

        tracing::info!(
            succeeded = aggregator.success_count(),
            failed = aggregator.failure_count(),
            "Icon uploads finished"
        );
        Ok(())
    }
}

fn interrupt(join_set: &mut JoinSet<()>, admitted: usize, total: usize) -> VolleyError {
    let in_flight = join_set.len();
    join_set.detach_all();
    tracing::warn!(admitted, total, in_flight, "Icon upload interrupted");
    VolleyError::Interrupted
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_never_exceeds_concurrency() {
        let executing = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let aggregator = Arc::new(ResultAggregator::new());

        let work = {
            let executing = executing.clone();
            let peak = peak.clone();
            move |_: usize| {
                let executing = executing.clone();
                let peak = peak.clone();
                async move {
                    let now = executing.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    executing.fetch_sub(1, Ordering::SeqCst);
                    UploadOutcome::Success
                }
            }
        };

        FanOut::new(3)
            .run((0..30).collect(), aggregator.clone(), work)
            .await
            .unwrap();

        assert_eq!(aggregator.success_count(), 30);
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 1);
        assert_eq!(executing.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_admission_follows_input_order() {
        let started = Arc::new(Mutex::new(Vec::new()));
        let aggregator = Arc::new(ResultAggregator::new());

        let work = {
            let started = started.clone();
            move |index: usize| {
                let started = started.clone();
                async move {
                    started.lock().push(index);
                    UploadOutcome::Success
                }
            }
        };

        FanOut::new(1)
            .run((0..10).collect(), aggregator, work)
            .await
            .unwrap();

        assert_eq!(*started.lock(), (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_empty_input_returns_immediately() {
        let aggregator = Arc::new(ResultAggregator::new());
        FanOut::new(10)
            .run(Vec::<usize>::new(), aggregator.clone(), |_| async {
                UploadOutcome::Success
            })
            .await
            .unwrap();
        assert_eq!(aggregator.summary(), None);
    }

    #[tokio::test]
    async fn test_panicking_worker_counts_as_failure() {
        let aggregator = Arc::new(ResultAggregator::new());

        FanOut::new(2)
            .run((0..4).collect(), aggregator.clone(), |index: usize| async move {
                if index == 2 {
                    panic!("icon decoder crashed");
                }
                UploadOutcome::Success
            })
            .await
            .unwrap();

        assert_eq!(aggregator.success_count(), 3);
        assert_eq!(
            aggregator.failures(),
            vec!["Request failed: icon decoder crashed".to_string()]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancellation_interrupts_without_draining() {
        let token = CancellationToken::new();
        let aggregator = Arc::new(ResultAggregator::new());
        let finished = Arc::new(AtomicUsize::new(0));

        let work = {
            let finished = finished.clone();
            move |_: usize| {
                let finished = finished.clone();
                async move {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    finished.fetch_add(1, Ordering::SeqCst);
                    UploadOutcome::Success
                }
            }
        };

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let started = Instant::now();
        let result = FanOut::new(2)
            .with_cancellation(token)
            .run((0..10).collect(), aggregator, work)
            .await;

        assert!(matches!(result, Err(VolleyError::Interrupted)));
        assert!(started.elapsed() < Duration::from_millis(200));
        assert_eq!(finished.load(Ordering::SeqCst), 0);

        // Detached workers still run to completion
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancellation_while_joining_admitted_workers() {
        let token = CancellationToken::new();
        let aggregator = Arc::new(ResultAggregator::new());
        let started_count = Arc::new(AtomicUsize::new(0));

        let work = {
            let started_count = started_count.clone();
            move |_: usize| {
                let started_count = started_count.clone();
                async move {
                    started_count.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    UploadOutcome::Success
                }
            }
        };

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            canceller.cancel();
        });

        // Fewer items than permits: everything is admitted before the cancel fires
        let started = Instant::now();
        let result = FanOut::new(10)
            .with_cancellation(token)
            .run((0..3).collect(), aggregator.clone(), work)
            .await;

        assert!(matches!(result, Err(VolleyError::Interrupted)));
        assert!(started.elapsed() < Duration::from_millis(300));
        assert_eq!(started_count.load(Ordering::SeqCst), 3);
        assert_eq!(aggregator.success_count(), 0);
        assert_eq!(aggregator.failure_count(), 0);
    }
}
