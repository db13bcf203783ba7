//! Collection of per-item outcomes from concurrent workers.

use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;

use crate::domain::UploadOutcome;

/// Number of failure messages quoted in a summary before it is truncated.
pub const SUMMARY_EXCERPT_LEN: usize = 3;

/// Lock-free accumulator of upload outcomes.
///
/// Workers record through `&self` from any task. Failures keep their arrival order via an
/// atomic sequence number. [`ResultAggregator::summary`] is meant to be read once every worker
/// has finished.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    successes: AtomicUsize,
    failure_seq: AtomicUsize,
    // Keyed by arrival sequence; `failures()` restores arrival order from the keys.
    failures: DashMap<usize, String>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self, message: impl Into<String>) {
        let seq = self.failure_seq.fetch_add(1, Ordering::Relaxed);
        self.failures.insert(seq, message.into());
    }

    pub fn record(&self, outcome: UploadOutcome) {
        match outcome {
            UploadOutcome::Success => self.record_success(),
            UploadOutcome::Failure(message) => self.record_failure(message),
        }
    }

    pub fn success_count(&self) -> usize {
        self.successes.load(Ordering::Relaxed)
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Failure messages in arrival order.
    pub fn failures(&self) -> Vec<String> {
        let mut entries: Vec<(usize, String)> = self
            .failures
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        entries.sort_unstable_by_key(|(seq, _)| *seq);
        entries.into_iter().map(|(_, message)| message).collect()
    }

    /// `None` when nothing failed, otherwise a report with a bounded excerpt of failures.
    pub fn summary(&self) -> Option<String> {
        let failures = self.failures();
        if failures.is_empty() {
            return None;
        }

        let excerpt = if failures.len() == 1 {
            failures[0].clone()
        } else {
            let mut excerpt = failures
                .iter()
                .take(SUMMARY_EXCERPT_LEN)
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join("\n");
            if failures.len() > SUMMARY_EXCERPT_LEN {
                excerpt.push_str("\n...");
            }
            excerpt
        };

        Some(format!(
            "Icon upload completed with errors. Success: {}, Failed: {}\n{}",
            self.success_count(),
            failures.len(),
            excerpt
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_no_failures_has_no_summary() {
        let aggregator = ResultAggregator::new();
        aggregator.record_success();
        aggregator.record_success();
        assert_eq!(aggregator.summary(), None);
        assert_eq!(aggregator.success_count(), 2);
    }

    #[test]
    fn test_single_failure_is_verbatim() {
        let aggregator = ResultAggregator::new();
        aggregator.record(UploadOutcome::Success);
        aggregator.record(UploadOutcome::Success);
        aggregator.record(UploadOutcome::failure("X"));

        assert_eq!(
            aggregator.summary().unwrap(),
            "Icon upload completed with errors. Success: 2, Failed: 1\nX"
        );
    }

    #[test]
    fn test_excerpt_is_bounded() {
        let aggregator = ResultAggregator::new();
        for i in 1..=5 {
            aggregator.record_failure(format!("error {}", i));
        }

        assert_eq!(
            aggregator.summary().unwrap(),
            "Icon upload completed with errors. Success: 0, Failed: 5\nerror 1\nerror 2\nerror 3\n..."
        );
    }

    #[test]
    fn test_exactly_three_failures_has_no_ellipsis() {
        let aggregator = ResultAggregator::new();
        for message in ["a", "b", "c"] {
            aggregator.record_failure(message);
        }
        aggregator.record_success();

        assert_eq!(
            aggregator.summary().unwrap(),
            "Icon upload completed with errors. Success: 1, Failed: 3\na\nb\nc"
        );
    }

    #[test]
    fn test_failures_keep_arrival_order() {
        let aggregator = ResultAggregator::new();
        for i in 0..100 {
            aggregator.record_failure(format!("failure {}", i));
        }

        let expected: Vec<String> = (0..100).map(|i| format!("failure {}", i)).collect();
        assert_eq!(aggregator.failures(), expected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_recording() {
        let aggregator = Arc::new(ResultAggregator::new());
        let mut handles = Vec::new();

        for i in 0..200 {
            let aggregator = aggregator.clone();
            handles.push(tokio::spawn(async move {
                if i % 4 == 0 {
                    aggregator.record_failure(format!("failure {}", i));
                } else {
                    aggregator.record_success();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(aggregator.success_count(), 150);
        assert_eq!(aggregator.failure_count(), 50);
        assert_eq!(aggregator.failures().len(), 50);
    }
}
