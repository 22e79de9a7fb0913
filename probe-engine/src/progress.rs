//! Run progress accounting and snapshot broadcasting

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::error;
use uuid::Uuid;

use crate::traits::ResultSink;
use crate::types::{AttemptOutcome, ProgressSnapshot};

/// Tracks counts for one run and fans outcomes out to the sink.
///
/// Counters only move through `record`, so completed/succeeded/failed never
/// exceed the total and `completed == succeeded + failed` holds throughout.
/// A sink failure is logged and dropped; accounting must not stall the run.
pub struct ProgressTracker {
    run_id: Uuid,
    total: usize,
    completed: AtomicUsize,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
    sink: Arc<dyn ResultSink>,
    progress_tx: broadcast::Sender<ProgressSnapshot>,
}

impl ProgressTracker {
    pub fn new(
        run_id: Uuid,
        total: usize,
        sink: Arc<dyn ResultSink>,
        progress_tx: broadcast::Sender<ProgressSnapshot>,
    ) -> Self {
        Self {
            run_id,
            total,
            completed: AtomicUsize::new(0),
            succeeded: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            sink,
            progress_tx,
        }
    }

    /// Record one finished attempt: forward it to the sink, bump the
    /// counters, then broadcast a fresh snapshot. Attempts that never got a
    /// response count as failures, exactly like a rejected login.
    pub async fn record(&self, outcome: AttemptOutcome) {
        if let Err(e) = self.sink.record(&outcome).await {
            error!(run_id = %self.run_id, task_id = %outcome.task_id, "result sink error: {}", e);
        }

        self.completed.fetch_add(1, Ordering::SeqCst);
        if outcome.succeeded {
            self.succeeded.fetch_add(1, Ordering::SeqCst);
        } else {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }

        // Nobody listening is fine
        let _ = self.progress_tx.send(self.snapshot());
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            run_id: self.run_id,
            total: self.total,
            completed: self.completed.load(Ordering::SeqCst),
            succeeded: self.succeeded.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn succeeded(&self) -> usize {
        self.succeeded.load(Ordering::SeqCst)
    }

    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EngineError, EngineResult};
    use crate::types::{AttemptTask, Credential};
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    struct VecSink {
        outcomes: Mutex<Vec<AttemptOutcome>>,
    }

    impl VecSink {
        fn new() -> Self {
            Self {
                outcomes: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ResultSink for VecSink {
        async fn record(&self, outcome: &AttemptOutcome) -> EngineResult<()> {
            self.outcomes.lock().await.push(outcome.clone());
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl ResultSink for FailingSink {
        async fn record(&self, _outcome: &AttemptOutcome) -> EngineResult<()> {
            Err(EngineError::Sink {
                reason: "disk full".to_string(),
            })
        }
    }

    fn outcome(succeeded: bool) -> AttemptOutcome {
        let task = AttemptTask::new(Credential::new("u".to_string(), "p".to_string()));
        AttemptOutcome::completed(&task, succeeded, 200)
    }

    #[tokio::test]
    async fn counters_track_successes_and_failures() {
        let (tx, _rx) = broadcast::channel(16);
        let sink = Arc::new(VecSink::new());
        let tracker = ProgressTracker::new(Uuid::new_v4(), 3, sink.clone(), tx);

        tracker.record(outcome(true)).await;
        tracker.record(outcome(false)).await;
        tracker.record(outcome(false)).await;

        assert_eq!(tracker.completed(), 3);
        assert_eq!(tracker.succeeded(), 1);
        assert_eq!(tracker.failed(), 2);
        assert_eq!(tracker.completed(), tracker.succeeded() + tracker.failed());
        assert_eq!(sink.outcomes.lock().await.len(), 3);
    }

    #[tokio::test]
    async fn sink_failure_does_not_stop_accounting() {
        let (tx, _rx) = broadcast::channel(16);
        let tracker = ProgressTracker::new(Uuid::new_v4(), 2, Arc::new(FailingSink), tx);

        tracker.record(outcome(true)).await;
        tracker.record(outcome(false)).await;

        assert_eq!(tracker.completed(), 2);
        assert_eq!(tracker.succeeded(), 1);
        assert_eq!(tracker.failed(), 1);
    }

    #[tokio::test]
    async fn snapshots_are_broadcast_after_each_record() {
        let (tx, mut rx) = broadcast::channel(16);
        let tracker = ProgressTracker::new(Uuid::new_v4(), 2, Arc::new(VecSink::new()), tx);

        tracker.record(outcome(true)).await;
        tracker.record(outcome(false)).await;

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.completed, 1);
        assert_eq!(second.completed, 2);
        assert!(first.completed <= first.total);
        assert_eq!(second.succeeded + second.failed, second.completed);
    }
}
