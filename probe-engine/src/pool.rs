//! Worker pool lifecycle: start, cancel, wait

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::attempt::Attempter;
use crate::error::{EngineError, EngineResult};
use crate::progress::ProgressTracker;
use crate::queue::TaskQueue;
use crate::traits::{ResultSink, SuccessPredicate};
use crate::types::{
    AttemptOutcome, AttemptTask, Credential, DelayRange, ProgressSnapshot, RunConfig, RunStatus,
};

const PROGRESS_CHANNEL_CAPACITY: usize = 1000;

/// Everything tied to the run in flight, dropped when the run finalizes
struct RunState {
    run_id: Uuid,
    cancel_token: CancellationToken,
    tracker: Arc<ProgressTracker>,
    active_workers: Arc<AtomicUsize>,
}

/// Drives a pool of attempt workers over a shared task queue.
///
/// One run at a time: `start` validates the configuration, fills the queue
/// with every username/password pair and launches the workers. `cancel`
/// requests a stop without interrupting in-flight attempts, and `wait`
/// blocks until the run reaches a terminal status. The pool is reusable
/// once a run has finalized.
pub struct WorkerPool {
    sink: Arc<dyn ResultSink>,
    progress_tx: broadcast::Sender<ProgressSnapshot>,
    active: Arc<RwLock<Option<RunState>>>,
    status_tx: watch::Sender<RunStatus>,
    status_rx: watch::Receiver<RunStatus>,
}

impl WorkerPool {
    pub fn new(sink: Arc<dyn ResultSink>) -> Self {
        let (progress_tx, _) = broadcast::channel(PROGRESS_CHANNEL_CAPACITY);
        let (status_tx, status_rx) = watch::channel(RunStatus::Idle);
        Self {
            sink,
            progress_tx,
            active: Arc::new(RwLock::new(None)),
            status_tx,
            status_rx,
        }
    }

    /// Launch a run. Fails without side effects when the configuration is
    /// invalid or another run is still active. Returns the run id.
    pub async fn start(
        &self,
        config: RunConfig,
        predicate: Arc<dyn SuccessPredicate>,
    ) -> EngineResult<Uuid> {
        config.validate()?;

        let mut active = self.active.write().await;
        if active.is_some() {
            return Err(EngineError::AlreadyRunning);
        }

        let run_id = Uuid::new_v4();
        let credentials = Credential::product(&config.usernames, &config.passwords);
        let total = credentials.len();
        let tasks: Vec<AttemptTask> = credentials.into_iter().map(AttemptTask::new).collect();
        let queue = Arc::new(TaskQueue::from_tasks(tasks));

        let attempter = Arc::new(Attempter::new(
            config.endpoint.clone(),
            config.proxies.clone(),
            predicate,
        )?);
        let tracker = Arc::new(ProgressTracker::new(
            run_id,
            total,
            self.sink.clone(),
            self.progress_tx.clone(),
        ));
        let cancel_token = CancellationToken::new();
        let active_workers = Arc::new(AtomicUsize::new(config.worker_count));

        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();

        for worker_id in 0..config.worker_count {
            tokio::spawn(run_worker(
                worker_id,
                queue.clone(),
                attempter.clone(),
                config.delay,
                outcome_tx.clone(),
                cancel_token.clone(),
                active_workers.clone(),
            ));
        }
        // The channel closes once the last worker exits
        drop(outcome_tx);

        tokio::spawn(aggregate_outcomes(
            outcome_rx,
            tracker.clone(),
            cancel_token.clone(),
            self.active.clone(),
            self.status_tx.clone(),
        ));

        *active = Some(RunState {
            run_id,
            cancel_token,
            tracker,
            active_workers,
        });
        // Published while the state lock is held: the aggregator needs the
        // same lock to finalize, so Running always lands first.
        let _ = self.status_tx.send(RunStatus::Running);

        info!(
            %run_id,
            workers = config.worker_count,
            total,
            endpoint = %config.endpoint,
            "run started"
        );
        Ok(run_id)
    }

    /// Request cancellation of the run in flight. Workers finish their
    /// current attempt and stop before dequeuing another task. Safe to call
    /// repeatedly and on an idle pool.
    pub async fn cancel(&self) {
        let active = self.active.read().await;
        if let Some(state) = active.as_ref() {
            if !state.cancel_token.is_cancelled() {
                state.cancel_token.cancel();
                let _ = self.status_tx.send(RunStatus::Cancelling);
                info!(run_id = %state.run_id, "cancellation requested");
            }
        }
    }

    /// Block until the current run reaches a terminal status. Returns
    /// immediately when no run is active.
    pub async fn wait(&self) {
        let mut status_rx = self.status_rx.clone();
        loop {
            if !status_rx.borrow_and_update().is_active() {
                return;
            }
            if status_rx.changed().await.is_err() {
                return;
            }
        }
    }

    pub fn status(&self) -> RunStatus {
        *self.status_rx.borrow()
    }

    /// True from a successful `start` until the run finalizes
    pub fn is_running(&self) -> bool {
        self.status().is_active()
    }

    /// Snapshot of the run in flight, `None` when the pool is idle
    pub async fn progress(&self) -> Option<ProgressSnapshot> {
        let active = self.active.read().await;
        active.as_ref().map(|state| state.tracker.snapshot())
    }

    /// Number of workers that have not yet exited
    pub async fn active_workers(&self) -> usize {
        let active = self.active.read().await;
        active
            .as_ref()
            .map(|state| state.active_workers.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Subscribe to per-outcome progress snapshots
    pub fn subscribe_progress(&self) -> broadcast::Receiver<ProgressSnapshot> {
        self.progress_tx.subscribe()
    }
}

/// One worker: dequeue, attempt, report, pause, repeat. Cancellation is
/// honored between attempts, never during one.
async fn run_worker(
    worker_id: usize,
    queue: Arc<TaskQueue>,
    attempter: Arc<Attempter>,
    delay: DelayRange,
    outcome_tx: mpsc::UnboundedSender<AttemptOutcome>,
    cancel_token: CancellationToken,
    active_workers: Arc<AtomicUsize>,
) {
    debug!(worker_id, "worker started");
    loop {
        if cancel_token.is_cancelled() {
            debug!(worker_id, "worker stopping: run cancelled");
            break;
        }

        let task = match queue.try_dequeue().await {
            Some(task) => task,
            None => {
                debug!(worker_id, "worker stopping: queue drained");
                break;
            }
        };

        let outcome = attempter.attempt(&task).await;
        // A closed channel means the run is being torn down
        let _ = outcome_tx.send(outcome);

        let pause = delay.sample();
        if !pause.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = cancel_token.cancelled() => {
                    debug!(worker_id, "worker stopping: run cancelled");
                    break;
                }
            }
        }
    }
    active_workers.fetch_sub(1, Ordering::SeqCst);
}

/// Consumes outcomes until every worker is gone, then finalizes the run:
/// clears the pool state and publishes the terminal status under the same
/// lock `start` uses, so a new run can only begin after the flip.
async fn aggregate_outcomes(
    mut outcome_rx: mpsc::UnboundedReceiver<AttemptOutcome>,
    tracker: Arc<ProgressTracker>,
    cancel_token: CancellationToken,
    active: Arc<RwLock<Option<RunState>>>,
    status_tx: watch::Sender<RunStatus>,
) {
    while let Some(outcome) = outcome_rx.recv().await {
        tracker.record(outcome).await;
    }

    let status = if cancel_token.is_cancelled() && tracker.completed() < tracker.total() {
        RunStatus::Cancelled
    } else {
        RunStatus::Completed
    };

    {
        let mut active = active.write().await;
        *active = None;
        let _ = status_tx.send(status);
    }

    info!(
        run_id = %tracker.run_id(),
        completed = tracker.completed(),
        succeeded = tracker.succeeded(),
        failed = tracker.failed(),
        total = tracker.total(),
        "run finished with status {:?}",
        status
    );
}
