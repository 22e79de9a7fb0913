//! Probe Engine - Concurrent credential-attempt dispatch
//!
//! This crate turns username and password lists into a queue of login
//! attempts and drives them through a cancellable worker pool, reporting
//! every outcome to a pluggable sink.

pub mod types;
pub mod traits;
pub mod error;
pub mod queue;
pub mod attempt;
pub mod progress;
pub mod pool;


pub use types::{
    AttemptOutcome, AttemptTask, Credential, DelayRange, ProgressSnapshot, RunConfig, RunStatus,
};

pub use traits::{ResultSink, SuccessPredicate};

pub use error::{EngineError, EngineResult};

pub use queue::TaskQueue;

pub use attempt::{Attempter, MarkerPredicate, RegexPredicate, DEFAULT_SUCCESS_MARKER};

pub use progress::ProgressTracker;

pub use pool::WorkerPool;
