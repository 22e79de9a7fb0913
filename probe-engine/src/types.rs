//! Core data types for the probe engine

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use url::Url;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};

/// One username/password pair under test
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl Credential {
    /// Create a new credential pair
    pub fn new(username: String, password: String) -> Self {
        Self { username, password }
    }

    /// Expand username and password lists into their cartesian product,
    /// preserving input order and duplicates
    pub fn product(usernames: &[String], passwords: &[String]) -> Vec<Credential> {
        let mut pairs = Vec::with_capacity(usernames.len() * passwords.len());
        for username in usernames {
            for password in passwords {
                pairs.push(Credential::new(username.clone(), password.clone()));
            }
        }
        pairs
    }
}

/// One queued attempt: a credential plus the id linking it to its outcome.
/// Created once at enqueue time and consumed exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptTask {
    pub id: Uuid,
    pub credential: Credential,
}

impl AttemptTask {
    /// Create a task for a credential, assigning a fresh id
    pub fn new(credential: Credential) -> Self {
        Self {
            id: Uuid::new_v4(),
            credential,
        }
    }
}

/// Inclusive pause range in seconds between a worker's attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_secs: u64,
    pub max_secs: u64,
}

impl DelayRange {
    /// Build a range, rejecting max < min
    pub fn new(min_secs: u64, max_secs: u64) -> EngineResult<Self> {
        if max_secs < min_secs {
            return Err(EngineError::invalid_config(
                "delay",
                &format!("max {} is below min {}", max_secs, min_secs),
            ));
        }
        Ok(Self { min_secs, max_secs })
    }

    /// Draw a pause duration uniformly from the range. A degenerate range
    /// (min == max) always yields exactly that many seconds.
    pub fn sample(&self) -> Duration {
        if self.min_secs == self.max_secs {
            return Duration::from_secs(self.min_secs);
        }
        let secs = rand::thread_rng().gen_range(self.min_secs as f64..=self.max_secs as f64);
        Duration::from_secs_f64(secs)
    }
}

impl Default for DelayRange {
    fn default() -> Self {
        Self {
            min_secs: 0,
            max_secs: 0,
        }
    }
}

impl FromStr for DelayRange {
    type Err = EngineError;

    /// Parse a `"min-max"` range, e.g. `"2-5"`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('-').collect();
        if parts.len() != 2 {
            return Err(EngineError::invalid_config(
                "delay",
                "expected two values as \"min-max\"",
            ));
        }
        let min_secs = parts[0]
            .trim()
            .parse::<u64>()
            .map_err(|e| EngineError::invalid_config("delay", &format!("invalid min: {}", e)))?;
        let max_secs = parts[1]
            .trim()
            .parse::<u64>()
            .map_err(|e| EngineError::invalid_config("delay", &format!("invalid max: {}", e)))?;
        Self::new(min_secs, max_secs)
    }
}

/// The recorded result of one attempt.
///
/// Exactly one of `status_code` and `error` is set: a completed HTTP
/// exchange carries the status code, a transport failure carries the error
/// description. `completed` and `transport_failure` are the intended
/// constructors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptOutcome {
    pub task_id: Uuid,
    pub credential: Credential,
    pub succeeded: bool,
    pub status_code: Option<u16>,
    pub error: Option<String>,
    pub executed_at: DateTime<Utc>,
}

impl AttemptOutcome {
    /// Outcome of a completed HTTP exchange
    pub fn completed(task: &AttemptTask, succeeded: bool, status_code: u16) -> Self {
        Self {
            task_id: task.id,
            credential: task.credential.clone(),
            succeeded,
            status_code: Some(status_code),
            error: None,
            executed_at: Utc::now(),
        }
    }

    /// Outcome of an attempt that never completed an HTTP exchange
    pub fn transport_failure(task: &AttemptTask, error: String) -> Self {
        Self {
            task_id: task.id,
            credential: task.credential.clone(),
            succeeded: false,
            status_code: None,
            error: Some(error),
            executed_at: Utc::now(),
        }
    }

    /// True when the attempt never completed an HTTP exchange
    pub fn is_transport_failure(&self) -> bool {
        self.error.is_some()
    }
}

/// Immutable configuration for one run, validated before anything launches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub endpoint: String,
    pub usernames: Vec<String>,
    pub passwords: Vec<String>,
    pub worker_count: usize,
    pub proxies: Vec<String>,
    pub delay: DelayRange,
}

impl RunConfig {
    /// Create a configuration with default worker count, no proxies and no
    /// pacing delay
    pub fn new(endpoint: String, usernames: Vec<String>, passwords: Vec<String>) -> Self {
        Self {
            endpoint,
            usernames,
            passwords,
            worker_count: 4,
            proxies: Vec::new(),
            delay: DelayRange::default(),
        }
    }

    /// Set the number of concurrent workers
    pub fn with_workers(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Set the proxy URLs to rotate through
    pub fn with_proxies(mut self, proxies: Vec<String>) -> Self {
        self.proxies = proxies;
        self
    }

    /// Set the pacing delay range
    pub fn with_delay(mut self, delay: DelayRange) -> Self {
        self.delay = delay;
        self
    }

    /// Total number of attempts the run will make
    pub fn total_attempts(&self) -> usize {
        self.usernames.len() * self.passwords.len()
    }

    /// Fail-fast validation, run before any worker launches
    pub fn validate(&self) -> EngineResult<()> {
        if self.endpoint.trim().is_empty() {
            return Err(EngineError::invalid_config(
                "endpoint",
                "must not be empty",
            ));
        }
        Url::parse(&self.endpoint)
            .map_err(|e| EngineError::invalid_config("endpoint", &format!("not a URL: {}", e)))?;
        if self.usernames.is_empty() {
            return Err(EngineError::invalid_config(
                "usernames",
                "at least one username is required",
            ));
        }
        if self.passwords.is_empty() {
            return Err(EngineError::invalid_config(
                "passwords",
                "at least one password is required",
            ));
        }
        if self.worker_count == 0 {
            return Err(EngineError::invalid_config(
                "workers",
                "worker count must be at least 1",
            ));
        }
        if self.delay.max_secs < self.delay.min_secs {
            return Err(EngineError::invalid_config(
                "delay",
                "max must not be below min",
            ));
        }
        Ok(())
    }
}

/// Point-in-time progress of a run, broadcast once per recorded outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub run_id: Uuid,
    pub total: usize,
    pub completed: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Pool-level run lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Idle,
    Running,
    Cancelling,
    Completed,
    Cancelled,
}

impl RunStatus {
    /// True while workers may still produce outcomes
    pub fn is_active(&self) -> bool {
        matches!(self, RunStatus::Running | RunStatus::Cancelling)
    }
}
