//! Result sinks: console echo, flat log file, JSON lines, fanout

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use probe_engine::{AttemptOutcome, EngineResult, ResultSink};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{info, warn};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Render one outcome as a flat log line
pub fn format_line(outcome: &AttemptOutcome) -> String {
    let timestamp = outcome.executed_at.format(TIMESTAMP_FORMAT);
    let username = &outcome.credential.username;
    let password = &outcome.credential.password;
    match (&outcome.error, outcome.status_code) {
        (Some(error), _) => {
            format!(
                "{} - {}:{} - Request failed: {}",
                timestamp, username, password, error
            )
        }
        (None, Some(code)) => {
            let verdict = if outcome.succeeded { "Success" } else { "Failed" };
            format!(
                "{} - {}:{} - {} - Status Code: {}",
                timestamp, username, password, verdict, code
            )
        }
        (None, None) => {
            format!(
                "{} - {}:{} - Failed - Status Code: unknown",
                timestamp, username, password
            )
        }
    }
}

/// Echoes every outcome to the terminal through the tracing pipeline
pub struct ConsoleSink;

#[async_trait]
impl ResultSink for ConsoleSink {
    async fn record(&self, outcome: &AttemptOutcome) -> EngineResult<()> {
        let username = &outcome.credential.username;
        let password = &outcome.credential.password;
        if let Some(error) = &outcome.error {
            warn!("Request failed: {}", error);
        } else if outcome.succeeded {
            info!("Successful login with {}:{}", username, password);
        } else {
            info!("Failed login with {}:{}", username, password);
        }
        Ok(())
    }
}

/// Appends one timestamped line per outcome to a log file
pub struct FileSink {
    file: Mutex<tokio::fs::File>,
}

impl FileSink {
    pub async fn create(path: &Path) -> EngineResult<Self> {
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

#[async_trait]
impl ResultSink for FileSink {
    async fn record(&self, outcome: &AttemptOutcome) -> EngineResult<()> {
        let line = format!("{}\n", format_line(outcome));
        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes()).await?;
        Ok(())
    }
}

/// Appends one JSON object per outcome, machine-readable counterpart of
/// `FileSink`
pub struct JsonlSink {
    file: Mutex<tokio::fs::File>,
}

impl JsonlSink {
    pub async fn create(path: &Path) -> EngineResult<Self> {
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

#[async_trait]
impl ResultSink for JsonlSink {
    async fn record(&self, outcome: &AttemptOutcome) -> EngineResult<()> {
        let mut line = serde_json::to_string(outcome)?;
        line.push('\n');
        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes()).await?;
        Ok(())
    }
}

/// Forwards every outcome to each inner sink. All sinks see the outcome
/// even when one of them fails; the first failure is reported.
pub struct FanoutSink {
    sinks: Vec<Arc<dyn ResultSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn ResultSink>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl ResultSink for FanoutSink {
    async fn record(&self, outcome: &AttemptOutcome) -> EngineResult<()> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.record(outcome).await {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Counts outcomes for the end-of-run summary
pub struct SummarySink {
    completed: AtomicUsize,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
}

impl SummarySink {
    pub fn new() -> Self {
        Self {
            completed: AtomicUsize::new(0),
            succeeded: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        }
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

#[async_trait]
impl ResultSink for SummarySink {
    async fn record(&self, outcome: &AttemptOutcome) -> EngineResult<()> {
        self.completed.fetch_add(1, Ordering::SeqCst);
        if outcome.succeeded {
            self.succeeded.fetch_add(1, Ordering::SeqCst);
        } else {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use probe_engine::{AttemptTask, Credential, EngineError};

    fn completed_outcome(succeeded: bool, code: u16) -> AttemptOutcome {
        let task = AttemptTask::new(Credential::new(
            "admin".to_string(),
            "hunter2".to_string(),
        ));
        let mut outcome = AttemptOutcome::completed(&task, succeeded, code);
        outcome.executed_at = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        outcome
    }

    fn transport_outcome(error: &str) -> AttemptOutcome {
        let task = AttemptTask::new(Credential::new(
            "admin".to_string(),
            "hunter2".to_string(),
        ));
        let mut outcome = AttemptOutcome::transport_failure(&task, error.to_string());
        outcome.executed_at = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        outcome
    }

    #[test]
    fn format_line_for_completed_attempts() {
        assert_eq!(
            format_line(&completed_outcome(true, 200)),
            "2024-01-02 03:04:05 - admin:hunter2 - Success - Status Code: 200"
        );
        assert_eq!(
            format_line(&completed_outcome(false, 401)),
            "2024-01-02 03:04:05 - admin:hunter2 - Failed - Status Code: 401"
        );
    }

    #[test]
    fn format_line_for_transport_failures() {
        assert_eq!(
            format_line(&transport_outcome("connection refused")),
            "2024-01-02 03:04:05 - admin:hunter2 - Request failed: connection refused"
        );
    }

    #[tokio::test]
    async fn file_sink_appends_one_line_per_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attempts.log");

        let sink = FileSink::create(&path).await.unwrap();
        sink.record(&completed_outcome(true, 200)).await.unwrap();
        sink.record(&transport_outcome("timeout")).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("Success - Status Code: 200"));
        assert!(lines[1].ends_with("Request failed: timeout"));
    }

    #[tokio::test]
    async fn jsonl_sink_writes_parseable_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attempts.jsonl");

        let sink = JsonlSink::create(&path).await.unwrap();
        let outcome = completed_outcome(false, 403);
        sink.record(&outcome).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: AttemptOutcome = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(parsed.task_id, outcome.task_id);
        assert_eq!(parsed.status_code, Some(403));
        assert!(!parsed.succeeded);
    }

    #[tokio::test]
    async fn summary_sink_counts_every_kind_of_outcome() {
        let sink = SummarySink::new();
        sink.record(&completed_outcome(true, 200)).await.unwrap();
        sink.record(&completed_outcome(false, 401)).await.unwrap();
        sink.record(&transport_outcome("timeout")).await.unwrap();

        assert_eq!(sink.completed(), 3);
        assert_eq!(sink.succeeded(), 1);
        assert_eq!(sink.failed(), 2);
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

    #[tokio::test]
    async fn fanout_reaches_every_sink_despite_failures() {
        let summary = Arc::new(SummarySink::new());
        let fanout = FanoutSink::new(vec![Arc::new(FailingSink), summary.clone()]);

        let result = fanout.record(&completed_outcome(true, 200)).await;

        assert!(result.is_err());
        assert_eq!(summary.completed(), 1);
    }
}
