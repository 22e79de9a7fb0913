//! Single-attempt execution: proxy selection, form POST, outcome mapping

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use regex::Regex;
use reqwest::Client;
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::traits::SuccessPredicate;
use crate::types::{AttemptOutcome, AttemptTask};

/// Fixed per-request timeout
const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);

/// Form field names submitted to the endpoint
const USERNAME_FIELD: &str = "username";
const PASSWORD_FIELD: &str = "password";

/// Body marker checked by the default predicate
pub const DEFAULT_SUCCESS_MARKER: &str = "Login successful";

/// Executes one credential attempt against the configured endpoint.
///
/// Transport problems never surface as errors: they are folded into the
/// returned outcome, so a failing attempt cannot abort its worker. When
/// proxies are configured, one is picked uniformly at random per attempt
/// (sampling with replacement) and the request is routed through it.
pub struct Attempter {
    endpoint: String,
    proxies: Vec<String>,
    direct_client: Client,
    predicate: Arc<dyn SuccessPredicate>,
}

impl Attempter {
    /// Build an attempter. The direct client is constructed once up front;
    /// proxied clients are built per attempt around the selected proxy.
    pub fn new(
        endpoint: String,
        proxies: Vec<String>,
        predicate: Arc<dyn SuccessPredicate>,
    ) -> EngineResult<Self> {
        let direct_client = Client::builder()
            .timeout(ATTEMPT_TIMEOUT)
            .build()
            .map_err(|e| EngineError::ClientBuild {
                reason: e.to_string(),
            })?;

        Ok(Self {
            endpoint,
            proxies,
            direct_client,
            predicate,
        })
    }

    /// Perform one attempt for the task
    pub async fn attempt(&self, task: &AttemptTask) -> AttemptOutcome {
        let client = match self.select_client() {
            Ok(client) => client,
            Err(reason) => {
                debug!(task_id = %task.id, "proxy client unavailable: {}", reason);
                return AttemptOutcome::transport_failure(task, reason);
            }
        };

        let form = [
            (USERNAME_FIELD, task.credential.username.as_str()),
            (PASSWORD_FIELD, task.credential.password.as_str()),
        ];

        let response = match client.post(&self.endpoint).form(&form).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!(task_id = %task.id, "attempt failed: {}", e);
                return AttemptOutcome::transport_failure(task, e.to_string());
            }
        };

        let status = response.status().as_u16();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                debug!(task_id = %task.id, "response body unreadable: {}", e);
                return AttemptOutcome::transport_failure(task, e.to_string());
            }
        };

        let succeeded = self.predicate.is_success(status, &body);
        AttemptOutcome::completed(task, succeeded, status)
    }

    /// Pick the route for this attempt: the shared direct client when no
    /// proxies are configured, otherwise a fresh client through one proxy
    /// chosen uniformly at random. A proxy URL that cannot become a client
    /// fails this attempt the same way an unreachable proxy would.
    fn select_client(&self) -> Result<Client, String> {
        if self.proxies.is_empty() {
            return Ok(self.direct_client.clone());
        }

        let index = rand::thread_rng().gen_range(0..self.proxies.len());
        let proxy_url = &self.proxies[index];
        let proxy = reqwest::Proxy::all(proxy_url.as_str())
            .map_err(|e| format!("invalid proxy {}: {}", proxy_url, e))?;
        Client::builder()
            .timeout(ATTEMPT_TIMEOUT)
            .proxy(proxy)
            .build()
            .map_err(|e| e.to_string())
    }
}

/// Default success test: the response body contains a marker string
#[derive(Debug, Clone)]
pub struct MarkerPredicate {
    marker: String,
}

impl MarkerPredicate {
    pub fn new(marker: String) -> Self {
        Self { marker }
    }
}

impl Default for MarkerPredicate {
    fn default() -> Self {
        Self::new(DEFAULT_SUCCESS_MARKER.to_string())
    }
}

impl SuccessPredicate for MarkerPredicate {
    fn is_success(&self, _status: u16, body: &str) -> bool {
        body.contains(&self.marker)
    }
}

/// Success test driven by a regular expression over the response body
#[derive(Debug, Clone)]
pub struct RegexPredicate {
    pattern: Regex,
}

impl RegexPredicate {
    pub fn new(pattern: &str) -> EngineResult<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|e| EngineError::invalid_config("success-regex", &e.to_string()))?;
        Ok(Self { pattern })
    }
}

impl SuccessPredicate for RegexPredicate {
    fn is_success(&self, _status: u16, body: &str) -> bool {
        self.pattern.is_match(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Credential;

    fn task() -> AttemptTask {
        AttemptTask::new(Credential::new("admin".to_string(), "secret".to_string()))
    }

    fn closed_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        port
    }

    #[test]
    fn marker_predicate_matches_substring() {
        let predicate = MarkerPredicate::default();
        assert!(predicate.is_success(200, "Welcome! Login successful."));
        assert!(!predicate.is_success(200, "Invalid credentials"));
        assert!(!predicate.is_success(200, "login successful"));
    }

    #[test]
    fn regex_predicate_matches_pattern() {
        let predicate = RegexPredicate::new(r"(?i)login\s+successful").unwrap();
        assert!(predicate.is_success(200, "LOGIN SUCCESSFUL"));
        assert!(!predicate.is_success(200, "try again"));
    }

    #[test]
    fn regex_predicate_rejects_invalid_patterns() {
        let err = RegexPredicate::new("(unclosed").unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig { .. }));
    }

    #[tokio::test]
    async fn refused_connection_becomes_a_transport_failure() {
        let endpoint = format!("http://127.0.0.1:{}/login", closed_port());
        let attempter = Attempter::new(
            endpoint,
            Vec::new(),
            Arc::new(MarkerPredicate::default()),
        )
        .unwrap();

        let task = task();
        let outcome = attempter.attempt(&task).await;

        assert!(outcome.is_transport_failure());
        assert!(outcome.status_code.is_none());
        assert!(!outcome.succeeded);
        assert_eq!(outcome.task_id, task.id);
    }

    #[tokio::test]
    async fn malformed_proxy_fails_the_attempt_not_the_run() {
        let attempter = Attempter::new(
            "http://127.0.0.1:8080/login".to_string(),
            vec!["::not a proxy::".to_string()],
            Arc::new(MarkerPredicate::default()),
        )
        .unwrap();

        let outcome = attempter.attempt(&task()).await;

        assert!(outcome.is_transport_failure());
        assert!(outcome.error.as_deref().unwrap_or("").contains("proxy"));
    }
}
