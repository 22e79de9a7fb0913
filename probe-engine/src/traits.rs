//! Trait seams between the engine and its collaborators

use async_trait::async_trait;

use crate::error::EngineResult;
use crate::types::AttemptOutcome;

/// Receives every recorded outcome exactly once.
///
/// Implementations own any buffering or thread-affinity concerns of their
/// rendering or storage. A returned error is logged by the tracker and the
/// run continues; a sink can never abort a run.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn record(&self, outcome: &AttemptOutcome) -> EngineResult<()>;
}

/// Decides whether a completed HTTP exchange counts as a successful login.
///
/// The engine has no opinion on what the target's responses mean; callers
/// supply the predicate that matches their service.
pub trait SuccessPredicate: Send + Sync {
    fn is_success(&self, status: u16, body: &str) -> bool;
}
