//! Collaborator call outcomes
//!
//! Every call the pipeline makes to the store, curator or catalog is converted
//! to an [`Outcome`] at the call site. Transient failures (network, timeout,
//! malformed response) become `Degraded` and are logged; they never abort a
//! pipeline run.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Result of a collaborator call after the degrade-on-failure policy
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Success(T),
    /// Call failed or timed out; carries the reason for logging/diagnostics
    Degraded(String),
}

impl<T> Outcome<T> {
    /// Convert a collaborator result, logging failures at warn level
    pub fn from_result<E: Display>(operation: &str, result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Outcome::Success(value),
            Err(e) => {
                warn!(operation, error = %e, "Collaborator call degraded");
                Outcome::Degraded(format!("{}: {}", operation, e))
            }
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Outcome::Degraded(_))
    }

    /// The value on success
    pub fn success(self) -> Option<T> {
        match self {
            Outcome::Success(value) => Some(value),
            Outcome::Degraded(_) => None,
        }
    }

    pub fn unwrap_or(self, default: T) -> T {
        self.success().unwrap_or(default)
    }
}

impl<T: Default> Outcome<T> {
    pub fn unwrap_or_default(self) -> T {
        self.success().unwrap_or_default()
    }
}

/// Run a collaborator call under a hard timeout
///
/// A timeout is the collaborator's ordinary failure mode and degrades like any
/// other error.
pub async fn guarded<T, E, F>(operation: &str, limit: Duration, call: F) -> Outcome<T>
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => Outcome::from_result(operation, result),
        Err(_) => {
            warn!(
                operation,
                timeout_ms = limit.as_millis() as u64,
                "Collaborator call timed out"
            );
            Outcome::Degraded(format!("{}: timed out after {:?}", operation, limit))
        }
    }
}
