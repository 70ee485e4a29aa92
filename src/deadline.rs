//! Deadline enforcement for a single fetch.
//!
//! The fetch runs as its own task. If the deadline fires first the caller gets
//! [`FetchError::Timeout`] immediately and the task is aborted, so a late
//! answer can never be observed.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::abort_guard::AbortGuard;
use crate::error::FetchError;

/// Runs `fut` as a separate task bounded by `deadline`.
pub async fn run_with_deadline<F, T>(deadline: Duration, fut: F) -> Result<T, FetchError>
where
    F: Future<Output = Result<T, FetchError>> + Send + 'static,
    T: Send + 'static,
{
    // dropping the guard on return aborts a task that is still running
    let mut guard = AbortGuard::new(tokio::spawn(fut));
    let joined = tokio::time::timeout(deadline, guard.join()).await;
    match joined {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            warn!(target: "llm", error = %e, "fetch task failed");
            Err(FetchError::Transport(e.to_string()))
        }
        Err(_) => {
            warn!(target: "llm", ?deadline, "fetch timed out, abandoning request");
            Err(FetchError::Timeout)
        }
    }
}
