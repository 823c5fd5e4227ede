//! Time bounds for remote boundaries

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{TriageError, TriageResult};
use crate::logging::Logger;
use crate::log_warn;

/// Run `fut`, failing with `RemoteTimeout` once `limit` elapses
pub async fn bounded<T, F>(operation: &str, limit: Duration, fut: F) -> TriageResult<T>
where
    F: Future<Output = TriageResult<T>>,
{
    let started = Instant::now();
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(TriageError::RemoteTimeout {
            operation: operation.to_string(),
            elapsed: started.elapsed(),
        }),
    }
}

/// `bounded`, with one more attempt when the first times out
///
/// Other failures are returned as-is.
pub async fn bounded_retry_once<T, F, Fut>(
    operation: &str,
    limit: Duration,
    logger: &dyn Logger,
    mut attempt: F,
) -> TriageResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = TriageResult<T>>,
{
    match bounded(operation, limit, attempt()).await {
        Err(err) if err.is_retryable() => {
            log_warn!(logger, "[Remote] {} ({}), retrying once", operation, err);
            bounded(operation, limit, attempt()).await
        }
        other => other,
    }
}
