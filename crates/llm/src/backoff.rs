//! Async retry loop driven by a [`BackoffSchedule`].

use std::future::Future;

use storybook::{BackoffSchedule, ContentError, RetryPolicy};

/// Runs `op` until it succeeds, fails with a non-retryable error, or the
/// schedule runs out of attempts. The last error is returned.
pub async fn with_backoff<T, F, Fut>(
    schedule: &BackoffSchedule,
    operation: &str,
    mut op: F,
) -> Result<T, ContentError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ContentError>>,
{
    let mut attempt = 1;
    loop {
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        let hint = match err.retry_policy() {
            RetryPolicy::Retryable { after } => after,
            RetryPolicy::NonRetryable => return Err(err),
        };
        let Some(delay) = schedule.next_delay(attempt, hint) else {
            tracing::warn!(operation, attempt, error = %err, "Giving up after final attempt");
            return Err(err);
        };

        tracing::warn!(
            operation,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Retrying after transient failure"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
