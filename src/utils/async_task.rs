use std::time::Duration;

use tokio::time::sleep;
use tokio::time::timeout;
use tracing::warn;

use crate::BackoffPolicy;
use crate::Error;
use crate::Result;

/// Runs `task` until it succeeds, fails with a non-transport error, or the
/// policy's attempts are used up. Every attempt is bounded by
/// `policy.timeout_ms`; the delay between attempts doubles up to
/// `policy.max_delay_ms`.
///
/// The last error is returned once retries are exhausted, so callers can
/// still tell a remote `SlotNotFound` from an unreachable member.
pub(crate) async fn task_with_timeout_and_exponential_backoff<F, T, P>(
    task: F,
    policy: BackoffPolicy,
) -> Result<P>
where
    F: Fn() -> T,                               // The type of the async function
    T: std::future::Future<Output = Result<P>>, // The future returned by the async function
{
    let max_retries = policy.max_retries.max(1);
    let timeout_duration = Duration::from_millis(policy.timeout_ms);
    let max_delay = Duration::from_millis(policy.max_delay_ms);
    let mut delay = Duration::from_millis(policy.base_delay_ms);

    let mut retries = 0;
    let mut last_error = Error::RetryTaskFailed("Task failed after max retries".to_string());
    while retries < max_retries {
        match timeout(timeout_duration, task()).await {
            Ok(Ok(r)) => {
                return Ok(r); // Exit on success
            }
            Ok(Err(error)) => {
                if !error.is_transport_fault() {
                    return Err(error);
                }
                warn!("failed with error: {:?}", &error);
                last_error = error;
            }
            Err(error) => {
                warn!("task_with_timeout_and_exponential_backoff timeout: {:?}", &error);
                last_error = Error::RetryTimeoutError;
            }
        };

        retries += 1;
        if retries < max_retries {
            sleep(delay).await;
            delay = (delay * 2).min(max_delay);
        } else {
            warn!("Task failed after {} retries", retries);
        }
    }
    Err(last_error)
}
