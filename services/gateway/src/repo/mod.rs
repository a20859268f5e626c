pub mod messages;
pub mod rooms;
pub mod sessions;

use std::future::Future;
use std::time::Duration;
use tracing::warn;

const MAX_ATTEMPTS: u32 = 3;
const BASE_BACKOFF: Duration = Duration::from_millis(100);

fn is_transient(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed
    )
}

/// Retries `op` up to `MAX_ATTEMPTS` times with exponential back-off (base
/// 100 ms, doubling) on connection errors classified as transient; any
/// other error surfaces on the first attempt (spec §4.2).
pub async fn with_retries<T, F, Fut>(mut op: F) -> Result<T, sqlx::Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, sqlx::Error>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if is_transient(&err) && attempt + 1 < MAX_ATTEMPTS => {
                let backoff = BASE_BACKOFF * 2u32.pow(attempt);
                warn!(attempt, ?backoff, error = %err, "transient store error, retrying");
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn with_retries_returns_first_success() {
        let calls = AtomicU32::new(0);
        let result = with_retries(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, sqlx::Error>(42) }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn with_retries_retries_transient_errors_up_to_the_cap() {
        let calls = AtomicU32::new(0);
        let result = with_retries(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<i32, _>(sqlx::Error::PoolTimedOut) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn with_retries_does_not_retry_non_transient_errors() {
        let calls = AtomicU32::new(0);
        let result = with_retries(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<i32, _>(sqlx::Error::RowNotFound) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn with_retries_succeeds_after_a_transient_failure() {
        let calls = AtomicU32::new(0);
        let result = with_retries(|| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(sqlx::Error::PoolTimedOut)
                } else {
                    Ok(7)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
