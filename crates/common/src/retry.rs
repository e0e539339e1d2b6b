//! Bounded retry with exponential backoff.
//!
//! For flaky best-effort upstreams only (identity/score lookups). The
//! money-movement paths (voucher issuance and claim counting) are never
//! routed through this: their at-most-once semantics come from the dedup
//! marker, not from retry safety.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

/// Default attempt count including the first call.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Initial delay before the second attempt.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(1000);

/// Run `op` up to `max_attempts` times, doubling the delay between
/// attempts, retrying only when `is_retryable` says so.
///
/// Classification stays with the caller: timeouts, 5xx and 429 are the
/// intended retryable set; other 4xx responses are not.
pub async fn retry_with_backoff<T, E, F, Fut, C>(
    max_attempts: u32,
    initial_delay: Duration,
    mut op: F,
    is_retryable: C,
) -> std::result::Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    C: Fn(&E) -> bool,
{
    let mut delay = initial_delay;
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if attempt < max_attempts && is_retryable(&e) => {
                debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying upstream call");
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_succeeds_first_try() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let out: Result<i32, &str> = retry_with_backoff(
            3,
            Duration::from_millis(1),
            move || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Ok(7)
                }
            },
            |_| true,
        )
        .await;
        assert_eq!(out.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let out: Result<i32, &str> = retry_with_backoff(
            3,
            Duration::from_millis(1),
            move || {
                let c = c.clone();
                async move {
                    if c.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err("timeout")
                    } else {
                        Ok(9)
                    }
                }
            },
            |e| *e == "timeout",
        )
        .await;
        assert_eq!(out.unwrap(), 9);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let out: Result<i32, &str> = retry_with_backoff(
            3,
            Duration::from_millis(1),
            move || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err("bad request")
                }
            },
            |e| *e == "timeout",
        )
        .await;
        assert!(out.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_attempts_are_bounded() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let out: Result<i32, &str> = retry_with_backoff(
            3,
            Duration::from_millis(1),
            move || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err("timeout")
                }
            },
            |e| *e == "timeout",
        )
        .await;
        assert!(out.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
