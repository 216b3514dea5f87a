//! Retry policy for persistence calls.
//!
//! Only transient failures are worth retrying — a duplicate key or a
//! syntax error will fail identically on attempt four as it did on attempt
//! one. [`classify`] draws that line; [`retry`] drives the backoff.

use std::{future::Future, time::Duration};

use {rand::Rng, tracing::warn};

use moltis_common::{Error, ErrorKind};

const MAX_ATTEMPTS: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(2);

/// Whether a DB-layer error is worth retrying.
///
/// Deadlocks, serialization failures, statement timeouts, and dropped
/// connections are transient. Duplicate keys, foreign-key violations,
/// constraint failures, syntax errors, and permission errors are not —
/// they will reproduce identically on every attempt.
#[must_use]
pub fn is_transient(err: &Error) -> bool {
    matches!(err.kind, ErrorKind::DbTransient | ErrorKind::Timeout)
}

pub async fn retry<T, F, Fut>(operation_name: &str, mut f: F) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < MAX_ATTEMPTS && is_transient(&err) => {
                let backoff = backoff_for_attempt(attempt);
                warn!(
                    operation = operation_name,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %err,
                    "retrying transient error"
                );
                moltis_metrics::counter!(moltis_metrics::dispatcher::PERSIST_RETRIES_TOTAL)
                    .increment(1);
                tokio::time::sleep(backoff).await;
            },
            Err(err) => return Err(err),
        }
    }
}

fn backoff_for_attempt(attempt: u32) -> Duration {
    let exp = INITIAL_BACKOFF.saturating_mul(1 << (attempt.saturating_sub(1)).min(16));
    let capped = exp.min(MAX_BACKOFF);
    let jitter_ms = rand::rng().random_range(0..=capped.as_millis() as u64 / 2);
    capped + Duration::from_millis(jitter_ms)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_transient_and_timeout_are_retryable() {
        assert!(is_transient(&Error::db_transient("deadlock")));
        assert!(is_transient(&Error::timeout("slow upstream")));
    }

    #[test]
    fn permanent_db_errors_are_not_retryable() {
        assert!(!is_transient(&Error::db_permanent("duplicate key")));
        assert!(!is_transient(&Error::validation("bad payload")));
    }

    #[tokio::test]
    async fn retry_gives_up_after_max_attempts() {
        let mut calls = 0;
        let result: Result<(), Error> = retry("persist_message", || {
            calls += 1;
            async { Err(Error::db_transient("deadlock")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls, MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn retry_does_not_retry_permanent_errors() {
        let mut calls = 0;
        let result: Result<(), Error> = retry("persist_message", || {
            calls += 1;
            async { Err(Error::db_permanent("duplicate key")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn retry_succeeds_after_transient_failures() {
        let mut calls = 0;
        let result: Result<u32, Error> = retry("persist_message", || {
            calls += 1;
            async move {
                if calls < 2 {
                    Err(Error::db_transient("deadlock"))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls, 2);
    }
}
