//! Retry of SQLite transactions that lose a lock race
//!
//! A deferred transaction that reads and then writes cannot upgrade its lock
//! once another connection has committed a write; SQLite answers
//! `SQLITE_BUSY` immediately and the busy timeout never applies. The whole
//! transaction has to be rolled back and run again from the start.

use std::time::{Duration, Instant};

use crate::{Error, Result};

/// Default total retry budget for one operation
pub const DEFAULT_MAX_LOCK_WAIT_MS: u64 = 10_000;

const INITIAL_BACKOFF_MS: u64 = 10;
const MAX_BACKOFF_MS: u64 = 1000;

/// Run `operation` again with exponential backoff while it fails on a lock
///
/// `operation` must open its own transaction on every call. Errors other
/// than lock contention are returned on the first attempt. Backoff starts at
/// 10ms and doubles up to 1000ms until `max_wait_ms` has elapsed.
pub async fn retry_on_lock<F, Fut, T>(
    operation_name: &str,
    max_wait_ms: u64,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let start_time = Instant::now();
    let max_duration = Duration::from_millis(max_wait_ms);
    let mut attempt = 0u32;
    let mut backoff_ms = INITIAL_BACKOFF_MS;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    let elapsed_ms = start_time.elapsed().as_millis();
                    if elapsed_ms > 2000 {
                        tracing::warn!(
                            operation = operation_name,
                            attempt,
                            elapsed_ms,
                            "Database operation succeeded after a long retry period"
                        );
                    } else {
                        tracing::debug!(
                            operation = operation_name,
                            attempt,
                            elapsed_ms,
                            "Database operation succeeded after retry"
                        );
                    }
                }
                return Ok(result);
            }
            Err(err) if !is_lock_error(&err) => return Err(err),
            Err(err) => {
                let elapsed = start_time.elapsed();
                if elapsed >= max_duration {
                    tracing::error!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = elapsed.as_millis(),
                        max_wait_ms,
                        error = %err,
                        "Database operation failed: max retry time exceeded"
                    );
                    return Err(Error::Internal(format!(
                        "{}: database locked after {} attempts ({} ms elapsed, max {} ms)",
                        operation_name,
                        attempt,
                        elapsed.as_millis(),
                        max_wait_ms
                    )));
                }

                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    elapsed_ms = elapsed.as_millis(),
                    backoff_ms,
                    "Database locked, will retry after backoff"
                );
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms = (backoff_ms * 2).min(MAX_BACKOFF_MS);
            }
        }
    }
}

/// True for `SQLITE_BUSY` and `SQLITE_LOCKED`, including extended codes
pub fn is_lock_error(err: &Error) -> bool {
    let Error::Database(db_err) = err else {
        return false;
    };
    if let Some(code) = db_err
        .as_database_error()
        .and_then(|e| e.code())
        .and_then(|code| code.parse::<i32>().ok())
    {
        // Primary result code lives in the low byte
        if matches!(code & 0xff, 5 | 6) {
            return true;
        }
    }
    let message = db_err.to_string();
    message.contains("database is locked") || message.contains("database table is locked")
}
