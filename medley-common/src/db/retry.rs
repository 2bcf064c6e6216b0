//! Busy-retry logic
//!
//! Retries an operation with exponential backoff while SQLite reports lock
//! contention, until a maximum wait elapses. Any other error is returned
//! immediately. The transaction executor uses this for the closing COMMIT only.

use crate::{Error, Result};
use std::time::{Duration, Instant};

const INITIAL_BACKOFF_MS: u64 = 2;
const MAX_BACKOFF_MS: u64 = 500;

/// Backoff state for one retried operation
///
/// Call [`BusyBackoff::wait_or_give_up`] with each failure; it sleeps and
/// returns `Ok(())` when the caller should try again.
#[derive(Debug)]
pub struct BusyBackoff {
    operation_name: String,
    start_time: Instant,
    max_wait: Duration,
    backoff_ms: u64,
    attempt: u32,
}

impl BusyBackoff {
    pub fn new(operation_name: impl Into<String>, max_wait: Duration) -> Self {
        Self {
            operation_name: operation_name.into(),
            start_time: Instant::now(),
            max_wait,
            backoff_ms: INITIAL_BACKOFF_MS,
            attempt: 0,
        }
    }

    /// Sleep before the next attempt, or return the error that ends retrying
    pub async fn wait_or_give_up(&mut self, err: Error) -> Result<()> {
        self.attempt += 1;

        if !err.is_busy() {
            return Err(err);
        }

        let elapsed = self.start_time.elapsed();
        if elapsed >= self.max_wait {
            tracing::error!(
                operation = %self.operation_name,
                attempt = self.attempt,
                elapsed_ms = elapsed.as_millis() as u64,
                max_wait_ms = self.max_wait.as_millis() as u64,
                "Database operation failed: max retry time exceeded"
            );
            return Err(Error::Internal(format!(
                "Database busy during {} after {} attempts ({} ms elapsed)",
                self.operation_name,
                self.attempt,
                elapsed.as_millis()
            )));
        }

        tracing::warn!(
            operation = %self.operation_name,
            attempt = self.attempt,
            backoff_ms = self.backoff_ms,
            "Database busy, will retry after backoff"
        );

        tokio::time::sleep(Duration::from_millis(self.backoff_ms)).await;
        self.backoff_ms = (self.backoff_ms * 2).min(MAX_BACKOFF_MS);
        Ok(())
    }
}
