//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap user callbacks (server data, page handlers, render engine) with a deadline
//! - Cancel the wrapped future cleanly when the deadline passes
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other errors and name the operation

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// A bounded operation did not finish in time.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{operation} timed out after {}ms", .after.as_millis())]
pub struct TimeoutError {
    pub operation: &'static str,
    pub after: Duration,
}

/// Run `future` to completion or fail after `limit`.
pub async fn with_deadline<F, T>(
    operation: &'static str,
    limit: Duration,
    future: F,
) -> Result<T, TimeoutError>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(limit, future)
        .await
        .map_err(|_| TimeoutError {
            operation,
            after: limit,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completes_within_deadline() {
        let value = with_deadline("fast", Duration::from_millis(200), async { 7 }).await;
        assert_eq!(value, Ok(7));
    }

    #[tokio::test]
    async fn test_times_out() {
        let err = with_deadline(
            "server data",
            Duration::from_millis(20),
            std::future::pending::<()>(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.operation, "server data");
        assert_eq!(err.to_string(), "server data timed out after 20ms");
    }
}
