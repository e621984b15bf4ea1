//! Database query timeout helpers
//!
//! Every repository call goes through one of these wrappers so that no
//! reservation operation can wait on the database indefinitely.

use super::errors::{RepositoryError, RepositoryResult};
use std::time::Duration;
use tokio::time::timeout;

/// Default timeout for single statements (5 seconds)
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Default timeout for guarded write transactions (10 seconds)
pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for schema setup and other long-running operations (30 seconds)
pub const LONG_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Execute a database future with a timeout
///
/// # Arguments
///
/// * `duration` - Timeout duration
/// * `future` - Async operation to execute
///
/// # Returns
///
/// * `RepositoryResult<T>` - Result, mapped database error, or `Timeout`
///
/// # Example
///
/// ```no_run
/// use tourney_slots::db::timeouts::{with_timeout, DEFAULT_QUERY_TIMEOUT};
/// # use sqlx::PgPool;
/// # async fn example(pool: &PgPool) -> Result<(), Box<dyn std::error::Error>> {
///
/// let result = with_timeout(
///     DEFAULT_QUERY_TIMEOUT,
///     sqlx::query("SELECT * FROM reservations WHERE id = $1")
///         .bind(1_i64)
///         .fetch_optional(pool)
/// ).await?;
///
/// # Ok(())
/// # }
/// ```
pub async fn with_timeout<F, T, E>(duration: Duration, future: F) -> RepositoryResult<T>
where
    F: std::future::Future<Output = Result<T, E>>,
    E: Into<RepositoryError>,
{
    match timeout(duration, future).await {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(e)) => Err(e.into()),
        Err(_) => Err(RepositoryError::Timeout(duration)),
    }
}

/// Execute a statement with the default timeout (5 seconds)
pub async fn with_default_timeout<F, T, E>(future: F) -> RepositoryResult<T>
where
    F: std::future::Future<Output = Result<T, E>>,
    E: Into<RepositoryError>,
{
    with_timeout(DEFAULT_QUERY_TIMEOUT, future).await
}

/// Execute a guarded write transaction with the transaction timeout (10 seconds)
pub async fn with_transaction_timeout<F, T, E>(future: F) -> RepositoryResult<T>
where
    F: std::future::Future<Output = Result<T, E>>,
    E: Into<RepositoryError>,
{
    with_timeout(DEFAULT_TRANSACTION_TIMEOUT, future).await
}

/// Execute a long-running operation with extended timeout (30 seconds)
pub async fn with_long_timeout<F, T, E>(future: F) -> RepositoryResult<T>
where
    F: std::future::Future<Output = Result<T, E>>,
    E: Into<RepositoryError>,
{
    with_timeout(LONG_OPERATION_TIMEOUT, future).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_timeout_constants() {
        assert_eq!(DEFAULT_QUERY_TIMEOUT.as_secs(), 5);
        assert_eq!(DEFAULT_TRANSACTION_TIMEOUT.as_secs(), 10);
        assert_eq!(LONG_OPERATION_TIMEOUT.as_secs(), 30);
    }

    #[tokio::test]
    async fn test_slow_future_times_out() {
        let result: RepositoryResult<()> = with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<(), sqlx::Error>(())
        })
        .await;
        assert!(matches!(result, Err(RepositoryError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_fast_future_passes_through() {
        let result = with_default_timeout(async { Ok::<_, sqlx::Error>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
