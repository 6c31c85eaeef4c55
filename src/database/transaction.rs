//! # Transaction Scopes
//!
//! Every admission check and state transition in the core runs inside an
//! explicit [`TransactionScope`]. The scope owns the pooled connection for its
//! whole lifetime; dropping it without calling [`TransactionScope::commit`]
//! rolls the transaction back, which is what makes deadline expiry safe: the
//! timed-out future is dropped together with its scope.
//!
//! Two helpers wrap an attempt closure:
//!
//! - [`retry_on_conflict`] re-runs the attempt with a fresh transaction when
//!   PostgreSQL reports a serialization failure or deadlock.
//! - [`with_deadline`] bounds the whole operation, retries included.

use std::future::Future;
use std::time::Duration;

use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::TransactionConfig;

/// Raised when an operation outlives its caller-supplied deadline.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{operation} exceeded its deadline of {after:?}")]
pub struct DeadlineExceeded {
    pub operation: &'static str,
    pub after: Duration,
}

/// Errors that can tell whether a fresh attempt might succeed.
pub trait RetryableError {
    fn is_retryable(&self) -> bool;
}

impl RetryableError for sqlx::Error {
    fn is_retryable(&self) -> bool {
        super::error_codes::is_retryable(self)
    }
}

/// Retry and deadline settings shared by all components.
#[derive(Debug, Clone)]
pub struct TransactionPolicy {
    pub default_timeout: Duration,
    pub serialization_retries: u32,
    pub retry_backoff: Duration,
}

impl Default for TransactionPolicy {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(5),
            serialization_retries: 1,
            retry_backoff: Duration::from_millis(25),
        }
    }
}

impl From<&TransactionConfig> for TransactionPolicy {
    fn from(config: &TransactionConfig) -> Self {
        Self {
            default_timeout: Duration::from_millis(config.default_timeout_ms),
            serialization_retries: config.serialization_retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }
}

impl TransactionPolicy {
    /// Resolve the effective deadline for a request.
    pub fn deadline(&self, requested: Option<Duration>) -> Duration {
        requested.unwrap_or(self.default_timeout)
    }

    /// Run `attempt` with conflict retries, bounded by the request deadline.
    pub async fn run<T, E, F, Fut>(
        &self,
        operation: &'static str,
        deadline: Option<Duration>,
        attempt: F,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RetryableError + From<DeadlineExceeded>,
    {
        with_deadline(
            operation,
            self.deadline(deadline),
            retry_on_conflict(self, operation, attempt),
        )
        .await
    }
}

/// An open transaction on a dedicated pooled connection.
pub struct TransactionScope {
    tx: Transaction<'static, Postgres>,
    label: &'static str,
}

impl TransactionScope {
    /// Begin a READ COMMITTED transaction.
    pub async fn begin(pool: &PgPool, label: &'static str) -> Result<Self, sqlx::Error> {
        let tx = pool.begin().await?;
        debug!(scope = label, "Transaction started");
        Ok(Self { tx, label })
    }

    /// Connection bound to this transaction.
    pub fn connection(&mut self) -> &mut PgConnection {
        &mut self.tx
    }

    /// Take a transaction-scoped advisory lock keyed by `key`.
    ///
    /// The lock is released by PostgreSQL at commit or rollback.
    pub async fn lock(&mut self, key: &str) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(key)
            .execute(self.connection())
            .await?;
        debug!(scope = self.label, lock_key = key, "Advisory lock acquired");
        Ok(())
    }

    pub async fn commit(self) -> Result<(), sqlx::Error> {
        let label = self.label;
        self.tx.commit().await?;
        debug!(scope = label, "Transaction committed");
        Ok(())
    }

    pub async fn rollback(self) -> Result<(), sqlx::Error> {
        let label = self.label;
        self.tx.rollback().await?;
        debug!(scope = label, "Transaction rolled back");
        Ok(())
    }
}

/// Re-run `attempt` while it fails with a retryable store conflict.
pub async fn retry_on_conflict<T, E, F, Fut>(
    policy: &TransactionPolicy,
    operation: &'static str,
    mut attempt: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryableError,
{
    let mut retries = 0;

    loop {
        match attempt().await {
            Err(err) if err.is_retryable() && retries < policy.serialization_retries => {
                retries += 1;
                let delay = policy.retry_backoff * 2u32.saturating_pow(retries - 1);
                warn!(
                    operation = operation,
                    retry = retries,
                    delay_ms = delay.as_millis() as u64,
                    "Transaction conflict, retrying with a fresh transaction"
                );
                tokio::time::sleep(delay).await;
            }
            result => return result,
        }
    }
}

/// Bound `future` by `deadline`; on expiry the future (and any open
/// transaction it owns) is dropped.
pub async fn with_deadline<T, E, Fut>(
    operation: &'static str,
    deadline: Duration,
    future: Fut,
) -> Result<T, E>
where
    Fut: Future<Output = Result<T, E>>,
    E: From<DeadlineExceeded>,
{
    match tokio::time::timeout(deadline, future).await {
        Ok(result) => result,
        Err(_) => {
            warn!(operation = operation, deadline_ms = deadline.as_millis() as u64, "Deadline exceeded");
            Err(DeadlineExceeded {
                operation,
                after: deadline,
            }
            .into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, PartialEq)]
    enum TestError {
        Conflict,
        Fatal,
        Timeout,
    }

    impl RetryableError for TestError {
        fn is_retryable(&self) -> bool {
            matches!(self, TestError::Conflict)
        }
    }

    impl From<DeadlineExceeded> for TestError {
        fn from(_: DeadlineExceeded) -> Self {
            TestError::Timeout
        }
    }

    fn fast_policy(retries: u32) -> TransactionPolicy {
        TransactionPolicy {
            default_timeout: Duration::from_secs(1),
            serialization_retries: retries,
            retry_backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_conflict_is_retried_once() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, TestError> = retry_on_conflict(&fast_policy(1), "test", || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                Err(TestError::Conflict)
            } else {
                Ok(n)
            }
        })
        .await;

        assert_eq!(result, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let calls = AtomicU32::new(0);
        let result: Result<(), TestError> = retry_on_conflict(&fast_policy(1), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(TestError::Conflict)
        })
        .await;

        assert_eq!(result, Err(TestError::Conflict));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_errors_surface_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), TestError> = retry_on_conflict(&fast_policy(3), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(TestError::Fatal)
        })
        .await;

        assert_eq!(result, Err(TestError::Fatal));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_deadline_expiry_maps_to_timeout() {
        let result: Result<(), TestError> =
            with_deadline("slow", Duration::from_millis(10), async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        assert_eq!(result, Err(TestError::Timeout));
    }

    #[test]
    fn test_policy_uses_requested_deadline() {
        let policy = fast_policy(1);
        assert_eq!(policy.deadline(None), Duration::from_secs(1));
        assert_eq!(
            policy.deadline(Some(Duration::from_millis(200))),
            Duration::from_millis(200)
        );
    }
}
