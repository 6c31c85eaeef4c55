//! PostgreSQL Error Codes
//!
//! SQLSTATE constants used to classify store failures. Only codes the core
//! actually reacts to are listed.
//!
//! Full list: <https://www.postgresql.org/docs/current/errcodes-appendix.html>

/// PostgreSQL SQLSTATE error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PgErrorCode;

impl PgErrorCode {
    // =========================================================================
    // Class 40 - Transaction Rollback
    // =========================================================================

    /// Serialization failure - Code 40001
    pub const SERIALIZATION_FAILURE: &'static str = "40001";

    /// Deadlock detected - Code 40P01
    pub const DEADLOCK_DETECTED: &'static str = "40P01";

    // =========================================================================
    // Class 55 / 57 - Lock and cancellation
    // =========================================================================

    /// Lock not available - Code 55P03 (`lock_timeout` expired)
    pub const LOCK_NOT_AVAILABLE: &'static str = "55P03";

    /// Query canceled - Code 57014 (`statement_timeout` expired)
    pub const QUERY_CANCELED: &'static str = "57014";

    /// Check if the error is retryable (serialization failure or deadlock)
    #[inline]
    pub fn is_retryable_transaction_error(code: &str) -> bool {
        code == Self::SERIALIZATION_FAILURE || code == Self::DEADLOCK_DETECTED
    }

    /// Check if the store gave up waiting on our behalf
    #[inline]
    pub fn is_timeout(code: &str) -> bool {
        code == Self::LOCK_NOT_AVAILABLE || code == Self::QUERY_CANCELED
    }
}

/// SQLSTATE of a database error, if the error came from the server
pub fn sqlstate(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().map(|code| code.into_owned()),
        _ => None,
    }
}

/// True for errors worth one more attempt with a fresh transaction
pub fn is_retryable(err: &sqlx::Error) -> bool {
    sqlstate(err)
        .map(|code| PgErrorCode::is_retryable_transaction_error(&code))
        .unwrap_or(false)
}

/// True when the server gave up on a lock wait or a statement
pub fn is_store_timeout(err: &sqlx::Error) -> bool {
    sqlstate(err)
        .map(|code| PgErrorCode::is_timeout(&code))
        .unwrap_or(false)
}
