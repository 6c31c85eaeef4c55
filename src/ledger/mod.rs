//! # Resource Ledger
//!
//! Admission control for plan-bound resources (tables, menu items, users).
//!
//! ## Locking
//!
//! Each check takes a transaction-scoped advisory lock on
//! `ledger:{restaurant_id}:{kind}` before counting live rows, so two
//! concurrent creators for the same pair are serialized: the second one
//! counts only after the first has committed or rolled back. The lock is
//! released by PostgreSQL when the transaction ends.
//!
//! ## Usage
//!
//! ```rust,no_run
//! # use comanda_core::ledger::{ResourceLedger, ResourceKind};
//! # async fn example(ledger: ResourceLedger, restaurant_id: uuid::Uuid) -> Result<(), Box<dyn std::error::Error>> {
//! let mut admission = ledger.admit(restaurant_id, ResourceKind::Tables, None).await?;
//! sqlx::query("INSERT INTO restaurant_tables (table_id, restaurant_id, label, capacity) VALUES ($1, $2, 'T6', 4)")
//!     .bind(uuid::Uuid::new_v4())
//!     .bind(restaurant_id)
//!     .execute(admission.connection())
//!     .await?;
//! admission.commit().await?;
//! # Ok(())
//! # }
//! ```

use sqlx::{PgConnection, PgPool};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::collaborators::SubscriptionStore;
use crate::database::{DeadlineExceeded, RetryableError, TransactionPolicy, TransactionScope};
use crate::logging::log_ledger_operation;
pub use crate::models::{Limit, ResourceKind};

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Limit reached for {kind} in restaurant {restaurant_id}: {current_count}/{limit}")]
    LimitExceeded {
        restaurant_id: Uuid,
        kind: ResourceKind,
        current_count: i64,
        limit: i64,
    },

    #[error("Ledger unavailable: {0}")]
    LedgerUnavailable(#[source] sqlx::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Timeout(#[from] DeadlineExceeded),
}

impl RetryableError for LedgerError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Database(err) if err.is_retryable())
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Outcome of one admission check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotGrant {
    pub restaurant_id: Uuid,
    pub kind: ResourceKind,
    pub granted: bool,
    pub current_count: i64,
    pub limit: Limit,
}

impl SlotGrant {
    pub fn evaluate(restaurant_id: Uuid, kind: ResourceKind, current_count: i64, limit: Limit) -> Self {
        Self {
            restaurant_id,
            kind,
            granted: limit.admits(current_count),
            current_count,
            limit,
        }
    }

    /// Remaining capacity; `None` when unlimited
    pub fn remaining(&self) -> Option<i64> {
        self.limit
            .as_option()
            .map(|max| (max - self.current_count).max(0))
    }

    fn into_rejection(self) -> LedgerError {
        LedgerError::LimitExceeded {
            restaurant_id: self.restaurant_id,
            kind: self.kind,
            current_count: self.current_count,
            limit: self.limit.as_option().unwrap_or(i64::MAX),
        }
    }
}

/// A granted slot holding the transaction and lock it was granted under.
///
/// Insert the new resource through [`Admission::connection`] and commit;
/// dropping the admission rolls back and releases the slot.
pub struct Admission {
    scope: TransactionScope,
    grant: SlotGrant,
}

impl Admission {
    pub fn grant(&self) -> &SlotGrant {
        &self.grant
    }

    pub fn connection(&mut self) -> &mut PgConnection {
        self.scope.connection()
    }

    pub async fn commit(self) -> LedgerResult<SlotGrant> {
        self.scope.commit().await?;
        Ok(self.grant)
    }

    pub async fn rollback(self) -> LedgerResult<()> {
        self.scope.rollback().await?;
        Ok(())
    }
}

impl std::fmt::Debug for Admission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Admission").field("grant", &self.grant).finish()
    }
}

#[derive(Clone)]
pub struct ResourceLedger {
    pool: PgPool,
    limits: Arc<dyn SubscriptionStore>,
    policy: TransactionPolicy,
}

impl ResourceLedger {
    pub fn new(pool: PgPool, limits: Arc<dyn SubscriptionStore>, policy: TransactionPolicy) -> Self {
        Self {
            pool,
            limits,
            policy,
        }
    }

    /// Check one more `kind` against the restaurant's limit inside `scope`.
    ///
    /// Holds the pair's advisory lock until `scope` ends. A refusal is
    /// returned as `granted == false` with no side effects.
    pub async fn try_reserve_slot(
        &self,
        scope: &mut TransactionScope,
        restaurant_id: Uuid,
        kind: ResourceKind,
    ) -> LedgerResult<SlotGrant> {
        scope.lock(&lock_key(restaurant_id, kind)).await?;
        let grant = self.evaluate(scope.connection(), restaurant_id, kind).await?;

        log_ledger_operation(
            restaurant_id,
            kind.as_str(),
            grant.granted,
            grant.current_count,
            grant.limit.as_option(),
        );

        Ok(grant)
    }

    /// Open a transaction, lock and check the pair, and hand the transaction
    /// back for the caller's insert. Fails with `LimitExceeded` when full.
    pub async fn admit(
        &self,
        restaurant_id: Uuid,
        kind: ResourceKind,
        deadline: Option<Duration>,
    ) -> LedgerResult<Admission> {
        self.policy
            .run("ledger.admit", deadline, || self.admit_once(restaurant_id, kind))
            .await
    }

    async fn admit_once(&self, restaurant_id: Uuid, kind: ResourceKind) -> LedgerResult<Admission> {
        let mut scope = TransactionScope::begin(&self.pool, "ledger.admit")
            .await
            .map_err(LedgerError::LedgerUnavailable)?;

        let grant = self.try_reserve_slot(&mut scope, restaurant_id, kind).await?;
        if !grant.granted {
            scope.rollback().await?;
            debug!(
                restaurant_id = %restaurant_id,
                resource_kind = %kind,
                current_count = grant.current_count,
                "Admission refused"
            );
            return Err(grant.into_rejection());
        }

        Ok(Admission { scope, grant })
    }

    /// Lock-free snapshot for display; never use it to admit.
    pub async fn check_limit(&self, restaurant_id: Uuid, kind: ResourceKind) -> LedgerResult<SlotGrant> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(LedgerError::LedgerUnavailable)?;
        self.evaluate(&mut conn, restaurant_id, kind).await
    }

    async fn evaluate(
        &self,
        conn: &mut PgConnection,
        restaurant_id: Uuid,
        kind: ResourceKind,
    ) -> LedgerResult<SlotGrant> {
        let limits = self.limits.limits_for(&mut *conn, restaurant_id).await?;
        let current_count = count_live(conn, restaurant_id, kind).await?;
        Ok(SlotGrant::evaluate(
            restaurant_id,
            kind,
            current_count,
            limits.limit_for(kind),
        ))
    }
}

fn lock_key(restaurant_id: Uuid, kind: ResourceKind) -> String {
    format!("ledger:{restaurant_id}:{}", kind.as_str())
}

async fn count_live(
    conn: &mut PgConnection,
    restaurant_id: Uuid,
    kind: ResourceKind,
) -> Result<i64, sqlx::Error> {
    let sql = format!(
        "SELECT COUNT(*) FROM {} WHERE restaurant_id = $1 AND deleted_at IS NULL",
        kind.table_name()
    );
    sqlx::query_scalar::<_, i64>(&sql)
        .bind(restaurant_id)
        .fetch_one(conn)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant_evaluation() {
        let restaurant_id = Uuid::new_v4();

        let full = SlotGrant::evaluate(restaurant_id, ResourceKind::Tables, 5, Limit::Max(5));
        assert!(!full.granted);
        assert_eq!(full.remaining(), Some(0));

        let open = SlotGrant::evaluate(restaurant_id, ResourceKind::Tables, 3, Limit::Max(5));
        assert!(open.granted);
        assert_eq!(open.remaining(), Some(2));

        let unlimited = SlotGrant::evaluate(restaurant_id, ResourceKind::Users, 10_000, Limit::Unlimited);
        assert!(unlimited.granted);
        assert_eq!(unlimited.remaining(), None);
    }

    #[test]
    fn test_rejection_carries_counts() {
        let restaurant_id = Uuid::new_v4();
        let grant = SlotGrant::evaluate(restaurant_id, ResourceKind::MenuItems, 40, Limit::Max(40));

        match grant.into_rejection() {
            LedgerError::LimitExceeded {
                kind,
                current_count,
                limit,
                ..
            } => {
                assert_eq!(kind, ResourceKind::MenuItems);
                assert_eq!(current_count, 40);
                assert_eq!(limit, 40);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_lock_key_is_scoped_by_restaurant_and_kind() {
        let restaurant_id = Uuid::nil();
        assert_eq!(
            lock_key(restaurant_id, ResourceKind::Tables),
            "ledger:00000000-0000-0000-0000-000000000000:tables"
        );
        assert_ne!(
            lock_key(restaurant_id, ResourceKind::Tables),
            lock_key(restaurant_id, ResourceKind::Users)
        );
    }
}
