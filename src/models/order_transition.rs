//! # Order Transition Model
//!
//! Append-only audit trail of order-level state changes.
//!
//! ## Overview
//!
//! Every order transition writes one row in the same transaction as the
//! state change itself, so a committed state always has its history entry and
//! a rolled-back transition leaves none. Rows are never updated or deleted.
//!
//! ## Ordering
//!
//! - **`sort_key`**: per-order sequence, 1 for the creation entry
//! - **`created_at`**: `clock_timestamp()` at insert time
//!
//! History reads order by `created_at`, ties broken by `sort_key`.
//!
//! ## Database Schema
//!
//! Maps to `order_transitions`:
//! ```sql
//! CREATE TABLE order_transitions (
//!   order_transition_id BIGSERIAL PRIMARY KEY,
//!   order_id UUID NOT NULL,
//!   from_state VARCHAR,
//!   to_state VARCHAR NOT NULL,
//!   actor_id UUID,
//!   notes TEXT,
//!   sort_key INTEGER NOT NULL,
//!   created_at TIMESTAMPTZ NOT NULL DEFAULT clock_timestamp()
//! );
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

use crate::state_machine::states::OrderState;

/// One order-level state change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct OrderTransition {
    pub order_transition_id: i64,
    pub order_id: Uuid,
    /// `None` for the creation entry
    pub from_state: Option<String>,
    pub to_state: String,
    /// `None` for system or public actors
    pub actor_id: Option<Uuid>,
    pub notes: Option<String>,
    pub sort_key: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewOrderTransition {
    pub order_id: Uuid,
    pub from_state: Option<OrderState>,
    pub to_state: OrderState,
    pub actor_id: Option<Uuid>,
    pub notes: Option<String>,
}

const TRANSITION_COLUMNS: &str = "order_transition_id, order_id, from_state, to_state, actor_id, \
                                  notes, sort_key, created_at";

impl OrderTransition {
    /// Append a transition inside the caller's transaction.
    ///
    /// The caller must hold the order row lock, which keeps `sort_key`
    /// allocation race free.
    pub(crate) async fn create_with_transaction(
        conn: &mut PgConnection,
        new_transition: NewOrderTransition,
    ) -> Result<OrderTransition, sqlx::Error> {
        let next_sort_key: i32 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(sort_key), 0) + 1 FROM order_transitions WHERE order_id = $1",
        )
        .bind(new_transition.order_id)
        .fetch_one(&mut *conn)
        .await?;

        let sql = format!(
            "INSERT INTO order_transitions \
             (order_id, from_state, to_state, actor_id, notes, sort_key) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {TRANSITION_COLUMNS}"
        );

        sqlx::query_as::<_, OrderTransition>(&sql)
            .bind(new_transition.order_id)
            .bind(new_transition.from_state.map(|s| s.as_str()))
            .bind(new_transition.to_state.as_str())
            .bind(new_transition.actor_id)
            .bind(new_transition.notes)
            .bind(next_sort_key)
            .fetch_one(conn)
            .await
    }

    /// Full history of an order, oldest first
    pub async fn list_by_order(
        conn: &mut PgConnection,
        order_id: Uuid,
    ) -> Result<Vec<OrderTransition>, sqlx::Error> {
        let sql = format!(
            "SELECT {TRANSITION_COLUMNS} FROM order_transitions \
             WHERE order_id = $1 ORDER BY created_at ASC, sort_key ASC"
        );

        sqlx::query_as::<_, OrderTransition>(&sql)
            .bind(order_id)
            .fetch_all(conn)
            .await
    }

    /// History within `[from, to)`, oldest first
    pub async fn list_in_range(
        conn: &mut PgConnection,
        order_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<OrderTransition>, sqlx::Error> {
        let sql = format!(
            "SELECT {TRANSITION_COLUMNS} FROM order_transitions \
             WHERE order_id = $1 AND created_at >= $2 AND created_at < $3 \
             ORDER BY created_at ASC, sort_key ASC"
        );

        sqlx::query_as::<_, OrderTransition>(&sql)
            .bind(order_id)
            .bind(from)
            .bind(to)
            .fetch_all(conn)
            .await
    }
}
