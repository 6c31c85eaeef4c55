//! # Order Item Transition Model
//!
//! Item-level audit trail, written in the same transaction as each item state
//! change (including changes cascaded from an order-level transition).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

use crate::state_machine::states::ItemState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct OrderItemTransition {
    pub order_item_transition_id: i64,
    pub order_item_id: Uuid,
    pub from_state: Option<String>,
    pub to_state: String,
    pub actor_id: Option<Uuid>,
    pub notes: Option<String>,
    pub sort_key: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewOrderItemTransition {
    pub order_item_id: Uuid,
    pub from_state: Option<ItemState>,
    pub to_state: ItemState,
    pub actor_id: Option<Uuid>,
    pub notes: Option<String>,
}

const ITEM_TRANSITION_COLUMNS: &str = "order_item_transition_id, order_item_id, from_state, \
                                       to_state, actor_id, notes, sort_key, created_at";

impl OrderItemTransition {
    pub(crate) async fn create_with_transaction(
        conn: &mut PgConnection,
        new_transition: NewOrderItemTransition,
    ) -> Result<OrderItemTransition, sqlx::Error> {
        let sql = format!(
            "INSERT INTO order_item_transitions \
             (order_item_id, from_state, to_state, actor_id, notes, sort_key) \
             SELECT $1, $2, $3, $4, $5, COALESCE(MAX(sort_key), 0) + 1 \
             FROM order_item_transitions WHERE order_item_id = $1 \
             RETURNING {ITEM_TRANSITION_COLUMNS}"
        );

        sqlx::query_as::<_, OrderItemTransition>(&sql)
            .bind(new_transition.order_item_id)
            .bind(new_transition.from_state.map(|s| s.as_str()))
            .bind(new_transition.to_state.as_str())
            .bind(new_transition.actor_id)
            .bind(new_transition.notes)
            .fetch_one(conn)
            .await
    }

    pub async fn list_by_item(
        conn: &mut PgConnection,
        order_item_id: Uuid,
    ) -> Result<Vec<OrderItemTransition>, sqlx::Error> {
        let sql = format!(
            "SELECT {ITEM_TRANSITION_COLUMNS} FROM order_item_transitions \
             WHERE order_item_id = $1 ORDER BY created_at ASC, sort_key ASC"
        );

        sqlx::query_as::<_, OrderItemTransition>(&sql)
            .bind(order_item_id)
            .fetch_all(conn)
            .await
    }
}
