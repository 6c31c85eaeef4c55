//! # Order Item Model
//!
//! One line of an order. The unit price and name are snapshots taken from the
//! menu catalog when the order was created; later menu edits do not reach
//! existing orders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

use crate::collaborators::MenuItemSnapshot;
use crate::state_machine::states::ItemState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct OrderItem {
    pub order_item_id: Uuid,
    pub order_id: Uuid,
    pub menu_item_id: Uuid,
    pub position: i32,
    pub name: String,
    pub quantity: i32,
    pub unit_price_cents: i64,
    pub state: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Requested line of a new order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub menu_item_id: Uuid,
    pub quantity: i32,
    pub notes: Option<String>,
}

const ITEM_COLUMNS: &str = "order_item_id, order_id, menu_item_id, position, name, quantity, \
                            unit_price_cents, state, notes, created_at, updated_at";

fn qualified_columns(alias: &str) -> String {
    ITEM_COLUMNS
        .split(',')
        .map(|column| format!("{alias}.{}", column.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}

impl OrderItem {
    pub async fn insert(
        conn: &mut PgConnection,
        order_id: Uuid,
        position: i32,
        line: &NewOrderItem,
        snapshot: &MenuItemSnapshot,
    ) -> Result<OrderItem, sqlx::Error> {
        let sql = format!(
            "INSERT INTO order_items \
             (order_item_id, order_id, menu_item_id, position, name, quantity, unit_price_cents, state, notes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {ITEM_COLUMNS}"
        );

        sqlx::query_as::<_, OrderItem>(&sql)
            .bind(Uuid::new_v4())
            .bind(order_id)
            .bind(line.menu_item_id)
            .bind(position)
            .bind(&snapshot.name)
            .bind(line.quantity)
            .bind(snapshot.price_cents)
            .bind(ItemState::default().as_str())
            .bind(&line.notes)
            .fetch_one(conn)
            .await
    }

    /// Restaurant-scoped lookup; items of soft-deleted orders are excluded
    pub async fn find(
        conn: &mut PgConnection,
        restaurant_id: Uuid,
        order_item_id: Uuid,
    ) -> Result<Option<OrderItem>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM order_items i \
             JOIN orders o ON o.order_id = i.order_id \
             WHERE i.order_item_id = $1 AND o.restaurant_id = $2 AND o.deleted_at IS NULL",
            qualified_columns("i")
        );

        sqlx::query_as::<_, OrderItem>(&sql)
            .bind(order_item_id)
            .bind(restaurant_id)
            .fetch_optional(conn)
            .await
    }

    /// Items of an order in kitchen display order
    pub async fn list_by_order(
        conn: &mut PgConnection,
        order_id: Uuid,
    ) -> Result<Vec<OrderItem>, sqlx::Error> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY position ASC"
        );

        sqlx::query_as::<_, OrderItem>(&sql)
            .bind(order_id)
            .fetch_all(conn)
            .await
    }

    pub async fn update_state(
        conn: &mut PgConnection,
        order_item_id: Uuid,
        state: ItemState,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE order_items SET state = $2, updated_at = NOW() WHERE order_item_id = $1",
        )
        .bind(order_item_id)
        .bind(state.as_str())
        .execute(conn)
        .await?;
        Ok(())
    }

    pub fn item_state(&self) -> Result<ItemState, String> {
        self.state.parse()
    }

    pub fn is_cancelled(&self) -> bool {
        self.state == ItemState::Cancelado.as_str()
    }

    pub fn line_total_cents(&self) -> i64 {
        self.unit_price_cents * i64::from(self.quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualified_columns() {
        let columns = qualified_columns("i");
        assert!(columns.starts_with("i.order_item_id, i.order_id, "));
        assert!(columns.ends_with("i.created_at, i.updated_at"));
    }
}
