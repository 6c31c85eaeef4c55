//! # Order Model
//!
//! One customer order within one restaurant, optionally tied to a table.
//! The `state` column is only written by the order state machine.
//!
//! Maps to the `orders` table. Line items live in `order_items` and are
//! loaded in insertion order (`position`), which is the kitchen display order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

use super::order_item::{NewOrderItem, OrderItem};
use crate::state_machine::states::OrderState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub order_id: Uuid,
    pub restaurant_id: Uuid,
    pub table_id: Option<Uuid>,
    pub customer_name: Option<String>,
    pub state: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    #[sqlx(skip)]
    pub items: Vec<OrderItem>,
}

/// Order submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    /// `None` for takeaway or virtual sessions
    pub table_id: Option<Uuid>,
    pub customer_name: Option<String>,
    pub items: Vec<NewOrderItem>,
}

const ORDER_COLUMNS: &str = "order_id, restaurant_id, table_id, customer_name, state, \
                             created_at, updated_at, deleted_at";

impl Order {
    pub async fn insert(
        conn: &mut PgConnection,
        restaurant_id: Uuid,
        new_order: &NewOrder,
        state: OrderState,
    ) -> Result<Order, sqlx::Error> {
        let sql = format!(
            "INSERT INTO orders (order_id, restaurant_id, table_id, customer_name, state) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {ORDER_COLUMNS}"
        );

        sqlx::query_as::<_, Order>(&sql)
            .bind(Uuid::new_v4())
            .bind(restaurant_id)
            .bind(new_order.table_id)
            .bind(&new_order.customer_name)
            .bind(state.as_str())
            .fetch_one(conn)
            .await
    }

    /// Load a live order and lock its row until the transaction ends.
    ///
    /// Every transition locks the order row first, which linearizes
    /// concurrent order- and item-level writers for the same order.
    pub async fn find_for_update(
        conn: &mut PgConnection,
        restaurant_id: Uuid,
        order_id: Uuid,
    ) -> Result<Option<Order>, sqlx::Error> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE order_id = $1 AND restaurant_id = $2 AND deleted_at IS NULL \
             FOR UPDATE"
        );

        sqlx::query_as::<_, Order>(&sql)
            .bind(order_id)
            .bind(restaurant_id)
            .fetch_optional(conn)
            .await
    }

    /// Load a live order with its items, without locking.
    pub async fn find_with_items(
        conn: &mut PgConnection,
        restaurant_id: Uuid,
        order_id: Uuid,
    ) -> Result<Option<Order>, sqlx::Error> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE order_id = $1 AND restaurant_id = $2 AND deleted_at IS NULL"
        );

        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(order_id)
            .bind(restaurant_id)
            .fetch_optional(&mut *conn)
            .await?;

        match order {
            Some(mut order) => {
                order.items = OrderItem::list_by_order(conn, order.order_id).await?;
                Ok(Some(order))
            }
            None => Ok(None),
        }
    }

    /// Whether the order ever existed in this restaurant, deleted or not
    pub async fn exists_in_restaurant(
        conn: &mut PgConnection,
        restaurant_id: Uuid,
        order_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM orders WHERE order_id = $1 AND restaurant_id = $2)",
        )
        .bind(order_id)
        .bind(restaurant_id)
        .fetch_one(conn)
        .await
    }

    pub async fn update_state(
        conn: &mut PgConnection,
        order_id: Uuid,
        state: OrderState,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE orders SET state = $2, updated_at = NOW() WHERE order_id = $1")
            .bind(order_id)
            .bind(state.as_str())
            .execute(conn)
            .await?;
        Ok(())
    }

    pub async fn soft_delete(conn: &mut PgConnection, order_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE orders SET deleted_at = NOW(), updated_at = NOW() \
             WHERE order_id = $1 AND deleted_at IS NULL",
        )
        .bind(order_id)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Parsed lifecycle state
    pub fn order_state(&self) -> Result<OrderState, String> {
        self.state.parse()
    }

    /// Sum of price snapshots of all non-cancelled lines
    pub fn total_cents(&self) -> i64 {
        self.items
            .iter()
            .filter(|item| !item.is_cancelled())
            .map(OrderItem::line_total_cents)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::states::ItemState;

    fn item(quantity: i32, unit_price_cents: i64, state: ItemState) -> OrderItem {
        OrderItem {
            order_item_id: Uuid::new_v4(),
            order_id: Uuid::nil(),
            menu_item_id: Uuid::new_v4(),
            position: 0,
            name: "Tacos al pastor".to_string(),
            quantity,
            unit_price_cents,
            state: state.to_string(),
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_total_ignores_cancelled_lines() {
        let order = Order {
            order_id: Uuid::nil(),
            restaurant_id: Uuid::new_v4(),
            table_id: None,
            customer_name: Some("Ana".to_string()),
            state: OrderState::Confirmado.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
            items: vec![
                item(2, 4_500, ItemState::Pendiente),
                item(1, 12_000, ItemState::Cancelado),
                item(3, 1_000, ItemState::Entregado),
            ],
        };

        assert_eq!(order.total_cents(), 12_000);
        assert_eq!(order.order_state(), Ok(OrderState::Confirmado));
    }
}
