//! Transition persistence.
//!
//! Each helper writes the new state and its audit row on the caller's
//! connection, so both land in the same transaction or neither does.

use sqlx::PgConnection;
use uuid::Uuid;

use super::states::{ItemState, OrderState};
use crate::models::{
    NewOrderItemTransition, NewOrderTransition, Order, OrderItem, OrderItemTransition,
    OrderTransition,
};

/// Who made a change and why
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Attribution<'a> {
    pub actor: Option<Uuid>,
    pub notes: Option<&'a str>,
}

impl<'a> Attribution<'a> {
    pub fn new(actor: Option<Uuid>, notes: Option<&'a str>) -> Self {
        Self { actor, notes }
    }

    pub fn with_notes(self, notes: &'a str) -> Self {
        Self {
            notes: Some(notes),
            ..self
        }
    }
}

/// Record the creation entry `(null -> initial)` for a freshly inserted order
pub(crate) async fn record_order_created(
    conn: &mut PgConnection,
    order_id: Uuid,
    initial: OrderState,
    by: Attribution<'_>,
) -> Result<OrderTransition, sqlx::Error> {
    OrderTransition::create_with_transaction(
        conn,
        NewOrderTransition {
            order_id,
            from_state: None,
            to_state: initial,
            actor_id: by.actor,
            notes: by.notes.map(str::to_owned),
        },
    )
    .await
}

/// Move an order to `to` and append its history entry
pub(crate) async fn transition_order(
    conn: &mut PgConnection,
    order_id: Uuid,
    from: OrderState,
    to: OrderState,
    by: Attribution<'_>,
) -> Result<OrderTransition, sqlx::Error> {
    Order::update_state(&mut *conn, order_id, to).await?;
    OrderTransition::create_with_transaction(
        conn,
        NewOrderTransition {
            order_id,
            from_state: Some(from),
            to_state: to,
            actor_id: by.actor,
            notes: by.notes.map(str::to_owned),
        },
    )
    .await
}

/// Record the creation entry `(null -> pendiente)` for a new line item
pub(crate) async fn record_item_created(
    conn: &mut PgConnection,
    order_item_id: Uuid,
    by: Attribution<'_>,
) -> Result<OrderItemTransition, sqlx::Error> {
    OrderItemTransition::create_with_transaction(
        conn,
        NewOrderItemTransition {
            order_item_id,
            from_state: None,
            to_state: ItemState::default(),
            actor_id: by.actor,
            notes: by.notes.map(str::to_owned),
        },
    )
    .await
}

/// Move an item to `to` and append its item-level history entry
pub(crate) async fn transition_item(
    conn: &mut PgConnection,
    order_item_id: Uuid,
    from: ItemState,
    to: ItemState,
    by: Attribution<'_>,
) -> Result<OrderItemTransition, sqlx::Error> {
    OrderItem::update_state(&mut *conn, order_item_id, to).await?;
    OrderItemTransition::create_with_transaction(
        conn,
        NewOrderItemTransition {
            order_item_id,
            from_state: Some(from),
            to_state: to,
            actor_id: by.actor,
            notes: by.notes.map(str::to_owned),
        },
    )
    .await
}
