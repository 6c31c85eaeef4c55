//! Post-commit actions.
//!
//! Transitions collect the notifications they imply while the transaction is
//! open; the caller publishes them only after commit, so listeners never see
//! a state that could still roll back.

use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use super::states::{ItemState, OrderState};
use crate::events::{EventBroadcaster, EventType};
use crate::models::{Order, OrderItem};

/// A notification waiting for its transaction to commit
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEvent {
    pub restaurant_id: Uuid,
    pub event_type: EventType,
    pub payload: Value,
}

/// Publish collected events in order
pub(crate) fn publish_all(broadcaster: &EventBroadcaster, events: Vec<PendingEvent>) {
    for event in events {
        broadcaster.publish(event.restaurant_id, event.event_type, event.payload);
    }
}

pub(crate) fn order_created(order: &Order) -> PendingEvent {
    PendingEvent {
        restaurant_id: order.restaurant_id,
        event_type: EventType::OrderCreated,
        payload: json!({
            "order_id": order.order_id,
            "table_id": order.table_id,
            "customer_name": order.customer_name,
            "state": order.state,
            "total_cents": order.total_cents(),
            "items": order.items.iter().map(item_summary).collect::<Vec<_>>(),
            "created_at": order.created_at,
        }),
    }
}

pub(crate) fn order_state_changed(
    order: &Order,
    from: OrderState,
    to: OrderState,
    actor: Option<Uuid>,
) -> PendingEvent {
    PendingEvent {
        restaurant_id: order.restaurant_id,
        event_type: EventType::OrderStateChanged,
        payload: json!({
            "order_id": order.order_id,
            "table_id": order.table_id,
            "from_state": from,
            "to_state": to,
            "actor": actor,
            "transitioned_at": Utc::now(),
        }),
    }
}

pub(crate) fn item_state_changed(
    order: &Order,
    item: &OrderItem,
    from: ItemState,
    to: ItemState,
    actor: Option<Uuid>,
) -> PendingEvent {
    PendingEvent {
        restaurant_id: order.restaurant_id,
        event_type: EventType::OrderItemStateChanged,
        payload: json!({
            "order_id": order.order_id,
            "order_item_id": item.order_item_id,
            "name": item.name,
            "from_state": from,
            "to_state": to,
            "order_state": order.state,
            "actor": actor,
            "transitioned_at": Utc::now(),
        }),
    }
}

fn item_summary(item: &OrderItem) -> Value {
    json!({
        "order_item_id": item.order_item_id,
        "menu_item_id": item.menu_item_id,
        "name": item.name,
        "quantity": item.quantity,
        "unit_price_cents": item.unit_price_cents,
        "state": item.state,
        "notes": item.notes,
    })
}
