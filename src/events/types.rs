use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Notification kinds delivered to real-time listeners
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "order.created")]
    OrderCreated,
    #[serde(rename = "order.state_changed")]
    OrderStateChanged,
    #[serde(rename = "order.item_state_changed")]
    OrderItemStateChanged,
    #[serde(rename = "reservation.created")]
    ReservationCreated,
    #[serde(rename = "reservation.confirmed")]
    ReservationConfirmed,
    #[serde(rename = "reservation.cancelled")]
    ReservationCancelled,
    #[serde(rename = "reservation.completed")]
    ReservationCompleted,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OrderCreated => "order.created",
            Self::OrderStateChanged => "order.state_changed",
            Self::OrderItemStateChanged => "order.item_state_changed",
            Self::ReservationCreated => "reservation.created",
            Self::ReservationConfirmed => "reservation.confirmed",
            Self::ReservationCancelled => "reservation.cancelled",
            Self::ReservationCompleted => "reservation.completed",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event as delivered to a subscriber
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastEvent {
    pub event_id: Uuid,
    pub restaurant_id: Uuid,
    pub event_type: EventType,
    pub payload: Value,
    pub published_at: DateTime<Utc>,
}

impl BroadcastEvent {
    pub fn new(restaurant_id: Uuid, event_type: EventType, payload: Value) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            restaurant_id,
            event_type,
            payload,
            published_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_type_wire_names() {
        let serialized = serde_json::to_value(EventType::OrderItemStateChanged).unwrap();
        assert_eq!(serialized, json!("order.item_state_changed"));

        let parsed: EventType = serde_json::from_value(json!("reservation.confirmed")).unwrap();
        assert_eq!(parsed, EventType::ReservationConfirmed);
        assert_eq!(parsed.to_string(), "reservation.confirmed");
    }
}
