pub mod order;
pub mod order_item;
pub mod order_item_transition;
pub mod order_transition;
pub mod reservation;
pub mod reservation_policy;
pub mod subscription_limits;

// Re-export core models for easy access
pub use order::{NewOrder, Order};
pub use order_item::{NewOrderItem, OrderItem};
pub use order_item_transition::{NewOrderItemTransition, OrderItemTransition};
pub use order_transition::{NewOrderTransition, OrderTransition};
pub use reservation::{CustomerContact, NewReservation, Reservation, ReservationStatus};
pub use reservation_policy::{OperatingHours, ReservationPolicy};
pub use subscription_limits::{Limit, ResourceKind, SubscriptionLimits};
