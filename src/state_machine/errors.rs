use thiserror::Error;
use uuid::Uuid;

use super::states::OrderState;
use crate::database::{DeadlineExceeded, RetryableError};

/// Errors raised by order and item transitions
#[derive(Error, Debug)]
pub enum OrderError {
    #[error("Illegal {entity} transition for {id}: {from} -> {to}")]
    IllegalTransition {
        entity: &'static str,
        id: Uuid,
        from: String,
        to: String,
    },

    #[error("Order {order_id} is already {state}")]
    OrderAlreadyTerminal { order_id: Uuid, state: OrderState },

    #[error("Order {order_id} is still {state} and cannot be deleted")]
    OrderNotTerminal { order_id: Uuid, state: OrderState },

    #[error("Order not found: {0}")]
    OrderNotFound(Uuid),

    #[error("Order item not found: {0}")]
    ItemNotFound(Uuid),

    #[error("Table not found: {0}")]
    TableNotFound(Uuid),

    #[error("Menu item {menu_item_id} is unavailable: {reason}")]
    ItemUnavailable { menu_item_id: Uuid, reason: String },

    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    #[error("Corrupt state in store: {0}")]
    CorruptState(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Timeout(#[from] DeadlineExceeded),
}

impl RetryableError for OrderError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Database(err) if err.is_retryable())
    }
}

impl OrderError {
    /// Business-rule rejections; expected outcomes, never logged as failures
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::IllegalTransition { .. }
                | Self::OrderAlreadyTerminal { .. }
                | Self::OrderNotTerminal { .. }
                | Self::ItemUnavailable { .. }
                | Self::InvalidOrder(_)
        )
    }
}

pub type OrderResult<T> = Result<T, OrderError>;

pub(crate) fn illegal_order_transition(id: Uuid, from: OrderState, to: OrderState) -> OrderError {
    OrderError::IllegalTransition {
        entity: "order",
        id,
        from: from.to_string(),
        to: to.to_string(),
    }
}
