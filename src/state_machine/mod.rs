// Order lifecycle state machine
//
// Order- and item-level states, pure transition guards, the monotonic
// derivation of an order's state from its items, and the transactional
// service that applies transitions together with their audit trail.

pub mod actions;
pub mod derivation;
pub mod errors;
pub mod guards;
pub mod order_state_machine;
pub(crate) mod persistence;
pub mod states;

// Re-export main types for convenient access
pub use actions::PendingEvent;
pub use derivation::{derive_order_state, implied_by_items};
pub use errors::{OrderError, OrderResult};
pub use order_state_machine::OrderStateMachine;
pub use states::{ItemState, OrderState};
