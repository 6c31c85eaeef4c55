#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Comanda Core
//!
//! Order and table-reservation lifecycle core for a multi-tenant restaurant
//! ordering platform.
//!
//! ## Overview
//!
//! The crate owns the parts of the platform where concurrent writers race:
//! orders whose line items progress independently, the audit trail of every
//! order transition, table reservations checked against operating hours and
//! existing bookings, and admission control for plan-bound resources. CRUD,
//! authentication and transport live outside; they reach this crate through
//! [`RequestContext`] and the traits in [`collaborators`].
//!
//! ## Module Organization
//!
//! - [`ledger`] - Per-restaurant resource admission under advisory locks
//! - [`scheduler`] - Reservation windows, overlap checks and confirmation codes
//! - [`state_machine`] - Order and item lifecycle with monotonic derivation
//! - [`models`] - Rows and their queries, including the audit trail tables
//! - [`events`] - Post-commit fan-out to real-time listeners
//! - [`database`] - Pooling, migrations and explicit transaction scopes
//! - [`config`] - Layered configuration
//! - [`error`] - Crate-level error with stable codes
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use comanda_core::{ComandaConfig, ComandaCore, RequestContext};
//! use comanda_core::models::{NewOrder, NewOrderItem};
//!
//! # async fn example(restaurant_id: uuid::Uuid, menu_item_id: uuid::Uuid) -> comanda_core::Result<()> {
//! comanda_core::logging::init_structured_logging();
//! let config = ComandaConfig::load()?;
//! let core = ComandaCore::connect(&config).await?;
//!
//! let order = core
//!     .orders
//!     .create_order(
//!         RequestContext::public(restaurant_id),
//!         NewOrder {
//!             table_id: None,
//!             customer_name: Some("Ana".to_string()),
//!             items: vec![NewOrderItem { menu_item_id, quantity: 2, notes: None }],
//!         },
//!     )
//!     .await?;
//! # let _ = order;
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! Database tests use SQLx's per-test databases:
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # All tests, requires DATABASE_URL
//! ```

pub mod bootstrap;
pub mod collaborators;
pub mod config;
pub mod context;
pub mod database;
pub mod error;
pub mod events;
pub mod ledger;
pub mod logging;
pub mod models;
pub mod scheduler;
pub mod state_machine;

pub use bootstrap::{Collaborators, ComandaCore};
pub use config::{ComandaConfig, ConfigurationError};
pub use context::RequestContext;
pub use error::{ComandaError, ErrorKind, Result};
pub use events::{BroadcastEvent, EventBroadcaster, EventType, Subscription};
pub use ledger::{Admission, LedgerError, ResourceKind, ResourceLedger, SlotGrant};
pub use scheduler::{ReservationScheduler, SchedulerError};
pub use state_machine::{ItemState, OrderError, OrderState, OrderStateMachine};
