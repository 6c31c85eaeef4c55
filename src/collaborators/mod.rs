//! # External Collaborators
//!
//! Contracts for the systems this crate consumes but does not own: the menu
//! catalog, the table directory and the subscription plan store.
//!
//! Every lookup receives the caller's `PgConnection` so it runs inside the
//! same transaction as the admission check or transition that needs it.
//! PostgreSQL-backed implementations live in [`postgres`]; callers with a
//! different catalog backend inject their own through
//! [`crate::bootstrap::ComandaCore::with_collaborators`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::models::SubscriptionLimits;

pub mod postgres;

pub use postgres::{PgMenuCatalog, PgSubscriptionStore, PgTableDirectory};

/// Menu item as seen at order-creation time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MenuItemSnapshot {
    pub menu_item_id: Uuid,
    pub name: String,
    pub price_cents: i64,
    pub available: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TableInfo {
    pub table_id: Uuid,
    pub capacity: i32,
    pub active: bool,
}

/// Menu item existence, availability and price lookups
#[async_trait]
pub trait MenuCatalog: Send + Sync {
    /// Snapshots for the requested ids that exist in the restaurant's menu.
    /// Unknown ids are simply absent from the result.
    async fn lookup_items(
        &self,
        conn: &mut PgConnection,
        restaurant_id: Uuid,
        menu_item_ids: &[Uuid],
    ) -> Result<Vec<MenuItemSnapshot>, sqlx::Error>;
}

/// Table existence and capacity lookups
#[async_trait]
pub trait TableDirectory: Send + Sync {
    async fn find_table(
        &self,
        conn: &mut PgConnection,
        restaurant_id: Uuid,
        table_id: Uuid,
    ) -> Result<Option<TableInfo>, sqlx::Error>;
}

/// Current plan limits consumed by the resource ledger
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// A restaurant without a limits row is unlimited.
    async fn limits_for(
        &self,
        conn: &mut PgConnection,
        restaurant_id: Uuid,
    ) -> Result<SubscriptionLimits, sqlx::Error>;
}
