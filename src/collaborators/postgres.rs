use async_trait::async_trait;
use sqlx::PgConnection;
use uuid::Uuid;

use super::{MenuCatalog, MenuItemSnapshot, SubscriptionStore, TableDirectory, TableInfo};
use crate::models::SubscriptionLimits;

/// Menu catalog over the `menu_items` table
#[derive(Debug, Clone, Copy, Default)]
pub struct PgMenuCatalog;

#[async_trait]
impl MenuCatalog for PgMenuCatalog {
    async fn lookup_items(
        &self,
        conn: &mut PgConnection,
        restaurant_id: Uuid,
        menu_item_ids: &[Uuid],
    ) -> Result<Vec<MenuItemSnapshot>, sqlx::Error> {
        sqlx::query_as::<_, MenuItemSnapshot>(
            "SELECT menu_item_id, name, price_cents, available FROM menu_items \
             WHERE restaurant_id = $1 AND menu_item_id = ANY($2) AND deleted_at IS NULL",
        )
        .bind(restaurant_id)
        .bind(menu_item_ids)
        .fetch_all(conn)
        .await
    }
}

/// Table directory over the `restaurant_tables` table
#[derive(Debug, Clone, Copy, Default)]
pub struct PgTableDirectory;

#[async_trait]
impl TableDirectory for PgTableDirectory {
    async fn find_table(
        &self,
        conn: &mut PgConnection,
        restaurant_id: Uuid,
        table_id: Uuid,
    ) -> Result<Option<TableInfo>, sqlx::Error> {
        sqlx::query_as::<_, TableInfo>(
            "SELECT table_id, capacity, active FROM restaurant_tables \
             WHERE restaurant_id = $1 AND table_id = $2 AND deleted_at IS NULL",
        )
        .bind(restaurant_id)
        .bind(table_id)
        .fetch_optional(conn)
        .await
    }
}

/// Plan store over the `subscription_limits` table
#[derive(Debug, Clone, Copy, Default)]
pub struct PgSubscriptionStore;

#[async_trait]
impl SubscriptionStore for PgSubscriptionStore {
    async fn limits_for(
        &self,
        conn: &mut PgConnection,
        restaurant_id: Uuid,
    ) -> Result<SubscriptionLimits, sqlx::Error> {
        Ok(SubscriptionLimits::find_by_restaurant(conn, restaurant_id)
            .await?
            .unwrap_or_else(|| SubscriptionLimits::unlimited(restaurant_id)))
    }
}
