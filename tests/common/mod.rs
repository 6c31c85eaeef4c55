//! Shared seed helpers for database integration tests
#![allow(dead_code)]

use chrono::NaiveTime;
use comanda_core::config::ComandaConfig;
use comanda_core::models::{NewOrder, NewOrderItem};
use comanda_core::{ComandaCore, RequestContext};
use sqlx::PgPool;
use uuid::Uuid;

pub async fn seed_restaurant(pool: &PgPool) -> Result<Uuid, sqlx::Error> {
    let restaurant_id = Uuid::new_v4();
    sqlx::query("INSERT INTO restaurants (restaurant_id, name) VALUES ($1, 'La Cocina')")
        .bind(restaurant_id)
        .execute(pool)
        .await?;
    Ok(restaurant_id)
}

pub async fn seed_table(pool: &PgPool, restaurant_id: Uuid, capacity: i32) -> Result<Uuid, sqlx::Error> {
    let table_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO restaurant_tables (table_id, restaurant_id, label, capacity) VALUES ($1, $2, $3, $4)",
    )
    .bind(table_id)
    .bind(restaurant_id)
    .bind(format!("Mesa {}", &table_id.to_string()[..4]))
    .bind(capacity)
    .execute(pool)
    .await?;
    Ok(table_id)
}

pub async fn seed_menu_item(
    pool: &PgPool,
    restaurant_id: Uuid,
    name: &str,
    price_cents: i64,
    available: bool,
) -> Result<Uuid, sqlx::Error> {
    let menu_item_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO menu_items (menu_item_id, restaurant_id, name, price_cents, available) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(menu_item_id)
    .bind(restaurant_id)
    .bind(name)
    .bind(price_cents)
    .bind(available)
    .execute(pool)
    .await?;
    Ok(menu_item_id)
}

pub async fn set_limits(
    pool: &PgPool,
    restaurant_id: Uuid,
    max_tables: i32,
    max_menu_items: i32,
    max_users: i32,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO subscription_limits (restaurant_id, max_tables, max_menu_items, max_users) \
         VALUES ($1, $2, $3, $4)",
    )
    .bind(restaurant_id)
    .bind(max_tables)
    .bind(max_menu_items)
    .bind(max_users)
    .execute(pool)
    .await?;
    Ok(())
}

/// Weekday 0 = Monday
pub struct Hours {
    pub weekday: i16,
    pub opens: (u32, u32),
    pub closes: (u32, u32),
}

pub async fn seed_policy(
    pool: &PgPool,
    restaurant_id: Uuid,
    slot_minutes: i32,
    buffer_minutes: i32,
    max_party_size: i32,
    hours: &[Hours],
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO reservation_policies \
         (restaurant_id, enabled, timezone, slot_minutes, buffer_minutes, max_party_size) \
         VALUES ($1, true, 'UTC', $2, $3, $4)",
    )
    .bind(restaurant_id)
    .bind(slot_minutes)
    .bind(buffer_minutes)
    .bind(max_party_size)
    .execute(pool)
    .await?;

    for day in hours {
        sqlx::query(
            "INSERT INTO reservation_policy_hours (restaurant_id, weekday, opens_at, closes_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(restaurant_id)
        .bind(day.weekday)
        .bind(NaiveTime::from_hms_opt(day.opens.0, day.opens.1, 0).unwrap())
        .bind(NaiveTime::from_hms_opt(day.closes.0, day.closes.1, 0).unwrap())
        .execute(pool)
        .await?;
    }
    Ok(())
}

pub async fn disable_reservations(pool: &PgPool, restaurant_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE reservation_policies SET enabled = false WHERE restaurant_id = $1")
        .bind(restaurant_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub fn test_config() -> ComandaConfig {
    let mut config = ComandaConfig::default();
    config.transactions.default_timeout_ms = 10_000;
    config
}

pub fn core(pool: &PgPool) -> ComandaCore {
    ComandaCore::new(pool.clone(), &test_config()).expect("core wiring")
}

pub fn staff(restaurant_id: Uuid) -> RequestContext {
    RequestContext::staff(restaurant_id, Uuid::new_v4())
}

pub fn order_of(table_id: Option<Uuid>, menu_item_ids: &[Uuid]) -> NewOrder {
    NewOrder {
        table_id,
        customer_name: Some("Ana".to_string()),
        items: menu_item_ids
            .iter()
            .map(|&menu_item_id| NewOrderItem {
                menu_item_id,
                quantity: 1,
                notes: None,
            })
            .collect(),
    }
}
