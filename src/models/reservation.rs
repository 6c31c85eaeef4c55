//! # Reservation Model
//!
//! A booking of one table for one time window. The stored
//! `effective_end_at` already includes the slot duration and the turnover
//! buffer, so overlap checks are a single range predicate.
//!
//! Cancelled reservations are soft-deleted and excluded from overlap checks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection};
use std::fmt;
use uuid::Uuid;

/// Reservation lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Completed)
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReservationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "cancelled" => Ok(Self::Cancelled),
            "completed" => Ok(Self::Completed),
            _ => Err(format!("Invalid reservation status: {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Reservation {
    pub reservation_id: Uuid,
    pub restaurant_id: Uuid,
    pub table_id: Uuid,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub effective_end_at: DateTime<Utc>,
    pub party_size: i32,
    pub status: String,
    pub confirmation_code: String,
    pub arrived_at: Option<DateTime<Utc>>,
    pub departed_at: Option<DateTime<Utc>>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerContact {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// Booking request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReservation {
    pub table_id: Uuid,
    pub customer: CustomerContact,
    pub starts_at: DateTime<Utc>,
    pub party_size: i32,
}

const RESERVATION_COLUMNS: &str = "reservation_id, restaurant_id, table_id, customer_name, \
                                   customer_phone, customer_email, starts_at, effective_end_at, \
                                   party_size, status, confirmation_code, arrived_at, departed_at, \
                                   created_by, created_at, updated_at, deleted_at";

impl Reservation {
    /// Insert a pending reservation.
    ///
    /// Returns `None` when `confirmation_code` is already taken; the insert
    /// uses `ON CONFLICT DO NOTHING` so a collision leaves the transaction
    /// usable for another attempt with a fresh code.
    pub async fn insert_with_code(
        conn: &mut PgConnection,
        restaurant_id: Uuid,
        request: &NewReservation,
        effective_end_at: DateTime<Utc>,
        confirmation_code: &str,
        created_by: Option<Uuid>,
    ) -> Result<Option<Reservation>, sqlx::Error> {
        let sql = format!(
            "INSERT INTO reservations \
             (reservation_id, restaurant_id, table_id, customer_name, customer_phone, \
              customer_email, starts_at, effective_end_at, party_size, status, \
              confirmation_code, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             ON CONFLICT (confirmation_code) DO NOTHING \
             RETURNING {RESERVATION_COLUMNS}"
        );

        sqlx::query_as::<_, Reservation>(&sql)
            .bind(Uuid::new_v4())
            .bind(restaurant_id)
            .bind(request.table_id)
            .bind(&request.customer.name)
            .bind(&request.customer.phone)
            .bind(&request.customer.email)
            .bind(request.starts_at)
            .bind(effective_end_at)
            .bind(request.party_size)
            .bind(ReservationStatus::Pending.as_str())
            .bind(confirmation_code)
            .bind(created_by)
            .fetch_optional(conn)
            .await
    }

    /// First live reservation on `table_id` whose effective window
    /// intersects `[starts_at, ends_at)`.
    pub async fn find_conflicting(
        conn: &mut PgConnection,
        table_id: Uuid,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    ) -> Result<Option<Reservation>, sqlx::Error> {
        let sql = format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations \
             WHERE table_id = $1 \
               AND status <> 'cancelled' \
               AND deleted_at IS NULL \
               AND starts_at < $3 \
               AND $2 < effective_end_at \
             ORDER BY starts_at ASC \
             LIMIT 1"
        );

        sqlx::query_as::<_, Reservation>(&sql)
            .bind(table_id)
            .bind(starts_at)
            .bind(ends_at)
            .fetch_optional(conn)
            .await
    }

    pub async fn find_by_code_for_update(
        conn: &mut PgConnection,
        confirmation_code: &str,
    ) -> Result<Option<Reservation>, sqlx::Error> {
        let sql = format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations \
             WHERE confirmation_code = $1 FOR UPDATE"
        );

        sqlx::query_as::<_, Reservation>(&sql)
            .bind(confirmation_code)
            .fetch_optional(conn)
            .await
    }

    /// Restaurant-scoped lookup that includes cancelled rows
    pub async fn find_for_update(
        conn: &mut PgConnection,
        restaurant_id: Uuid,
        reservation_id: Uuid,
    ) -> Result<Option<Reservation>, sqlx::Error> {
        let sql = format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations \
             WHERE reservation_id = $1 AND restaurant_id = $2 FOR UPDATE"
        );

        sqlx::query_as::<_, Reservation>(&sql)
            .bind(reservation_id)
            .bind(restaurant_id)
            .fetch_optional(conn)
            .await
    }

    pub async fn find(
        conn: &mut PgConnection,
        restaurant_id: Uuid,
        reservation_id: Uuid,
    ) -> Result<Option<Reservation>, sqlx::Error> {
        let sql = format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations \
             WHERE reservation_id = $1 AND restaurant_id = $2"
        );

        sqlx::query_as::<_, Reservation>(&sql)
            .bind(reservation_id)
            .bind(restaurant_id)
            .fetch_optional(conn)
            .await
    }

    pub async fn update_status(
        conn: &mut PgConnection,
        reservation_id: Uuid,
        status: ReservationStatus,
    ) -> Result<Reservation, sqlx::Error> {
        let sql = format!(
            "UPDATE reservations SET status = $2, updated_at = NOW() \
             WHERE reservation_id = $1 RETURNING {RESERVATION_COLUMNS}"
        );

        sqlx::query_as::<_, Reservation>(&sql)
            .bind(reservation_id)
            .bind(status.as_str())
            .fetch_one(conn)
            .await
    }

    /// Cancel and soft-delete in one statement
    pub async fn cancel(
        conn: &mut PgConnection,
        reservation_id: Uuid,
    ) -> Result<Reservation, sqlx::Error> {
        let sql = format!(
            "UPDATE reservations \
             SET status = 'cancelled', deleted_at = NOW(), updated_at = NOW() \
             WHERE reservation_id = $1 RETURNING {RESERVATION_COLUMNS}"
        );

        sqlx::query_as::<_, Reservation>(&sql)
            .bind(reservation_id)
            .fetch_one(conn)
            .await
    }

    pub async fn mark_arrived(
        conn: &mut PgConnection,
        reservation_id: Uuid,
    ) -> Result<Reservation, sqlx::Error> {
        let sql = format!(
            "UPDATE reservations \
             SET arrived_at = COALESCE(arrived_at, NOW()), updated_at = NOW() \
             WHERE reservation_id = $1 RETURNING {RESERVATION_COLUMNS}"
        );

        sqlx::query_as::<_, Reservation>(&sql)
            .bind(reservation_id)
            .fetch_one(conn)
            .await
    }

    pub async fn complete(
        conn: &mut PgConnection,
        reservation_id: Uuid,
    ) -> Result<Reservation, sqlx::Error> {
        let sql = format!(
            "UPDATE reservations \
             SET status = 'completed', \
                 arrived_at = COALESCE(arrived_at, NOW()), \
                 departed_at = NOW(), \
                 updated_at = NOW() \
             WHERE reservation_id = $1 RETURNING {RESERVATION_COLUMNS}"
        );

        sqlx::query_as::<_, Reservation>(&sql)
            .bind(reservation_id)
            .fetch_one(conn)
            .await
    }

    pub fn reservation_status(&self) -> Result<ReservationStatus, String> {
        self.status.parse()
    }
}
