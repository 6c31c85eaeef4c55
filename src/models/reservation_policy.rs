//! # Reservation Policy Model
//!
//! Per-restaurant booking rules, read-only to this crate. Weekdays are stored
//! as 0 = Monday through 6 = Sunday; times are local to `timezone`.

use chrono::{Duration, NaiveTime, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct OperatingHours {
    pub weekday: i16,
    pub opens_at: NaiveTime,
    pub closes_at: NaiveTime,
}

impl OperatingHours {
    /// A closing time at or before the opening time closes the next day
    pub fn closes_next_day(&self) -> bool {
        self.closes_at <= self.opens_at
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ReservationPolicy {
    pub restaurant_id: Uuid,
    pub enabled: bool,
    pub timezone: String,
    pub slot_minutes: i32,
    pub buffer_minutes: i32,
    pub max_party_size: i32,
    #[sqlx(skip)]
    pub hours: Vec<OperatingHours>,
}

impl ReservationPolicy {
    pub async fn find_by_restaurant(
        conn: &mut PgConnection,
        restaurant_id: Uuid,
    ) -> Result<Option<ReservationPolicy>, sqlx::Error> {
        let policy = sqlx::query_as::<_, ReservationPolicy>(
            "SELECT restaurant_id, enabled, timezone, slot_minutes, buffer_minutes, max_party_size \
             FROM reservation_policies WHERE restaurant_id = $1",
        )
        .bind(restaurant_id)
        .fetch_optional(&mut *conn)
        .await?;

        let Some(mut policy) = policy else {
            return Ok(None);
        };

        policy.hours = sqlx::query_as::<_, OperatingHours>(
            "SELECT weekday, opens_at, closes_at FROM reservation_policy_hours \
             WHERE restaurant_id = $1 ORDER BY weekday ASC",
        )
        .bind(restaurant_id)
        .fetch_all(conn)
        .await?;

        Ok(Some(policy))
    }

    /// Opening window for `weekday`, if the restaurant opens that day
    pub fn hours_for(&self, weekday: Weekday) -> Option<&OperatingHours> {
        let index = weekday.num_days_from_monday() as i16;
        self.hours.iter().find(|hours| hours.weekday == index)
    }

    pub fn tz(&self) -> Result<Tz, String> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| format!("invalid timezone {}: {e}", self.timezone))
    }

    pub fn slot_duration(&self) -> Duration {
        Duration::minutes(i64::from(self.slot_minutes))
    }

    pub fn buffer_duration(&self) -> Duration {
        Duration::minutes(i64::from(self.buffer_minutes))
    }
}
