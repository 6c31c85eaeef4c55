//! # Subscription Limits Model
//!
//! Plan-derived ceilings per restaurant. A stored value of `-1` means the
//! plan does not cap that resource.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection};
use std::fmt;
use uuid::Uuid;

/// Sentinel stored for "no limit"
pub const UNLIMITED: i32 = -1;

/// Plan-bound resource kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Tables,
    MenuItems,
    Users,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tables => "tables",
            Self::MenuItems => "menu_items",
            Self::Users => "users",
        }
    }

    /// Table whose live rows count against the limit
    pub(crate) fn table_name(&self) -> &'static str {
        match self {
            Self::Tables => "restaurant_tables",
            Self::MenuItems => "menu_items",
            Self::Users => "restaurant_users",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Effective ceiling for one resource kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Limit {
    Unlimited,
    Max(i64),
}

impl Limit {
    pub fn from_stored(value: i32) -> Self {
        if value < 0 {
            Self::Unlimited
        } else {
            Self::Max(i64::from(value))
        }
    }

    /// Whether one more resource fits on top of `current_count`
    pub fn admits(&self, current_count: i64) -> bool {
        match self {
            Self::Unlimited => true,
            Self::Max(max) => current_count < *max,
        }
    }

    pub fn as_option(&self) -> Option<i64> {
        match self {
            Self::Unlimited => None,
            Self::Max(max) => Some(*max),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct SubscriptionLimits {
    pub restaurant_id: Uuid,
    pub max_tables: i32,
    pub max_menu_items: i32,
    pub max_users: i32,
}

impl SubscriptionLimits {
    pub fn unlimited(restaurant_id: Uuid) -> Self {
        Self {
            restaurant_id,
            max_tables: UNLIMITED,
            max_menu_items: UNLIMITED,
            max_users: UNLIMITED,
        }
    }

    pub async fn find_by_restaurant(
        conn: &mut PgConnection,
        restaurant_id: Uuid,
    ) -> Result<Option<SubscriptionLimits>, sqlx::Error> {
        sqlx::query_as::<_, SubscriptionLimits>(
            "SELECT restaurant_id, max_tables, max_menu_items, max_users \
             FROM subscription_limits WHERE restaurant_id = $1",
        )
        .bind(restaurant_id)
        .fetch_optional(conn)
        .await
    }

    pub fn limit_for(&self, kind: ResourceKind) -> Limit {
        let stored = match kind {
            ResourceKind::Tables => self.max_tables,
            ResourceKind::MenuItems => self.max_menu_items,
            ResourceKind::Users => self.max_users,
        };
        Limit::from_stored(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_sentinel_is_unlimited() {
        assert_eq!(Limit::from_stored(UNLIMITED), Limit::Unlimited);
        assert_eq!(Limit::from_stored(0), Limit::Max(0));
        assert!(Limit::Unlimited.admits(i64::MAX));
    }

    #[test]
    fn test_limit_admits_until_full() {
        let limit = Limit::Max(5);
        assert!(limit.admits(4));
        assert!(!limit.admits(5));
        assert!(!limit.admits(6));
        assert!(!Limit::Max(0).admits(0));
    }

    #[test]
    fn test_limit_for_kind() {
        let limits = SubscriptionLimits {
            restaurant_id: Uuid::new_v4(),
            max_tables: 5,
            max_menu_items: UNLIMITED,
            max_users: 3,
        };
        assert_eq!(limits.limit_for(ResourceKind::Tables), Limit::Max(5));
        assert_eq!(limits.limit_for(ResourceKind::MenuItems), Limit::Unlimited);
        assert_eq!(limits.limit_for(ResourceKind::Users).as_option(), Some(3));
        assert_eq!(
            SubscriptionLimits::unlimited(limits.restaurant_id).limit_for(ResourceKind::Tables),
            Limit::Unlimited
        );
    }
}
