//! # Structured Logging Module
//!
//! Environment-aware structured logging for order, reservation and admission
//! operations. Console output by default; JSON lines when
//! `COMANDA_LOG_FORMAT=json`.

use std::sync::OnceLock;

use chrono::Utc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use uuid::Uuid;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging once per process.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = crate::config::detect_environment();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(get_log_level(&environment)));

        let json = std::env::var("COMANDA_LOG_FORMAT")
            .map(|format| format.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let layer = if json {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .json()
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(true)
                .with_filter(filter)
                .boxed()
        };

        // A host process may already own the global subscriber
        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            environment = %environment,
            json = json,
            "Structured logging initialized"
        );
    });
}

fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

/// Log an order-level operation
pub fn log_order_operation(
    operation: &str,
    restaurant_id: Uuid,
    order_id: Uuid,
    from_state: Option<&str>,
    to_state: &str,
    actor: Option<Uuid>,
) {
    tracing::info!(
        operation = %operation,
        restaurant_id = %restaurant_id,
        order_id = %order_id,
        from_state = from_state,
        to_state = %to_state,
        actor = ?actor,
        timestamp = %Utc::now().to_rfc3339(),
        "ORDER_OPERATION"
    );
}

/// Log a reservation operation
pub fn log_reservation_operation(
    operation: &str,
    restaurant_id: Uuid,
    reservation_id: Uuid,
    table_id: Uuid,
    status: &str,
) {
    tracing::info!(
        operation = %operation,
        restaurant_id = %restaurant_id,
        reservation_id = %reservation_id,
        table_id = %table_id,
        status = %status,
        timestamp = %Utc::now().to_rfc3339(),
        "RESERVATION_OPERATION"
    );
}

/// Log a resource admission decision
pub fn log_ledger_operation(
    restaurant_id: Uuid,
    kind: &str,
    granted: bool,
    current_count: i64,
    limit: Option<i64>,
) {
    tracing::info!(
        restaurant_id = %restaurant_id,
        resource_kind = %kind,
        granted = granted,
        current_count = current_count,
        limit = limit,
        timestamp = %Utc::now().to_rfc3339(),
        "LEDGER_OPERATION"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_mapping() {
        assert_eq!(get_log_level("test"), "debug");
        assert_eq!(get_log_level("development"), "debug");
        assert_eq!(get_log_level("production"), "info");
        assert_eq!(get_log_level("unknown"), "debug");
    }

    #[test]
    fn test_init_is_idempotent() {
        init_structured_logging();
        init_structured_logging();
    }
}
