//! Crate-level error type.
//!
//! Component errors convert into [`ComandaError`]; the transport layer maps
//! [`ComandaError::kind`] to a status family and returns
//! [`ComandaError::code`] as the stable machine-readable code.

use thiserror::Error;

use crate::config::ConfigurationError;
use crate::database::error_codes::is_store_timeout;
use crate::database::DeadlineExceeded;
use crate::ledger::LedgerError;
use crate::scheduler::SchedulerError;
use crate::state_machine::OrderError;

/// Broad outcome class for protocol mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Business-rule rejection; the caller can act on it
    Validation,
    NotFound,
    /// Store or configuration failure
    Infrastructure,
    Timeout,
}

#[derive(Error, Debug)]
pub enum ComandaError {
    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

pub type Result<T> = std::result::Result<T, ComandaError>;

impl ComandaError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        if self.store_timed_out() {
            return "TIMEOUT";
        }
        match self {
            Self::Order(err) => match err {
                OrderError::IllegalTransition { .. } => "ILLEGAL_TRANSITION",
                OrderError::OrderAlreadyTerminal { .. } => "ORDER_ALREADY_TERMINAL",
                OrderError::OrderNotTerminal { .. } => "ORDER_NOT_TERMINAL",
                OrderError::OrderNotFound(_) => "ORDER_NOT_FOUND",
                OrderError::ItemNotFound(_) => "ITEM_NOT_FOUND",
                OrderError::TableNotFound(_) => "TABLE_NOT_FOUND",
                OrderError::ItemUnavailable { .. } => "ITEM_UNAVAILABLE",
                OrderError::InvalidOrder(_) => "INVALID_ORDER",
                OrderError::CorruptState(_) => "CORRUPT_STATE",
                OrderError::Database(_) => "STORE_UNAVAILABLE",
                OrderError::Timeout(_) => "TIMEOUT",
            },
            Self::Scheduler(err) => match err {
                SchedulerError::ReservationsDisabled(_) => "RESERVATIONS_DISABLED",
                SchedulerError::OutsideOperatingHours { .. } => "OUTSIDE_OPERATING_HOURS",
                SchedulerError::PartySizeExceedsCapacity { .. } => "PARTY_SIZE_EXCEEDS_CAPACITY",
                SchedulerError::InvalidPartySize(_) => "INVALID_PARTY_SIZE",
                SchedulerError::SlotConflict { .. } => "SLOT_CONFLICT",
                SchedulerError::TableNotFound(_) => "TABLE_NOT_FOUND",
                SchedulerError::InvalidOrExpiredCode => "INVALID_OR_EXPIRED_CODE",
                SchedulerError::AlreadyProcessed { .. } => "ALREADY_PROCESSED",
                SchedulerError::NotConfirmed { .. } => "RESERVATION_NOT_CONFIRMED",
                SchedulerError::ReservationNotFound(_) => "RESERVATION_NOT_FOUND",
                SchedulerError::InvalidPolicy(_) => "INVALID_RESERVATION_POLICY",
                SchedulerError::ConfirmationCodeExhausted(_) => "CONFIRMATION_CODE_EXHAUSTED",
                SchedulerError::CorruptState(_) => "CORRUPT_STATE",
                SchedulerError::Database(_) => "STORE_UNAVAILABLE",
                SchedulerError::Timeout(_) => "TIMEOUT",
            },
            Self::Ledger(err) => match err {
                LedgerError::LimitExceeded { .. } => "LIMIT_EXCEEDED",
                LedgerError::LedgerUnavailable(_) => "LEDGER_UNAVAILABLE",
                LedgerError::Database(_) => "STORE_UNAVAILABLE",
                LedgerError::Timeout(_) => "TIMEOUT",
            },
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Database(_) => "STORE_UNAVAILABLE",
            Self::Migration(_) => "MIGRATION_FAILED",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        if self.store_timed_out() {
            return ErrorKind::Timeout;
        }
        match self {
            Self::Order(err) => match err {
                OrderError::OrderNotFound(_)
                | OrderError::ItemNotFound(_)
                | OrderError::TableNotFound(_) => ErrorKind::NotFound,
                OrderError::Timeout(_) => ErrorKind::Timeout,
                OrderError::Database(_) | OrderError::CorruptState(_) => ErrorKind::Infrastructure,
                _ => ErrorKind::Validation,
            },
            Self::Scheduler(err) => match err {
                SchedulerError::ReservationNotFound(_) | SchedulerError::TableNotFound(_) => {
                    ErrorKind::NotFound
                }
                SchedulerError::Timeout(_) => ErrorKind::Timeout,
                SchedulerError::Database(_)
                | SchedulerError::CorruptState(_)
                | SchedulerError::InvalidPolicy(_)
                | SchedulerError::ConfirmationCodeExhausted(_) => ErrorKind::Infrastructure,
                _ => ErrorKind::Validation,
            },
            Self::Ledger(err) => match err {
                LedgerError::LimitExceeded { .. } => ErrorKind::Validation,
                LedgerError::Timeout(_) => ErrorKind::Timeout,
                LedgerError::LedgerUnavailable(_) | LedgerError::Database(_) => {
                    ErrorKind::Infrastructure
                }
            },
            Self::Configuration(_) | Self::Database(_) | Self::Migration(_) => {
                ErrorKind::Infrastructure
            }
        }
    }

    /// Store-side lock or statement timeout (55P03, 57014)
    fn store_timed_out(&self) -> bool {
        let store_error = match self {
            Self::Order(OrderError::Database(err))
            | Self::Scheduler(SchedulerError::Database(err))
            | Self::Ledger(LedgerError::Database(err) | LedgerError::LedgerUnavailable(err))
            | Self::Database(err) => err,
            _ => return false,
        };
        is_store_timeout(store_error)
    }

    /// Whether the transport should present this as a server fault
    pub fn is_server_fault(&self) -> bool {
        matches!(self.kind(), ErrorKind::Infrastructure | ErrorKind::Timeout)
    }
}

impl From<DeadlineExceeded> for ComandaError {
    fn from(err: DeadlineExceeded) -> Self {
        Self::Order(OrderError::Timeout(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ReservationStatus, ResourceKind};
    use std::borrow::Cow;
    use std::time::Duration;
    use uuid::Uuid;

    #[derive(Debug)]
    struct ServerError(&'static str);

    impl std::fmt::Display for ServerError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "server error {}", self.0)
        }
    }

    impl std::error::Error for ServerError {}

    impl sqlx::error::DatabaseError for ServerError {
        fn message(&self) -> &str {
            "server error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed(self.0))
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            sqlx::error::ErrorKind::Other
        }
    }

    fn server_error(code: &'static str) -> sqlx::Error {
        sqlx::Error::Database(Box::new(ServerError(code)))
    }

    #[test]
    fn test_business_rejections_are_validation() {
        let err: ComandaError = SchedulerError::SlotConflict {
            table_id: Uuid::nil(),
            conflicting_reservation_id: Uuid::nil(),
        }
        .into();
        assert_eq!(err.code(), "SLOT_CONFLICT");
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(!err.is_server_fault());

        let err: ComandaError = LedgerError::LimitExceeded {
            restaurant_id: Uuid::nil(),
            kind: ResourceKind::Tables,
            current_count: 5,
            limit: 5,
        }
        .into();
        assert_eq!(err.code(), "LIMIT_EXCEEDED");
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err: ComandaError = SchedulerError::AlreadyProcessed {
            reservation_id: Uuid::nil(),
            status: ReservationStatus::Cancelled,
        }
        .into();
        assert_eq!(err.code(), "ALREADY_PROCESSED");
    }

    #[test]
    fn test_not_found_kinds() {
        let err: ComandaError = OrderError::OrderNotFound(Uuid::nil()).into();
        assert_eq!(err.code(), "ORDER_NOT_FOUND");
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err: ComandaError = SchedulerError::ReservationNotFound(Uuid::nil()).into();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_infrastructure_and_timeout() {
        let err: ComandaError = LedgerError::LedgerUnavailable(sqlx::Error::PoolTimedOut).into();
        assert_eq!(err.code(), "LEDGER_UNAVAILABLE");
        assert!(err.is_server_fault());

        let err: ComandaError = DeadlineExceeded {
            operation: "order.create",
            after: Duration::from_millis(10),
        }
        .into();
        assert_eq!(err.code(), "TIMEOUT");
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }

    #[test]
    fn test_store_timeouts_classify_as_timeout() {
        let err: ComandaError = OrderError::Database(server_error("55P03")).into();
        assert_eq!(err.code(), "TIMEOUT");
        assert_eq!(err.kind(), ErrorKind::Timeout);

        let err: ComandaError = SchedulerError::Database(server_error("57014")).into();
        assert_eq!(err.kind(), ErrorKind::Timeout);

        let err: ComandaError = LedgerError::LedgerUnavailable(server_error("55P03")).into();
        assert_eq!(err.code(), "TIMEOUT");

        let err: ComandaError = server_error("57014").into();
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }

    #[test]
    fn test_other_store_errors_stay_infrastructure() {
        let err: ComandaError = OrderError::Database(server_error("40001")).into();
        assert_eq!(err.code(), "STORE_UNAVAILABLE");
        assert_eq!(err.kind(), ErrorKind::Infrastructure);
        assert!(err.is_server_fault());
    }
}
