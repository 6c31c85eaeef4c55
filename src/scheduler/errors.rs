use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::database::{DeadlineExceeded, RetryableError};
use crate::models::ReservationStatus;

/// Errors raised by reservation admission and lifecycle operations
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Reservations are disabled for restaurant {0}")]
    ReservationsDisabled(Uuid),

    #[error("Requested start {starts_at} is outside operating hours: {reason}")]
    OutsideOperatingHours {
        starts_at: DateTime<Utc>,
        reason: String,
    },

    #[error("Party of {party_size} exceeds capacity {capacity} (policy maximum {max_party_size})")]
    PartySizeExceedsCapacity {
        party_size: i32,
        capacity: i32,
        max_party_size: i32,
    },

    #[error("Invalid party size: {0}")]
    InvalidPartySize(i32),

    #[error("Table {table_id} is already booked by reservation {conflicting_reservation_id}")]
    SlotConflict {
        table_id: Uuid,
        conflicting_reservation_id: Uuid,
    },

    #[error("Table not found: {0}")]
    TableNotFound(Uuid),

    #[error("Invalid or expired confirmation code")]
    InvalidOrExpiredCode,

    #[error("Reservation {reservation_id} was already {status}")]
    AlreadyProcessed {
        reservation_id: Uuid,
        status: ReservationStatus,
    },

    #[error("Reservation {reservation_id} is {status}, not confirmed")]
    NotConfirmed {
        reservation_id: Uuid,
        status: ReservationStatus,
    },

    #[error("Reservation not found: {0}")]
    ReservationNotFound(Uuid),

    #[error("Invalid reservation policy: {0}")]
    InvalidPolicy(String),

    #[error("Could not allocate a unique confirmation code after {0} attempts")]
    ConfirmationCodeExhausted(u32),

    #[error("Corrupt state in store: {0}")]
    CorruptState(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Timeout(#[from] DeadlineExceeded),
}

impl RetryableError for SchedulerError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Database(err) if err.is_retryable())
    }
}

impl SchedulerError {
    /// Business-rule rejections; expected outcomes, never logged as failures
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::ReservationsDisabled(_)
                | Self::OutsideOperatingHours { .. }
                | Self::PartySizeExceedsCapacity { .. }
                | Self::InvalidPartySize(_)
                | Self::SlotConflict { .. }
                | Self::InvalidOrExpiredCode
                | Self::AlreadyProcessed { .. }
                | Self::NotConfirmed { .. }
        )
    }
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
