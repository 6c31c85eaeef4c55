//! # Reservation Scheduler
//!
//! Decides whether a proposed reservation is legal for a table and owns the
//! reservation lifecycle:
//!
//! ```text
//! pending ──confirm_by_code──▶ confirmed ──complete──▶ completed
//!    │                            │
//!    └────────cancel──────────────┴──▶ cancelled (soft-deleted)
//! ```
//!
//! ## Admission
//!
//! Policy, operating hours, party size, then overlap. The overlap query and
//! the insert run under a transaction-scoped advisory lock on the table, so
//! two concurrent bookings for the same table are serialized and the second
//! one sees the first one's row.

pub mod errors;
pub mod window;

pub use errors::{SchedulerError, SchedulerResult};
pub use window::{check_operating_hours, EffectiveWindow};

use chrono::Utc;
use rand::Rng;
use serde_json::{json, Value};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};
use uuid::Uuid;

use crate::collaborators::TableDirectory;
use crate::context::RequestContext;
use crate::database::{TransactionPolicy, TransactionScope};
use crate::events::{EventBroadcaster, EventType};
use crate::logging::log_reservation_operation;
use crate::models::{NewReservation, Reservation, ReservationPolicy, ReservationStatus};

/// Unambiguous uppercase alphabet (no 0/O, 1/I)
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_LENGTH: usize = 8;
const CODE_ATTEMPTS: u32 = 5;

#[derive(Clone)]
pub struct ReservationScheduler {
    pool: PgPool,
    tables: Arc<dyn TableDirectory>,
    broadcaster: EventBroadcaster,
    policy: TransactionPolicy,
}

impl ReservationScheduler {
    pub fn new(
        pool: PgPool,
        tables: Arc<dyn TableDirectory>,
        broadcaster: EventBroadcaster,
        policy: TransactionPolicy,
    ) -> Self {
        Self {
            pool,
            tables,
            broadcaster,
            policy,
        }
    }

    /// Validate and persist a `pending` reservation.
    pub async fn create_reservation(
        &self,
        ctx: RequestContext,
        request: NewReservation,
    ) -> SchedulerResult<Reservation> {
        let reservation = self
            .policy
            .run("reservation.create", ctx.deadline, || {
                self.create_once(ctx, &request)
            })
            .await
            .inspect_err(|err| log_failure("reservation.create", err))?;

        self.announce("create", EventType::ReservationCreated, &reservation);
        Ok(reservation)
    }

    /// Confirm a pending reservation by its public code.
    ///
    /// Confirming an already-confirmed reservation returns it unchanged.
    pub async fn confirm_by_code(
        &self,
        code: &str,
        deadline: Option<Duration>,
    ) -> SchedulerResult<Reservation> {
        let code = normalize_code(code);
        let (reservation, changed) = self
            .policy
            .run("reservation.confirm", deadline, || self.confirm_once(&code))
            .await
            .inspect_err(|err| log_failure("reservation.confirm", err))?;

        if changed {
            self.announce("confirm", EventType::ReservationConfirmed, &reservation);
        }
        Ok(reservation)
    }

    /// Cancel and soft-delete a pending or confirmed reservation.
    pub async fn cancel_reservation(
        &self,
        ctx: RequestContext,
        reservation_id: Uuid,
    ) -> SchedulerResult<Reservation> {
        let reservation = self
            .policy
            .run("reservation.cancel", ctx.deadline, || {
                self.cancel_once(ctx, reservation_id)
            })
            .await
            .inspect_err(|err| log_failure("reservation.cancel", err))?;

        self.announce("cancel", EventType::ReservationCancelled, &reservation);
        Ok(reservation)
    }

    /// Record the party's arrival on a confirmed reservation.
    pub async fn record_arrival(
        &self,
        ctx: RequestContext,
        reservation_id: Uuid,
    ) -> SchedulerResult<Reservation> {
        let reservation = self
            .policy
            .run("reservation.arrive", ctx.deadline, || {
                self.arrival_once(ctx, reservation_id)
            })
            .await
            .inspect_err(|err| log_failure("reservation.arrive", err))?;

        log_reservation_operation(
            "arrive",
            reservation.restaurant_id,
            reservation.reservation_id,
            reservation.table_id,
            &reservation.status,
        );
        Ok(reservation)
    }

    /// Close a confirmed reservation once the party leaves.
    pub async fn complete_reservation(
        &self,
        ctx: RequestContext,
        reservation_id: Uuid,
    ) -> SchedulerResult<Reservation> {
        let reservation = self
            .policy
            .run("reservation.complete", ctx.deadline, || {
                self.complete_once(ctx, reservation_id)
            })
            .await
            .inspect_err(|err| log_failure("reservation.complete", err))?;

        self.announce("complete", EventType::ReservationCompleted, &reservation);
        Ok(reservation)
    }

    pub async fn get_reservation(
        &self,
        ctx: RequestContext,
        reservation_id: Uuid,
    ) -> SchedulerResult<Reservation> {
        let mut conn = self.pool.acquire().await?;
        Reservation::find(&mut conn, ctx.restaurant_id, reservation_id)
            .await?
            .ok_or(SchedulerError::ReservationNotFound(reservation_id))
    }

    async fn create_once(
        &self,
        ctx: RequestContext,
        request: &NewReservation,
    ) -> SchedulerResult<Reservation> {
        if request.party_size <= 0 {
            return Err(SchedulerError::InvalidPartySize(request.party_size));
        }

        let mut scope = TransactionScope::begin(&self.pool, "reservation.create").await?;

        let policy = ReservationPolicy::find_by_restaurant(scope.connection(), ctx.restaurant_id)
            .await?
            .filter(|policy| policy.enabled)
            .ok_or(SchedulerError::ReservationsDisabled(ctx.restaurant_id))?;
        let tz = policy.tz().map_err(SchedulerError::InvalidPolicy)?;

        let table = self
            .tables
            .find_table(scope.connection(), ctx.restaurant_id, request.table_id)
            .await?
            .filter(|table| table.active)
            .ok_or(SchedulerError::TableNotFound(request.table_id))?;

        check_operating_hours(&policy, tz, request.starts_at)?;

        if request.party_size > table.capacity || request.party_size > policy.max_party_size {
            return Err(SchedulerError::PartySizeExceedsCapacity {
                party_size: request.party_size,
                capacity: table.capacity,
                max_party_size: policy.max_party_size,
            });
        }

        let window = EffectiveWindow::for_request(
            request.starts_at,
            policy.slot_duration(),
            policy.buffer_duration(),
        );

        scope.lock(&table_lock_key(request.table_id)).await?;

        if let Some(existing) = Reservation::find_conflicting(
            scope.connection(),
            request.table_id,
            window.starts_at,
            window.ends_at,
        )
        .await?
        {
            return Err(SchedulerError::SlotConflict {
                table_id: request.table_id,
                conflicting_reservation_id: existing.reservation_id,
            });
        }

        for _ in 0..CODE_ATTEMPTS {
            let code = generate_confirmation_code();
            let inserted = Reservation::insert_with_code(
                scope.connection(),
                ctx.restaurant_id,
                request,
                window.ends_at,
                &code,
                ctx.actor,
            )
            .await?;

            if let Some(reservation) = inserted {
                scope.commit().await?;
                return Ok(reservation);
            }
            debug!(table_id = %request.table_id, "Confirmation code collision, regenerating");
        }

        Err(SchedulerError::ConfirmationCodeExhausted(CODE_ATTEMPTS))
    }

    async fn confirm_once(&self, code: &str) -> SchedulerResult<(Reservation, bool)> {
        if code.is_empty() {
            return Err(SchedulerError::InvalidOrExpiredCode);
        }

        let mut scope = TransactionScope::begin(&self.pool, "reservation.confirm").await?;
        let reservation = Reservation::find_by_code_for_update(scope.connection(), code)
            .await?
            .ok_or(SchedulerError::InvalidOrExpiredCode)?;

        match status_of(&reservation)? {
            ReservationStatus::Pending if reservation.starts_at <= Utc::now() => {
                Err(SchedulerError::InvalidOrExpiredCode)
            }
            ReservationStatus::Pending => {
                let confirmed = Reservation::update_status(
                    scope.connection(),
                    reservation.reservation_id,
                    ReservationStatus::Confirmed,
                )
                .await?;
                scope.commit().await?;
                Ok((confirmed, true))
            }
            ReservationStatus::Confirmed => Ok((reservation, false)),
            status => Err(SchedulerError::AlreadyProcessed {
                reservation_id: reservation.reservation_id,
                status,
            }),
        }
    }

    async fn cancel_once(
        &self,
        ctx: RequestContext,
        reservation_id: Uuid,
    ) -> SchedulerResult<Reservation> {
        let mut scope = TransactionScope::begin(&self.pool, "reservation.cancel").await?;
        let reservation = self.load_for_update(&mut scope, ctx, reservation_id).await?;

        let status = status_of(&reservation)?;
        if status.is_closed() {
            return Err(SchedulerError::AlreadyProcessed {
                reservation_id,
                status,
            });
        }

        let cancelled = Reservation::cancel(scope.connection(), reservation_id).await?;
        scope.commit().await?;
        Ok(cancelled)
    }

    async fn arrival_once(
        &self,
        ctx: RequestContext,
        reservation_id: Uuid,
    ) -> SchedulerResult<Reservation> {
        let mut scope = TransactionScope::begin(&self.pool, "reservation.arrive").await?;
        let reservation = self.load_for_update(&mut scope, ctx, reservation_id).await?;
        require_confirmed(&reservation)?;

        let arrived = Reservation::mark_arrived(scope.connection(), reservation_id).await?;
        scope.commit().await?;
        Ok(arrived)
    }

    async fn complete_once(
        &self,
        ctx: RequestContext,
        reservation_id: Uuid,
    ) -> SchedulerResult<Reservation> {
        let mut scope = TransactionScope::begin(&self.pool, "reservation.complete").await?;
        let reservation = self.load_for_update(&mut scope, ctx, reservation_id).await?;
        require_confirmed(&reservation)?;

        let completed = Reservation::complete(scope.connection(), reservation_id).await?;
        scope.commit().await?;
        Ok(completed)
    }

    async fn load_for_update(
        &self,
        scope: &mut TransactionScope,
        ctx: RequestContext,
        reservation_id: Uuid,
    ) -> SchedulerResult<Reservation> {
        Reservation::find_for_update(scope.connection(), ctx.restaurant_id, reservation_id)
            .await?
            .ok_or(SchedulerError::ReservationNotFound(reservation_id))
    }

    fn announce(&self, operation: &str, event_type: EventType, reservation: &Reservation) {
        log_reservation_operation(
            operation,
            reservation.restaurant_id,
            reservation.reservation_id,
            reservation.table_id,
            &reservation.status,
        );
        self.broadcaster
            .publish(reservation.restaurant_id, event_type, reservation_payload(reservation));
    }
}

fn status_of(reservation: &Reservation) -> SchedulerResult<ReservationStatus> {
    reservation
        .reservation_status()
        .map_err(SchedulerError::CorruptState)
}

fn require_confirmed(reservation: &Reservation) -> SchedulerResult<()> {
    match status_of(reservation)? {
        ReservationStatus::Confirmed => Ok(()),
        ReservationStatus::Pending => Err(SchedulerError::NotConfirmed {
            reservation_id: reservation.reservation_id,
            status: ReservationStatus::Pending,
        }),
        status => Err(SchedulerError::AlreadyProcessed {
            reservation_id: reservation.reservation_id,
            status,
        }),
    }
}

fn table_lock_key(table_id: Uuid) -> String {
    format!("reservation-table:{table_id}")
}

fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Random code drawn from [`CODE_ALPHABET`]
pub fn generate_confirmation_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

fn reservation_payload(reservation: &Reservation) -> Value {
    json!({
        "reservation_id": reservation.reservation_id,
        "table_id": reservation.table_id,
        "customer_name": reservation.customer_name,
        "starts_at": reservation.starts_at,
        "ends_at": reservation.effective_end_at,
        "party_size": reservation.party_size,
        "status": reservation.status,
    })
}

fn log_failure(operation: &'static str, err: &SchedulerError) {
    if err.is_rejection() {
        debug!(operation = operation, reason = %err, "Reservation request rejected");
    } else if matches!(
        err,
        SchedulerError::Database(_)
            | SchedulerError::Timeout(_)
            | SchedulerError::CorruptState(_)
            | SchedulerError::InvalidPolicy(_)
            | SchedulerError::ConfirmationCodeExhausted(_)
    ) {
        error!(operation = operation, error = %err, "Reservation operation failed");
    }
}
