//! Reservation window arithmetic.
//!
//! Effective windows are half-open: `[start, start + slot + buffer)`. Two
//! windows that merely touch do not overlap, so back-to-back bookings are
//! allowed. Operating hours are checked in the restaurant's local time and
//! cover the slot only; the turnover buffer may run past closing.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;

use super::errors::{SchedulerError, SchedulerResult};
use crate::models::{OperatingHours, ReservationPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectiveWindow {
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

impl EffectiveWindow {
    pub fn for_request(starts_at: DateTime<Utc>, slot: Duration, buffer: Duration) -> Self {
        Self {
            starts_at,
            ends_at: starts_at + slot + buffer,
        }
    }

    pub fn overlaps(&self, other: &EffectiveWindow) -> bool {
        self.starts_at < other.ends_at && other.starts_at < self.ends_at
    }
}

/// Local opening interval for hours anchored on `date`
fn local_interval(date: NaiveDate, hours: &OperatingHours) -> (NaiveDateTime, NaiveDateTime) {
    let opens = date.and_time(hours.opens_at);
    let closes = if hours.closes_next_day() {
        (date + Duration::days(1)).and_time(hours.closes_at)
    } else {
        date.and_time(hours.closes_at)
    };
    (opens, closes)
}

/// Reject a start whose slot does not fit an opening window.
///
/// The start's own weekday is checked first; an overnight window opened
/// the previous day also counts (a 00:30 booking inside Friday 18:00-02:00).
pub fn check_operating_hours(
    policy: &ReservationPolicy,
    tz: Tz,
    starts_at: DateTime<Utc>,
) -> SchedulerResult<()> {
    let local_start = starts_at.with_timezone(&tz).naive_local();
    let local_end = local_start + policy.slot_duration();
    let date = local_start.date();

    let fits = |anchor: NaiveDate, hours: &OperatingHours| {
        let (opens, closes) = local_interval(anchor, hours);
        opens <= local_start && local_end <= closes
    };

    if let Some(hours) = policy.hours_for(date.weekday()) {
        if fits(date, hours) {
            return Ok(());
        }
    }

    if let Some(previous) = date.pred_opt() {
        if let Some(hours) = policy.hours_for(previous.weekday()) {
            if hours.closes_next_day() && fits(previous, hours) {
                return Ok(());
            }
        }
    }

    let reason = match policy.hours_for(date.weekday()) {
        Some(hours) => format!(
            "{} opens {}-{} ({}), slot {}-{}",
            date.weekday(),
            hours.opens_at.format("%H:%M"),
            hours.closes_at.format("%H:%M"),
            tz,
            local_start.format("%H:%M"),
            local_end.format("%H:%M"),
        ),
        None => format!("closed on {}", date.weekday()),
    };

    Err(SchedulerError::OutsideOperatingHours { starts_at, reason })
}
