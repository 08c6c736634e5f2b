use chrono::NaiveDate;

use crate::models::AppointmentStatus;

/// Where an appointment's date sits relative to today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateRelation {
    Past,
    Today,
    Future,
}

pub fn date_relation(appointment_date: NaiveDate, today: NaiveDate) -> DateRelation {
    if appointment_date < today {
        DateRelation::Past
    } else if appointment_date == today {
        DateRelation::Today
    } else {
        DateRelation::Future
    }
}

/// What is asking for a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    DateDriven(DateRelation),
    CheckIn,
    CheckOut,
    Cancel,
    Close,
    NeedsRescheduling,
}

/// Status for a freshly created appointment.
pub fn initial_status(relation: DateRelation, is_unavailability: bool) -> AppointmentStatus {
    if is_unavailability {
        return AppointmentStatus::Unavailable;
    }
    match relation {
        DateRelation::Today => AppointmentStatus::Confirmed,
        DateRelation::Future => AppointmentStatus::Scheduled,
        DateRelation::Past => AppointmentStatus::NoShow,
    }
}

/// The full transition table, keyed by (current status, trigger).
///
/// Terminal states (Cancelled, Closed) are sticky: every trigger maps back
/// to the current status, which also makes a repeated Cancel an idempotent
/// no-op. Unavailability blocks only ever move to Cancelled.
pub fn next_status(
    current: AppointmentStatus,
    trigger: Trigger,
    is_unavailability: bool,
) -> AppointmentStatus {
    use AppointmentStatus::*;

    if current.is_terminal() {
        return current;
    }

    if is_unavailability {
        return match trigger {
            Trigger::Cancel => Cancelled,
            _ => Unavailable,
        };
    }

    match (current, trigger) {
        (_, Trigger::Cancel) => Cancelled,
        (_, Trigger::Close) => Closed,
        (_, Trigger::CheckIn) => CheckedIn,
        (_, Trigger::CheckOut) => CheckedOut,
        (_, Trigger::NeedsRescheduling) => NeedsRescheduling,

        // A rescheduled appointment re-enters the date-driven flow.
        (NeedsRescheduling, Trigger::DateDriven(DateRelation::Future)) => Scheduled,
        (NeedsRescheduling, Trigger::DateDriven(DateRelation::Today)) => Confirmed,
        (NeedsRescheduling, Trigger::DateDriven(DateRelation::Past)) => NoShow,

        (CheckedIn, Trigger::DateDriven(DateRelation::Today)) => CheckedIn,
        (CheckedOut, Trigger::DateDriven(DateRelation::Today)) => CheckedOut,
        (Open, Trigger::DateDriven(DateRelation::Today)) => Open,
        (Confirmed, Trigger::DateDriven(DateRelation::Today)) => Confirmed,
        (_, Trigger::DateDriven(DateRelation::Today)) => Open,

        (Scheduled, Trigger::DateDriven(DateRelation::Future)) => Scheduled,
        (Confirmed, Trigger::DateDriven(DateRelation::Future)) => Confirmed,
        (_, Trigger::DateDriven(DateRelation::Future)) => Scheduled,

        (NoShow, Trigger::DateDriven(DateRelation::Past)) => NoShow,
        (_, Trigger::DateDriven(DateRelation::Past)) => NoShow,
    }
}
