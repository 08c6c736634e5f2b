// libs/scheduling-cell/tests/lifecycle_test.rs
//
// One test per transition family of the status state machine.

use chrono::NaiveDate;

use scheduling_cell::models::AppointmentStatus::*;
use scheduling_cell::services::lifecycle::{
    date_relation, initial_status, next_status, DateRelation, Trigger,
};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

#[test]
fn date_relation_classifies_past_today_future() {
    let today = d(2025, 6, 15);
    assert_eq!(date_relation(d(2025, 6, 14), today), DateRelation::Past);
    assert_eq!(date_relation(d(2025, 6, 15), today), DateRelation::Today);
    assert_eq!(date_relation(d(2025, 6, 16), today), DateRelation::Future);
}

#[test]
fn new_appointments_take_date_driven_status() {
    assert_eq!(initial_status(DateRelation::Today, false), Confirmed);
    assert_eq!(initial_status(DateRelation::Future, false), Scheduled);
    assert_eq!(initial_status(DateRelation::Past, false), NoShow);
    assert_eq!(initial_status(DateRelation::Today, true), Unavailable);
}

#[test]
fn today_keeps_checked_in_and_out() {
    let trigger = Trigger::DateDriven(DateRelation::Today);
    assert_eq!(next_status(CheckedIn, trigger, false), CheckedIn);
    assert_eq!(next_status(CheckedOut, trigger, false), CheckedOut);
    assert_eq!(next_status(Open, trigger, false), Open);
    assert_eq!(next_status(Confirmed, trigger, false), Confirmed);
    // Anything else opens for the day.
    assert_eq!(next_status(Scheduled, trigger, false), Open);
    assert_eq!(next_status(NoShow, trigger, false), Open);
}

#[test]
fn future_dates_normalize_to_scheduled() {
    let trigger = Trigger::DateDriven(DateRelation::Future);
    assert_eq!(next_status(Scheduled, trigger, false), Scheduled);
    assert_eq!(next_status(Confirmed, trigger, false), Confirmed);
    assert_eq!(next_status(Open, trigger, false), Scheduled);
    assert_eq!(next_status(CheckedIn, trigger, false), Scheduled);
}

#[test]
fn past_dates_normalize_to_no_show() {
    let trigger = Trigger::DateDriven(DateRelation::Past);
    assert_eq!(next_status(Scheduled, trigger, false), NoShow);
    assert_eq!(next_status(Confirmed, trigger, false), NoShow);
    assert_eq!(next_status(NoShow, trigger, false), NoShow);
}

#[test]
fn terminal_states_are_sticky() {
    for trigger in [
        Trigger::DateDriven(DateRelation::Past),
        Trigger::DateDriven(DateRelation::Today),
        Trigger::DateDriven(DateRelation::Future),
        Trigger::CheckIn,
        Trigger::CheckOut,
        Trigger::Close,
        Trigger::NeedsRescheduling,
    ] {
        assert_eq!(next_status(Cancelled, trigger, false), Cancelled);
        assert_eq!(next_status(Closed, trigger, false), Closed);
    }
}

#[test]
fn cancelling_a_cancelled_appointment_is_idempotent() {
    assert_eq!(next_status(Cancelled, Trigger::Cancel, false), Cancelled);
    assert_eq!(next_status(Cancelled, Trigger::Cancel, true), Cancelled);
}

#[test]
fn explicit_triggers_move_to_their_target() {
    assert_eq!(next_status(Open, Trigger::CheckIn, false), CheckedIn);
    assert_eq!(next_status(CheckedIn, Trigger::CheckOut, false), CheckedOut);
    assert_eq!(next_status(CheckedOut, Trigger::Close, false), Closed);
    assert_eq!(next_status(Scheduled, Trigger::Cancel, false), Cancelled);
    assert_eq!(next_status(Scheduled, Trigger::NeedsRescheduling, false), NeedsRescheduling);
}

#[test]
fn rescheduled_appointment_reenters_date_driven_flow() {
    assert_eq!(
        next_status(NeedsRescheduling, Trigger::DateDriven(DateRelation::Future), false),
        Scheduled
    );
    assert_eq!(
        next_status(NeedsRescheduling, Trigger::DateDriven(DateRelation::Today), false),
        Confirmed
    );
}

#[test]
fn unavailability_blocks_only_move_to_cancelled() {
    assert_eq!(next_status(Unavailable, Trigger::Cancel, true), Cancelled);
    assert_eq!(
        next_status(Unavailable, Trigger::DateDriven(DateRelation::Past), true),
        Unavailable
    );
    assert_eq!(next_status(Unavailable, Trigger::CheckIn, true), Unavailable);
}
