// libs/scheduling-cell/tests/overlap_test.rs
//
// Conflict classification and policy enforcement for the overlap detector.

use assert_matches::assert_matches;
use chrono::{NaiveDate, NaiveTime};
use uuid::Uuid;

use scheduling_cell::models::{
    Appointment, AppointmentStatus, ConflictKind, SchedulingError, ServiceUnitPolicy,
    UNAVAILABILITY_TYPE,
};
use scheduling_cell::services::overlap::{
    classify_conflicts, enforce_conflict_policy, intervals_overlap,
};

const DEFAULT_DURATION: i64 = 15;

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
}

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn appointment(
    practitioner: Option<Uuid>,
    patient: Option<Uuid>,
    service_unit: Option<Uuid>,
    start: NaiveTime,
    end: NaiveTime,
) -> Appointment {
    Appointment {
        id: Uuid::new_v4(),
        patient,
        practitioner,
        service_unit,
        appointment_date: date(),
        start_time: start,
        end_time: Some(end),
        duration_minutes: Some((end - start).num_minutes()),
        status: AppointmentStatus::Scheduled,
        appointment_type: "Consultation".to_string(),
        notes: None,
        created_at: None,
        updated_at: None,
    }
}

fn unavailability_block(
    practitioner: Option<Uuid>,
    start: NaiveTime,
    end: NaiveTime,
) -> Appointment {
    let mut block = appointment(practitioner, None, None, start, end);
    block.appointment_type = UNAVAILABILITY_TYPE.to_string();
    block.status = AppointmentStatus::Unavailable;
    block
}

#[test]
fn touching_intervals_never_overlap() {
    assert!(!intervals_overlap(t(9, 0), t(9, 30), t(9, 30), t(10, 0)));
    assert!(!intervals_overlap(t(9, 30), t(10, 0), t(9, 0), t(9, 30)));
    assert!(!intervals_overlap(t(8, 0), t(8, 30), t(10, 0), t(10, 30)));
}

#[test]
fn partial_and_contained_intervals_overlap() {
    assert!(intervals_overlap(t(9, 0), t(9, 30), t(9, 15), t(9, 45)));
    assert!(intervals_overlap(t(9, 0), t(10, 0), t(9, 15), t(9, 30)));
    assert!(intervals_overlap(t(9, 15), t(9, 30), t(9, 0), t(10, 0)));
    assert!(intervals_overlap(t(9, 0), t(9, 30), t(9, 0), t(9, 30)));
}

#[test]
fn practitioner_booking_blocks_overlapping_interval() {
    let practitioner = Some(Uuid::new_v4());
    let existing = appointment(practitioner, Some(Uuid::new_v4()), None, t(9, 0), t(9, 30));
    let candidate = appointment(practitioner, Some(Uuid::new_v4()), None, t(9, 15), t(9, 45));

    let conflicts = classify_conflicts(&candidate, &[existing.clone()], DEFAULT_DURATION);
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].appointment_id, existing.id);
    assert_eq!(conflicts[0].kind, ConflictKind::PractitionerOverlap);

    let verdict = enforce_conflict_policy(&candidate, &conflicts, None);
    assert_matches!(verdict, Err(SchedulingError::Overlap(ids)) => {
        assert!(ids.contains(&existing.id.to_string()));
    });
}

#[test]
fn back_to_back_bookings_are_allowed() {
    let practitioner = Some(Uuid::new_v4());
    let existing = appointment(practitioner, Some(Uuid::new_v4()), None, t(9, 0), t(9, 30));
    let candidate = appointment(practitioner, Some(Uuid::new_v4()), None, t(9, 30), t(10, 0));

    let conflicts = classify_conflicts(&candidate, &[existing], DEFAULT_DURATION);
    assert!(conflicts.is_empty());
}

#[test]
fn terminal_appointments_are_excluded_from_scans() {
    let practitioner = Some(Uuid::new_v4());
    let mut cancelled = appointment(practitioner, Some(Uuid::new_v4()), None, t(9, 0), t(9, 30));
    cancelled.status = AppointmentStatus::Cancelled;
    let mut closed = appointment(practitioner, Some(Uuid::new_v4()), None, t(9, 0), t(9, 30));
    closed.status = AppointmentStatus::Closed;

    let candidate = appointment(practitioner, Some(Uuid::new_v4()), None, t(9, 0), t(9, 30));
    let conflicts = classify_conflicts(&candidate, &[cancelled, closed], DEFAULT_DURATION);
    assert!(conflicts.is_empty());
}

#[test]
fn different_scope_never_conflicts() {
    let existing = appointment(
        Some(Uuid::new_v4()),
        Some(Uuid::new_v4()),
        Some(Uuid::new_v4()),
        t(9, 0),
        t(9, 30),
    );
    let candidate = appointment(
        Some(Uuid::new_v4()),
        Some(Uuid::new_v4()),
        Some(Uuid::new_v4()),
        t(9, 0),
        t(9, 30),
    );

    let conflicts = classify_conflicts(&candidate, &[existing], DEFAULT_DURATION);
    assert!(conflicts.is_empty());
}

#[test]
fn patient_double_booking_is_a_conflict() {
    let patient = Some(Uuid::new_v4());
    let existing = appointment(Some(Uuid::new_v4()), patient, None, t(9, 0), t(9, 30));
    let candidate = appointment(Some(Uuid::new_v4()), patient, None, t(9, 15), t(9, 45));

    let conflicts = classify_conflicts(&candidate, &[existing], DEFAULT_DURATION);
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].kind, ConflictKind::PatientOverlap);
}

#[test]
fn unavailability_block_always_wins() {
    let practitioner = Some(Uuid::new_v4());
    let block = unavailability_block(practitioner, t(9, 0), t(12, 0));
    let candidate = appointment(practitioner, Some(Uuid::new_v4()), None, t(10, 0), t(10, 30));

    let conflicts = classify_conflicts(&candidate, &[block.clone()], DEFAULT_DURATION);
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].kind, ConflictKind::UnavailabilityBlock);

    let verdict = enforce_conflict_policy(&candidate, &conflicts, None);
    assert_matches!(verdict, Err(SchedulingError::UnavailabilityBlock(ids)) => {
        assert!(ids.contains(&block.id.to_string()));
    });
}

#[test]
fn unavailability_wins_even_when_unit_allows_overlap() {
    let unit = Some(Uuid::new_v4());
    let mut block = unavailability_block(None, t(9, 0), t(12, 0));
    block.service_unit = unit;

    let candidate = appointment(None, Some(Uuid::new_v4()), unit, t(10, 0), t(10, 30));
    let conflicts = classify_conflicts(&candidate, &[block], DEFAULT_DURATION);

    let policy = ServiceUnitPolicy {
        id: unit.unwrap(),
        overlap_appointments: true,
        service_unit_capacity: Some(10),
    };
    let verdict = enforce_conflict_policy(&candidate, &conflicts, Some(&policy));
    assert_matches!(verdict, Err(SchedulingError::UnavailabilityBlock(_)));
}

#[test]
fn service_unit_capacity_allows_distinct_patients() {
    let unit = Some(Uuid::new_v4());
    let existing = appointment(None, Some(Uuid::new_v4()), unit, t(9, 0), t(9, 30));
    let candidate = appointment(None, Some(Uuid::new_v4()), unit, t(9, 0), t(9, 30));

    let conflicts = classify_conflicts(&candidate, &[existing], DEFAULT_DURATION);
    assert_eq!(conflicts.len(), 1);

    let policy = ServiceUnitPolicy {
        id: unit.unwrap(),
        overlap_appointments: true,
        service_unit_capacity: Some(2),
    };
    assert!(enforce_conflict_policy(&candidate, &conflicts, Some(&policy)).is_ok());
}

#[test]
fn service_unit_capacity_exceeded_is_rejected() {
    let unit = Some(Uuid::new_v4());
    let existing_a = appointment(None, Some(Uuid::new_v4()), unit, t(9, 0), t(9, 30));
    let existing_b = appointment(None, Some(Uuid::new_v4()), unit, t(9, 0), t(9, 30));
    let candidate = appointment(None, Some(Uuid::new_v4()), unit, t(9, 0), t(9, 30));

    let conflicts = classify_conflicts(&candidate, &[existing_a, existing_b], DEFAULT_DURATION);
    assert_eq!(conflicts.len(), 2);

    let policy = ServiceUnitPolicy {
        id: unit.unwrap(),
        overlap_appointments: true,
        service_unit_capacity: Some(2),
    };
    let verdict = enforce_conflict_policy(&candidate, &conflicts, Some(&policy));
    assert_matches!(verdict, Err(SchedulingError::MaximumCapacity { capacity: 2, .. }));
}

#[test]
fn capacity_never_absorbs_same_patient_overlap() {
    let unit = Some(Uuid::new_v4());
    let patient = Some(Uuid::new_v4());
    let existing = appointment(None, patient, unit, t(9, 0), t(9, 30));
    let candidate = appointment(None, patient, unit, t(9, 0), t(9, 30));

    let conflicts = classify_conflicts(&candidate, &[existing], DEFAULT_DURATION);

    let policy = ServiceUnitPolicy {
        id: unit.unwrap(),
        overlap_appointments: true,
        service_unit_capacity: Some(10),
    };
    let verdict = enforce_conflict_policy(&candidate, &conflicts, Some(&policy));
    assert_matches!(verdict, Err(SchedulingError::Overlap(_)));
}

#[test]
fn excluding_self_never_conflicts() {
    let practitioner = Some(Uuid::new_v4());
    let existing = appointment(practitioner, Some(Uuid::new_v4()), None, t(9, 0), t(9, 30));

    // Re-validating the same record against itself.
    let conflicts = classify_conflicts(&existing, &[existing.clone()], DEFAULT_DURATION);
    assert!(conflicts.is_empty());
}

#[test]
fn duration_fallback_is_used_when_end_time_missing() {
    let practitioner = Some(Uuid::new_v4());
    let mut existing = appointment(practitioner, Some(Uuid::new_v4()), None, t(9, 0), t(9, 30));
    existing.end_time = None;
    existing.duration_minutes = Some(30);

    let candidate = appointment(practitioner, Some(Uuid::new_v4()), None, t(9, 15), t(9, 45));
    let conflicts = classify_conflicts(&candidate, &[existing], DEFAULT_DURATION);
    assert_eq!(conflicts.len(), 1);
}
