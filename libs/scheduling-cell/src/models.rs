// libs/scheduling-cell/src/models.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc, NaiveDate, NaiveTime, Duration};
use std::fmt;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

/// The type name that marks an appointment as an unavailability block.
pub const UNAVAILABILITY_TYPE: &str = "Unavailable";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient: Option<Uuid>,
    pub practitioner: Option<Uuid>,
    pub service_unit: Option<Uuid>,
    pub appointment_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: Option<NaiveTime>,
    pub duration_minutes: Option<i64>,
    pub status: AppointmentStatus,
    pub appointment_type: String,
    pub notes: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Appointment {
    /// Explicit end time, or start plus stored duration, or start plus the
    /// given fallback duration.
    pub fn effective_end_time(&self, default_duration: i64) -> NaiveTime {
        if let Some(end) = self.end_time {
            return end;
        }
        let minutes = self.duration_minutes.unwrap_or(default_duration);
        self.start_time + Duration::minutes(minutes)
    }

    pub fn is_unavailability(&self) -> bool {
        self.appointment_type == UNAVAILABILITY_TYPE
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Open,
    #[serde(rename = "Checked In")]
    CheckedIn,
    #[serde(rename = "Checked Out")]
    CheckedOut,
    Unavailable,
    Cancelled,
    #[serde(rename = "No Show")]
    NoShow,
    Closed,
    #[serde(rename = "Needs Rescheduling")]
    NeedsRescheduling,
}

impl AppointmentStatus {
    /// Terminal states never leave via a date-driven transition and are
    /// excluded from conflict scans.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Cancelled | AppointmentStatus::Closed)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AppointmentStatus::Scheduled => "Scheduled",
            AppointmentStatus::Confirmed => "Confirmed",
            AppointmentStatus::Open => "Open",
            AppointmentStatus::CheckedIn => "Checked In",
            AppointmentStatus::CheckedOut => "Checked Out",
            AppointmentStatus::Unavailable => "Unavailable",
            AppointmentStatus::Cancelled => "Cancelled",
            AppointmentStatus::NoShow => "No Show",
            AppointmentStatus::Closed => "Closed",
            AppointmentStatus::NeedsRescheduling => "Needs Rescheduling",
        };
        write!(f, "{}", label)
    }
}

// ==============================================================================
// SCHEDULE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSlotTemplate {
    /// Weekday name, e.g. "Monday".
    pub day: String,
    pub from_time: NaiveTime,
    pub to_time: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PractitionerSchedule {
    pub id: Uuid,
    pub practitioner: Uuid,
    pub service_unit: Option<Uuid>,
    pub disabled: bool,
    pub time_slots: Vec<TimeSlotTemplate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeSlot {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// Overlap policy of a service unit. With `overlap_appointments` enabled,
/// up to `service_unit_capacity` concurrent bookings for distinct patients
/// share the unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceUnitPolicy {
    pub id: Uuid,
    pub overlap_appointments: bool,
    pub service_unit_capacity: Option<i32>,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub patient: Option<Uuid>,
    pub practitioner: Option<Uuid>,
    pub service_unit: Option<Uuid>,
    pub appointment_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: Option<NaiveTime>,
    pub duration_minutes: Option<i64>,
    pub appointment_type: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictCheckResponse {
    pub has_conflict: bool,
    pub conflicts: Vec<Conflict>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableSlotsResponse {
    pub date: NaiveDate,
    pub slots: Vec<TimeSlot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusTriggerRequest {
    CheckIn,
    CheckOut,
    Cancel,
    Close,
    NeedsRescheduling,
}

// ==============================================================================
// CONFLICT MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// Collision with an unavailability block in the booking's scope.
    UnavailabilityBlock,
    PractitionerOverlap,
    ServiceUnitOverlap,
    PatientOverlap,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conflict {
    pub appointment_id: Uuid,
    pub kind: ConflictKind,
    pub patient: Option<Uuid>,
    pub service_unit: Option<Uuid>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

pub fn join_conflict_ids(conflicts: &[Conflict]) -> String {
    conflicts
        .iter()
        .map(|c| c.appointment_id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum SchedulingError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{0} is required")]
    Mandatory(String),

    #[error("Not allowed, cannot overlap appointment(s) {0}")]
    Overlap(String),

    #[error("Marked as unavailable during this time (blocking record(s): {0})")]
    UnavailabilityBlock(String),

    #[error("Not allowed, service unit {service_unit} cannot exceed maximum capacity {capacity}")]
    MaximumCapacity { service_unit: Uuid, capacity: i32 },

    #[error("Patient already has appointment {0} booked for the same day")]
    DuplicateEntry(Uuid),

    #[error("Appointment not found")]
    NotFound,

    #[error("Store error: {0}")]
    Store(String),
}
