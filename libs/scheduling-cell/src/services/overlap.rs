use chrono::NaiveTime;
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};

use shared_config::AppConfig;
use shared_database::StoreClient;

use crate::models::{
    Appointment, Conflict, ConflictKind, SchedulingError, ServiceUnitPolicy,
    join_conflict_ids,
};

/// Half-open interval test: `[s1, e1)` and `[s2, e2)` overlap iff
/// `s1 < e2 && s2 < e1`. Touching endpoints never conflict, so
/// back-to-back bookings are allowed.
pub fn intervals_overlap(s1: NaiveTime, e1: NaiveTime, s2: NaiveTime, e2: NaiveTime) -> bool {
    s1 < e2 && s2 < e1
}

/// Classify every same-day, same-scope, time-overlapping appointment
/// against the candidate. Terminal-state appointments (Cancelled, Closed)
/// never conflict.
pub fn classify_conflicts(
    candidate: &Appointment,
    existing: &[Appointment],
    default_duration: i64,
) -> Vec<Conflict> {
    let start = candidate.start_time;
    let end = candidate.effective_end_time(default_duration);

    let mut conflicts = Vec::new();

    for other in existing {
        if other.id == candidate.id {
            continue;
        }
        if other.status.is_terminal() {
            continue;
        }
        if other.appointment_date != candidate.appointment_date {
            continue;
        }

        let other_start = other.start_time;
        let other_end = other.effective_end_time(default_duration);
        if !intervals_overlap(start, end, other_start, other_end) {
            continue;
        }

        let same_practitioner =
            candidate.practitioner.is_some() && candidate.practitioner == other.practitioner;
        let same_service_unit =
            candidate.service_unit.is_some() && candidate.service_unit == other.service_unit;
        let same_patient = candidate.patient.is_some() && candidate.patient == other.patient;

        let kind = if other.is_unavailability() && (same_practitioner || same_service_unit) {
            ConflictKind::UnavailabilityBlock
        } else if same_practitioner {
            ConflictKind::PractitionerOverlap
        } else if same_patient {
            ConflictKind::PatientOverlap
        } else if same_service_unit {
            ConflictKind::ServiceUnitOverlap
        } else {
            continue;
        };

        conflicts.push(Conflict {
            appointment_id: other.id,
            kind,
            patient: other.patient,
            service_unit: other.service_unit,
            start_time: other_start,
            end_time: other_end,
        });
    }

    conflicts
}

/// Turn the classified conflicts into a verdict. Unavailability blocks
/// always win; the service-unit capacity policy can absorb overlaps for
/// distinct patients; anything left rejects the save entirely.
pub fn enforce_conflict_policy(
    candidate: &Appointment,
    conflicts: &[Conflict],
    policy: Option<&ServiceUnitPolicy>,
) -> Result<(), SchedulingError> {
    if conflicts.is_empty() {
        return Ok(());
    }

    if !candidate.is_unavailability() {
        let blocks: Vec<Conflict> = conflicts
            .iter()
            .filter(|c| c.kind == ConflictKind::UnavailabilityBlock)
            .cloned()
            .collect();
        if !blocks.is_empty() {
            return Err(SchedulingError::UnavailabilityBlock(join_conflict_ids(&blocks)));
        }
    }

    let mut remaining: Vec<Conflict> = conflicts.to_vec();

    if let Some(policy) = policy {
        if policy.overlap_appointments && candidate.service_unit.is_some() {
            let capacity = policy.service_unit_capacity.unwrap_or(1).max(1);

            // Concurrent bookings for distinct patients may share the unit.
            let shared: Vec<Conflict> = remaining
                .iter()
                .filter(|c| {
                    c.kind != ConflictKind::UnavailabilityBlock
                        && c.service_unit == candidate.service_unit
                        && c.patient != candidate.patient
                })
                .cloned()
                .collect();

            if shared.len() >= capacity as usize {
                return Err(SchedulingError::MaximumCapacity {
                    service_unit: candidate.service_unit.unwrap_or_default(),
                    capacity,
                });
            }

            remaining.retain(|c| {
                !shared.iter().any(|s| s.appointment_id == c.appointment_id)
            });
        }
    }

    if !remaining.is_empty() {
        return Err(SchedulingError::Overlap(join_conflict_ids(&remaining)));
    }

    Ok(())
}

// ==============================================================================
// STORE-BACKED SERVICE
// ==============================================================================

pub struct OverlapService {
    store: StoreClient,
    default_duration: i64,
}

impl OverlapService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: StoreClient::new(config),
            default_duration: config.default_appointment_duration,
        }
    }

    /// Classify conflicts for the candidate against the store's view of the
    /// same day and scope. Read-then-write: no row lock is taken, so two
    /// simultaneous bookings can both pass this check before either saves.
    pub async fn check_overlap(
        &self,
        candidate: &Appointment,
        auth_token: Option<&str>,
    ) -> Result<Vec<Conflict>, SchedulingError> {
        debug!(
            "Checking overlaps for {} on {} from {} to {}",
            candidate.id,
            candidate.appointment_date,
            candidate.start_time,
            candidate.effective_end_time(self.default_duration)
        );

        let existing = self.fetch_same_day_in_scope(candidate, auth_token).await?;
        Ok(classify_conflicts(candidate, &existing, self.default_duration))
    }

    /// Full overlap validation: classify, apply the service-unit policy,
    /// and reject the save on any surviving conflict.
    pub async fn enforce(
        &self,
        candidate: &Appointment,
        auth_token: Option<&str>,
    ) -> Result<(), SchedulingError> {
        let conflicts = self.check_overlap(candidate, auth_token).await?;

        let policy = match candidate.service_unit {
            Some(unit) => self.fetch_service_unit_policy(unit, auth_token).await?,
            None => None,
        };

        let verdict = enforce_conflict_policy(candidate, &conflicts, policy.as_ref());
        if let Err(ref e) = verdict {
            warn!("Overlap validation rejected appointment {}: {}", candidate.id, e);
        }
        verdict
    }

    async fn fetch_same_day_in_scope(
        &self,
        candidate: &Appointment,
        auth_token: Option<&str>,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let mut scope_parts = Vec::new();
        if let Some(practitioner) = candidate.practitioner {
            scope_parts.push(format!("practitioner.eq.{}", practitioner));
        }
        if let Some(patient) = candidate.patient {
            scope_parts.push(format!("patient.eq.{}", patient));
        }
        if let Some(unit) = candidate.service_unit {
            scope_parts.push(format!("service_unit.eq.{}", unit));
        }

        if scope_parts.is_empty() {
            return Ok(vec![]);
        }

        let path = format!(
            "/rest/v1/patient_appointments?appointment_date=eq.{}&status=not.in.(Cancelled,Closed)&or=({})&order=start_time.asc",
            candidate.appointment_date,
            scope_parts.join(",")
        );

        let rows: Vec<Value> = self.store.request(
            Method::GET,
            &path,
            auth_token,
            None,
        ).await.map_err(|e| SchedulingError::Store(e.to_string()))?;

        let appointments: Vec<Appointment> = rows.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| SchedulingError::Store(format!("Failed to parse appointments: {}", e)))?;

        Ok(appointments)
    }

    async fn fetch_service_unit_policy(
        &self,
        unit: uuid::Uuid,
        auth_token: Option<&str>,
    ) -> Result<Option<ServiceUnitPolicy>, SchedulingError> {
        let path = format!("/rest/v1/service_units?id=eq.{}", unit);

        let rows: Vec<Value> = self.store.request(
            Method::GET,
            &path,
            auth_token,
            None,
        ).await.map_err(|e| SchedulingError::Store(e.to_string()))?;

        let policy = rows.into_iter().next()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| SchedulingError::Store(format!("Failed to parse service unit: {}", e)))?;

        Ok(policy)
    }
}
