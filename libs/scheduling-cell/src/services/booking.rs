use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::StoreClient;

use crate::models::{
    Appointment, AppointmentStatus, BookAppointmentRequest, SchedulingError,
    UNAVAILABILITY_TYPE,
};
use crate::services::lifecycle::{
    date_relation, initial_status, next_status, Trigger,
};
use crate::services::overlap::OverlapService;
use crate::services::slots::{weekday_name, SlotService};

pub struct BookingService {
    store: StoreClient,
    overlap: OverlapService,
    slots: SlotService,
    default_duration: i64,
}

impl BookingService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: StoreClient::new(config),
            overlap: OverlapService::new(config),
            slots: SlotService::new(config),
            default_duration: config.default_appointment_duration,
        }
    }

    /// Validate and persist a booking. The save is all-or-nothing: any
    /// conflict rejects the whole request with an error naming the
    /// colliding records.
    pub async fn book_appointment(
        &self,
        request: BookAppointmentRequest,
        auth_token: Option<&str>,
    ) -> Result<Appointment, SchedulingError> {
        let is_unavailability = request.appointment_type == UNAVAILABILITY_TYPE;

        if !is_unavailability && request.patient.is_none() {
            return Err(SchedulingError::Mandatory("patient".to_string()));
        }
        if request.practitioner.is_none() && request.service_unit.is_none() {
            return Err(SchedulingError::Mandatory(
                "practitioner or service unit".to_string(),
            ));
        }

        let (end_time, duration) = self.resolve_times(&request, auth_token).await?;

        let today = Utc::now().date_naive();
        let relation = date_relation(request.appointment_date, today);

        let candidate = Appointment {
            id: Uuid::new_v4(),
            patient: request.patient,
            practitioner: request.practitioner,
            service_unit: request.service_unit,
            appointment_date: request.appointment_date,
            start_time: request.start_time,
            end_time: Some(end_time),
            duration_minutes: Some(duration),
            status: initial_status(relation, is_unavailability),
            appointment_type: request.appointment_type.clone(),
            notes: request.notes.clone(),
            created_at: Some(Utc::now()),
            updated_at: Some(Utc::now()),
        };

        if !is_unavailability {
            self.check_duplicate_day_booking(&candidate, auth_token).await?;
        }
        self.overlap.enforce(&candidate, auth_token).await?;

        let body = serde_json::to_value(&candidate)
            .map_err(|e| SchedulingError::Store(e.to_string()))?;

        let created = self.store
            .insert_returning("patient_appointments", auth_token, body)
            .await
            .map_err(|e| SchedulingError::Store(e.to_string()))?;

        let appointment: Appointment = serde_json::from_value(created)
            .map_err(|e| SchedulingError::Store(format!("Failed to parse appointment: {}", e)))?;

        debug!("Booked appointment {} on {}", appointment.id, appointment.appointment_date);
        Ok(appointment)
    }

    /// Cancel an appointment. Cancelling an already-cancelled appointment
    /// is an idempotent no-op.
    pub async fn cancel_appointment(
        &self,
        id: Uuid,
        auth_token: Option<&str>,
    ) -> Result<Appointment, SchedulingError> {
        let mut appointment = self.get_appointment(id, auth_token).await?;

        if appointment.status == AppointmentStatus::Cancelled {
            debug!("Appointment {} already cancelled, nothing to do", id);
            return Ok(appointment);
        }

        let next = next_status(
            appointment.status,
            Trigger::Cancel,
            appointment.is_unavailability(),
        );
        self.persist_status(id, next, auth_token).await?;
        appointment.status = next;

        Ok(appointment)
    }

    /// Apply an explicit lifecycle trigger (check-in, check-out, close,
    /// needs-rescheduling, cancel). Terminal states are sticky, so the
    /// write is skipped when nothing changes.
    pub async fn apply_trigger(
        &self,
        id: Uuid,
        trigger: Trigger,
        auth_token: Option<&str>,
    ) -> Result<Appointment, SchedulingError> {
        let mut appointment = self.get_appointment(id, auth_token).await?;

        let next = next_status(appointment.status, trigger, appointment.is_unavailability());
        if next != appointment.status {
            self.persist_status(id, next, auth_token).await?;
            appointment.status = next;
        }

        Ok(appointment)
    }

    /// Re-derive the date-driven status (past / today / future) and persist
    /// it when it changed.
    pub async fn refresh_date_driven_status(
        &self,
        id: Uuid,
        today: NaiveDate,
        auth_token: Option<&str>,
    ) -> Result<Appointment, SchedulingError> {
        let mut appointment = self.get_appointment(id, auth_token).await?;

        let relation = date_relation(appointment.appointment_date, today);
        let next = next_status(
            appointment.status,
            Trigger::DateDriven(relation),
            appointment.is_unavailability(),
        );
        if next != appointment.status {
            self.persist_status(id, next, auth_token).await?;
            appointment.status = next;
        }

        Ok(appointment)
    }

    pub async fn get_appointment(
        &self,
        id: Uuid,
        auth_token: Option<&str>,
    ) -> Result<Appointment, SchedulingError> {
        let path = format!("/rest/v1/patient_appointments?id=eq.{}", id);

        let rows: Vec<Value> = self.store.request(
            Method::GET,
            &path,
            auth_token,
            None,
        ).await.map_err(|e| SchedulingError::Store(e.to_string()))?;

        let row = rows.into_iter().next().ok_or(SchedulingError::NotFound)?;

        serde_json::from_value(row)
            .map_err(|e| SchedulingError::Store(format!("Failed to parse appointment: {}", e)))
    }

    pub fn overlap_service(&self) -> &OverlapService {
        &self.overlap
    }

    pub fn slot_service(&self) -> &SlotService {
        &self.slots
    }

    // ==========================================================================
    // PRIVATE HELPERS
    // ==========================================================================

    /// End time and duration must agree within a 1-minute tolerance; when
    /// they disagree the pair wins and duration is recomputed. Without an
    /// end time the duration falls back through: request value, matching
    /// schedule slot length, configured default.
    async fn resolve_times(
        &self,
        request: &BookAppointmentRequest,
        auth_token: Option<&str>,
    ) -> Result<(NaiveTime, i64), SchedulingError> {
        if let Some(end) = request.end_time {
            if end <= request.start_time {
                return Err(SchedulingError::Validation(
                    "End time must be after start time".to_string(),
                ));
            }

            let computed = (end - request.start_time).num_minutes();
            let duration = match request.duration_minutes {
                Some(given) if (given - computed).abs() <= 1 => given,
                Some(given) => {
                    warn!(
                        "Duration {} disagrees with start/end pair, using {} minutes",
                        given, computed
                    );
                    computed
                }
                None => computed,
            };
            return Ok((end, duration));
        }

        let duration = match request.duration_minutes {
            Some(d) if d > 0 => d,
            Some(_) => {
                return Err(SchedulingError::Validation(
                    "Duration must be positive".to_string(),
                ))
            }
            None => self
                .slot_duration_from_schedule(request, auth_token)
                .await?
                .unwrap_or(self.default_duration),
        };

        Ok((request.start_time + Duration::minutes(duration), duration))
    }

    async fn slot_duration_from_schedule(
        &self,
        request: &BookAppointmentRequest,
        auth_token: Option<&str>,
    ) -> Result<Option<i64>, SchedulingError> {
        let practitioner = match request.practitioner {
            Some(p) => p,
            None => return Ok(None),
        };

        let schedules = self.slots.fetch_schedules(practitioner, auth_token).await?;
        let weekday = weekday_name(request.appointment_date);

        for schedule in &schedules {
            for slot in &schedule.time_slots {
                if slot.day == weekday
                    && slot.from_time <= request.start_time
                    && request.start_time < slot.to_time
                {
                    return Ok(Some((slot.to_time - slot.from_time).num_minutes()));
                }
            }
        }

        Ok(None)
    }

    /// Patient-level duplicate prevention for service-unit bookings: one
    /// appointment per patient per unit per day, regardless of time.
    async fn check_duplicate_day_booking(
        &self,
        candidate: &Appointment,
        auth_token: Option<&str>,
    ) -> Result<(), SchedulingError> {
        let (patient, unit) = match (candidate.patient, candidate.service_unit) {
            (Some(p), Some(u)) if candidate.practitioner.is_none() => (p, u),
            _ => return Ok(()),
        };

        let path = format!(
            "/rest/v1/patient_appointments?patient=eq.{}&service_unit=eq.{}&appointment_date=eq.{}&status=neq.Cancelled&id=neq.{}",
            patient, unit, candidate.appointment_date, candidate.id
        );

        let rows: Vec<Value> = self.store.request(
            Method::GET,
            &path,
            auth_token,
            None,
        ).await.map_err(|e| SchedulingError::Store(e.to_string()))?;

        if let Some(existing) = rows.first() {
            let existing_id = existing
                .get("id")
                .and_then(|v| v.as_str())
                .and_then(|s| Uuid::parse_str(s).ok())
                .unwrap_or_default();
            return Err(SchedulingError::DuplicateEntry(existing_id));
        }

        Ok(())
    }

    async fn persist_status(
        &self,
        id: Uuid,
        status: AppointmentStatus,
        auth_token: Option<&str>,
    ) -> Result<(), SchedulingError> {
        self.store
            .set_values(
                "patient_appointments",
                &format!("id=eq.{}", id),
                auth_token,
                serde_json::json!({
                    "status": status.to_string(),
                    "updated_at": Utc::now().to_rfc3339(),
                }),
            )
            .await
            .map_err(|e| SchedulingError::Store(e.to_string()))
    }
}
