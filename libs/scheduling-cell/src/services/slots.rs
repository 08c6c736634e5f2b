use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};
use reqwest::Method;
use serde_json::Value;
use tracing::debug;

use shared_config::AppConfig;
use shared_database::StoreClient;
use uuid::Uuid;

use crate::models::{Appointment, PractitionerSchedule, SchedulingError, TimeSlot};

pub fn weekday_name(date: NaiveDate) -> &'static str {
    match date.weekday() {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Candidate time slots for a date, from the schedule's weekday templates.
///
/// A template produces a slot unless the schedule is disabled, the slot
/// start has already passed (when the date is today), or a non-terminal
/// booking already sits at that exact slot start. An empty result is a
/// valid "no availability" answer.
pub fn available_slots(
    schedule: &PractitionerSchedule,
    date: NaiveDate,
    existing: &[Appointment],
    now: NaiveDateTime,
) -> Vec<TimeSlot> {
    if schedule.disabled {
        return vec![];
    }

    let weekday = weekday_name(date);
    let mut slots: Vec<TimeSlot> = schedule
        .time_slots
        .iter()
        .filter(|template| template.day == weekday)
        .filter(|template| date != now.date() || template.from_time > now.time())
        .filter(|template| {
            !existing.iter().any(|appointment| {
                !appointment.status.is_terminal()
                    && appointment.appointment_date == date
                    && appointment.start_time == template.from_time
            })
        })
        .map(|template| TimeSlot {
            start_time: template.from_time,
            end_time: template.to_time,
        })
        .collect();

    slots.sort_by(|a, b| a.start_time.cmp(&b.start_time));
    slots
}

// ==============================================================================
// STORE-BACKED SERVICE
// ==============================================================================

pub struct SlotService {
    store: StoreClient,
}

impl SlotService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: StoreClient::new(config),
        }
    }

    pub async fn available_slots_for_practitioner(
        &self,
        practitioner: Uuid,
        date: NaiveDate,
        now: NaiveDateTime,
        auth_token: Option<&str>,
    ) -> Result<Vec<TimeSlot>, SchedulingError> {
        debug!("Calculating available slots for practitioner {} on {}", practitioner, date);

        let schedules = self.fetch_schedules(practitioner, auth_token).await?;
        let existing = self.fetch_appointments_for_date(practitioner, date, auth_token).await?;

        let mut slots = Vec::new();
        for schedule in &schedules {
            slots.extend(available_slots(schedule, date, &existing, now));
        }

        slots.sort_by(|a, b| a.start_time.cmp(&b.start_time));
        slots.dedup();

        debug!("Found {} available slots", slots.len());
        Ok(slots)
    }

    pub async fn fetch_schedules(
        &self,
        practitioner: Uuid,
        auth_token: Option<&str>,
    ) -> Result<Vec<PractitionerSchedule>, SchedulingError> {
        let path = format!(
            "/rest/v1/practitioner_schedules?practitioner=eq.{}&disabled=eq.false",
            practitioner
        );

        let rows: Vec<Value> = self.store.request(
            Method::GET,
            &path,
            auth_token,
            None,
        ).await.map_err(|e| SchedulingError::Store(e.to_string()))?;

        rows.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<PractitionerSchedule>, _>>()
            .map_err(|e| SchedulingError::Store(format!("Failed to parse schedules: {}", e)))
    }

    pub async fn fetch_appointments_for_date(
        &self,
        practitioner: Uuid,
        date: NaiveDate,
        auth_token: Option<&str>,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let path = format!(
            "/rest/v1/patient_appointments?practitioner=eq.{}&appointment_date=eq.{}&status=not.in.(Cancelled,Closed)&order=start_time.asc",
            practitioner, date
        );

        let rows: Vec<Value> = self.store.request(
            Method::GET,
            &path,
            auth_token,
            None,
        ).await.map_err(|e| SchedulingError::Store(e.to_string()))?;

        rows.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| SchedulingError::Store(format!("Failed to parse appointments: {}", e)))
    }
}
