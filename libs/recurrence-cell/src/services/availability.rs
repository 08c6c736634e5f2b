use chrono::Utc;
use reqwest::Method;
use serde_json::Value;
use tracing::debug;

use shared_config::AppConfig;
use shared_database::StoreClient;
use uuid::Uuid;

use scheduling_cell::models::Appointment;
use scheduling_cell::services::overlap::intervals_overlap;

use crate::models::{
    CandidateDate, ExpansionResult, HolidayList, RecurrenceError, RecurrenceSpec,
    ScheduleWindow,
};
use crate::services::expander::expand;

pub struct RecurrenceService {
    store: StoreClient,
    default_duration: i64,
    scan_horizon_days: i64,
}

impl RecurrenceService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: StoreClient::new(config),
            default_duration: config.default_appointment_duration,
            scan_horizon_days: config.recurrence_scan_horizon_days,
        }
    }

    /// Expand a recurrence spec into candidate dates and annotate each with
    /// its slot-occupancy flag.
    pub async fn recurring_appointment_dates(
        &self,
        spec: &RecurrenceSpec,
        auth_token: Option<&str>,
    ) -> Result<ExpansionResult, RecurrenceError> {
        let windows = self.fetch_schedule_windows(spec, auth_token).await?;
        let holidays = self.fetch_holiday_lists(auth_token).await?;

        let now = Utc::now();
        let mut expansion = expand(
            spec,
            &windows,
            &holidays,
            now.date_naive(),
            now.time(),
            self.scan_horizon_days,
        )?;

        for candidate in &mut expansion.dates {
            candidate.booked = self
                .occurrence_is_booked(spec.practitioner, candidate, auth_token)
                .await?;
        }

        debug!(
            "Expanded recurrence for practitioner {}: {} dates, schedule matched: {}",
            spec.practitioner,
            expansion.dates.len(),
            expansion.schedule_matched
        );

        Ok(ExpansionResult {
            total: expansion.dates.len(),
            dates: expansion.dates,
            available: expansion.schedule_matched,
        })
    }

    /// The occurrence window collides with an existing non-terminal booking
    /// for the practitioner on that date.
    async fn occurrence_is_booked(
        &self,
        practitioner: Uuid,
        candidate: &CandidateDate,
        auth_token: Option<&str>,
    ) -> Result<bool, RecurrenceError> {
        let path = format!(
            "/rest/v1/patient_appointments?practitioner=eq.{}&appointment_date=eq.{}&status=not.in.(Cancelled,Closed)&order=start_time.asc",
            practitioner, candidate.date
        );

        let rows: Vec<Value> = self.store.request(
            Method::GET,
            &path,
            auth_token,
            None,
        ).await.map_err(|e| RecurrenceError::Store(e.to_string()))?;

        let appointments: Vec<Appointment> = rows.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| RecurrenceError::Store(format!("Failed to parse appointments: {}", e)))?;

        Ok(appointments.iter().any(|appointment| {
            intervals_overlap(
                candidate.from_time,
                candidate.to_time,
                appointment.start_time,
                appointment.effective_end_time(self.default_duration),
            )
        }))
    }

    async fn fetch_schedule_windows(
        &self,
        spec: &RecurrenceSpec,
        auth_token: Option<&str>,
    ) -> Result<Vec<ScheduleWindow>, RecurrenceError> {
        let mut path = format!(
            "/rest/v1/practitioner_schedules?practitioner=eq.{}&disabled=eq.false&select=time_slots",
            spec.practitioner
        );
        if let Some(unit) = spec.service_unit {
            path.push_str(&format!("&service_unit=eq.{}", unit));
        }

        let rows: Vec<Value> = self.store.request(
            Method::GET,
            &path,
            auth_token,
            None,
        ).await.map_err(|e| RecurrenceError::Store(e.to_string()))?;

        let mut windows = Vec::new();
        for row in rows {
            if let Some(slots) = row.get("time_slots") {
                let parsed: Vec<ScheduleWindow> = serde_json::from_value(slots.clone())
                    .map_err(|e| {
                        RecurrenceError::Store(format!("Failed to parse schedule slots: {}", e))
                    })?;
                windows.extend(parsed);
            }
        }

        Ok(windows)
    }

    async fn fetch_holiday_lists(
        &self,
        auth_token: Option<&str>,
    ) -> Result<Vec<HolidayList>, RecurrenceError> {
        let path = "/rest/v1/holiday_lists?select=from_date,to_date,holidays(holiday_date)";

        let rows: Vec<Value> = self.store.request(
            Method::GET,
            path,
            auth_token,
            None,
        ).await.map_err(|e| RecurrenceError::Store(e.to_string()))?;

        rows.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<HolidayList>, _>>()
            .map_err(|e| RecurrenceError::Store(format!("Failed to parse holiday lists: {}", e)))
    }
}
