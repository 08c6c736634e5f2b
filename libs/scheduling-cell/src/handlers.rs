// libs/scheduling-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use chrono::{NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::models::{
    Appointment, AvailableSlotsResponse, BookAppointmentRequest, ConflictCheckResponse,
    SchedulingError, StatusTriggerRequest,
};
use crate::services::booking::BookingService;
use crate::services::lifecycle::Trigger;

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub practitioner: Uuid,
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct ConflictCheckQuery {
    pub practitioner: Option<Uuid>,
    pub patient: Option<Uuid>,
    pub service_unit: Option<Uuid>,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub exclude_appointment_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateBody {
    pub trigger: StatusTriggerRequest,
}

fn map_scheduling_error(e: SchedulingError) -> AppError {
    match e {
        SchedulingError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        SchedulingError::Validation(_) | SchedulingError::Mandatory(_) => {
            AppError::BadRequest(e.to_string())
        }
        SchedulingError::Overlap(_)
        | SchedulingError::UnavailabilityBlock(_)
        | SchedulingError::MaximumCapacity { .. }
        | SchedulingError::DuplicateEntry(_) => AppError::Conflict(e.to_string()),
        SchedulingError::Store(msg) => AppError::Internal(msg),
    }
}

// ==============================================================================
// HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let booking_service = BookingService::new(&state);
    let appointment = booking_service
        .book_appointment(request, Some(token))
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Appointment>, AppError> {
    let token = auth.token();

    let booking_service = BookingService::new(&state);
    let appointment = booking_service
        .get_appointment(appointment_id, Some(token))
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(appointment))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let booking_service = BookingService::new(&state);
    let appointment = booking_service
        .cancel_appointment(appointment_id, Some(token))
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
    })))
}

#[axum::debug_handler]
pub async fn update_appointment_status(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(appointment_id): Path<Uuid>,
    Json(body): Json<StatusUpdateBody>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let trigger = match body.trigger {
        StatusTriggerRequest::CheckIn => Trigger::CheckIn,
        StatusTriggerRequest::CheckOut => Trigger::CheckOut,
        StatusTriggerRequest::Cancel => Trigger::Cancel,
        StatusTriggerRequest::Close => Trigger::Close,
        StatusTriggerRequest::NeedsRescheduling => Trigger::NeedsRescheduling,
    };

    let booking_service = BookingService::new(&state);
    let appointment = booking_service
        .apply_trigger(appointment_id, trigger, Some(token))
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
    })))
}

/// Candidate slots for a practitioner on a date. An empty list means no
/// availability, not an error.
#[axum::debug_handler]
pub async fn get_available_slots(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailableSlotsResponse>, AppError> {
    let token = auth.token();

    let booking_service = BookingService::new(&state);
    let slots = booking_service
        .slot_service()
        .available_slots_for_practitioner(
            query.practitioner,
            query.date,
            Utc::now().naive_utc(),
            Some(token),
        )
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(AvailableSlotsResponse {
        date: query.date,
        slots,
    }))
}

/// Dry-run conflict check for a proposed interval and scope.
#[axum::debug_handler]
pub async fn check_appointment_conflicts(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<ConflictCheckQuery>,
) -> Result<Json<ConflictCheckResponse>, AppError> {
    let token = auth.token();

    if query.end_time <= query.start_time {
        return Err(AppError::BadRequest(
            "End time must be after start time".to_string(),
        ));
    }

    let probe = Appointment {
        id: query.exclude_appointment_id.unwrap_or_else(Uuid::new_v4),
        patient: query.patient,
        practitioner: query.practitioner,
        service_unit: query.service_unit,
        appointment_date: query.date,
        start_time: query.start_time,
        end_time: Some(query.end_time),
        duration_minutes: Some((query.end_time - query.start_time).num_minutes()),
        status: crate::models::AppointmentStatus::Scheduled,
        appointment_type: String::new(),
        notes: None,
        created_at: None,
        updated_at: None,
    };

    let booking_service = BookingService::new(&state);
    let conflicts = booking_service
        .overlap_service()
        .check_overlap(&probe, Some(token))
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(ConflictCheckResponse {
        has_conflict: !conflicts.is_empty(),
        conflicts,
    }))
}
