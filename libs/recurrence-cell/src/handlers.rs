// libs/recurrence-cell/src/handlers.rs
use axum::{extract::State, Json};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use uuid::Uuid;

use shared_models::error::AppError;

use crate::models::{ExpansionResult, RecurrenceError, RecurrenceJob, RecurrenceSpec};
use crate::router::RecurrenceState;
use crate::services::availability::RecurrenceService;

fn map_recurrence_error(e: RecurrenceError) -> AppError {
    match e {
        RecurrenceError::Validation(_) | RecurrenceError::Mandatory(_) => {
            AppError::BadRequest(e.to_string())
        }
        RecurrenceError::NoSlotsAvailable => AppError::BadRequest(e.to_string()),
        RecurrenceError::Store(msg) => AppError::Internal(msg),
    }
}

/// Expand a recurrence spec into its candidate dates without creating
/// anything. Each date carries a flag marking occurrences whose slot is
/// already taken.
#[axum::debug_handler]
pub async fn get_recurring_appointment_dates(
    State(state): State<RecurrenceState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(spec): Json<RecurrenceSpec>,
) -> Result<Json<ExpansionResult>, AppError> {
    let token = auth.token();

    let service = RecurrenceService::new(&state.config);
    let result = service
        .recurring_appointment_dates(&spec, Some(token))
        .await
        .map_err(map_recurrence_error)?;

    Ok(Json(result))
}

/// Expand the spec and hand the unbooked occurrences to the background
/// worker. The response is a boolean acknowledgment only; creation happens
/// asynchronously.
#[axum::debug_handler]
pub async fn create_recurring_appointments(
    State(state): State<RecurrenceState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(spec): Json<RecurrenceSpec>,
) -> Result<Json<bool>, AppError> {
    let token = auth.token();

    let service = RecurrenceService::new(&state.config);
    let result = service
        .recurring_appointment_dates(&spec, Some(token))
        .await
        .map_err(map_recurrence_error)?;

    if result.dates.is_empty() {
        return Err(map_recurrence_error(RecurrenceError::NoSlotsAvailable));
    }

    let accepted = state.queue.enqueue(RecurrenceJob {
        job_id: Uuid::new_v4(),
        spec,
        dates: result.dates,
    });

    if !accepted {
        return Err(AppError::Internal(
            "Recurrence worker is not accepting jobs".to_string(),
        ));
    }

    Ok(Json(true))
}
