// libs/worklist-cell/src/handlers.rs
//
// DICOMWeb UPS-RS surface. Responses always carry a DICOM status code in
// the payload; the HTTP status is set alongside (200 success, 400
// processing failure, 404 unknown instance).

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use reqwest::Method;
use serde_json::{json, Map, Value};

use shared_config::AppConfig;
use shared_database::StoreClient;

use crate::models::{ModalityMessage, ModalityUpdate, WorklistError, DICOM_STATUS_SUCCESS};
use crate::services::capabilities::{conformance_statement, verification};
use crate::services::message_log::log_modality_message;
use crate::services::workitem::{is_valid_ups_uid, WorkitemService};

fn respond(status: StatusCode, payload: Value) -> Response {
    (status, Json(payload)).into_response()
}

fn dicom_error_response(err: &WorklistError) -> Response {
    respond(
        err.http_status(),
        json!({ "Status": err.dicom_status(), "ErrorComment": err.to_string() }),
    )
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
}

fn ae_title_or_unknown(headers: &HeaderMap) -> String {
    header_value(headers, "X-AE-TITLE").unwrap_or_else(|| "Unknown".to_string())
}

/// Check the AE registry for an enabled entry matching both headers.
async fn authenticate_ae(store: &StoreClient, headers: &HeaderMap) -> Result<String, WorklistError> {
    let ae_title = header_value(headers, "X-AE-TITLE")
        .ok_or_else(|| WorklistError::Unauthorized("missing AE credentials".to_string()))?;
    let token = header_value(headers, "X-AE-TOKEN")
        .ok_or_else(|| WorklistError::Unauthorized("missing AE credentials".to_string()))?;

    let path = format!("/rest/v1/modality_aes?ae_title=eq.{}&enabled=eq.true", ae_title);
    let rows: Vec<Value> = store.request(
        Method::GET,
        &path,
        None,
        None,
    ).await.map_err(|e| WorklistError::Processing(e.to_string()))?;

    let registered = rows.first()
        .and_then(|row| row.get("token"))
        .and_then(Value::as_str);

    match registered {
        Some(registered) if registered == token => Ok(ae_title),
        _ => Err(WorklistError::Unauthorized(ae_title)),
    }
}

/// A POST body may be the filter dictionary itself or wrapped under a
/// `filters` key.
fn unwrap_filters(body: Value) -> Map<String, Value> {
    match body {
        Value::Object(mut map) => match map.remove("filters") {
            Some(Value::Object(inner)) => inner,
            _ => map,
        },
        _ => Map::new(),
    }
}

/// Log the exchange and translate the action result into a DICOM response.
async fn log_and_respond(
    store: &StoreClient,
    ae_title: String,
    message_type: &str,
    success_text: &str,
    request_payload: Option<Value>,
    reference: Option<String>,
    result: Result<Value, WorklistError>,
) -> Response {
    match result {
        Ok(payload) => {
            log_modality_message(store, ModalityMessage {
                ae_title,
                message_type: message_type.to_string(),
                request_payload,
                response_payload: Some(payload.clone()),
                status_code: DICOM_STATUS_SUCCESS.to_string(),
                status_text: success_text.to_string(),
                reference,
            }).await;
            respond(StatusCode::OK, payload)
        }
        Err(e) => {
            log_modality_message(store, ModalityMessage {
                ae_title,
                message_type: message_type.to_string(),
                request_payload,
                response_payload: None,
                status_code: e.dicom_status().to_string(),
                status_text: e.to_string(),
                reference,
            }).await;
            dicom_error_response(&e)
        }
    }
}

async fn list_workitems(
    state: Arc<AppConfig>,
    headers: HeaderMap,
    filters: Map<String, Value>,
) -> Response {
    let store = StoreClient::new(&state);

    let ae_title = match authenticate_ae(&store, &headers).await {
        Ok(ae_title) => ae_title,
        Err(e) => return dicom_error_response(&e),
    };

    let service = WorkitemService::new(&state);
    let result = service.list(&filters).await.map(|datasets| json!(datasets));

    log_and_respond(
        &store,
        ae_title,
        "UPS RS",
        "Worklist served",
        Some(Value::Object(filters)),
        None,
        result,
    )
    .await
}

#[axum::debug_handler]
pub async fn get_workitems(
    State(state): State<Arc<AppConfig>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let filters: Map<String, Value> = params
        .into_iter()
        .map(|(k, v)| (k, Value::String(v)))
        .collect();
    list_workitems(state, headers, filters).await
}

#[axum::debug_handler]
pub async fn post_workitems(
    State(state): State<Arc<AppConfig>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    list_workitems(state, headers, unwrap_filters(body)).await
}

#[axum::debug_handler]
pub async fn claim_workitem(
    State(state): State<Arc<AppConfig>>,
    Path(uid): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let store = StoreClient::new(&state);

    let ae_title = match authenticate_ae(&store, &headers).await {
        Ok(ae_title) => ae_title,
        Err(e) => return dicom_error_response(&e),
    };
    if !is_valid_ups_uid(&uid) {
        return dicom_error_response(&WorklistError::InvalidAttribute(
            "Invalid UPS UID format".to_string(),
        ));
    }

    let service = WorkitemService::new(&state);
    let result = service.claim(&uid, &body, &ae_title).await;

    log_and_respond(
        &store,
        ae_title,
        "UPS Claim",
        "Claim accepted",
        Some(body),
        Some(uid),
        result,
    )
    .await
}

#[axum::debug_handler]
pub async fn cancel_workitem(
    State(state): State<Arc<AppConfig>>,
    Path(uid): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let store = StoreClient::new(&state);

    let ae_title = match authenticate_ae(&store, &headers).await {
        Ok(ae_title) => ae_title,
        Err(e) => return dicom_error_response(&e),
    };
    if !is_valid_ups_uid(&uid) {
        return dicom_error_response(&WorklistError::InvalidAttribute(
            "Invalid UPS UID format".to_string(),
        ));
    }

    let service = WorkitemService::new(&state);
    let result = service.cancel(&uid, &body, &ae_title).await;

    log_and_respond(
        &store,
        ae_title,
        "UPS Cancel",
        "Cancelled",
        Some(body),
        Some(uid),
        result,
    )
    .await
}

#[axum::debug_handler]
pub async fn workitem_event(
    State(state): State<Arc<AppConfig>>,
    Path(uid): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let store = StoreClient::new(&state);

    let ae_title = match authenticate_ae(&store, &headers).await {
        Ok(ae_title) => ae_title,
        Err(e) => return dicom_error_response(&e),
    };
    if !is_valid_ups_uid(&uid) {
        return dicom_error_response(&WorklistError::InvalidAttribute(
            "Invalid UPS UID format".to_string(),
        ));
    }

    let service = WorkitemService::new(&state);
    let result = service.workitem_event(&uid, &body, &ae_title).await;

    log_and_respond(
        &store,
        ae_title,
        "UPS WorkitemEvent",
        "Workitem updated",
        Some(body),
        Some(uid),
        result,
    )
    .await
}

#[axum::debug_handler]
pub async fn update_workitem(
    State(state): State<Arc<AppConfig>>,
    Path(uid): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let store = StoreClient::new(&state);

    let ae_title = match authenticate_ae(&store, &headers).await {
        Ok(ae_title) => ae_title,
        Err(e) => return dicom_error_response(&e),
    };
    if !is_valid_ups_uid(&uid) {
        return dicom_error_response(&WorklistError::InvalidAttribute(
            "Invalid UPS UID format".to_string(),
        ));
    }

    let update: ModalityUpdate = match serde_json::from_value(body.clone()) {
        Ok(update) => update,
        Err(e) => {
            return dicom_error_response(&WorklistError::InvalidAttribute(e.to_string()));
        }
    };

    let service = WorkitemService::new(&state);
    let result = service.modality_update(&uid, &update).await;

    log_and_respond(
        &store,
        ae_title,
        "UPS Update",
        "Updated",
        Some(body),
        Some(uid),
        result,
    )
    .await
}

#[axum::debug_handler]
pub async fn echo(
    State(state): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Response {
    let store = StoreClient::new(&state);
    let result = verification();

    log_modality_message(&store, ModalityMessage {
        ae_title: ae_title_or_unknown(&headers),
        message_type: "Verification".to_string(),
        request_payload: None,
        response_payload: Some(result.clone()),
        status_code: DICOM_STATUS_SUCCESS.to_string(),
        status_text: "DICOMWeb Verification successful".to_string(),
        reference: None,
    }).await;

    respond(StatusCode::OK, result)
}

#[axum::debug_handler]
pub async fn conformance(
    State(state): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Response {
    let store = StoreClient::new(&state);
    let result = conformance_statement();

    log_modality_message(&store, ModalityMessage {
        ae_title: ae_title_or_unknown(&headers),
        message_type: "Conformance".to_string(),
        request_payload: None,
        response_payload: Some(result.clone()),
        status_code: DICOM_STATUS_SUCCESS.to_string(),
        status_text: "Conformance served successfully".to_string(),
        reference: None,
    }).await;

    respond(StatusCode::OK, result)
}
