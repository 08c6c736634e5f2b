// libs/worklist-cell/src/models.rs
use chrono::{NaiveDate, NaiveTime};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use std::fmt;

// ==============================================================================
// UPS WORK-ITEM
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum WorkItemStatus {
    Scheduled,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
    Cancelled,
}

impl fmt::Display for WorkItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WorkItemStatus::Scheduled => "Scheduled",
            WorkItemStatus::InProgress => "In Progress",
            WorkItemStatus::Completed => "Completed",
            WorkItemStatus::Cancelled => "Cancelled",
        };
        write!(f, "{}", label)
    }
}

/// A modality worklist entry backing one imaging appointment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: Uuid,
    pub accession_number: Option<String>,
    pub appointment: Option<Uuid>,
    pub ups_instance_uid: Option<String>,
    pub patient: Option<String>,
    pub patient_name: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub procedure_code: Option<String>,
    pub scheduled_date: Option<NaiveDate>,
    pub scheduled_time: Option<NaiveTime>,
    pub modality: Option<String>,
    pub station_ae: Option<String>,
    pub status: WorkItemStatus,
    pub study_instance_uid: Option<String>,
    pub claimed_by: Option<String>,
    pub cancelled_by: Option<String>,
}

/// Allow-listed modality update payload. Anything outside these fields is
/// dropped at deserialization instead of being applied to the record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModalityUpdate {
    pub scheduled_date: Option<NaiveDate>,
    pub scheduled_time: Option<NaiveTime>,
    pub modality: Option<String>,
    pub station_ae: Option<String>,
    pub procedure_code: Option<String>,
    pub study_instance_uid: Option<String>,
}

impl ModalityUpdate {
    /// The subset of present fields as a store patch.
    pub fn to_patch(&self) -> Value {
        let mut patch = serde_json::Map::new();
        if let Some(date) = self.scheduled_date {
            patch.insert("scheduled_date".into(), Value::String(date.to_string()));
        }
        if let Some(time) = self.scheduled_time {
            patch.insert("scheduled_time".into(), Value::String(time.to_string()));
        }
        if let Some(ref modality) = self.modality {
            patch.insert("modality".into(), Value::String(modality.clone()));
        }
        if let Some(ref station) = self.station_ae {
            patch.insert("station_ae".into(), Value::String(station.clone()));
        }
        if let Some(ref code) = self.procedure_code {
            patch.insert("procedure_code".into(), Value::String(code.clone()));
        }
        if let Some(ref uid) = self.study_instance_uid {
            patch.insert("study_instance_uid".into(), Value::String(uid.clone()));
        }
        Value::Object(patch)
    }

    pub fn is_empty(&self) -> bool {
        self.to_patch().as_object().map_or(true, |m| m.is_empty())
    }
}

// ==============================================================================
// MESSAGE LOG
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModalityMessage {
    pub ae_title: String,
    pub message_type: String,
    pub request_payload: Option<Value>,
    pub response_payload: Option<Value>,
    pub status_code: String,
    pub status_text: String,
    pub reference: Option<String>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum WorklistError {
    #[error("UPS task not found")]
    NotFound,

    #[error("UPS work-item already claimed by {0}")]
    AlreadyClaimed(String),

    #[error("UPS work-item already in progress")]
    AlreadyInProgress,

    #[error("UPS work-item already completed")]
    AlreadyCompleted,

    #[error("Invalid attribute value: {0}")]
    InvalidAttribute(String),

    #[error("Missing attribute: {0}")]
    MissingAttribute(String),

    #[error("Unauthorized modality AE: {0}")]
    Unauthorized(String),

    #[error("Processing failure: {0}")]
    Processing(String),
}

impl WorklistError {
    /// DICOM status code embedded in the response payload.
    pub fn dicom_status(&self) -> &'static str {
        match self {
            WorklistError::NotFound => "0112H",
            WorklistError::AlreadyClaimed(_) => "C301H",
            WorklistError::AlreadyInProgress => "C303H",
            WorklistError::AlreadyCompleted => "C304H",
            WorklistError::InvalidAttribute(_) => "0107H",
            WorklistError::MissingAttribute(_) => "0120H",
            WorklistError::Unauthorized(_) => "0110H",
            WorklistError::Processing(_) => "0110H",
        }
    }

    pub fn http_status(&self) -> StatusCode {
        match self {
            WorklistError::NotFound => StatusCode::NOT_FOUND,
            WorklistError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

pub const DICOM_STATUS_SUCCESS: &str = "0000H";
