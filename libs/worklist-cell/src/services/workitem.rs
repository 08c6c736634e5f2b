use std::sync::OnceLock;

use chrono::Utc;
use regex::Regex;
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, error, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::StoreClient;

use crate::models::{ModalityUpdate, WorkItem, WorkItemStatus, WorklistError};
use crate::services::tags::{
    dataset_string, filters_to_query, to_dicom_json, to_query_segments,
};

/// UUID-derived DICOM UID (the `2.25.<decimal-uuid>` form), minted when a
/// work-item reaches the wire without one.
pub fn generate_ups_instance_uid() -> String {
    format!("2.25.{}", Uuid::new_v4().as_u128())
}

/// A UPS instance UID is dotted-decimal with at least four components.
pub fn is_valid_ups_uid(uid: &str) -> bool {
    static UID_FORMAT: OnceLock<Regex> = OnceLock::new();
    let re = UID_FORMAT.get_or_init(|| {
        Regex::new(r"^\d+(\.\d+){3,}$").unwrap()
    });
    re.is_match(uid)
}

// ==============================================================================
// STATE MACHINE
// ==============================================================================

/// Claim guard: exactly one claim per work-item, first claimant wins.
pub fn validate_claim(status: WorkItemStatus, claimed_by: Option<&str>) -> Result<(), WorklistError> {
    match status {
        WorkItemStatus::InProgress => Err(WorklistError::AlreadyInProgress),
        WorkItemStatus::Completed => Err(WorklistError::AlreadyCompleted),
        WorkItemStatus::Cancelled => Err(WorklistError::Processing(
            "UPS work-item is cancelled".to_string(),
        )),
        WorkItemStatus::Scheduled => match claimed_by {
            Some(claimant) => Err(WorklistError::AlreadyClaimed(claimant.to_string())),
            None => Ok(()),
        },
    }
}

/// Workitem-event statuses a modality may report.
pub fn parse_event_status(value: &str) -> Result<WorkItemStatus, WorklistError> {
    match value {
        "In Progress" => Ok(WorkItemStatus::InProgress),
        "Completed" => Ok(WorkItemStatus::Completed),
        other => Err(WorklistError::InvalidAttribute(format!(
            "invalid workitem status: {}",
            other
        ))),
    }
}

// ==============================================================================
// STORE-BACKED SERVICE
// ==============================================================================

pub struct WorkitemService {
    store: StoreClient,
}

impl WorkitemService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: StoreClient::new(config),
        }
    }

    /// Return the DICOM+JSON worklist for a filter dictionary. Entries that
    /// cannot be encoded are logged and skipped; entries without a UPS
    /// instance UID get one minted and persisted on the way out.
    pub async fn list(&self, filters: &Map<String, Value>) -> Result<Vec<Value>, WorklistError> {
        let query = filters_to_query(filters);
        let segments = to_query_segments(&query);
        let path = format!("/rest/v1/imaging_worklist?{}", segments.join("&"));

        let rows: Vec<Value> = self.store.request(
            Method::GET,
            &path,
            None,
            None,
        ).await.map_err(|e| WorklistError::Processing(e.to_string()))?;

        let items: Vec<WorkItem> = rows.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<WorkItem>, _>>()
            .map_err(|e| WorklistError::Processing(format!("Failed to parse worklist: {}", e)))?;

        let mut datasets = Vec::with_capacity(items.len());
        for mut item in items {
            if item.ups_instance_uid.is_none() {
                let uid = generate_ups_instance_uid();
                if let Err(e) = self.store.set_values(
                    "imaging_worklist",
                    &format!("id=eq.{}", item.id),
                    None,
                    json!({ "ups_instance_uid": uid.clone() }),
                ).await {
                    warn!("Failed to persist generated UPS UID for {}: {}", item.id, e);
                }
                item.ups_instance_uid = Some(uid);
            }

            match to_dicom_json(&item) {
                Ok(dataset) => datasets.push(dataset),
                Err(e) => {
                    error!(
                        "Worklist encoding failed for {}: {}",
                        item.ups_instance_uid.as_deref().unwrap_or("<no uid>"),
                        e
                    );
                }
            }
        }

        Ok(datasets)
    }

    /// Claim a Scheduled work-item for a modality. Racing claims beyond the
    /// first fail loudly instead of silently overwriting the claimant. A
    /// claim against an unknown UID creates the work-item (N-CREATE).
    pub async fn claim(
        &self,
        uid: &str,
        dataset: &Value,
        ae_title: &str,
    ) -> Result<Value, WorklistError> {
        let item = self.get_or_create(uid).await?;

        validate_claim(item.status, item.claimed_by.as_deref())?;

        let claimed_by = dataset_string(dataset, "00400241")
            .unwrap_or_else(|| ae_title.to_string());
        let study_instance_uid = dataset_string(dataset, "0020000D");

        self.store.set_values(
            "imaging_worklist",
            &format!("id=eq.{}", item.id),
            None,
            json!({
                "status": WorkItemStatus::InProgress.to_string(),
                "claimed_by": claimed_by,
                "study_instance_uid": study_instance_uid,
                "n_create": dataset,
            }),
        ).await.map_err(|e| WorklistError::Processing(e.to_string()))?;

        debug!("Work-item {} claimed by {}", uid, ae_title);

        Ok(json!({ "Status": "Claimed", "UPSInstanceUID": uid }))
    }

    /// Cancel request: any state moves to Cancelled.
    pub async fn cancel(
        &self,
        uid: &str,
        dataset: &Value,
        ae_title: &str,
    ) -> Result<Value, WorklistError> {
        let item = self.resolve(uid).await?.ok_or(WorklistError::NotFound)?;

        self.store.set_values(
            "imaging_worklist",
            &format!("id=eq.{}", item.id),
            None,
            json!({
                "status": WorkItemStatus::Cancelled.to_string(),
                "cancelled_by": ae_title,
                "n_cancel": dataset,
            }),
        ).await.map_err(|e| WorklistError::Processing(e.to_string()))?;

        Ok(json!({ "Status": "Cancelled", "UPSInstanceUID": uid }))
    }

    /// N-SET / workitem event from the modality. Completion with a study
    /// UID closes the linked patient appointment.
    pub async fn workitem_event(
        &self,
        uid: &str,
        dataset: &Value,
        ae_title: &str,
    ) -> Result<Value, WorklistError> {
        let item = self.resolve(uid).await?.ok_or(WorklistError::NotFound)?;

        let reported = dataset
            .get("Status")
            .and_then(Value::as_str)
            .unwrap_or("Completed");
        let new_status = parse_event_status(reported)?;

        let study_instance_uid = dataset_string(dataset, "0020000D")
            .or_else(|| item.study_instance_uid.clone());

        self.store.set_values(
            "imaging_worklist",
            &format!("id=eq.{}", item.id),
            None,
            json!({
                "status": new_status.to_string(),
                "station_ae": ae_title,
                "study_instance_uid": study_instance_uid.clone(),
                "n_set": dataset,
            }),
        ).await.map_err(|e| WorklistError::Processing(e.to_string()))?;

        if new_status == WorkItemStatus::Completed && study_instance_uid.is_some() {
            self.close_linked_appointment(&item).await;
        }

        Ok(json!({ "Status": new_status.to_string(), "UPSInstanceUID": uid }))
    }

    /// Modality update through the allow-listed field map.
    pub async fn modality_update(
        &self,
        uid: &str,
        update: &ModalityUpdate,
    ) -> Result<Value, WorklistError> {
        let item = self.resolve(uid).await?.ok_or(WorklistError::NotFound)?;

        if update.is_empty() {
            return Err(WorklistError::InvalidAttribute(
                "no updatable attributes in payload".to_string(),
            ));
        }

        self.store.set_values(
            "imaging_worklist",
            &format!("id=eq.{}", item.id),
            None,
            update.to_patch(),
        ).await.map_err(|e| WorklistError::Processing(e.to_string()))?;

        Ok(json!({ "Status": "Updated", "UPSInstanceUID": uid }))
    }

    pub async fn exists(&self, uid: &str) -> Result<bool, WorklistError> {
        Ok(self.resolve(uid).await?.is_some())
    }

    /// Look a work-item up by UPS instance UID, accession number, or study
    /// instance UID.
    pub async fn resolve(&self, id: &str) -> Result<Option<WorkItem>, WorklistError> {
        let path = format!(
            "/rest/v1/imaging_worklist?or=(ups_instance_uid.eq.{id},accession_number.eq.{id},study_instance_uid.eq.{id})",
            id = id
        );

        let rows: Vec<Value> = self.store.request(
            Method::GET,
            &path,
            None,
            None,
        ).await.map_err(|e| WorklistError::Processing(e.to_string()))?;

        rows.into_iter()
            .next()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| WorklistError::Processing(format!("Failed to parse work-item: {}", e)))
    }

    async fn get_or_create(&self, uid: &str) -> Result<WorkItem, WorklistError> {
        if let Some(item) = self.resolve(uid).await? {
            return Ok(item);
        }

        let created = self.store.insert_returning(
            "imaging_worklist",
            None,
            json!({
                "id": Uuid::new_v4(),
                "ups_instance_uid": uid,
                "status": WorkItemStatus::Scheduled.to_string(),
                "created_at": Utc::now().to_rfc3339(),
            }),
        ).await.map_err(|e| WorklistError::Processing(e.to_string()))?;

        warn!("Work-item {} did not exist, created a new one", uid);

        serde_json::from_value(created)
            .map_err(|e| WorklistError::Processing(format!("Failed to parse work-item: {}", e)))
    }

    /// Best-effort: a failed close is logged, never surfaced to the
    /// modality.
    async fn close_linked_appointment(&self, item: &WorkItem) {
        let appointment = match item.appointment {
            Some(appointment) => appointment,
            None => return,
        };

        let result = self.store.set_values(
            "patient_appointments",
            &format!("id=eq.{}", appointment),
            None,
            json!({ "status": "Closed" }),
        ).await;

        match result {
            Ok(()) => debug!("Closed appointment {} after work-item completion", appointment),
            Err(e) => warn!("Failed to close appointment {}: {}", appointment, e),
        }
    }
}
