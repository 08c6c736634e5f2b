//! Modality message log. Logging failures degrade gracefully and never
//! block the primary transaction.

use chrono::Utc;
use serde_json::json;
use tracing::warn;

use shared_database::StoreClient;

use crate::models::ModalityMessage;

pub async fn log_modality_message(store: &StoreClient, message: ModalityMessage) {
    let body = json!({
        "ae_title": message.ae_title,
        "message_type": message.message_type,
        "request_payload": message.request_payload,
        "response_payload": message.response_payload,
        "status_code": message.status_code,
        "status_text": message.status_text,
        "reference": message.reference,
        "logged_at": Utc::now().to_rfc3339(),
    });

    if let Err(e) = store.insert_returning("modality_message_logs", None, body).await {
        warn!("Failed to write modality message log: {}", e);
    }
}
