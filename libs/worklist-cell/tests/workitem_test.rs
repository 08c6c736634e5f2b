// libs/worklist-cell/tests/workitem_test.rs
//
// Work-item state machine guards and the store-backed worklist query,
// exercised against a mock store.

use assert_matches::assert_matches;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared_config::AppConfig;
use worklist_cell::models::{WorkItemStatus, WorklistError};
use worklist_cell::services::workitem::{
    generate_ups_instance_uid, is_valid_ups_uid, parse_event_status, validate_claim,
    WorkitemService,
};

// ==============================================================================
// STATE MACHINE GUARDS
// ==============================================================================

#[test]
fn unclaimed_scheduled_item_can_be_claimed() {
    assert!(validate_claim(WorkItemStatus::Scheduled, None).is_ok());
}

#[test]
fn claiming_an_in_progress_item_fails_loudly() {
    let result = validate_claim(WorkItemStatus::InProgress, Some("CT01"));
    assert_matches!(result, Err(WorklistError::AlreadyInProgress));
}

#[test]
fn racing_claim_against_existing_claimant_is_rejected() {
    // Scheduled but already carrying a claimant: first claimant wins.
    let result = validate_claim(WorkItemStatus::Scheduled, Some("CT01"));
    assert_matches!(result, Err(WorklistError::AlreadyClaimed(claimant)) => {
        assert_eq!(claimant, "CT01");
    });
}

#[test]
fn completed_and_cancelled_items_cannot_be_claimed() {
    assert_matches!(
        validate_claim(WorkItemStatus::Completed, None),
        Err(WorklistError::AlreadyCompleted)
    );
    assert_matches!(
        validate_claim(WorkItemStatus::Cancelled, None),
        Err(WorklistError::Processing(_))
    );
}

#[test]
fn claim_conflicts_carry_their_dicom_codes() {
    assert_eq!(
        validate_claim(WorkItemStatus::Scheduled, Some("CT01")).unwrap_err().dicom_status(),
        "C301H"
    );
    assert_eq!(
        validate_claim(WorkItemStatus::InProgress, None).unwrap_err().dicom_status(),
        "C303H"
    );
    assert_eq!(
        validate_claim(WorkItemStatus::Completed, None).unwrap_err().dicom_status(),
        "C304H"
    );
}

#[test]
fn workitem_events_accept_only_progress_and_completion() {
    assert_eq!(parse_event_status("In Progress").unwrap(), WorkItemStatus::InProgress);
    assert_eq!(parse_event_status("Completed").unwrap(), WorkItemStatus::Completed);
    assert_matches!(parse_event_status("Scheduled"), Err(WorklistError::InvalidAttribute(_)));
    assert_matches!(parse_event_status("Paused"), Err(WorklistError::InvalidAttribute(_)));
}

// ==============================================================================
// UID FORMAT
// ==============================================================================

#[test]
fn generated_uids_are_valid_dicom_uids() {
    let uid = generate_ups_instance_uid();
    assert!(uid.starts_with("2.25."));
    assert!(is_valid_ups_uid(&uid));
}

#[test]
fn uid_validation_requires_dotted_decimal_form() {
    assert!(is_valid_ups_uid("1.2.840.10008.5.1.4.34.5"));
    assert!(!is_valid_ups_uid("not-a-uid"));
    assert!(!is_valid_ups_uid("1.2.840"));
    assert!(!is_valid_ups_uid(""));
    assert!(!is_valid_ups_uid("1.2.840.10008x"));
}

// ==============================================================================
// WORKLIST QUERY AGAINST A MOCK STORE
// ==============================================================================

fn test_config(store_url: String) -> AppConfig {
    AppConfig {
        store_url,
        store_service_key: "test-key".to_string(),
        jwt_secret: "test-secret".to_string(),
        default_appointment_duration: 15,
        recurrence_scan_horizon_days: 1095,
    }
}

fn worklist_row() -> serde_json::Value {
    json!({
        "id": "550e8400-e29b-41d4-a716-446655440000",
        "accession_number": "ACC-0042",
        "appointment": null,
        "ups_instance_uid": "2.25.329800735698586629295641978511506172918",
        "patient": "PAT 001",
        "patient_name": "Jane Doe",
        "gender": "female",
        "date_of_birth": "1990-04-01",
        "procedure_code": "CT-CHEST",
        "scheduled_date": "2025-06-02",
        "scheduled_time": "10:30:00",
        "modality": "CT",
        "station_ae": "CT01",
        "status": "Scheduled",
        "study_instance_uid": null,
        "claimed_by": null,
        "cancelled_by": null
    })
}

#[tokio::test]
async fn list_returns_dicom_datasets_for_matching_rows() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/imaging_worklist"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![worklist_row()]))
        .mount(&mock_server)
        .await;

    let config = test_config(mock_server.uri());
    let service = WorkitemService::new(&config);

    let datasets = service.list(&serde_json::Map::new()).await.unwrap();
    assert_eq!(datasets.len(), 1);
    assert_eq!(datasets[0]["00100010"]["Value"][0], "Jane^Doe");
    assert_eq!(datasets[0]["00080050"]["Value"][0], "ACC-0042");
}

#[tokio::test]
async fn list_skips_rows_that_cannot_be_encoded() {
    let mock_server = MockServer::start().await;

    let mut incomplete = worklist_row();
    incomplete["patient_name"] = serde_json::Value::Null;
    incomplete["id"] = json!("660e8400-e29b-41d4-a716-446655440001");

    Mock::given(method("GET"))
        .and(path("/rest/v1/imaging_worklist"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![worklist_row(), incomplete]))
        .mount(&mock_server)
        .await;

    let config = test_config(mock_server.uri());
    let service = WorkitemService::new(&config);

    let datasets = service.list(&serde_json::Map::new()).await.unwrap();
    assert_eq!(datasets.len(), 1);
}

#[tokio::test]
async fn resolve_returns_none_for_unknown_id() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/imaging_worklist"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<serde_json::Value>::new()))
        .mount(&mock_server)
        .await;

    let config = test_config(mock_server.uri());
    let service = WorkitemService::new(&config);

    let item = service.resolve("1.2.840.10008.1.1").await.unwrap();
    assert!(item.is_none());
}
