// libs/scheduling-cell/tests/booking_test.rs
//
// Booking service against a mock store: the save is accepted or rejected
// as a whole.

use assert_matches::assert_matches;
use chrono::{NaiveDate, NaiveTime};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use scheduling_cell::models::{BookAppointmentRequest, SchedulingError};
use scheduling_cell::services::booking::BookingService;
use shared_config::AppConfig;

fn test_config(store_url: String) -> AppConfig {
    AppConfig {
        store_url,
        store_service_key: "test-key".to_string(),
        jwt_secret: "test-secret".to_string(),
        default_appointment_duration: 15,
        recurrence_scan_horizon_days: 1095,
    }
}

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn practitioner_id() -> Uuid {
    Uuid::parse_str("7f8d1a2e-3b4c-4d5e-8f90-123456789abc").unwrap()
}

fn booking_request(start: NaiveTime, end: NaiveTime) -> BookAppointmentRequest {
    BookAppointmentRequest {
        patient: Some(Uuid::new_v4()),
        practitioner: Some(practitioner_id()),
        service_unit: None,
        appointment_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        start_time: start,
        end_time: Some(end),
        duration_minutes: None,
        appointment_type: "Consultation".to_string(),
        notes: None,
    }
}

fn existing_booking_row() -> serde_json::Value {
    json!({
        "id": "550e8400-e29b-41d4-a716-446655440000",
        "patient": "650e8400-e29b-41d4-a716-446655440111",
        "practitioner": practitioner_id(),
        "service_unit": null,
        "appointment_date": "2025-01-01",
        "start_time": "09:00:00",
        "end_time": "09:30:00",
        "duration_minutes": 30,
        "status": "Scheduled",
        "appointment_type": "Consultation",
        "notes": null
    })
}

fn created_row(request: &BookAppointmentRequest) -> serde_json::Value {
    json!({
        "id": Uuid::new_v4(),
        "patient": request.patient,
        "practitioner": request.practitioner,
        "service_unit": request.service_unit,
        "appointment_date": request.appointment_date,
        "start_time": request.start_time,
        "end_time": request.end_time,
        "duration_minutes": 30,
        "status": "Scheduled",
        "appointment_type": request.appointment_type,
        "notes": null
    })
}

async fn mock_existing_appointments(server: &MockServer, rows: Vec<serde_json::Value>) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/patient_appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows))
        .mount(server)
        .await;
}

#[tokio::test]
async fn overlapping_practitioner_booking_is_rejected() {
    let mock_server = MockServer::start().await;
    mock_existing_appointments(&mock_server, vec![existing_booking_row()]).await;

    let config = test_config(mock_server.uri());
    let service = BookingService::new(&config);

    // 09:00-09:30 is taken; 09:15-09:45 collides.
    let result = service
        .book_appointment(booking_request(t(9, 15), t(9, 45)), None)
        .await;

    assert_matches!(result, Err(SchedulingError::Overlap(ids)) => {
        assert!(ids.contains("550e8400-e29b-41d4-a716-446655440000"));
    });
}

#[tokio::test]
async fn touching_booking_is_accepted() {
    let mock_server = MockServer::start().await;
    mock_existing_appointments(&mock_server, vec![existing_booking_row()]).await;

    let request = booking_request(t(9, 30), t(10, 0));

    Mock::given(method("POST"))
        .and(path("/rest/v1/patient_appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(vec![created_row(&request)]))
        .mount(&mock_server)
        .await;

    let config = test_config(mock_server.uri());
    let service = BookingService::new(&config);

    let appointment = service.book_appointment(request, None).await.unwrap();
    assert_eq!(appointment.start_time, t(9, 30));
}

#[tokio::test]
async fn booking_without_patient_is_rejected() {
    let mock_server = MockServer::start().await;
    let config = test_config(mock_server.uri());
    let service = BookingService::new(&config);

    let mut request = booking_request(t(9, 0), t(9, 30));
    request.patient = None;

    let result = service.book_appointment(request, None).await;
    assert_matches!(result, Err(SchedulingError::Mandatory(field)) => {
        assert_eq!(field, "patient");
    });
}

#[tokio::test]
async fn booking_without_any_scope_is_rejected() {
    let mock_server = MockServer::start().await;
    let config = test_config(mock_server.uri());
    let service = BookingService::new(&config);

    let mut request = booking_request(t(9, 0), t(9, 30));
    request.practitioner = None;
    request.service_unit = None;

    let result = service.book_appointment(request, None).await;
    assert_matches!(result, Err(SchedulingError::Mandatory(_)));
}

#[tokio::test]
async fn inverted_times_are_rejected() {
    let mock_server = MockServer::start().await;
    let config = test_config(mock_server.uri());
    let service = BookingService::new(&config);

    let result = service
        .book_appointment(booking_request(t(10, 0), t(9, 0)), None)
        .await;
    assert_matches!(result, Err(SchedulingError::Validation(_)));
}

#[tokio::test]
async fn unavailability_block_rejects_booking_inside_it() {
    let mock_server = MockServer::start().await;

    let block = json!({
        "id": "770e8400-e29b-41d4-a716-446655440222",
        "patient": null,
        "practitioner": practitioner_id(),
        "service_unit": null,
        "appointment_date": "2025-01-01",
        "start_time": "09:00:00",
        "end_time": "12:00:00",
        "duration_minutes": 180,
        "status": "Unavailable",
        "appointment_type": "Unavailable",
        "notes": null
    });
    mock_existing_appointments(&mock_server, vec![block]).await;

    let config = test_config(mock_server.uri());
    let service = BookingService::new(&config);

    let result = service
        .book_appointment(booking_request(t(10, 0), t(10, 30)), None)
        .await;

    assert_matches!(result, Err(SchedulingError::UnavailabilityBlock(ids)) => {
        assert!(ids.contains("770e8400-e29b-41d4-a716-446655440222"));
    });
}
