// libs/worklist-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
};

use shared_config::AppConfig;

use crate::handlers;

/// DICOMWeb routes. AE authentication happens in the handlers so failures
/// render as DICOM status payloads rather than bare HTTP errors.
pub fn worklist_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/workitems", get(handlers::get_workitems).post(handlers::post_workitems))
        .route("/workitems/{uid}", put(handlers::update_workitem))
        .route("/workitems/{uid}/claim", post(handlers::claim_workitem))
        .route("/workitems/{uid}/cancelrequest", post(handlers::cancel_workitem))
        .route("/workitems/{uid}/workitemevent", post(handlers::workitem_event))
        .route("/echo", get(handlers::echo))
        .route("/conformance", get(handlers::conformance))
        .with_state(state)
}
