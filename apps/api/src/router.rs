use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use recurrence_cell::router::recurrence_routes;
use recurrence_cell::services::queue::RecurrenceQueue;
use scheduling_cell::router::scheduling_routes;
use shared_config::AppConfig;
use worklist_cell::router::worklist_routes;

pub fn create_router(state: Arc<AppConfig>, recurrence_queue: RecurrenceQueue) -> Router {
    Router::new()
        .route("/", get(|| async { "Meridian Clinic API is running!" }))
        .nest("/appointments", scheduling_routes(state.clone()))
        .nest("/recurrences", recurrence_routes(state.clone(), recurrence_queue))
        .nest("/dicom-web", worklist_routes(state.clone()))
}
