// libs/recurrence-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    routing::post,
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::queue::RecurrenceQueue;

#[derive(Clone)]
pub struct RecurrenceState {
    pub config: Arc<AppConfig>,
    pub queue: RecurrenceQueue,
}

pub fn recurrence_routes(config: Arc<AppConfig>, queue: RecurrenceQueue) -> Router {
    let state = RecurrenceState {
        config: config.clone(),
        queue,
    };

    let protected_routes = Router::new()
        .route("/dates", post(handlers::get_recurring_appointment_dates))
        .route("/book", post(handlers::create_recurring_appointments))
        .layer(middleware::from_fn_with_state(config, auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
