use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::*;
use crate::services::AgendaStore;

pub fn create_agenda_router(store: Arc<AgendaStore>, config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(get_agenda))
        .route("/{id}/status", put(update_status))
        .route("/{id}/reminder", post(send_reminder))
        .route("/{id}/payment-request", post(request_payment))
        .route("/{id}/cancel", post(cancel_appointment))
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(store)
}
