use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::get_dashboard_kpis;
use crate::services::DashboardKpiService;

pub fn create_dashboard_router(
    service: Arc<DashboardKpiService>,
    config: Arc<AppConfig>,
) -> Router {
    Router::new()
        .route("/kpis", get(get_dashboard_kpis))
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(service)
}
