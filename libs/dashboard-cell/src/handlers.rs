use std::sync::Arc;

use axum::{extract::State, Json};

use crate::models::KpiSnapshot;
use crate::services::DashboardKpiService;

#[axum::debug_handler]
pub async fn get_dashboard_kpis(
    State(service): State<Arc<DashboardKpiService>>,
) -> Json<KpiSnapshot> {
    Json(service.compute_daily_snapshot().await)
}
