use std::sync::Arc;

use axum::{routing::get, Router};

use agenda_cell::router::create_agenda_router;
use agenda_cell::services::{AgendaStore, TracingLinkOpener};
use dashboard_cell::router::create_dashboard_router;
use dashboard_cell::services::DashboardKpiService;
use shared_config::AppConfig;
use shared_models::auth::SessionProvider;
use shared_models::notify::{Notifier, TracingNotifier};
use shared_utils::session::TokenSessionProvider;

pub fn create_router(config: Arc<AppConfig>) -> Router {
    let session: Arc<dyn SessionProvider> = Arc::new(TokenSessionProvider::new(&config));
    let notifier: Arc<dyn Notifier> = Arc::new(TracingNotifier);
    let links = Arc::new(TracingLinkOpener);

    // One store per served agenda view; the backend remains the source of
    // truth for durable data.
    let store = Arc::new(AgendaStore::new(
        &config,
        session.clone(),
        notifier,
        links,
    ));
    let kpis = Arc::new(DashboardKpiService::new(&config, session));

    Router::new()
        .route("/", get(|| async { "Clinic Agenda API is running!" }))
        .nest("/agenda", create_agenda_router(store, config.clone()))
        .nest("/dashboard", create_dashboard_router(kpis, config.clone()))
}
