use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::error::AppError;

use crate::models::{AgendaError, AgendaQuery, UpdateStatusRequest};
use crate::services::AgendaStore;

fn map_agenda_error(e: AgendaError) -> AppError {
    match e {
        AgendaError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        AgendaError::MissingPhone => {
            AppError::BadRequest("Patient has no phone number".to_string())
        }
        AgendaError::NoSession => AppError::Auth("No active session".to_string()),
        AgendaError::DatabaseError(msg) => AppError::Database(msg),
    }
}

#[axum::debug_handler]
pub async fn get_agenda(
    State(store): State<Arc<AgendaStore>>,
    Query(query): Query<AgendaQuery>,
) -> Json<Value> {
    store.load(query.date).await;

    Json(json!({
        "appointments": store.appointments(),
        "loading": store.is_loading(),
    }))
}

#[axum::debug_handler]
pub async fn update_status(
    State(store): State<Arc<AgendaStore>>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    store
        .update_status(id, request.status)
        .await
        .map_err(map_agenda_error)?;

    Ok(Json(json!({ "appointments": store.appointments() })))
}

#[axum::debug_handler]
pub async fn send_reminder(
    State(store): State<Arc<AgendaStore>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    store.send_reminder(id).await.map_err(map_agenda_error)?;

    Ok(Json(json!({ "appointments": store.appointments() })))
}

#[axum::debug_handler]
pub async fn request_payment(
    State(store): State<Arc<AgendaStore>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    store.request_payment(id).await.map_err(map_agenda_error)?;

    Ok(Json(json!({ "appointments": store.appointments() })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(store): State<Arc<AgendaStore>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    store.cancel(id).await.map_err(map_agenda_error)?;

    Ok(Json(json!({ "appointments": store.appointments() })))
}
