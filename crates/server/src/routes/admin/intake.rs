//! Contact and appointment administration.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;

use tasfiya_core::{AppointmentId, AppointmentStatus, ContactId, ContactStatus};

use crate::error::Result;
use crate::extract::{ApiJson, ApiPath};
use crate::models::{Appointment, Contact};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StatusBody<T> {
    pub status: T,
}

/// GET /api/admin/contacts
pub async fn list_contacts(State(state): State<AppState>) -> Result<Json<Vec<Contact>>> {
    Ok(Json(state.storage().list_contacts().await?))
}

/// PATCH /api/admin/contacts/{id}/status
pub async fn update_contact(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ContactId>,
    ApiJson(body): ApiJson<StatusBody<ContactStatus>>,
) -> Result<Json<Contact>> {
    Ok(Json(
        state
            .storage()
            .update_contact_status(id, body.status)
            .await?,
    ))
}

/// DELETE /api/admin/contacts/{id}
pub async fn delete_contact(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ContactId>,
) -> Result<StatusCode> {
    state.storage().delete_contact(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/admin/appointments
pub async fn list_appointments(State(state): State<AppState>) -> Result<Json<Vec<Appointment>>> {
    Ok(Json(state.storage().list_appointments().await?))
}

/// PATCH /api/admin/appointments/{id}/status
pub async fn update_appointment(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<AppointmentId>,
    ApiJson(body): ApiJson<StatusBody<AppointmentStatus>>,
) -> Result<Json<Appointment>> {
    Ok(Json(
        state
            .storage()
            .update_appointment_status(id, body.status)
            .await?,
    ))
}

/// DELETE /api/admin/appointments/{id}
pub async fn delete_appointment(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<AppointmentId>,
) -> Result<StatusCode> {
    state.storage().delete_appointment(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
