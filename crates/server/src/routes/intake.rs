//! Contact form and appointment booking.

use axum::{Json, extract::State, http::StatusCode};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::Result;
use crate::extract::{ApiJson, ApiQuery};
use crate::models::{Appointment, Contact, NewAppointment, NewContact, SlotAvailability};
use crate::services::intake::IntakeService;
use crate::state::AppState;

/// POST /api/contact
pub async fn contact(
    State(state): State<AppState>,
    ApiJson(contact): ApiJson<NewContact>,
) -> Result<(StatusCode, Json<Contact>)> {
    let contact = IntakeService::new(&state).submit_contact(contact).await?;
    Ok((StatusCode::CREATED, Json(contact)))
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub date: NaiveDate,
}

/// GET /api/appointments/availability?date=YYYY-MM-DD
pub async fn availability(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<AvailabilityQuery>,
) -> Result<Json<Vec<SlotAvailability>>> {
    Ok(Json(
        IntakeService::new(&state).availability(query.date).await?,
    ))
}

/// POST /api/appointments
pub async fn book(
    State(state): State<AppState>,
    ApiJson(appointment): ApiJson<NewAppointment>,
) -> Result<(StatusCode, Json<Appointment>)> {
    let appointment = IntakeService::new(&state).book(appointment).await?;
    Ok((StatusCode::CREATED, Json(appointment)))
}
