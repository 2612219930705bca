//! Contacts and appointments.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use tasfiya_core::{AppointmentId, AppointmentStatus, ContactId, ContactStatus, Email, Phone};

use super::PgStorage;
use crate::db::{IntakeRepository, RepositoryError};
use crate::models::{Appointment, Contact, NewAppointment, NewContact};

#[derive(sqlx::FromRow)]
struct ContactRow {
    id: ContactId,
    name: String,
    phone: Phone,
    email: Option<Email>,
    subject: String,
    message: String,
    status: ContactStatus,
    created_at: DateTime<Utc>,
}

impl From<ContactRow> for Contact {
    fn from(r: ContactRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            phone: r.phone,
            email: r.email,
            subject: r.subject,
            message: r.message,
            status: r.status,
            created_at: r.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AppointmentRow {
    id: AppointmentId,
    name: String,
    phone: Phone,
    date: NaiveDate,
    time_slot: String,
    notes: Option<String>,
    status: AppointmentStatus,
    created_at: DateTime<Utc>,
}

impl From<AppointmentRow> for Appointment {
    fn from(r: AppointmentRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            phone: r.phone,
            date: r.date,
            time_slot: r.time_slot,
            notes: r.notes,
            status: r.status,
            created_at: r.created_at,
        }
    }
}

#[async_trait]
impl IntakeRepository for PgStorage {
    async fn create_contact(&self, contact: NewContact) -> Result<Contact, RepositoryError> {
        let row: ContactRow = sqlx::query_as(
            r"
            INSERT INTO contacts (name, phone, email, subject, message)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, phone, email, subject, message, status, created_at
            ",
        )
        .bind(&contact.name)
        .bind(contact.phone.as_str())
        .bind(contact.email.as_ref().map(Email::as_str))
        .bind(&contact.subject)
        .bind(&contact.message)
        .fetch_one(self.pool())
        .await?;
        Ok(row.into())
    }

    async fn list_contacts(&self) -> Result<Vec<Contact>, RepositoryError> {
        let rows: Vec<ContactRow> = sqlx::query_as(
            r"
            SELECT id, name, phone, email, subject, message, status, created_at
            FROM contacts
            ORDER BY id DESC
            ",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn update_contact_status(
        &self,
        id: ContactId,
        status: ContactStatus,
    ) -> Result<Contact, RepositoryError> {
        let row: Option<ContactRow> = sqlx::query_as(
            r"
            UPDATE contacts SET status = $2
            WHERE id = $1
            RETURNING id, name, phone, email, subject, message, status, created_at
            ",
        )
        .bind(id.as_i32())
        .bind(status)
        .fetch_optional(self.pool())
        .await?;
        row.map(Into::into).ok_or(RepositoryError::NotFound)
    }

    async fn delete_contact(&self, id: ContactId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM contacts WHERE id = $1")
            .bind(id.as_i32())
            .execute(self.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn create_appointment(
        &self,
        appointment: NewAppointment,
        capacity: i64,
    ) -> Result<Appointment, RepositoryError> {
        let mut tx = self.pool().begin().await?;

        // No row exists to lock for an empty slot, so serialize on an
        // advisory lock scoped to the date and slot.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(format!(
                "appointment:{}:{}",
                appointment.date, appointment.time_slot
            ))
            .execute(&mut *tx)
            .await?;

        let booked: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*) FROM appointments
            WHERE date = $1 AND time_slot = $2 AND status <> $3
            ",
        )
        .bind(appointment.date)
        .bind(&appointment.time_slot)
        .bind(AppointmentStatus::Cancelled)
        .fetch_one(&mut *tx)
        .await?;
        if booked >= capacity {
            return Err(RepositoryError::Conflict(
                "this time slot is fully booked".to_owned(),
            ));
        }

        let row: AppointmentRow = sqlx::query_as(
            r"
            INSERT INTO appointments (name, phone, date, time_slot, notes)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, phone, date, time_slot, notes, status, created_at
            ",
        )
        .bind(&appointment.name)
        .bind(appointment.phone.as_str())
        .bind(appointment.date)
        .bind(&appointment.time_slot)
        .bind(appointment.notes.as_deref())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    async fn appointment_counts(
        &self,
        date: NaiveDate,
    ) -> Result<HashMap<String, i64>, RepositoryError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r"
            SELECT time_slot, COUNT(*) FROM appointments
            WHERE date = $1 AND status <> $2
            GROUP BY time_slot
            ",
        )
        .bind(date)
        .bind(AppointmentStatus::Cancelled)
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().collect())
    }

    async fn list_appointments(&self) -> Result<Vec<Appointment>, RepositoryError> {
        let rows: Vec<AppointmentRow> = sqlx::query_as(
            r"
            SELECT id, name, phone, date, time_slot, notes, status, created_at
            FROM appointments
            ORDER BY date, time_slot, id
            ",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn update_appointment_status(
        &self,
        id: AppointmentId,
        status: AppointmentStatus,
    ) -> Result<Appointment, RepositoryError> {
        let row: Option<AppointmentRow> = sqlx::query_as(
            r"
            UPDATE appointments SET status = $2
            WHERE id = $1
            RETURNING id, name, phone, date, time_slot, notes, status, created_at
            ",
        )
        .bind(id.as_i32())
        .bind(status)
        .fetch_optional(self.pool())
        .await?;
        row.map(Into::into).ok_or(RepositoryError::NotFound)
    }

    async fn delete_appointment(&self, id: AppointmentId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM appointments WHERE id = $1")
            .bind(id.as_i32())
            .execute(self.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
