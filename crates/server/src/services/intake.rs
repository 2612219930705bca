//! Contact messages and appointment booking.

use chrono::{NaiveDate, Utc};

use tasfiya_core::NotificationKind;

use crate::error::{AppError, Result};
use crate::models::intake::{is_open_day, parse_slot};
use crate::models::setting::{DEFAULT_APPOINTMENT_SLOTS, keys};
use crate::models::{Appointment, Contact, NewAppointment, NewContact, SettingsSnapshot, SlotAvailability};
use crate::state::AppState;

/// Slots, capacity and closed days as currently configured.
struct Schedule {
    slots: Vec<String>,
    capacity: i64,
    closed_days: Vec<String>,
}

impl Schedule {
    fn from_settings(settings: &SettingsSnapshot) -> Self {
        let default_slots: Vec<String> = DEFAULT_APPOINTMENT_SLOTS
            .iter()
            .map(|s| (*s).to_owned())
            .collect();
        let mut slots: Vec<String> = settings
            .get_json::<Vec<String>>(keys::APPOINTMENT_SLOTS, default_slots)
            .iter()
            .filter_map(|s| parse_slot(s))
            .collect();
        slots.sort();
        slots.dedup();
        Self {
            slots,
            capacity: settings.get_i64(keys::APPOINTMENT_SLOT_CAPACITY, 1).max(0),
            closed_days: settings.get_json(keys::APPOINTMENT_CLOSED_DAYS, Vec::new()),
        }
    }

    fn offers(&self, date: NaiveDate, today: NaiveDate, slot: &str) -> bool {
        is_open_day(date, today, &self.closed_days) && self.slots.iter().any(|s| s == slot)
    }
}

pub struct IntakeService<'a> {
    state: &'a AppState,
}

impl<'a> IntakeService<'a> {
    #[must_use]
    pub const fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Store a contact message and tell the administrators.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for blank or oversized fields.
    pub async fn submit_contact(&self, contact: NewContact) -> Result<Contact> {
        let contact = contact.normalized().map_err(AppError::BadRequest)?;
        let stored = self.state.storage().create_contact(contact).await?;
        tracing::info!(contact_id = %stored.id, "Contact message received");

        let subject = if stored.subject.is_empty() {
            "(no subject)"
        } else {
            stored.subject.as_str()
        };
        self.state
            .notifier()
            .notify_admins_logged(
                NotificationKind::NewContact,
                &format!("New message from {}", stored.name),
                subject,
                Some("/admin/contacts"),
            )
            .await;
        Ok(stored)
    }

    /// Remaining capacity per slot on `date`. Past and closed days have none.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` on storage failure.
    pub async fn availability(&self, date: NaiveDate) -> Result<Vec<SlotAvailability>> {
        let schedule = Schedule::from_settings(&*self.state.settings_snapshot().await?);
        let today = Utc::now().date_naive();
        if !is_open_day(date, today, &schedule.closed_days) {
            return Ok(Vec::new());
        }
        let booked = self.state.storage().appointment_counts(date).await?;
        Ok(schedule
            .slots
            .iter()
            .map(|slot| SlotAvailability {
                time_slot: slot.clone(),
                remaining: (schedule.capacity - booked.get(slot).copied().unwrap_or(0)).max(0),
            })
            .collect())
    }

    /// Book an appointment if the slot is offered and has room.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for a slot that is not offered on that
    /// date and `AppError::Database(Conflict)` when it is full.
    pub async fn book(&self, appointment: NewAppointment) -> Result<Appointment> {
        let appointment = appointment.normalized().map_err(AppError::BadRequest)?;
        let schedule = Schedule::from_settings(&*self.state.settings_snapshot().await?);
        if !schedule.offers(appointment.date, Utc::now().date_naive(), &appointment.time_slot) {
            return Err(AppError::BadRequest(format!(
                "{} at {} is not available for booking",
                appointment.date, appointment.time_slot
            )));
        }

        let stored = self
            .state
            .storage()
            .create_appointment(appointment, schedule.capacity)
            .await?;
        tracing::info!(
            appointment_id = %stored.id,
            date = %stored.date,
            slot = %stored.time_slot,
            "Appointment booked"
        );

        self.state
            .notifier()
            .notify_admins_logged(
                NotificationKind::NewAppointment,
                &format!("New appointment: {}", stored.name),
                &format!("{} at {}", stored.date, stored.time_slot),
                Some("/admin/appointments"),
            )
            .await;
        Ok(stored)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Datelike, Duration};
    use tasfiya_core::{Phone, SettingType, UserRole};

    use super::*;
    use crate::db::{NotificationRepository, RepositoryError, SettingsRepository};
    use crate::services::testing;

    fn booking(date: NaiveDate, slot: &str) -> NewAppointment {
        NewAppointment {
            name: "Huda".to_owned(),
            phone: Phone::parse("0509876543").unwrap(),
            date,
            time_slot: slot.to_owned(),
            notes: None,
        }
    }

    fn tomorrow() -> NaiveDate {
        Utc::now().date_naive() + Duration::days(1)
    }

    #[tokio::test]
    async fn test_full_slot_rejects_booking() {
        let state = testing::state();
        let admin = testing::user(&state, "0500000001", UserRole::Admin).await;
        let service = IntakeService::new(&state);
        let date = tomorrow();

        service.book(booking(date, "10:00")).await.unwrap();
        assert!(matches!(
            service.book(booking(date, "10:00")).await,
            Err(AppError::Database(RepositoryError::Conflict(_)))
        ));

        let slots = service.availability(date).await.unwrap();
        let ten = slots.iter().find(|s| s.time_slot == "10:00").unwrap();
        assert_eq!(ten.remaining, 0);
        assert_eq!(slots.len(), DEFAULT_APPOINTMENT_SLOTS.len());
        assert_eq!(state.storage().unread_count(admin).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unoffered_slot_and_past_dates() {
        let state = testing::state();
        let service = IntakeService::new(&state);

        assert!(matches!(
            service.book(booking(tomorrow(), "09:30")).await,
            Err(AppError::BadRequest(_))
        ));
        let yesterday = Utc::now().date_naive() - Duration::days(1);
        assert!(service.availability(yesterday).await.unwrap().is_empty());
        assert!(matches!(
            service.book(booking(yesterday, "10:00")).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_closed_days_and_custom_slots() {
        let state = testing::state();
        let date = tomorrow();
        let closed = crate::models::intake::weekday_name(date.weekday());
        let storage = state.storage();
        storage
            .upsert_setting(
                keys::APPOINTMENT_CLOSED_DAYS,
                &format!("[\"{closed}\"]"),
                "appointments",
                SettingType::Json,
            )
            .await
            .unwrap();
        storage
            .upsert_setting(
                keys::APPOINTMENT_SLOTS,
                r#"["18:30","9:00","bogus"]"#,
                "appointments",
                SettingType::Json,
            )
            .await
            .unwrap();
        storage
            .upsert_setting(
                keys::APPOINTMENT_SLOT_CAPACITY,
                "2",
                "appointments",
                SettingType::Number,
            )
            .await
            .unwrap();

        let service = IntakeService::new(&state);
        assert!(service.availability(date).await.unwrap().is_empty());

        let open_day = date + Duration::days(1);
        let slots = service.availability(open_day).await.unwrap();
        assert_eq!(
            slots,
            vec![
                SlotAvailability {
                    time_slot: "09:00".to_owned(),
                    remaining: 2
                },
                SlotAvailability {
                    time_slot: "18:30".to_owned(),
                    remaining: 2
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_contact_notifies_admins() {
        let state = testing::state();
        let admin = testing::user(&state, "0500000001", UserRole::Admin).await;
        let contact = IntakeService::new(&state)
            .submit_contact(NewContact {
                name: " Khaled ".to_owned(),
                phone: Phone::parse("0501112222").unwrap(),
                email: None,
                subject: "Bulk order".to_owned(),
                message: "Do you sell pallets?".to_owned(),
            })
            .await
            .unwrap();
        assert_eq!(contact.name, "Khaled");
        let notes = state.storage().list_notifications(admin, 10).await.unwrap();
        assert_eq!(notes.first().unwrap().kind, NotificationKind::NewContact);
    }
}
