//! Contact requests and appointment bookings from the public site.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

use tasfiya_core::{AppointmentId, AppointmentStatus, ContactId, ContactStatus, Email, Phone};

const MAX_NAME_LENGTH: usize = 200;
const MAX_SUBJECT_LENGTH: usize = 200;
const MAX_MESSAGE_LENGTH: usize = 5000;
const MAX_NOTES_LENGTH: usize = 1000;

/// A message left through the contact form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: ContactId,
    pub name: String,
    pub phone: Phone,
    pub email: Option<Email>,
    pub subject: String,
    pub message: String,
    pub status: ContactStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewContact {
    pub name: String,
    pub phone: Phone,
    pub email: Option<Email>,
    #[serde(default)]
    pub subject: String,
    pub message: String,
}

impl NewContact {
    /// # Errors
    ///
    /// Returns a message for the first blank or oversized field.
    pub fn normalized(self) -> Result<Self, String> {
        let name = bounded("name", &self.name, MAX_NAME_LENGTH, true)?;
        let subject = bounded("subject", &self.subject, MAX_SUBJECT_LENGTH, false)?;
        let message = bounded("message", &self.message, MAX_MESSAGE_LENGTH, true)?;
        Ok(Self {
            name,
            subject,
            message,
            ..self
        })
    }
}

/// A booked visit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: AppointmentId,
    pub name: String,
    pub phone: Phone,
    pub date: NaiveDate,
    /// `HH:MM`, one of the configured slots.
    pub time_slot: String,
    pub notes: Option<String>,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAppointment {
    pub name: String,
    pub phone: Phone,
    pub date: NaiveDate,
    pub time_slot: String,
    pub notes: Option<String>,
}

impl NewAppointment {
    /// # Errors
    ///
    /// Returns a message for a blank name, malformed slot or oversized notes.
    pub fn normalized(self) -> Result<Self, String> {
        let name = bounded("name", &self.name, MAX_NAME_LENGTH, true)?;
        let time_slot = parse_slot(&self.time_slot)
            .ok_or_else(|| format!("invalid time slot: {}", self.time_slot.trim()))?;
        let notes = match self.notes {
            Some(n) => Some(bounded("notes", &n, MAX_NOTES_LENGTH, false)?).filter(|n| !n.is_empty()),
            None => None,
        };
        Ok(Self {
            name,
            time_slot,
            notes,
            ..self
        })
    }
}

/// Remaining capacity of one slot on one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotAvailability {
    pub time_slot: String,
    pub remaining: i64,
}

/// Normalize an `H:MM` / `HH:MM` slot to `HH:MM`.
#[must_use]
pub fn parse_slot(raw: &str) -> Option<String> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .ok()
        .map(|t| t.format("%H:%M").to_string())
}

/// Lower-case English weekday name, as used by `appointment_closed_days`.
#[must_use]
pub const fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

/// Whether bookings are accepted on `date` at all.
#[must_use]
pub fn is_open_day(date: NaiveDate, today: NaiveDate, closed_days: &[String]) -> bool {
    date >= today
        && !closed_days
            .iter()
            .any(|d| d.trim().eq_ignore_ascii_case(weekday_name(date.weekday())))
}

fn bounded(field: &str, value: &str, max: usize, required: bool) -> Result<String, String> {
    let value = value.trim();
    if required && value.is_empty() {
        return Err(format!("{field} is required"));
    }
    if value.chars().count() > max {
        return Err(format!("{field} must be at most {max} characters"));
    }
    Ok(value.to_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_slot() {
        assert_eq!(parse_slot("9:00").as_deref(), Some("09:00"));
        assert_eq!(parse_slot(" 14:30 ").as_deref(), Some("14:30"));
        assert_eq!(parse_slot("25:00"), None);
        assert_eq!(parse_slot("noon"), None);
    }

    #[test]
    fn test_open_day() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 15).unwrap();
        let friday = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let closed = vec!["Friday".to_owned()];
        assert!(!is_open_day(friday, today, &closed));
        assert!(is_open_day(friday, today, &[]));
        assert!(is_open_day(today, today, &closed));
        assert!(!is_open_day(today.pred_opt().unwrap(), today, &[]));
    }

    #[test]
    fn test_contact_message_length_limit() {
        let contact = NewContact {
            name: "Sara".to_owned(),
            phone: Phone::parse("0551234567").unwrap(),
            email: None,
            subject: String::new(),
            message: "x".repeat(MAX_MESSAGE_LENGTH + 1),
        };
        assert!(contact.normalized().is_err());
    }

    #[test]
    fn test_appointment_slot_normalized() {
        let appt = NewAppointment {
            name: " Omar ".to_owned(),
            phone: Phone::parse("0551234567").unwrap(),
            date: NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
            time_slot: "9:00".to_owned(),
            notes: Some("  ".to_owned()),
        }
        .normalized()
        .unwrap();
        assert_eq!(appt.name, "Omar");
        assert_eq!(appt.time_slot, "09:00");
        assert_eq!(appt.notes, None);
    }
}
