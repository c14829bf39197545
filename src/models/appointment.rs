use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::AppointmentStatus;

/// Wall-clock time format used everywhere an appointment time crosses a
/// boundary (store rows, requests, list views). Minute precision.
pub const TIME_FORMAT: &str = "%H:%M";
/// Calendar date format for the same boundaries.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A booked appointment on the single shared timeline.
///
/// `duration_min` and `price_cents` are snapshots taken from the service
/// catalog at booking time, so historical entries stay stable when the
/// catalog changes. Exactly one of `owner_id` / `edit_token` is assigned at
/// creation: authenticated bookings carry the owner, public bookings carry
/// a bearer token. An admin may later attach an owner to a token booking,
/// in which case both coexist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub client_name: String,
    pub email: Option<String>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub service_id: Uuid,
    pub service_name: String,
    pub duration_min: u32,
    pub price_cents: i64,
    pub status: AppointmentStatus,
    pub owner_id: Option<String>,
    pub edit_token: Option<String>,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Appointment {
    /// Start instant on the shared timeline.
    pub fn start(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }

    /// Start of the occupied interval in minutes since midnight.
    pub fn start_min(&self) -> u32 {
        use chrono::Timelike;
        self.time.hour() * 60 + self.time.minute()
    }

    /// End of the occupied interval in minutes since midnight (half-open).
    pub fn end_min(&self) -> u32 {
        self.start_min() + self.duration_min
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == AppointmentStatus::Confirmed
    }
}

/// List-view row for presentation and the query engine.
///
/// Date and time are kept as the raw store strings: legacy rows with
/// malformed values stay representable, sort to the front of chronological
/// views, and remain visible for correction instead of being dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentSummary {
    pub id: Uuid,
    pub client_name: String,
    pub email: Option<String>,
    pub date: String,
    pub time: String,
    pub service_id: Uuid,
    pub service_name: String,
    pub duration_min: u32,
    pub price_cents: i64,
    pub status: AppointmentStatus,
    pub owner_id: Option<String>,
    pub notes: Option<String>,
}

impl From<&Appointment> for AppointmentSummary {
    fn from(a: &Appointment) -> Self {
        Self {
            id: a.id,
            client_name: a.client_name.clone(),
            email: a.email.clone(),
            date: a.date.format(DATE_FORMAT).to_string(),
            time: a.time.format(TIME_FORMAT).to_string(),
            service_id: a.service_id,
            service_name: a.service_name.clone(),
            duration_min: a.duration_min,
            price_cents: a.price_cents,
            status: a.status,
            owner_id: a.owner_id.clone(),
            notes: a.notes.clone(),
        }
    }
}

impl AppointmentSummary {
    /// Parsed start instant, `None` when the stored date or time is malformed.
    pub fn start(&self) -> Option<NaiveDateTime> {
        let date = NaiveDate::parse_from_str(&self.date, DATE_FORMAT).ok()?;
        let time = NaiveTime::parse_from_str(&self.time, TIME_FORMAT).ok()?;
        Some(date.and_time(time))
    }
}
