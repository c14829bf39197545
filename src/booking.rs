//! Booking lifecycle: create, edit, cancel, complete.
//!
//! Status machine: `confirmed → completed` and `confirmed → cancelled`,
//! both terminal. Cancellation is a soft transition — rows are never
//! hard-deleted, so history and stats survive.
//!
//! Every write re-validates its slot against a fresh read of the confirmed
//! appointments *inside the same transaction* as the write. A concurrent
//! creator losing that race gets `SlotConflict` and decides itself whether
//! to refresh availability and retry.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rand::rngs::OsRng;
use rand::RngCore;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::availability::slot_is_available;
use crate::catalog::ServiceCatalogCache;
use crate::config::BusinessCalendarConfig;
use crate::db::{self, DatabaseError};
use crate::events::{ChangeEvent, EventBus};
use crate::identity::Requester;
use crate::models::appointment::{DATE_FORMAT, TIME_FORMAT};
use crate::models::{Appointment, AppointmentStatus, ServiceCatalogEntry};
use crate::permissions::{can_mutate, MutationReason};

// ─── Types ────────────────────────────────────────────────────────────────────

/// Incoming booking request. Dates and times arrive as strings from the
/// presentation layer and are validated here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRequest {
    pub client_name: String,
    pub email: Option<String>,
    /// YYYY-MM-DD
    pub date: String,
    /// HH:MM
    pub time: String,
    pub service_id: Uuid,
    pub notes: Option<String>,
}

/// Partial edit; `None` fields stay as they are.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookingChanges {
    pub client_name: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub service_id: Option<Uuid>,
    pub notes: Option<String>,
}

/// Errors surfaced by lifecycle operations, with enough structure for the
/// caller to render the specific rule that failed.
#[derive(Debug, Error)]
pub enum BookingError {
    #[error("Validation failed for {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("Slot {date} {time} is no longer available")]
    SlotConflict { date: NaiveDate, time: NaiveTime },

    #[error("Operation forbidden: {reason:?}")]
    Forbidden { reason: MutationReason },

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: &'static str, id: String },

    #[error("Store unavailable: {0}")]
    Store(#[from] DatabaseError),
}

fn validation(field: &'static str, reason: impl Into<String>) -> BookingError {
    BookingError::Validation {
        field,
        reason: reason.into(),
    }
}

// ─── Parsing helpers ──────────────────────────────────────────────────────────

fn parse_date(raw: &str) -> Result<NaiveDate, BookingError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|_| validation("date", format!("expected YYYY-MM-DD, got '{raw}'")))
}

fn parse_time(raw: &str) -> Result<NaiveTime, BookingError> {
    NaiveTime::parse_from_str(raw, TIME_FORMAT)
        .map_err(|_| validation("time", format!("expected HH:MM, got '{raw}'")))
}

/// Bearer credential for anonymous bookings: 256 random bits, base64url.
/// Possession of `(appointment_id, edit_token)` is the whole authorization
/// for the public booking link, so the token must be unguessable.
fn generate_edit_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn resolve_service(
    conn: &Connection,
    catalog: &mut ServiceCatalogCache,
    service_id: &Uuid,
) -> Result<ServiceCatalogEntry, BookingError> {
    let entry = catalog
        .get(conn, service_id)?
        .ok_or(BookingError::NotFound {
            entity_type: "Service",
            id: service_id.to_string(),
        })?;
    if !entry.active {
        return Err(validation("service_id", "service is no longer offered"));
    }
    Ok(entry)
}

// ─── Operations ───────────────────────────────────────────────────────────────

/// Create a confirmed booking.
///
/// The slot is re-validated against the latest confirmed appointments in
/// the same transaction as the insert. A booking without an authenticated
/// owner gets a fresh edit token instead.
pub fn create_booking(
    conn: &Connection,
    cfg: &BusinessCalendarConfig,
    catalog: &mut ServiceCatalogCache,
    events: &EventBus,
    req: &BookingRequest,
    requester: &Requester,
    now: NaiveDateTime,
) -> Result<Appointment, BookingError> {
    if req.client_name.trim().is_empty() {
        return Err(validation("client_name", "client name is required"));
    }
    let date = parse_date(&req.date)?;
    let time = parse_time(&req.time)?;
    if date < now.date() {
        return Err(validation("date", "date is in the past"));
    }

    let service = resolve_service(conn, catalog, &req.service_id)?;

    let tx = conn.unchecked_transaction().map_err(DatabaseError::from)?;
    let existing = db::list_confirmed_on_date(&tx, date)?;
    if !slot_is_available(cfg, date, time, service.duration_min, &existing, None, now) {
        return Err(BookingError::SlotConflict { date, time });
    }

    let owner_id = requester.user_id.clone();
    let edit_token = if owner_id.is_none() {
        Some(generate_edit_token())
    } else {
        None
    };

    let appt = Appointment {
        id: Uuid::new_v4(),
        client_name: req.client_name.trim().to_string(),
        email: req.email.clone(),
        date,
        time,
        service_id: service.id,
        service_name: service.name.clone(),
        duration_min: service.duration_min,
        price_cents: service.price_cents,
        status: AppointmentStatus::Confirmed,
        owner_id,
        edit_token,
        notes: req.notes.clone(),
        created_at: now,
        updated_at: now,
    };

    db::insert_appointment(&tx, &appt)?;
    tx.commit().map_err(DatabaseError::from)?;

    tracing::info!(id = %appt.id, date = %appt.date, time = %appt.time, "booking created");
    events.emit(&ChangeEvent::AppointmentCreated(appt.id));
    Ok(appt)
}

/// Edit an existing booking.
///
/// Date, time, or service changes re-validate availability with the edited
/// appointment excluded from the conflict set, so it may move within its
/// own vacated slot. A service change retakes the duration/price snapshot:
/// the snapshot protects history against catalog drift, not against a
/// deliberate rebooking.
pub fn update_booking(
    conn: &Connection,
    cfg: &BusinessCalendarConfig,
    catalog: &mut ServiceCatalogCache,
    events: &EventBus,
    id: &Uuid,
    changes: &BookingChanges,
    requester: &Requester,
    now: NaiveDateTime,
) -> Result<Appointment, BookingError> {
    let current = db::get_appointment(conn, id)?.ok_or(BookingError::NotFound {
        entity_type: "Appointment",
        id: id.to_string(),
    })?;

    let decision = can_mutate(&current, requester, now);
    if !decision.allowed {
        return Err(BookingError::Forbidden {
            reason: decision.reason,
        });
    }
    if current.status != AppointmentStatus::Confirmed {
        return Err(validation(
            "status",
            format!("{} appointments cannot be edited", current.status.as_str()),
        ));
    }

    let mut updated = current.clone();
    if let Some(name) = &changes.client_name {
        if name.trim().is_empty() {
            return Err(validation("client_name", "client name is required"));
        }
        updated.client_name = name.trim().to_string();
    }
    if let Some(raw) = &changes.date {
        updated.date = parse_date(raw)?;
    }
    if let Some(raw) = &changes.time {
        updated.time = parse_time(raw)?;
    }
    if let Some(service_id) = &changes.service_id {
        if *service_id != current.service_id {
            let service = resolve_service(conn, catalog, service_id)?;
            updated.service_id = service.id;
            updated.service_name = service.name;
            updated.duration_min = service.duration_min;
            updated.price_cents = service.price_cents;
        }
    }
    if let Some(notes) = &changes.notes {
        updated.notes = Some(notes.clone());
    }

    let slot_changed = updated.date != current.date
        || updated.time != current.time
        || updated.service_id != current.service_id;

    updated.updated_at = now;

    let tx = conn.unchecked_transaction().map_err(DatabaseError::from)?;
    if slot_changed {
        if updated.date < now.date() {
            return Err(validation("date", "date is in the past"));
        }
        let existing = db::list_confirmed_on_date(&tx, updated.date)?;
        if !slot_is_available(
            cfg,
            updated.date,
            updated.time,
            updated.duration_min,
            &existing,
            Some(updated.id),
            now,
        ) {
            return Err(BookingError::SlotConflict {
                date: updated.date,
                time: updated.time,
            });
        }
    }
    db::update_appointment(&tx, &updated)?;
    tx.commit().map_err(DatabaseError::from)?;

    tracing::info!(id = %updated.id, "booking updated");
    events.emit(&ChangeEvent::AppointmentUpdated(updated.id));
    Ok(updated)
}

/// Cancel a booking (soft transition). Idempotent: cancelling an already
/// cancelled appointment succeeds without touching the store.
pub fn cancel_booking(
    conn: &Connection,
    events: &EventBus,
    id: &Uuid,
    requester: &Requester,
    now: NaiveDateTime,
) -> Result<(), BookingError> {
    let current = db::get_appointment(conn, id)?.ok_or(BookingError::NotFound {
        entity_type: "Appointment",
        id: id.to_string(),
    })?;

    let decision = can_mutate(&current, requester, now);
    if !decision.allowed {
        return Err(BookingError::Forbidden {
            reason: decision.reason,
        });
    }

    match current.status {
        AppointmentStatus::Cancelled => {
            tracing::debug!(id = %id, "cancel on already-cancelled booking, no-op");
            Ok(())
        }
        AppointmentStatus::Completed => Err(validation(
            "status",
            "completed appointments cannot be cancelled",
        )),
        AppointmentStatus::Confirmed => {
            db::set_appointment_status(conn, id, AppointmentStatus::Cancelled, &now)?;
            tracing::info!(id = %id, "booking cancelled");
            events.emit(&ChangeEvent::AppointmentCancelled(*id));
            Ok(())
        }
    }
}

/// Administrative transition to `completed`. Idempotent on already
/// completed bookings.
pub fn complete_booking(
    conn: &Connection,
    events: &EventBus,
    id: &Uuid,
    requester: &Requester,
    now: NaiveDateTime,
) -> Result<(), BookingError> {
    if !requester.is_admin() && !requester.is_staff() {
        return Err(BookingError::Forbidden {
            reason: MutationReason::DeniedNoAccess,
        });
    }

    let current = db::get_appointment(conn, id)?.ok_or(BookingError::NotFound {
        entity_type: "Appointment",
        id: id.to_string(),
    })?;

    match current.status {
        AppointmentStatus::Completed => Ok(()),
        AppointmentStatus::Cancelled => Err(validation(
            "status",
            "cancelled appointments cannot be completed",
        )),
        AppointmentStatus::Confirmed => {
            db::set_appointment_status(conn, id, AppointmentStatus::Completed, &now)?;
            tracing::info!(id = %id, "booking completed");
            events.emit(&ChangeEvent::AppointmentUpdated(*id));
            Ok(())
        }
    }
}
