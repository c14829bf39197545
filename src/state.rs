//! Transport-agnostic application state.
//!
//! `SalonState` is the single shared state between whatever transports the
//! application mounts (IPC command handlers, a REST layer). Wrapped in
//! `Arc` at startup so every transport shares the same connection, catalog
//! cache, and event bus. The engines themselves take explicit clocks; this
//! is the one place that reads the wall clock.

use std::path::Path;

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::availability::compute_slots;
use crate::booking::{self, BookingChanges, BookingError, BookingRequest};
use crate::catalog::ServiceCatalogCache;
use crate::config::{BusinessCalendarConfig, ConfigError};
use crate::db::{self, DatabaseError};
use crate::events::{ChangeEvent, EventBus};
use crate::identity::Requester;
use crate::models::{Appointment, AppointmentSummary, BookingFilter, ServiceCatalogEntry};
use crate::permissions::{can_view, MutationReason};
use crate::query::{self, BookingStats};

/// Errors from state construction.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Invalid calendar configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

// ═══════════════════════════════════════════════════════════
// SalonState — shared by every transport
// ═══════════════════════════════════════════════════════════

pub struct SalonState {
    pub config: BusinessCalendarConfig,
    /// Single writer connection. SQLite serializes writers anyway; the
    /// async mutex keeps handler code simple.
    db: Mutex<rusqlite::Connection>,
    catalog: Mutex<ServiceCatalogCache>,
    events: EventBus,
}

impl std::fmt::Debug for SalonState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SalonState")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SalonState {
    /// Open (or create) the database at `path` and wrap it with defaults.
    /// The config is validated here — every engine below assumes a valid one.
    pub fn open(path: &Path, config: BusinessCalendarConfig) -> Result<Self, StateError> {
        config.validate()?;
        Ok(Self::with_connection(db::open_database(path)?, config))
    }

    /// In-memory state for tests.
    pub fn open_in_memory(config: BusinessCalendarConfig) -> Result<Self, StateError> {
        config.validate()?;
        Ok(Self::with_connection(db::open_memory_database()?, config))
    }

    fn with_connection(conn: rusqlite::Connection, config: BusinessCalendarConfig) -> Self {
        Self {
            config,
            db: Mutex::new(conn),
            catalog: Mutex::new(ServiceCatalogCache::new()),
            events: EventBus::new(),
        }
    }

    /// The one wall-clock read, truncated to the minute precision the whole
    /// timeline uses so a seconds-bearing `now` cannot misclassify an
    /// on-the-minute appointment.
    fn now() -> NaiveDateTime {
        query::truncate_to_minute(Local::now().naive_local())
    }

    /// Register a callback for change events.
    pub fn subscribe<F>(&self, callback: F)
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(callback);
    }

    // ── Availability ─────────────────────────────────────

    /// Bookable start times on `date` for a service, ascending.
    pub async fn available_slots(
        &self,
        date: NaiveDate,
        service_id: Uuid,
    ) -> Result<Vec<NaiveTime>, BookingError> {
        let conn = self.db.lock().await;
        let service = {
            let mut catalog = self.catalog.lock().await;
            catalog.get(&conn, &service_id)?
        }
        .ok_or(BookingError::NotFound {
            entity_type: "Service",
            id: service_id.to_string(),
        })?;

        let existing = db::list_confirmed_on_date(&conn, date)?;
        Ok(compute_slots(
            &self.config,
            date,
            service.duration_min,
            &existing,
            Self::now(),
        ))
    }

    // ── Booking lifecycle ────────────────────────────────

    pub async fn create_booking(
        &self,
        req: &BookingRequest,
        requester: &Requester,
    ) -> Result<Appointment, BookingError> {
        let conn = self.db.lock().await;
        let mut catalog = self.catalog.lock().await;
        booking::create_booking(
            &conn,
            &self.config,
            &mut catalog,
            &self.events,
            req,
            requester,
            Self::now(),
        )
    }

    pub async fn update_booking(
        &self,
        id: &Uuid,
        changes: &BookingChanges,
        requester: &Requester,
    ) -> Result<Appointment, BookingError> {
        let conn = self.db.lock().await;
        let mut catalog = self.catalog.lock().await;
        booking::update_booking(
            &conn,
            &self.config,
            &mut catalog,
            &self.events,
            id,
            changes,
            requester,
            Self::now(),
        )
    }

    pub async fn cancel_booking(&self, id: &Uuid, requester: &Requester) -> Result<(), BookingError> {
        let conn = self.db.lock().await;
        booking::cancel_booking(&conn, &self.events, id, requester, Self::now())
    }

    pub async fn complete_booking(&self, id: &Uuid, requester: &Requester) -> Result<(), BookingError> {
        let conn = self.db.lock().await;
        booking::complete_booking(&conn, &self.events, id, requester, Self::now())
    }

    /// Fetch a single booking, subject to the view rules.
    pub async fn get_booking(
        &self,
        id: &Uuid,
        requester: &Requester,
    ) -> Result<Appointment, BookingError> {
        let conn = self.db.lock().await;
        let appt = db::get_appointment(&conn, id)?.ok_or(BookingError::NotFound {
            entity_type: "Appointment",
            id: id.to_string(),
        })?;
        if !can_view(&appt, requester) {
            return Err(BookingError::Forbidden {
                reason: MutationReason::DeniedNoAccess,
            });
        }
        Ok(appt)
    }

    // ── List views and stats ─────────────────────────────

    /// Rows the requester may see at all: everything for staff and admin,
    /// own rows for a signed-in user, nothing for anonymous visitors
    /// (their per-booking access goes through `get_booking` with a token).
    async fn visible_summaries(
        &self,
        requester: &Requester,
    ) -> Result<Vec<AppointmentSummary>, DatabaseError> {
        let conn = self.db.lock().await;
        if requester.is_admin() || requester.is_staff() {
            return db::list_appointment_summaries(&conn);
        }
        match &requester.user_id {
            Some(owner) => db::list_summaries_for_owner(&conn, owner),
            None => Ok(Vec::new()),
        }
    }

    pub async fn list_bookings(
        &self,
        filter: &BookingFilter,
        requester: &Requester,
    ) -> Result<Vec<AppointmentSummary>, BookingError> {
        let summaries = self.visible_summaries(requester).await?;
        Ok(query::filter_appointments(
            &summaries,
            filter,
            Some(requester),
            Self::now(),
        ))
    }

    pub async fn booking_stats(&self, requester: &Requester) -> Result<BookingStats, BookingError> {
        let summaries = self.visible_summaries(requester).await?;
        Ok(query::booking_stats(&summaries, Some(requester), Self::now()))
    }

    // ── Service catalog ──────────────────────────────────

    /// Bookable services, served from the catalog cache.
    pub async fn services(&self) -> Result<Vec<ServiceCatalogEntry>, BookingError> {
        let conn = self.db.lock().await;
        let mut catalog = self.catalog.lock().await;
        Ok(catalog.list_active(&conn)?)
    }

    /// Force the catalog cache to reload from the store.
    pub async fn refresh_catalog(&self) -> Result<(), BookingError> {
        let conn = self.db.lock().await;
        let mut catalog = self.catalog.lock().await;
        catalog.refresh(&conn, std::time::Instant::now())?;
        self.events.emit(&ChangeEvent::CatalogRefreshed);
        Ok(())
    }

    /// Create or update a catalog entry. Admin only. The store is written
    /// first; the cache is patched on success so the change is visible
    /// without waiting out the staleness window.
    pub async fn save_service(
        &self,
        entry: &ServiceCatalogEntry,
        requester: &Requester,
    ) -> Result<(), BookingError> {
        if !requester.is_admin() {
            return Err(BookingError::Forbidden {
                reason: MutationReason::DeniedNoAccess,
            });
        }
        let conn = self.db.lock().await;
        match db::update_service(&conn, entry) {
            Ok(()) => {}
            Err(DatabaseError::NotFound { .. }) => db::insert_service(&conn, entry)?,
            Err(e) => return Err(e.into()),
        }
        let mut catalog = self.catalog.lock().await;
        catalog.note_service_saved(entry.clone());
        self.events.emit(&ChangeEvent::CatalogRefreshed);
        Ok(())
    }

    /// Take a service off the menu. Existing bookings keep their snapshots.
    pub async fn retire_service(
        &self,
        id: &Uuid,
        requester: &Requester,
    ) -> Result<(), BookingError> {
        if !requester.is_admin() {
            return Err(BookingError::Forbidden {
                reason: MutationReason::DeniedNoAccess,
            });
        }
        let conn = self.db.lock().await;
        db::deactivate_service(&conn, id)?;
        let mut catalog = self.catalog.lock().await;
        catalog.note_service_deactivated(id);
        self.events.emit(&ChangeEvent::CatalogRefreshed);
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
