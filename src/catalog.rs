//! In-memory service catalog cache.
//!
//! The catalog changes rarely, so reads are served from a snapshot that is
//! considered fresh for five minutes and re-read from the store after that.
//! Writes go through the store first and patch the snapshot on success, so
//! a saved service is visible immediately without waiting out the window.
//!
//! Time is injected (`Instant` parameters on the `_at` variants); the
//! wall-clock wrappers exist for call sites that do not care.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use rusqlite::Connection;
use uuid::Uuid;

use crate::db::{self, DatabaseError};
use crate::models::ServiceCatalogEntry;

/// How long a snapshot counts as fresh.
pub const STALENESS_WINDOW: Duration = Duration::from_secs(300);

// ═══════════════════════════════════════════════════════════
// ServiceCatalogCache
// ═══════════════════════════════════════════════════════════

pub struct ServiceCatalogCache {
    entries: HashMap<Uuid, ServiceCatalogEntry>,
    refreshed_at: Option<Instant>,
    staleness_window: Duration,
}

impl ServiceCatalogCache {
    /// Create an empty cache. The first read populates it.
    pub fn new() -> Self {
        Self::with_staleness_window(STALENESS_WINDOW)
    }

    pub fn with_staleness_window(staleness_window: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            refreshed_at: None,
            staleness_window,
        }
    }

    // ── Freshness ────────────────────────────────────────

    /// Whether the snapshot is still within its staleness window. A cache
    /// that has never been loaded is never fresh.
    pub fn is_fresh_at(&self, now: Instant) -> bool {
        match self.refreshed_at {
            Some(at) => now.duration_since(at) < self.staleness_window,
            None => false,
        }
    }

    /// Force the next read to hit the store.
    pub fn invalidate(&mut self) {
        self.refreshed_at = None;
    }

    // ── Reads (read-through) ─────────────────────────────

    /// Look up a service, reloading the snapshot first when stale.
    ///
    /// When the reload fails but an earlier snapshot exists, the stale
    /// snapshot is served and the failure logged; an empty cache has
    /// nothing to fall back on and propagates the error.
    pub fn get_at(
        &mut self,
        conn: &Connection,
        id: &Uuid,
        now: Instant,
    ) -> Result<Option<ServiceCatalogEntry>, DatabaseError> {
        self.ensure_fresh(conn, now)?;
        Ok(self.entries.get(id).cloned())
    }

    pub fn get(
        &mut self,
        conn: &Connection,
        id: &Uuid,
    ) -> Result<Option<ServiceCatalogEntry>, DatabaseError> {
        self.get_at(conn, id, Instant::now())
    }

    /// Bookable services, sorted by name.
    pub fn list_active_at(
        &mut self,
        conn: &Connection,
        now: Instant,
    ) -> Result<Vec<ServiceCatalogEntry>, DatabaseError> {
        self.ensure_fresh(conn, now)?;
        let mut active: Vec<ServiceCatalogEntry> = self
            .entries
            .values()
            .filter(|e| e.active)
            .cloned()
            .collect();
        active.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(active)
    }

    pub fn list_active(
        &mut self,
        conn: &Connection,
    ) -> Result<Vec<ServiceCatalogEntry>, DatabaseError> {
        self.list_active_at(conn, Instant::now())
    }

    /// Unconditionally reload the snapshot from the store.
    pub fn refresh(&mut self, conn: &Connection, now: Instant) -> Result<(), DatabaseError> {
        let services = db::list_services(conn)?;
        self.entries = services.into_iter().map(|s| (s.id, s)).collect();
        self.refreshed_at = Some(now);
        tracing::debug!(count = self.entries.len(), "service catalog refreshed");
        Ok(())
    }

    fn ensure_fresh(&mut self, conn: &Connection, now: Instant) -> Result<(), DatabaseError> {
        if self.is_fresh_at(now) {
            return Ok(());
        }
        match self.refresh(conn, now) {
            Ok(()) => Ok(()),
            Err(e) if !self.entries.is_empty() => {
                tracing::warn!(error = %e, "catalog refresh failed, serving stale snapshot");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    // ── Writes (write-through patching) ──────────────────

    /// Record a service that was just written to the store. Patches the
    /// snapshot in place so the write is visible before the next reload.
    pub fn note_service_saved(&mut self, entry: ServiceCatalogEntry) {
        self.entries.insert(entry.id, entry);
    }

    /// Record a deactivation that was just written to the store.
    pub fn note_service_deactivated(&mut self, id: &Uuid) {
        if let Some(entry) = self.entries.get_mut(id) {
            entry.active = false;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ServiceCatalogCache {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;

    fn entry(name: &str, active: bool) -> ServiceCatalogEntry {
        ServiceCatalogEntry {
            id: Uuid::new_v4(),
            name: name.to_string(),
            duration_min: 45,
            price_cents: 3500,
            category: "hair".to_string(),
            active,
        }
    }

    #[test]
    fn new_cache_is_empty_and_stale() {
        let cache = ServiceCatalogCache::new();
        assert!(cache.is_empty());
        assert!(!cache.is_fresh_at(Instant::now()));
    }

    #[test]
    fn first_read_populates_from_store() {
        let conn = open_memory_database().unwrap();
        let e = entry("Cut", true);
        db::insert_service(&conn, &e).unwrap();

        let mut cache = ServiceCatalogCache::new();
        let found = cache.get(&conn, &e.id).unwrap().unwrap();
        assert_eq!(found, e);
        assert!(cache.is_fresh_at(Instant::now()));
    }

    #[test]
    fn fresh_snapshot_skips_the_store() {
        let conn = open_memory_database().unwrap();
        let e = entry("Cut", true);
        db::insert_service(&conn, &e).unwrap();

        let now = Instant::now();
        let mut cache = ServiceCatalogCache::new();
        cache.refresh(&conn, now).unwrap();

        // A store write the cache was not told about stays invisible while
        // the snapshot is fresh.
        let hidden = entry("Beard trim", true);
        db::insert_service(&conn, &hidden).unwrap();
        assert!(cache.get_at(&conn, &hidden.id, now).unwrap().is_none());
    }

    #[test]
    fn stale_snapshot_reloads() {
        let conn = open_memory_database().unwrap();
        let e = entry("Cut", true);
        db::insert_service(&conn, &e).unwrap();

        let loaded_at = Instant::now();
        let mut cache = ServiceCatalogCache::new();
        cache.refresh(&conn, loaded_at).unwrap();

        let late = entry("Beard trim", true);
        db::insert_service(&conn, &late).unwrap();

        // Just past the window the next read goes back to the store.
        let later = loaded_at + STALENESS_WINDOW + Duration::from_secs(1);
        assert!(!cache.is_fresh_at(later));
        assert!(cache.get_at(&conn, &late.id, later).unwrap().is_some());
    }

    #[test]
    fn boundary_of_window_is_stale() {
        let conn = open_memory_database().unwrap();
        let loaded_at = Instant::now();
        let mut cache = ServiceCatalogCache::new();
        cache.refresh(&conn, loaded_at).unwrap();

        assert!(cache.is_fresh_at(loaded_at + STALENESS_WINDOW - Duration::from_millis(1)));
        assert!(!cache.is_fresh_at(loaded_at + STALENESS_WINDOW));
    }

    #[test]
    fn list_active_filters_and_sorts() {
        let conn = open_memory_database().unwrap();
        db::insert_service(&conn, &entry("Perm", true)).unwrap();
        db::insert_service(&conn, &entry("Blow-dry", true)).unwrap();
        db::insert_service(&conn, &entry("Discontinued", false)).unwrap();

        let mut cache = ServiceCatalogCache::new();
        let active = cache.list_active(&conn).unwrap();
        let names: Vec<&str> = active.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Blow-dry", "Perm"]);
    }

    #[test]
    fn saved_service_visible_before_reload() {
        let conn = open_memory_database().unwrap();
        let now = Instant::now();
        let mut cache = ServiceCatalogCache::new();
        cache.refresh(&conn, now).unwrap();

        let e = entry("Cut", true);
        db::insert_service(&conn, &e).unwrap();
        cache.note_service_saved(e.clone());

        // Snapshot is still fresh, yet the write shows up.
        assert_eq!(cache.get_at(&conn, &e.id, now).unwrap(), Some(e));
    }

    #[test]
    fn deactivation_visible_before_reload() {
        let conn = open_memory_database().unwrap();
        let e = entry("Cut", true);
        db::insert_service(&conn, &e).unwrap();

        let now = Instant::now();
        let mut cache = ServiceCatalogCache::new();
        cache.refresh(&conn, now).unwrap();

        db::deactivate_service(&conn, &e.id).unwrap();
        cache.note_service_deactivated(&e.id);

        assert!(cache.list_active_at(&conn, now).unwrap().is_empty());
        // The entry itself is still resolvable for existing bookings.
        assert!(!cache.get_at(&conn, &e.id, now).unwrap().unwrap().active);
    }

    #[test]
    fn invalidate_forces_reload() {
        let conn = open_memory_database().unwrap();
        let now = Instant::now();
        let mut cache = ServiceCatalogCache::new();
        cache.refresh(&conn, now).unwrap();

        let e = entry("Cut", true);
        db::insert_service(&conn, &e).unwrap();
        cache.invalidate();

        assert!(cache.get_at(&conn, &e.id, now).unwrap().is_some());
    }

    #[test]
    fn stale_snapshot_served_when_store_fails() {
        let conn = open_memory_database().unwrap();
        let e = entry("Cut", true);
        db::insert_service(&conn, &e).unwrap();

        let loaded_at = Instant::now();
        let mut cache = ServiceCatalogCache::new();
        cache.refresh(&conn, loaded_at).unwrap();

        // Break the store, then read past the window: the reload fails and
        // the stale snapshot answers instead.
        conn.execute_batch("DROP TABLE services").unwrap();
        let later = loaded_at + STALENESS_WINDOW + Duration::from_secs(1);
        assert_eq!(cache.get_at(&conn, &e.id, later).unwrap(), Some(e));
    }

    #[test]
    fn empty_cache_propagates_store_failure() {
        let conn = open_memory_database().unwrap();
        conn.execute_batch("DROP TABLE services").unwrap();

        let mut cache = ServiceCatalogCache::new();
        assert!(cache.get(&conn, &Uuid::new_v4()).is_err());
    }
}
