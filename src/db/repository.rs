//! Persistent-store adapter: appointment and service-catalog repositories.
//!
//! Dates and times are stored as `YYYY-MM-DD` / `HH:MM` text. The typed
//! readers parse them; rows a legacy importer left malformed are skipped on
//! the availability path (with a warning) but stay visible through the
//! summary readers, which keep the raw strings.

use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::DatabaseError;
use crate::models::appointment::{DATE_FORMAT, TIME_FORMAT};
use crate::models::{Appointment, AppointmentStatus, AppointmentSummary, ServiceCatalogEntry};

// ═══════════════════════════════════════════════════════════
// Appointment repository
// ═══════════════════════════════════════════════════════════

const APPOINTMENT_COLUMNS: &str = "id, client_name, email, date, time, service_id, service_name,
     duration_min, price_cents, status, owner_id, edit_token, notes, created_at, updated_at";

/// Raw row as stored — converted to the typed model or the summary view.
struct AppointmentRow {
    id: String,
    client_name: String,
    email: Option<String>,
    date: String,
    time: String,
    service_id: String,
    service_name: String,
    duration_min: u32,
    price_cents: i64,
    status: String,
    owner_id: Option<String>,
    edit_token: Option<String>,
    notes: Option<String>,
    created_at: String,
    updated_at: String,
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AppointmentRow> {
    Ok(AppointmentRow {
        id: row.get(0)?,
        client_name: row.get(1)?,
        email: row.get(2)?,
        date: row.get(3)?,
        time: row.get(4)?,
        service_id: row.get(5)?,
        service_name: row.get(6)?,
        duration_min: row.get(7)?,
        price_cents: row.get(8)?,
        status: row.get(9)?,
        owner_id: row.get(10)?,
        edit_token: row.get(11)?,
        notes: row.get(12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
    })
}

impl AppointmentRow {
    fn into_appointment(self) -> Result<Appointment, DatabaseError> {
        let date = NaiveDate::parse_from_str(&self.date, DATE_FORMAT).map_err(|_| {
            DatabaseError::ConstraintViolation(format!("Malformed date: {}", self.date))
        })?;
        let time = NaiveTime::parse_from_str(&self.time, TIME_FORMAT).map_err(|_| {
            DatabaseError::ConstraintViolation(format!("Malformed time: {}", self.time))
        })?;
        Ok(Appointment {
            id: parse_uuid(&self.id, "Appointment")?,
            client_name: self.client_name,
            email: self.email,
            date,
            time,
            service_id: parse_uuid(&self.service_id, "Service")?,
            service_name: self.service_name,
            duration_min: self.duration_min,
            price_cents: self.price_cents,
            status: AppointmentStatus::from_str(&self.status)?,
            owner_id: self.owner_id,
            edit_token: self.edit_token,
            notes: self.notes,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }

    fn into_summary(self) -> Result<AppointmentSummary, DatabaseError> {
        Ok(AppointmentSummary {
            id: parse_uuid(&self.id, "Appointment")?,
            client_name: self.client_name,
            email: self.email,
            date: self.date,
            time: self.time,
            service_id: parse_uuid(&self.service_id, "Service")?,
            service_name: self.service_name,
            duration_min: self.duration_min,
            price_cents: self.price_cents,
            status: AppointmentStatus::from_str(&self.status)?,
            owner_id: self.owner_id,
            notes: self.notes,
        })
    }
}

fn parse_uuid(s: &str, entity_type: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(s).map_err(|_| DatabaseError::ConstraintViolation(format!(
        "{entity_type} id is not a UUID: {s}"
    )))
}

fn parse_datetime(s: &str) -> Result<NaiveDateTime, DatabaseError> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map_err(|_| DatabaseError::ConstraintViolation(format!("Malformed timestamp: {s}")))
}

fn fmt_datetime(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

pub fn insert_appointment(conn: &Connection, appt: &Appointment) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO appointments (id, client_name, email, date, time, service_id, service_name,
         duration_min, price_cents, status, owner_id, edit_token, notes, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            appt.id.to_string(),
            appt.client_name,
            appt.email,
            appt.date.format(DATE_FORMAT).to_string(),
            appt.time.format(TIME_FORMAT).to_string(),
            appt.service_id.to_string(),
            appt.service_name,
            appt.duration_min,
            appt.price_cents,
            appt.status.as_str(),
            appt.owner_id,
            appt.edit_token,
            appt.notes,
            fmt_datetime(&appt.created_at),
            fmt_datetime(&appt.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_appointment(conn: &Connection, id: &Uuid) -> Result<Option<Appointment>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = ?1"
    ))?;
    let row = stmt
        .query_row(params![id.to_string()], map_row)
        .optional()?;
    row.map(AppointmentRow::into_appointment).transpose()
}

/// Persist the mutable fields of an appointment. The creation snapshot
/// fields change only through an explicit service change in the lifecycle
/// manager; `created_at` and `edit_token` never change here.
pub fn update_appointment(conn: &Connection, appt: &Appointment) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE appointments
         SET client_name = ?2, email = ?3, date = ?4, time = ?5, service_id = ?6,
             service_name = ?7, duration_min = ?8, price_cents = ?9, status = ?10,
             owner_id = ?11, notes = ?12, updated_at = ?13
         WHERE id = ?1",
        params![
            appt.id.to_string(),
            appt.client_name,
            appt.email,
            appt.date.format(DATE_FORMAT).to_string(),
            appt.time.format(TIME_FORMAT).to_string(),
            appt.service_id.to_string(),
            appt.service_name,
            appt.duration_min,
            appt.price_cents,
            appt.status.as_str(),
            appt.owner_id,
            appt.notes,
            fmt_datetime(&appt.updated_at),
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Appointment".into(),
            id: appt.id.to_string(),
        });
    }
    Ok(())
}

pub fn set_appointment_status(
    conn: &Connection,
    id: &Uuid,
    status: AppointmentStatus,
    updated_at: &NaiveDateTime,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE appointments SET status = ?2, updated_at = ?3 WHERE id = ?1",
        params![id.to_string(), status.as_str(), fmt_datetime(updated_at)],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Appointment".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Confirmed appointments occupying the given date, for conflict checks.
/// Rows with malformed times are logged and skipped — they cannot take part
/// in interval arithmetic, but remain visible through the summary readers.
pub fn list_confirmed_on_date(
    conn: &Connection,
    date: NaiveDate,
) -> Result<Vec<Appointment>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments
         WHERE date = ?1 AND status = 'confirmed'
         ORDER BY time ASC"
    ))?;
    let rows = stmt.query_map(params![date.format(DATE_FORMAT).to_string()], map_row)?;

    let mut out = Vec::new();
    for row in rows {
        let row = row?;
        let id = row.id.clone();
        match row.into_appointment() {
            Ok(appt) => out.push(appt),
            Err(e) => tracing::warn!("Skipping unparsable appointment {id}: {e}"),
        }
    }
    Ok(out)
}

/// All appointments as list-view rows, raw date/time strings preserved.
pub fn list_appointment_summaries(
    conn: &Connection,
) -> Result<Vec<AppointmentSummary>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments ORDER BY date ASC, time ASC"
    ))?;
    let rows = stmt.query_map([], map_row)?;
    rows.map(|r| r.map_err(DatabaseError::from).and_then(AppointmentRow::into_summary))
        .collect()
}

/// List-view rows restricted to one owner.
pub fn list_summaries_for_owner(
    conn: &Connection,
    owner_id: &str,
) -> Result<Vec<AppointmentSummary>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments
         WHERE owner_id = ?1 ORDER BY date ASC, time ASC"
    ))?;
    let rows = stmt.query_map(params![owner_id], map_row)?;
    rows.map(|r| r.map_err(DatabaseError::from).and_then(AppointmentRow::into_summary))
        .collect()
}

// ═══════════════════════════════════════════════════════════
// Service catalog repository
// ═══════════════════════════════════════════════════════════

fn map_service(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, ServiceCatalogEntry)> {
    let id: String = row.get(0)?;
    Ok((
        id,
        ServiceCatalogEntry {
            id: Uuid::nil(), // replaced by the caller after parsing
            name: row.get(1)?,
            duration_min: row.get(2)?,
            price_cents: row.get(3)?,
            category: row.get(4)?,
            active: row.get(5)?,
        },
    ))
}

fn finish_service((id, mut entry): (String, ServiceCatalogEntry)) -> Result<ServiceCatalogEntry, DatabaseError> {
    entry.id = parse_uuid(&id, "Service")?;
    Ok(entry)
}

pub fn insert_service(conn: &Connection, entry: &ServiceCatalogEntry) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO services (id, name, duration_min, price_cents, category, active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            entry.id.to_string(),
            entry.name,
            entry.duration_min,
            entry.price_cents,
            entry.category,
            entry.active as i32,
        ],
    )?;
    Ok(())
}

/// Full catalog, active and inactive — the cache snapshot source. Single
/// lookups go through the catalog cache, not the store.
pub fn list_services(conn: &Connection) -> Result<Vec<ServiceCatalogEntry>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, duration_min, price_cents, category, active
         FROM services ORDER BY name ASC",
    )?;
    let rows = stmt.query_map([], map_service)?;
    rows.map(|r| r.map_err(DatabaseError::from).and_then(finish_service))
        .collect()
}

pub fn update_service(conn: &Connection, entry: &ServiceCatalogEntry) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE services SET name = ?2, duration_min = ?3, price_cents = ?4,
         category = ?5, active = ?6 WHERE id = ?1",
        params![
            entry.id.to_string(),
            entry.name,
            entry.duration_min,
            entry.price_cents,
            entry.category,
            entry.active as i32,
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Service".into(),
            id: entry.id.to_string(),
        });
    }
    Ok(())
}

/// Retire a service from the bookable catalog. Appointments keep their
/// snapshots, so history is unaffected.
pub fn deactivate_service(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE services SET active = 0 WHERE id = ?1",
        params![id.to_string()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Service".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;

    fn sample_service() -> ServiceCatalogEntry {
        ServiceCatalogEntry {
            id: Uuid::new_v4(),
            name: "Cut & blow-dry".into(),
            duration_min: 60,
            price_cents: 4500,
            category: "hair".into(),
            active: true,
        }
    }

    fn sample_appointment(service: &ServiceCatalogEntry) -> Appointment {
        let created = NaiveDate::from_ymd_opt(2026, 8, 20)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        Appointment {
            id: Uuid::new_v4(),
            client_name: "Mara Lind".into(),
            email: Some("mara@example.com".into()),
            date: NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            service_id: service.id,
            service_name: service.name.clone(),
            duration_min: service.duration_min,
            price_cents: service.price_cents,
            status: AppointmentStatus::Confirmed,
            owner_id: Some("user-1".into()),
            edit_token: None,
            notes: None,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn appointment_round_trip() {
        let conn = open_memory_database().unwrap();
        let service = sample_service();
        insert_service(&conn, &service).unwrap();
        let appt = sample_appointment(&service);
        insert_appointment(&conn, &appt).unwrap();

        let loaded = get_appointment(&conn, &appt.id).unwrap().unwrap();
        assert_eq!(loaded.client_name, "Mara Lind");
        assert_eq!(loaded.date, appt.date);
        assert_eq!(loaded.time, appt.time);
        assert_eq!(loaded.duration_min, 60);
        assert_eq!(loaded.status, AppointmentStatus::Confirmed);
    }

    #[test]
    fn get_missing_appointment_is_none() {
        let conn = open_memory_database().unwrap();
        assert!(get_appointment(&conn, &Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn update_missing_appointment_is_not_found() {
        let conn = open_memory_database().unwrap();
        let service = sample_service();
        insert_service(&conn, &service).unwrap();
        let appt = sample_appointment(&service);
        let err = update_appointment(&conn, &appt).unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[test]
    fn set_status_updates_row() {
        let conn = open_memory_database().unwrap();
        let service = sample_service();
        insert_service(&conn, &service).unwrap();
        let appt = sample_appointment(&service);
        insert_appointment(&conn, &appt).unwrap();

        let later = appt.updated_at + chrono::Duration::hours(1);
        set_appointment_status(&conn, &appt.id, AppointmentStatus::Cancelled, &later).unwrap();

        let loaded = get_appointment(&conn, &appt.id).unwrap().unwrap();
        assert_eq!(loaded.status, AppointmentStatus::Cancelled);
        assert_eq!(loaded.updated_at, later);
    }

    #[test]
    fn confirmed_on_date_excludes_cancelled_and_other_dates() {
        let conn = open_memory_database().unwrap();
        let service = sample_service();
        insert_service(&conn, &service).unwrap();

        let a = sample_appointment(&service);
        insert_appointment(&conn, &a).unwrap();

        let mut b = sample_appointment(&service);
        b.id = Uuid::new_v4();
        b.time = NaiveTime::from_hms_opt(14, 0, 0).unwrap();
        b.status = AppointmentStatus::Cancelled;
        insert_appointment(&conn, &b).unwrap();

        let mut c = sample_appointment(&service);
        c.id = Uuid::new_v4();
        c.date = NaiveDate::from_ymd_opt(2026, 9, 2).unwrap();
        insert_appointment(&conn, &c).unwrap();

        let on_day = list_confirmed_on_date(&conn, a.date).unwrap();
        assert_eq!(on_day.len(), 1);
        assert_eq!(on_day[0].id, a.id);
    }

    #[test]
    fn malformed_time_skipped_on_conflict_path_but_listed() {
        let conn = open_memory_database().unwrap();
        let service = sample_service();
        insert_service(&conn, &service).unwrap();
        conn.execute(
            "INSERT INTO appointments (id, client_name, date, time, service_id, service_name,
             duration_min, price_cents, status, created_at, updated_at)
             VALUES (?1, 'Legacy Row', '2026-09-01', 'noonish', ?2, 'Cut', 30, 2000,
                     'confirmed', '2026-08-01 00:00:00', '2026-08-01 00:00:00')",
            params![Uuid::new_v4().to_string(), service.id.to_string()],
        )
        .unwrap();

        let date = NaiveDate::from_ymd_opt(2026, 9, 1).unwrap();
        assert!(list_confirmed_on_date(&conn, date).unwrap().is_empty());

        let summaries = list_appointment_summaries(&conn).unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].time, "noonish");
        assert!(summaries[0].start().is_none());
    }

    #[test]
    fn owner_scoped_listing() {
        let conn = open_memory_database().unwrap();
        let service = sample_service();
        insert_service(&conn, &service).unwrap();

        let a = sample_appointment(&service);
        insert_appointment(&conn, &a).unwrap();
        let mut b = sample_appointment(&service);
        b.id = Uuid::new_v4();
        b.time = NaiveTime::from_hms_opt(15, 0, 0).unwrap();
        b.owner_id = Some("user-2".into());
        insert_appointment(&conn, &b).unwrap();

        let mine = list_summaries_for_owner(&conn, "user-1").unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, a.id);
    }

    #[test]
    fn service_round_trip_and_deactivate() {
        let conn = open_memory_database().unwrap();
        let service = sample_service();
        insert_service(&conn, &service).unwrap();

        let loaded = &list_services(&conn).unwrap()[0];
        assert_eq!(loaded, &service);

        deactivate_service(&conn, &service.id).unwrap();
        let loaded = &list_services(&conn).unwrap()[0];
        assert!(!loaded.active, "deactivated services stay listed");
    }

    #[test]
    fn update_service_changes_fields() {
        let conn = open_memory_database().unwrap();
        let mut service = sample_service();
        insert_service(&conn, &service).unwrap();

        service.price_cents = 5200;
        service.duration_min = 75;
        update_service(&conn, &service).unwrap();

        let loaded = &list_services(&conn).unwrap()[0];
        assert_eq!(loaded.price_cents, 5200);
        assert_eq!(loaded.duration_min, 75);
    }

    #[test]
    fn deactivate_missing_service_is_not_found() {
        let conn = open_memory_database().unwrap();
        let err = deactivate_service(&conn, &Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }
}
