//! Slot computation for the single shared timeline.
//!
//! Pure and deterministic: callers supply the calendar config, the already
//! loaded confirmed appointments, and the wall clock. No I/O here — the
//! lifecycle manager re-runs this against a fresh read immediately before
//! every write.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use uuid::Uuid;

use crate::config::BusinessCalendarConfig;
use crate::models::Appointment;

/// Half-open interval intersection: touching endpoints do not conflict.
#[inline]
pub fn intervals_overlap(a_start: u32, a_end: u32, b_start: u32, b_end: u32) -> bool {
    a_start < b_end && b_start < a_end
}

fn minutes_of(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

fn time_from_minutes(min: u32) -> Option<NaiveTime> {
    NaiveTime::from_num_seconds_from_midnight_opt(min * 60, 0)
}

/// Compute the bookable start times on `date` for a service of
/// `service_duration_min` minutes, in ascending order.
///
/// Candidates run on the config's slot grid from opening time onward; a
/// candidate survives when its `[start, start + duration)` interval fits
/// before closing, misses the lunch break, starts strictly after `now` when
/// `date` is today, and overlaps no confirmed appointment on the same date.
pub fn compute_slots(
    cfg: &BusinessCalendarConfig,
    date: NaiveDate,
    service_duration_min: u32,
    existing: &[Appointment],
    now: NaiveDateTime,
) -> Vec<NaiveTime> {
    if !cfg.is_business_day(date.weekday()) {
        return Vec::new();
    }
    // A zero-length service or a zero-step grid cannot advance the candidate
    // loop below. Validated configs exclude both; unvalidated ones must not
    // spin forever.
    if service_duration_min == 0 || cfg.slot_duration_min == 0 {
        return Vec::new();
    }

    let occupied: Vec<(u32, u32)> = existing
        .iter()
        .filter(|a| a.date == date && a.is_confirmed())
        .map(|a| (a.start_min(), a.end_min()))
        .collect();

    let today = date == now.date();
    let now_min = minutes_of(now.time());

    let mut slots = Vec::new();
    let mut start = cfg.business_hours.start_min;
    while start + service_duration_min <= cfg.business_hours.end_min {
        let end = start + service_duration_min;

        let blocked_by_lunch = cfg.lunch_break.overlaps(start, end);
        // No booking into the past or the current instant.
        let in_the_past = today && start <= now_min;
        let taken = occupied
            .iter()
            .any(|&(b_start, b_end)| intervals_overlap(start, end, b_start, b_end));

        if !blocked_by_lunch && !in_the_past && !taken {
            if let Some(time) = time_from_minutes(start) {
                slots.push(time);
            }
        }
        start += cfg.slot_duration_min;
    }
    slots
}

/// Re-validation for a single `(date, time)` against a fresh appointment
/// read. `exclude` lets an edited appointment move within its own vacated
/// slot without conflicting with itself.
pub fn slot_is_available(
    cfg: &BusinessCalendarConfig,
    date: NaiveDate,
    time: NaiveTime,
    service_duration_min: u32,
    existing: &[Appointment],
    exclude: Option<Uuid>,
    now: NaiveDateTime,
) -> bool {
    let remaining: Vec<Appointment> = match exclude {
        Some(id) => existing.iter().filter(|a| a.id != id).cloned().collect(),
        None => existing.to_vec(),
    };
    compute_slots(cfg, date, service_duration_min, &remaining, now).contains(&time)
}
