//! Filtering, ordering, and dashboard counts for booking list views.
//!
//! Works on [`AppointmentSummary`] rows, so legacy entries with malformed
//! stored dates stay in every view: they get the epoch as their sort key
//! and float to the front of chronological lists, where someone can spot
//! and fix them.

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::identity::Requester;
use crate::models::appointment::DATE_FORMAT;
use crate::models::{AppointmentStatus, AppointmentSummary, BookingFilter, QuickFilter};

/// Sort key fallback for rows whose stored date or time does not parse.
fn sort_key(summary: &AppointmentSummary) -> NaiveDateTime {
    summary.start().unwrap_or(NaiveDateTime::UNIX_EPOCH)
}

fn is_today(summary: &AppointmentSummary, now: NaiveDateTime) -> bool {
    summary.date == now.date().format(DATE_FORMAT).to_string()
}

/// Strictly after `now`. Malformed rows fall back to the epoch and are
/// therefore never upcoming.
fn is_upcoming(summary: &AppointmentSummary, now: NaiveDateTime) -> bool {
    sort_key(summary) > now
}

fn is_mine(summary: &AppointmentSummary, identity: Option<&Requester>) -> bool {
    let Some(requester) = identity else {
        return false;
    };
    let owner_match = match (&summary.owner_id, &requester.user_id) {
        (Some(owner), Some(user)) => owner == user,
        _ => false,
    };
    let email_match = match (&summary.email, &requester.email) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => false,
    };
    owner_match || email_match
}

fn matches_quick(
    summary: &AppointmentSummary,
    quick: &QuickFilter,
    identity: Option<&Requester>,
    now: NaiveDateTime,
) -> bool {
    match quick {
        QuickFilter::Today => is_today(summary, now),
        QuickFilter::Upcoming => is_upcoming(summary, now),
        QuickFilter::Past => !is_upcoming(summary, now),
        QuickFilter::Mine => is_mine(summary, identity),
    }
}

fn matches(
    summary: &AppointmentSummary,
    filter: &BookingFilter,
    identity: Option<&Requester>,
    now: NaiveDateTime,
) -> bool {
    if let Some(date) = &filter.date {
        if summary.date != date.format(DATE_FORMAT).to_string() {
            return false;
        }
    }
    if let Some(status) = &filter.status {
        if summary.status != *status {
            return false;
        }
    }
    if let Some(service_id) = &filter.service_id {
        if summary.service_id != *service_id {
            return false;
        }
    }
    if let Some(needle) = &filter.client_name {
        let haystack = summary.client_name.to_lowercase();
        if !haystack.contains(&needle.to_lowercase()) {
            return false;
        }
    }
    // Quick filters OR with each other, AND with the explicit criteria.
    if !filter.quick.is_empty()
        && !filter
            .quick
            .iter()
            .any(|q| matches_quick(summary, q, identity, now))
    {
        return false;
    }
    true
}

/// Apply `filter` and return the surviving rows in chronological order
/// (ties kept in input order; malformed rows first, at the epoch).
pub fn filter_appointments(
    appointments: &[AppointmentSummary],
    filter: &BookingFilter,
    identity: Option<&Requester>,
    now: NaiveDateTime,
) -> Vec<AppointmentSummary> {
    let mut selected: Vec<AppointmentSummary> = appointments
        .iter()
        .filter(|s| matches(s, filter, identity, now))
        .cloned()
        .collect();
    selected.sort_by_key(sort_key);
    selected
}

/// Dashboard counters, always computed over the full unfiltered collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingStats {
    pub total: usize,
    pub today: usize,
    pub upcoming: usize,
    pub past: usize,
    pub completed: usize,
    pub cancelled: usize,
    pub mine: usize,
}

pub fn booking_stats(
    appointments: &[AppointmentSummary],
    identity: Option<&Requester>,
    now: NaiveDateTime,
) -> BookingStats {
    let mut stats = BookingStats {
        total: appointments.len(),
        ..Default::default()
    };
    for summary in appointments {
        if is_today(summary, now) {
            stats.today += 1;
        }
        if is_upcoming(summary, now) {
            stats.upcoming += 1;
        } else {
            stats.past += 1;
        }
        match summary.status {
            AppointmentStatus::Completed => stats.completed += 1,
            AppointmentStatus::Cancelled => stats.cancelled += 1,
            AppointmentStatus::Confirmed => {}
        }
        if is_mine(summary, identity) {
            stats.mine += 1;
        }
    }
    stats
}

/// Drop seconds and finer from a wall-clock reading. The timeline works at
/// minute precision; a seconds-bearing `now` would misclassify a row that
/// starts exactly on the current minute.
pub fn truncate_to_minute(now: NaiveDateTime) -> NaiveDateTime {
    now.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now)
}
