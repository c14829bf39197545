//! Business calendar configuration: opening hours, lunch break, business
//! days, and the slot grid. Pure data — validated once, read-only at engine
//! runtime. Changing it is an administrative operation outside this crate.

use std::path::PathBuf;

use chrono::Weekday;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "Salonbook";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when RUST_LOG is unset.
pub fn default_log_filter() -> String {
    format!("{}=info", env!("CARGO_PKG_NAME"))
}

/// Get the application data directory (~/Salonbook/ on all platforms).
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join(APP_NAME)
}

/// Default location of the booking database.
pub fn default_db_path() -> PathBuf {
    app_data_dir().join("salonbook.db")
}

// ─── Time windows ─────────────────────────────────────────────────────────────

/// Half-open window of wall-clock minutes since midnight: `[start_min, end_min)`.
///
/// A window with `start_min == end_min` is empty and never intersects
/// anything — the "no lunch break" encoding is `{0, 0}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start_min: u32,
    pub end_min: u32,
}

impl TimeWindow {
    pub fn new(start_min: u32, end_min: u32) -> Self {
        Self { start_min, end_min }
    }

    /// Window from whole hours of day, e.g. `from_hours(9, 18)` = 09:00–18:00.
    pub fn from_hours(start_hour: u32, end_hour: u32) -> Self {
        Self {
            start_min: start_hour * 60,
            end_min: end_hour * 60,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start_min >= self.end_min
    }

    /// Half-open interval intersection: touching endpoints do not overlap.
    pub fn overlaps(&self, other_start_min: u32, other_end_min: u32) -> bool {
        !self.is_empty()
            && other_start_min < other_end_min
            && self.start_min < other_end_min
            && other_start_min < self.end_min
    }
}

// ─── Calendar config ──────────────────────────────────────────────────────────

/// Errors from calendar configuration validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Business hours window is inverted or empty ({start_min}..{end_min})")]
    EmptyBusinessHours { start_min: u32, end_min: u32 },
    #[error("Business hours exceed the day (end {end_min} > 1440)")]
    BeyondMidnight { end_min: u32 },
    #[error("Lunch break is inverted ({start_min}..{end_min})")]
    InvertedLunch { start_min: u32, end_min: u32 },
    #[error("Lunch break lies outside business hours")]
    LunchOutsideHours,
    #[error("Slot duration must be a positive number of minutes")]
    ZeroSlotDuration,
    #[error("At least one business day is required")]
    NoBusinessDays,
}

/// Calendar constraints used by slot computation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessCalendarConfig {
    pub business_hours: TimeWindow,
    pub lunch_break: TimeWindow,
    pub business_days: Vec<Weekday>,
    pub slot_duration_min: u32,
}

impl Default for BusinessCalendarConfig {
    /// 09:00–18:00, lunch 13:00–14:00, Monday through Saturday, 30-minute grid.
    fn default() -> Self {
        Self {
            business_hours: TimeWindow::from_hours(9, 18),
            lunch_break: TimeWindow::from_hours(13, 14),
            business_days: vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
                Weekday::Sat,
            ],
            slot_duration_min: 30,
        }
    }
}

impl BusinessCalendarConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.business_hours.is_empty() {
            return Err(ConfigError::EmptyBusinessHours {
                start_min: self.business_hours.start_min,
                end_min: self.business_hours.end_min,
            });
        }
        if self.business_hours.end_min > 24 * 60 {
            return Err(ConfigError::BeyondMidnight {
                end_min: self.business_hours.end_min,
            });
        }
        // Lunch {0,0} means no lunch break; a non-empty lunch must be inside
        // business hours. start > end is always a configuration mistake.
        if self.lunch_break.start_min > self.lunch_break.end_min {
            return Err(ConfigError::InvertedLunch {
                start_min: self.lunch_break.start_min,
                end_min: self.lunch_break.end_min,
            });
        }
        if !self.lunch_break.is_empty()
            && (self.lunch_break.start_min < self.business_hours.start_min
                || self.lunch_break.end_min > self.business_hours.end_min)
        {
            return Err(ConfigError::LunchOutsideHours);
        }
        if self.slot_duration_min == 0 {
            return Err(ConfigError::ZeroSlotDuration);
        }
        if self.business_days.is_empty() {
            return Err(ConfigError::NoBusinessDays);
        }
        Ok(())
    }

    pub fn is_business_day(&self, weekday: Weekday) -> bool {
        self.business_days.contains(&weekday)
    }
}
