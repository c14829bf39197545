use chrono::NaiveDate;
use uuid::Uuid;

use super::enums::{AppointmentStatus, QuickFilter};

/// Composable filter criteria for appointment list views.
///
/// Explicit criteria are AND-combined; `quick` filters are OR-combined with
/// each other and AND-combined with the explicit criteria.
#[derive(Debug, Clone, Default)]
pub struct BookingFilter {
    pub date: Option<NaiveDate>,
    pub status: Option<AppointmentStatus>,
    pub service_id: Option<Uuid>,
    /// Case-insensitive substring match on the client name.
    pub client_name: Option<String>,
    pub quick: Vec<QuickFilter>,
}
