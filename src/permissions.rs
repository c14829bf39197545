//! Appointment access control.
//!
//! One default-deny cascade shared by every mutation entry point (edit,
//! cancel, complete), checked in order:
//! 1. Administrator → allow
//! 2. Matching edit token → allow, past appointments included
//! 3. Owner → allow for future appointments only
//! 4. Default → deny
//!
//! The token path deliberately skips the future-only rule: the public
//! booking-link flow lets anonymous holders correct historical entries,
//! while signed-in owners are limited to upcoming ones. Tests pin this
//! asymmetry down so it cannot disappear by accident.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::identity::Requester;
use crate::models::Appointment;

// ─── Types ────────────────────────────────────────────────────────────────────

/// Which rule decided the outcome — for audit and caller-facing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MutationReason {
    /// Administrator role.
    Admin,
    /// Matching bearer edit token.
    EditToken,
    /// Authenticated owner of a future appointment.
    Owner,
    /// Owner matched, but the appointment start is not in the future.
    DeniedPastAppointment,
    /// No rule matched.
    DeniedNoAccess,
}

/// Result of a permission check.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MutationDecision {
    pub allowed: bool,
    pub reason: MutationReason,
}

impl MutationDecision {
    fn allow(reason: MutationReason) -> Self {
        Self {
            allowed: true,
            reason,
        }
    }

    fn deny(reason: MutationReason) -> Self {
        Self {
            allowed: false,
            reason,
        }
    }
}

// ─── Checks ───────────────────────────────────────────────────────────────────

fn token_matches(appointment: &Appointment, requester: &Requester) -> bool {
    match (&appointment.edit_token, &requester.edit_token) {
        (Some(stored), Some(presented)) => stored == presented,
        _ => false,
    }
}

fn is_owner(appointment: &Appointment, requester: &Requester) -> bool {
    match (&appointment.owner_id, &requester.user_id) {
        (Some(owner), Some(user)) => owner == user,
        _ => false,
    }
}

/// May `requester` edit, cancel, or complete this appointment?
pub fn can_mutate(
    appointment: &Appointment,
    requester: &Requester,
    now: NaiveDateTime,
) -> MutationDecision {
    if requester.is_admin() {
        return MutationDecision::allow(MutationReason::Admin);
    }

    // Token before owner: a booking that carries both keys keeps its token
    // rights even where the owner path would refuse.
    if token_matches(appointment, requester) {
        return MutationDecision::allow(MutationReason::EditToken);
    }

    if is_owner(appointment, requester) {
        return if appointment.start() > now {
            MutationDecision::allow(MutationReason::Owner)
        } else {
            MutationDecision::deny(MutationReason::DeniedPastAppointment)
        };
    }

    MutationDecision::deny(MutationReason::DeniedNoAccess)
}

/// May `requester` see this appointment? Staff read everything; owners and
/// token holders see their own regardless of when it took place.
pub fn can_view(appointment: &Appointment, requester: &Requester) -> bool {
    requester.is_admin()
        || requester.is_staff()
        || is_owner(appointment, requester)
        || token_matches(appointment, requester)
}
