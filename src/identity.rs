//! Requesting identity at the edge of the engine.
//!
//! The identity provider itself is an external collaborator; it hands the
//! caller a user id, an email, and a role. Anonymous clients hold no user id
//! and authorize themselves per appointment with a bearer edit token.

use serde::{Deserialize, Serialize};

use crate::models::Role;

/// Who is asking. Built by the calling layer from the identity provider
/// (or from a public booking link) and passed into every permission check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Requester {
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub role: Role,
    /// Bearer token presented via a public booking link, if any.
    pub edit_token: Option<String>,
}

impl Requester {
    /// Anonymous visitor with no credentials at all.
    pub fn anonymous() -> Self {
        Self {
            user_id: None,
            email: None,
            role: Role::User,
            edit_token: None,
        }
    }

    /// Anonymous holder of a public booking link token.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            edit_token: Some(token.into()),
            ..Self::anonymous()
        }
    }

    /// Authenticated regular user.
    pub fn user(user_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            email: Some(email.into()),
            role: Role::User,
            edit_token: None,
        }
    }

    /// Staff member (read access to all appointments, no mutation rights).
    pub fn staff(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            email: None,
            role: Role::Staff,
            edit_token: None,
        }
    }

    /// Administrator.
    pub fn admin(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            email: None,
            role: Role::Admin,
            edit_token: None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_staff(&self) -> bool {
        self.role == Role::Staff
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_has_no_credentials() {
        let r = Requester::anonymous();
        assert!(r.user_id.is_none());
        assert!(r.edit_token.is_none());
        assert!(!r.is_admin());
    }

    #[test]
    fn token_holder_keeps_user_role() {
        let r = Requester::with_token("tok");
        assert_eq!(r.role, Role::User);
        assert_eq!(r.edit_token.as_deref(), Some("tok"));
    }

    #[test]
    fn admin_is_admin() {
        assert!(Requester::admin("a-1").is_admin());
        assert!(!Requester::staff("s-1").is_admin());
        assert!(Requester::staff("s-1").is_staff());
    }
}
