//! Authorization context of the caller that triggered an invocation

use serde::{Deserialize, Serialize};

/// Role granted to regular tenant users
pub const ROLE_USER: i32 = 0;

/// Role granted to tenant administrators
pub const ROLE_ADMIN: i32 = 100;

/// Identity and authority of the acting tenant account.
///
/// Owned by the dispatcher and borrowed for the duration of one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Auth {
    /// Account (tenant customer) the user belongs to
    pub account_id: String,
    /// Acting user
    pub user_id: String,
    /// Email of the acting user
    pub email: String,
    /// Role level
    pub role: i32,
    /// Session token issued to the user
    pub token: String,
}

impl Auth {
    /// Create a context for a regular user
    pub fn new(
        account_id: impl Into<String>,
        user_id: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            user_id: user_id.into(),
            email: String::new(),
            role: ROLE_USER,
            token: token.into(),
        }
    }

    /// Attach an email address
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    /// Attach a role level
    pub fn with_role(mut self, role: i32) -> Self {
        self.role = role;
        self
    }

    /// Whether the caller holds administrator rights
    pub fn is_admin(&self) -> bool {
        self.role >= ROLE_ADMIN
    }

    /// Rebuild the bearer token the caller presented, so messages published
    /// from a script carry the same authority as the triggering request.
    pub fn reconstruct_token(&self) -> String {
        format!("{}|{}", self.user_id, self.token)
    }
}
