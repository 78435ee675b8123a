use serde::{Deserialize, Serialize};
use std::fmt;

/// Account roles.
///
/// The order of variants matters: it defines the privilege hierarchy.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A registered community member.
    #[default]
    User = 0,
    /// Full access to the admin area.
    Admin = 1,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl Role {
    /// Returns `true` if `self` has at least the required role.
    pub fn has_access(&self, required: Role) -> bool {
        *self >= required
    }
}

/// Identity carried in the signed session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    /// Hex ObjectId for stored users, `admin` for the bootstrap admin.
    pub user_id: String,
    pub username: String,
    pub role: Role,
}

impl SessionUser {
    pub fn is_admin(&self) -> bool {
        self.role.has_access(Role::Admin)
    }
}
