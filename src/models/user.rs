//! User model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Access role derived from the stored `role` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Admin,
}

impl Role {
    /// Interpret a stored role string.
    ///
    /// Stored values are free text and have been seen with stray whitespace,
    /// so they are trimmed and compared case-insensitively. Anything that is
    /// not an admin role is a plain user.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "admin" | "super_admin" => Role::Admin,
            _ => Role::User,
        }
    }

    /// Parse a role supplied by an API caller; unknown values are rejected.
    pub fn parse_strict(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "user" => Some(Role::User),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

/// User profile stored in Firestore at `users/{uid}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Firebase Auth uid (also used as document ID)
    pub uid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    /// Corps membership (free text)
    #[serde(default)]
    pub corps: String,
    /// Raw role string; use [`User::role`] to interpret it
    #[serde(default)]
    pub role: String,
    /// Mandatory savings balance, only ever changed by increments
    #[serde(default)]
    pub cash: i64,
    /// Only active users receive corps top-ups
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub number_phone: String,
    #[serde(default, with = "firestore::serialize_as_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "firestore::serialize_as_timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// A freshly registered, active user with a zero balance.
    pub fn new_member(
        uid: String,
        name: String,
        email: String,
        corps: String,
        role: Role,
        number_phone: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            uid,
            name,
            email,
            corps,
            role: role.as_str().to_string(),
            cash: 0,
            is_active: true,
            number_phone,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn role(&self) -> Role {
        Role::parse(&self.role)
    }

    pub fn is_admin(&self) -> bool {
        self.role() == Role::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parse_tolerates_whitespace_and_case() {
        assert_eq!(Role::parse("admin"), Role::Admin);
        assert_eq!(Role::parse(" admin\n"), Role::Admin);
        assert_eq!(Role::parse("Admin"), Role::Admin);
        assert_eq!(Role::parse("super_admin"), Role::Admin);
        assert_eq!(Role::parse("user"), Role::User);
        assert_eq!(Role::parse(""), Role::User);
        assert_eq!(Role::parse("owner"), Role::User);
    }

    #[test]
    fn role_parse_strict_rejects_unknown() {
        assert_eq!(Role::parse_strict(" user "), Some(Role::User));
        assert_eq!(Role::parse_strict("ADMIN"), Some(Role::Admin));
        assert_eq!(Role::parse_strict("super_admin"), None);
        assert_eq!(Role::parse_strict(""), None);
    }
}
