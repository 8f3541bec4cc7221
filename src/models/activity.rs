// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Global activity log model (`Activities/{id}`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Rows written with this version store `affectedUsers` as user ids.
pub const ACTIVITY_SCHEMA_VERSION: u32 = 2;

/// Kind of logged admin action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityKind {
    /// Bulk top-up of every active user in a corps
    #[serde(rename = "TOPUP_CORPS")]
    TopupCorps,
    /// Top-up of a single user
    #[serde(rename = "topup", alias = "TOPUP")]
    Topup,
    #[serde(rename = "VIEW")]
    View,
    /// Anything else found in old rows
    #[serde(other)]
    Unknown,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::TopupCorps => "TOPUP_CORPS",
            ActivityKind::Topup => "topup",
            ActivityKind::View => "VIEW",
            ActivityKind::Unknown => "unknown",
        }
    }

    /// Parse a `type` filter value as used by the admin activity page.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "TOPUP_CORPS" => Some(ActivityKind::TopupCorps),
            "topup" | "TOPUP" => Some(ActivityKind::Topup),
            "VIEW" => Some(ActivityKind::View),
            _ => None,
        }
    }

    pub fn is_topup(&self) -> bool {
        matches!(self, ActivityKind::TopupCorps | ActivityKind::Topup)
    }
}

/// One entry of `affectedUsers`.
///
/// Current rows hold bare user ids. Older rows hold either bare strings
/// (ids or display names, indistinguishable without a lookup) or
/// `{name, amount}` objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AffectedUser {
    Id(String),
    Legacy {
        name: String,
        #[serde(default)]
        amount: Option<i64>,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AffectedUsersRepr {
    List(Vec<AffectedUser>),
    Indexed(HashMap<String, AffectedUser>),
}

/// Accept `affectedUsers` as an array or as an object keyed by index
/// (`{"0": .., "1": ..}`), the latter read in numeric key order.
fn deserialize_affected_users<'de, D>(deserializer: D) -> Result<Vec<AffectedUser>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match AffectedUsersRepr::deserialize(deserializer)? {
        AffectedUsersRepr::List(list) => list,
        AffectedUsersRepr::Indexed(map) => {
            let mut entries: Vec<(String, AffectedUser)> = map.into_iter().collect();
            entries.sort_by(|(a, _), (b, _)| {
                match (a.parse::<u64>(), b.parse::<u64>()) {
                    (Ok(x), Ok(y)) => x.cmp(&y),
                    (Ok(_), Err(_)) => std::cmp::Ordering::Less,
                    (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
                    (Err(_), Err(_)) => a.cmp(b),
                }
            });
            entries.into_iter().map(|(_, user)| user).collect()
        }
    })
}

/// Global activity record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    /// Document ID (filled from the Firestore document name on read)
    #[serde(alias = "_firestore_id", default, skip_serializing)]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corps: Option<String>,
    /// Amount credited to each affected user
    #[serde(default)]
    pub amount: i64,
    #[serde(alias = "admin", default, skip_serializing_if = "Option::is_none")]
    pub admin_name: Option<String>,
    #[serde(alias = "totalUsers", default)]
    pub total_user: u32,
    #[serde(default, deserialize_with = "deserialize_affected_users")]
    pub affected_users: Vec<AffectedUser>,
    #[serde(default)]
    pub schema_version: u32,
    #[serde(default, with = "firestore::serialize_as_timestamp")]
    pub created_at: DateTime<Utc>,
}

impl Activity {
    /// Total amount moved by this activity across all affected users.
    pub fn total_amount(&self) -> i64 {
        if self.kind.is_topup() {
            self.amount.saturating_mul(i64::from(self.total_user.max(1)))
        } else {
            0
        }
    }

    pub fn needs_normalization(&self) -> bool {
        self.schema_version < ACTIVITY_SCHEMA_VERSION
    }

    /// User ids, for rows already in the current schema.
    pub fn affected_user_ids(&self) -> impl Iterator<Item = &str> {
        self.affected_users.iter().filter_map(|u| match u {
            AffectedUser::Id(id) => Some(id.as_str()),
            AffectedUser::Legacy { .. } => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn affected_users_accepts_all_legacy_shapes() {
        let raw = serde_json::json!([
            "uid-1",
            { "name": "Budi", "amount": 20000 },
            { "name": "Sari" }
        ]);
        let parsed: Vec<AffectedUser> = serde_json::from_value(raw).unwrap();

        assert_eq!(
            parsed,
            vec![
                AffectedUser::Id("uid-1".to_string()),
                AffectedUser::Legacy {
                    name: "Budi".to_string(),
                    amount: Some(20000)
                },
                AffectedUser::Legacy {
                    name: "Sari".to_string(),
                    amount: None
                },
            ]
        );
    }

    #[test]
    fn affected_users_accepts_index_keyed_object() {
        let activity: Activity = serde_json::from_value(serde_json::json!({
            "type": "topup",
            "amount": 1000,
            "affectedUsers": { "10": "uid-3", "1": "Budi", "0": "uid-1" }
        }))
        .unwrap();

        assert_eq!(
            activity.affected_users,
            vec![
                AffectedUser::Id("uid-1".to_string()),
                AffectedUser::Id("Budi".to_string()),
                AffectedUser::Id("uid-3".to_string()),
            ]
        );
        assert!(activity.needs_normalization());
    }

    #[test]
    fn missing_affected_users_defaults_to_empty() {
        let activity: Activity = serde_json::from_value(serde_json::json!({
            "type": "TOPUP_CORPS",
            "corps": "SET",
            "amount": 20000
        }))
        .unwrap();
        assert!(activity.affected_users.is_empty());
    }

    #[test]
    fn kind_parse_matches_stored_names() {
        assert_eq!(ActivityKind::parse("TOPUP_CORPS"), Some(ActivityKind::TopupCorps));
        assert_eq!(ActivityKind::parse("topup"), Some(ActivityKind::Topup));
        assert_eq!(ActivityKind::parse("VIEW"), Some(ActivityKind::View));
        assert_eq!(ActivityKind::parse("bogus"), None);
    }

    #[test]
    fn unknown_kind_deserializes() {
        let kind: ActivityKind = serde_json::from_value(serde_json::json!("WITHDRAW")).unwrap();
        assert_eq!(kind, ActivityKind::Unknown);
    }
}
