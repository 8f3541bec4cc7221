//! Per-user balance history (`users/{uid}/history/{id}`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Title shown for history rows written without one.
pub const DEFAULT_TITLE: &str = "Top Up";

/// One append-only balance movement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// Document ID (filled from the Firestore document name on read)
    #[serde(alias = "_firestore_id", default, skip_serializing)]
    pub id: String,
    #[serde(default)]
    pub amount: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// `TOPUP_CORPS`, `topup`, or legacy values such as `wajib`
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Display name of the admin who made the change
    #[serde(alias = "admin", default, skip_serializing_if = "Option::is_none")]
    pub admin_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corps: Option<String>,
    #[serde(default, with = "firestore::serialize_as_timestamp")]
    pub created_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(DEFAULT_TITLE)
    }

    pub fn display_kind(&self) -> &str {
        self.kind.as_deref().unwrap_or("topup")
    }
}
