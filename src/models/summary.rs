//! Admin dashboard aggregate (`admin_summary/main`).
//!
//! The stored document is a cache of [`crate::services::summary::compute`];
//! nothing increments it in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminSummary {
    #[serde(default)]
    pub total_users: u64,
    #[serde(default)]
    pub total_corps: u64,
    #[serde(default)]
    pub total_cash: i64,
    /// Total credited by top-ups since local midnight
    #[serde(default)]
    pub today_topup: i64,
    #[serde(default, with = "firestore::serialize_as_timestamp")]
    pub updated_at: DateTime<Utc>,
}
