// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Admin activity log routes.

use crate::db::ActivityQuery;
use crate::error::{AppError, Result};
use crate::extract::ApiQuery;
use crate::models::{Activity, ActivityKind, AffectedUser};
use crate::services::activity_log::{self, ResolvedUser};
use crate::time_utils::{format_utc_rfc3339, local_day, parse_date, today};
use crate::AppState;
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

const DEFAULT_ACTIVITY_LIMIT: u32 = 20;
const MAX_ACTIVITY_LIMIT: u32 = 100;
const DEFAULT_TOPUPS_LIMIT: u32 = 100;
const WEEK_DAYS: i64 = 7;

/// Activity routes (require an admin session).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/admin/activity", get(list_activity))
        .route("/api/admin/activity/normalize", post(normalize_activity))
        .route("/api/admin/topups", get(list_topups))
}

/// Activity row as returned by the API.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ActivityResponse {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub corps: Option<String>,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub amount: i64,
    pub admin_name: Option<String>,
    pub total_user: u32,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_amount: i64,
    /// User ids, or display names on rows not yet normalized
    pub affected_users: Vec<String>,
    pub schema_version: u32,
    pub created_at: String,
}

impl From<Activity> for ActivityResponse {
    fn from(a: Activity) -> Self {
        let total_amount = a.total_amount();
        Self {
            id: a.id,
            kind: a.kind.as_str().to_string(),
            corps: a.corps,
            amount: a.amount,
            admin_name: a.admin_name,
            total_user: a.total_user,
            total_amount,
            affected_users: a
                .affected_users
                .into_iter()
                .map(|u| match u {
                    AffectedUser::Id(id) => id,
                    AffectedUser::Legacy { name, .. } => name,
                })
                .collect(),
            schema_version: a.schema_version,
            created_at: format_utc_rfc3339(a.created_at),
        }
    }
}

// ─── Activity log ────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActivityParams {
    limit: Option<u32>,
    #[serde(rename = "type")]
    kind: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
    page: Option<u32>,
}

fn parse_bound(name: &str, raw: Option<&str>) -> Result<Option<chrono::NaiveDate>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => parse_date(s)
            .map(Some)
            .ok_or_else(|| AppError::BadRequest(format!("{name} must be YYYY-MM-DD"))),
    }
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ActivityPageResponse {
    pub page: u32,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total: u64,
    pub activities: Vec<ActivityResponse>,
}

async fn list_activity(
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<ActivityParams>,
) -> Result<Json<ActivityPageResponse>> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_ACTIVITY_LIMIT)
        .clamp(1, MAX_ACTIVITY_LIMIT);
    let page = params.page.unwrap_or(1).max(1);

    let kind = match params.kind.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => None,
        Some(raw) => Some(
            ActivityKind::parse(raw)
                .ok_or_else(|| AppError::BadRequest(format!("Unknown activity type '{raw}'")))?,
        ),
    };

    let offset = &state.config.utc_offset;
    let start = parse_bound("startDate", params.start_date.as_deref())?;
    let end = parse_bound("endDate", params.end_date.as_deref())?;
    if let (Some(s), Some(e)) = (start, end) {
        if s > e {
            return Err(AppError::BadRequest(
                "startDate must not be after endDate".to_string(),
            ));
        }
    }

    let mut query = ActivityQuery {
        kind,
        since: start.map(|d| local_day(d, offset).start),
        until: end.map(|d| local_day(d, offset).end),
        offset: 0,
        limit: None,
    };
    let total = state.db.count_activities(&query).await?;

    query.offset = (page - 1).saturating_mul(limit);
    query.limit = Some(limit);
    let activities = state.db.list_activities(&query).await?;

    Ok(Json(ActivityPageResponse {
        page,
        total,
        activities: activities.into_iter().map(Into::into).collect(),
    }))
}

// ─── Top-up feed ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FeedFilter {
    All,
    Today,
    Week,
}

impl FeedFilter {
    fn parse(raw: Option<&str>) -> Result<Self> {
        match raw.map(str::trim).unwrap_or("all") {
            "" | "all" => Ok(FeedFilter::All),
            "today" => Ok(FeedFilter::Today),
            "week" => Ok(FeedFilter::Week),
            other => Err(AppError::BadRequest(format!("Unknown filter '{other}'"))),
        }
    }

    fn since(&self, state: &AppState, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let start_of_today = today(now, &state.config.utc_offset).start;
        match self {
            FeedFilter::All => None,
            FeedFilter::Today => Some(start_of_today),
            FeedFilter::Week => Some(start_of_today - Duration::days(WEEK_DAYS - 1)),
        }
    }
}

#[derive(Deserialize)]
struct TopupsParams {
    filter: Option<String>,
    limit: Option<u32>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AffectedUserResponse {
    pub uid: Option<String>,
    pub name: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub amount: i64,
}

impl From<ResolvedUser> for AffectedUserResponse {
    fn from(u: ResolvedUser) -> Self {
        Self {
            uid: u.uid,
            name: u.name,
            amount: u.amount,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TopupFeedItem {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub corps: Option<String>,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub amount: i64,
    pub admin_name: Option<String>,
    pub total_user: u32,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_amount: i64,
    pub affected_users: Vec<AffectedUserResponse>,
    pub created_at: String,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TopupFeedResponse {
    pub activities: Vec<TopupFeedItem>,
    pub total: usize,
}

async fn list_topups(
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<TopupsParams>,
) -> Result<Json<TopupFeedResponse>> {
    let filter = FeedFilter::parse(params.filter.as_deref())?;
    let limit = params.limit.unwrap_or(DEFAULT_TOPUPS_LIMIT).max(1);
    let since = filter.since(&state, Utc::now());

    // One query per top-up kind keeps other activity types from using up the limit.
    let mut rows = Vec::new();
    for kind in [ActivityKind::TopupCorps, ActivityKind::Topup] {
        rows.extend(
            state
                .db
                .list_activities(&ActivityQuery {
                    kind: Some(kind),
                    since,
                    limit: Some(limit),
                    ..Default::default()
                })
                .await?,
        );
    }
    rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    rows.truncate(limit as usize);

    let mut activities = Vec::with_capacity(rows.len());
    for row in rows {
        let affected = activity_log::resolve_affected(state.db.as_ref(), &row).await?;
        activities.push(TopupFeedItem {
            total_amount: row.total_amount(),
            id: row.id,
            kind: row.kind.as_str().to_string(),
            corps: row.corps,
            amount: row.amount,
            admin_name: row.admin_name,
            total_user: row.total_user,
            affected_users: affected.into_iter().map(Into::into).collect(),
            created_at: format_utc_rfc3339(row.created_at),
        });
    }

    Ok(Json(TopupFeedResponse {
        total: activities.len(),
        activities,
    }))
}

// ─── Normalization ───────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct NormalizeResponse {
    pub scanned: usize,
    pub migrated: usize,
    pub unresolved: usize,
}

async fn normalize_activity(State(state): State<Arc<AppState>>) -> Result<Json<NormalizeResponse>> {
    let report = activity_log::normalize(state.db.as_ref()).await?;
    Ok(Json(NormalizeResponse {
        scanned: report.scanned,
        migrated: report.migrated,
        unresolved: report.unresolved,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_filter_parsing() {
        assert_eq!(FeedFilter::parse(None).unwrap(), FeedFilter::All);
        assert_eq!(FeedFilter::parse(Some("today")).unwrap(), FeedFilter::Today);
        assert_eq!(FeedFilter::parse(Some("week")).unwrap(), FeedFilter::Week);
        assert!(FeedFilter::parse(Some("month")).is_err());
    }

    #[test]
    fn legacy_affected_users_render_as_names() {
        let activity = Activity {
            id: "a1".to_string(),
            kind: ActivityKind::TopupCorps,
            corps: Some("SOPS".to_string()),
            amount: 10000,
            admin_name: None,
            total_user: 2,
            affected_users: vec![
                AffectedUser::Id("uid-1".to_string()),
                AffectedUser::Legacy {
                    name: "Budi".to_string(),
                    amount: Some(10000),
                },
            ],
            schema_version: 0,
            created_at: Utc::now(),
        };

        let view = ActivityResponse::from(activity);
        assert_eq!(view.affected_users, vec!["uid-1", "Budi"]);
        assert_eq!(view.total_amount, 20000);
        assert_eq!(view.kind, "TOPUP_CORPS");
    }
}
