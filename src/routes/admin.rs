// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Admin API routes: dashboard, summary and user management.

use crate::db::{ActivityQuery, HistoryQuery, UserQuery};
use crate::error::{AppError, Result};
use crate::extract::{ApiJson, ApiQuery};
use crate::middleware::auth::AdminUser;
use crate::models::{AdminSummary, Role};
use crate::routes::activity::ActivityResponse;
use crate::routes::member::{TransactionResponse, UserResponse};
use crate::services::{search, summary};
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

const DASHBOARD_RECENT_ACTIVITIES: u32 = 5;
const DEFAULT_USERS_LIMIT: u32 = 1000;
const SUMMARY_CACHE_CONTROL: &str = "private, max-age=300";

/// Admin routes (require an admin session).
/// The admin middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/admin", get(get_dashboard))
        .route("/api/admin/profile", get(get_profile))
        .route("/api/admin/summary", get(get_summary))
        .route("/api/admin/users", get(list_users))
        .route("/api/admin/users/search", get(search_users))
        .route("/api/admin/users/{uid}", get(get_user).patch(update_user))
}

// ─── Dashboard & Summary ─────────────────────────────────────

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SummaryResponse {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_users: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_corps: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_cash: i64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub today_topup: i64,
    pub updated_at: String,
}

impl From<AdminSummary> for SummaryResponse {
    fn from(s: AdminSummary) -> Self {
        Self {
            total_users: s.total_users,
            total_corps: s.total_corps,
            total_cash: s.total_cash,
            today_topup: s.today_topup,
            updated_at: format_utc_rfc3339(s.updated_at),
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
pub struct AdminDashboardResponse {
    pub summary: SummaryResponse,
    pub recent_activities: Vec<ActivityResponse>,
}

async fn get_dashboard(State(state): State<Arc<AppState>>) -> Result<Json<AdminDashboardResponse>> {
    let now = Utc::now();
    let current = summary::current(state.db.as_ref(), &state.config.utc_offset, now).await?;
    let recent = state
        .db
        .list_activities(&ActivityQuery {
            limit: Some(DASHBOARD_RECENT_ACTIVITIES),
            ..Default::default()
        })
        .await?;

    Ok(Json(AdminDashboardResponse {
        summary: current.into(),
        recent_activities: recent.into_iter().map(Into::into).collect(),
    }))
}

/// Always recomputes; the browser may cache the answer briefly.
async fn get_summary(State(state): State<Arc<AppState>>) -> Result<Response> {
    let fresh = summary::refresh(state.db.as_ref(), &state.config.utc_offset, Utc::now()).await?;

    let mut response = Json(SummaryResponse::from(fresh)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(SUMMARY_CACHE_CONTROL),
    );
    Ok(response)
}

async fn get_profile(Extension(admin): Extension<AdminUser>) -> Json<UserResponse> {
    Json(admin.0.into())
}

// ─── Users ───────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListUsersParams {
    #[serde(default)]
    only_active: bool,
    limit: Option<u32>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UsersResponse {
    pub users: Vec<UserResponse>,
    pub total: usize,
}

async fn list_users(
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<ListUsersParams>,
) -> Result<Json<UsersResponse>> {
    let mut users = state
        .db
        .list_users(&UserQuery {
            corps: None,
            only_active: params.only_active,
            limit: Some(params.limit.unwrap_or(DEFAULT_USERS_LIMIT).max(1)),
        })
        .await?;

    // Active users first; the sort is stable so store order is kept within each group.
    users.sort_by_key(|u| !u.is_active);

    Ok(Json(UsersResponse {
        total: users.len(),
        users: users.into_iter().map(Into::into).collect(),
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchParams {
    #[serde(default)]
    q: String,
    corps: Option<String>,
    page: Option<u32>,
    per_page: Option<u32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SearchResponse {
    pub users: Vec<UserResponse>,
    pub page: u32,
    pub per_page: u32,
    pub total: usize,
    pub total_pages: u32,
}

async fn search_users(
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<SearchParams>,
) -> Result<Json<SearchResponse>> {
    let users = state.db.list_users(&UserQuery::default()).await?;
    let matches = search::filter_users(users, &params.q, params.corps.as_deref());
    let page = search::paginate(matches, params.page, params.per_page);

    Ok(Json(SearchResponse {
        users: page.items.into_iter().map(Into::into).collect(),
        page: page.page,
        per_page: page.per_page,
        total: page.total,
        total_pages: page.total_pages,
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserDetailResponse {
    pub user: UserResponse,
    pub history: Vec<TransactionResponse>,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub history_total: i64,
    /// `cash` minus the sum of history rows; non-zero means they disagree
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub balance_drift: i64,
}

async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<String>,
) -> Result<Json<UserDetailResponse>> {
    let user = state
        .db
        .get_user(&uid)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", uid)))?;
    let history = state.db.list_history(&uid, &HistoryQuery::default()).await?;

    let history_total: i64 = history.iter().map(|h| h.amount).sum();
    let balance_drift = user.cash - history_total;
    if balance_drift != 0 {
        tracing::warn!(uid = %uid, cash = user.cash, history_total, "Balance and history disagree");
    }

    Ok(Json(UserDetailResponse {
        user: user.into(),
        history: history.into_iter().map(Into::into).collect(),
        history_total,
        balance_drift,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateUserRequest {
    role: Option<String>,
    is_active: Option<bool>,
    corps: Option<String>,
}

async fn update_user(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AdminUser>,
    Path(uid): Path<String>,
    ApiJson(body): ApiJson<UpdateUserRequest>,
) -> Result<Json<UserResponse>> {
    let mut user = state
        .db
        .get_user(&uid)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", uid)))?;

    if let Some(raw) = body.role.as_deref() {
        let role = Role::parse_strict(raw)
            .ok_or_else(|| AppError::BadRequest(format!("Unknown role '{raw}'")))?;
        if uid == admin.uid() && role != user.role() {
            return Err(AppError::BadRequest(
                "Admins cannot change their own role".to_string(),
            ));
        }
        user.role = role.as_str().to_string();
    }

    if let Some(is_active) = body.is_active {
        user.is_active = is_active;
    }

    if let Some(corps) = body.corps {
        let corps = corps.trim().to_string();
        if corps.is_empty() {
            return Err(AppError::BadRequest("corps must not be blank".to_string()));
        }
        user.corps = corps;
    }

    user.updated_at = Utc::now();
    state.db.update_user(&user).await?;

    tracing::info!(
        uid = %uid,
        admin_uid = %admin.uid(),
        role = %user.role,
        is_active = user.is_active,
        corps = %user.corps,
        "User updated"
    );

    if let Err(e) = summary::refresh(state.db.as_ref(), &state.config.utc_offset, Utc::now()).await
    {
        tracing::warn!(error = %e, "Admin summary refresh failed after user update");
    }

    Ok(Json(user.into()))
}
