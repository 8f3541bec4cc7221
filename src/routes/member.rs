// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for signed-in members.
//!
//! Every handler is scoped to the uid of the session; there is no way to
//! ask for another user's data here.

use crate::db::{HistoryQuery, Store};
use crate::error::{AppError, Result};
use crate::extract::ApiQuery;
use crate::middleware::auth::AuthUser;
use crate::models::corps::PREDEFINED_CORPS;
use crate::models::{HistoryEntry, User};
use crate::services::stats::{self, TransactionFilter};
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    extract::State,
    routing::get,
    Extension, Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

const DASHBOARD_RECENT: u32 = 5;
const HISTORY_LIMIT: u32 = 50;
const DEFAULT_TRANSACTIONS_LIMIT: u32 = 20;
const MAX_TRANSACTIONS_LIMIT: u32 = 500;

/// Member routes (require a session).
/// The session middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/user/profile", get(get_profile))
        .route("/api/user/dashboard", get(get_dashboard))
        .route("/api/user/history", get(get_history))
        .route("/api/user/transactions", get(get_transactions))
        .route("/api/user/savings", get(get_savings))
        .route("/api/user/stats", get(get_stats))
        .route("/api/corps", get(get_corps))
}

// ─── Shared views ────────────────────────────────────────────

/// User profile as returned by the API.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserResponse {
    pub uid: String,
    pub name: String,
    pub email: String,
    pub corps: String,
    /// `admin` or `user`
    pub role: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub cash: i64,
    pub is_active: bool,
    pub number_phone: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            role: user.role().as_str().to_string(),
            uid: user.uid,
            name: user.name,
            email: user.email,
            corps: user.corps,
            cash: user.cash,
            is_active: user.is_active,
            number_phone: user.number_phone,
            created_at: format_utc_rfc3339(user.created_at),
            updated_at: format_utc_rfc3339(user.updated_at),
        }
    }
}

/// One history row as returned by the API.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TransactionResponse {
    pub id: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub amount: i64,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corps: Option<String>,
}

impl From<HistoryEntry> for TransactionResponse {
    fn from(entry: HistoryEntry) -> Self {
        Self {
            title: entry.display_title().to_string(),
            kind: entry.display_kind().to_string(),
            date: format_utc_rfc3339(entry.created_at),
            id: entry.id,
            amount: entry.amount,
            message: entry.message,
            admin_name: entry.admin_name,
            corps: entry.corps,
        }
    }
}

async fn load_profile(store: &dyn Store, uid: &str) -> Result<User> {
    store
        .get_user(uid)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", uid)))
}

async fn load_history(store: &dyn Store, uid: &str, query: HistoryQuery) -> Result<Vec<HistoryEntry>> {
    Ok(store.list_history(uid, &query).await?)
}

// ─── Profile & Dashboard ─────────────────────────────────────

async fn get_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<UserResponse>> {
    let profile = load_profile(state.db.as_ref(), &user.uid).await?;
    Ok(Json(profile.into()))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DashboardResponse {
    pub name: String,
    pub corps: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub cash: i64,
    pub recent_transactions: Vec<TransactionResponse>,
}

async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<DashboardResponse>> {
    let profile = load_profile(state.db.as_ref(), &user.uid).await?;
    let recent = load_history(
        state.db.as_ref(),
        &user.uid,
        HistoryQuery {
            limit: Some(DASHBOARD_RECENT),
            ..Default::default()
        },
    )
    .await?;

    Ok(Json(DashboardResponse {
        name: profile.name,
        corps: profile.corps,
        cash: profile.cash,
        recent_transactions: recent.into_iter().map(Into::into).collect(),
    }))
}

// ─── History & Transactions ──────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct HistoryResponse {
    pub transactions: Vec<TransactionResponse>,
    pub total: usize,
}

async fn get_history(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<HistoryResponse>> {
    let rows = load_history(
        state.db.as_ref(),
        &user.uid,
        HistoryQuery {
            limit: Some(HISTORY_LIMIT),
            ..Default::default()
        },
    )
    .await?;

    Ok(Json(HistoryResponse {
        total: rows.len(),
        transactions: rows.into_iter().map(Into::into).collect(),
    }))
}

#[derive(Deserialize)]
struct TransactionsParams {
    filter: Option<String>,
    limit: Option<u32>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TransactionsSummary {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total: i64,
    pub count: usize,
    pub filter: String,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TransactionsResponse {
    pub transactions: Vec<TransactionResponse>,
    pub summary: TransactionsSummary,
}

async fn get_transactions(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiQuery(params): ApiQuery<TransactionsParams>,
) -> Result<Json<TransactionsResponse>> {
    let filter = TransactionFilter::parse(params.filter.as_deref())?;
    let limit = params
        .limit
        .unwrap_or(DEFAULT_TRANSACTIONS_LIMIT)
        .clamp(1, MAX_TRANSACTIONS_LIMIT);
    let window = filter.window(Utc::now(), &state.config.utc_offset);

    let rows = load_history(
        state.db.as_ref(),
        &user.uid,
        HistoryQuery {
            since: window.map(|w| w.start),
            until: window.map(|w| w.end),
            limit: Some(limit),
        },
    )
    .await?;

    let summary = TransactionsSummary {
        total: rows.iter().map(|r| r.amount).sum(),
        count: rows.len(),
        filter: filter.as_str().to_string(),
    };

    Ok(Json(TransactionsResponse {
        transactions: rows.into_iter().map(Into::into).collect(),
        summary,
    }))
}

// ─── Savings & Stats ─────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SavingsResponse {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_cash: i64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub monthly_total: i64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub months_saving: i64,
    pub corps: String,
    pub total_transactions: usize,
    pub last_update: Option<String>,
}

async fn get_savings(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<SavingsResponse>> {
    let profile = load_profile(state.db.as_ref(), &user.uid).await?;
    let history = load_history(state.db.as_ref(), &user.uid, HistoryQuery::default()).await?;
    let savings = stats::savings(&profile, &history, Utc::now());

    Ok(Json(SavingsResponse {
        total_cash: savings.total_cash,
        monthly_total: savings.monthly_total,
        months_saving: savings.months_saving,
        corps: profile.corps,
        total_transactions: savings.total_transactions,
        last_update: savings.last_update.map(format_utc_rfc3339),
    }))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MonthlyBreakdown {
    pub month: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub amount: i64,
    pub count: usize,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LargestTransaction {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub amount: i64,
    pub date: String,
    pub title: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct StatsResponse {
    pub total_transactions: usize,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_amount: i64,
    pub average_amount: f64,
    pub monthly_breakdown: Vec<MonthlyBreakdown>,
    pub largest_transaction: Option<LargestTransaction>,
}

async fn get_stats(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<StatsResponse>> {
    let history = load_history(state.db.as_ref(), &user.uid, HistoryQuery::default()).await?;
    let member_stats = stats::member_stats(&history, Utc::now(), &state.config.utc_offset);

    Ok(Json(StatsResponse {
        total_transactions: member_stats.total_transactions,
        total_amount: member_stats.total_amount,
        average_amount: member_stats.average_amount,
        monthly_breakdown: member_stats
            .monthly_breakdown
            .into_iter()
            .map(|b| MonthlyBreakdown {
                month: b.month,
                amount: b.amount,
                count: b.count,
            })
            .collect(),
        largest_transaction: member_stats.largest.map(|h| LargestTransaction {
            amount: h.amount,
            date: format_utc_rfc3339(h.created_at),
            title: h.display_title().to_string(),
        }),
    }))
}

// ─── Corps ───────────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CorpsResponse {
    pub corps: Vec<String>,
}

async fn get_corps() -> Json<CorpsResponse> {
    Json(CorpsResponse {
        corps: PREDEFINED_CORPS.iter().map(|c| c.to_string()).collect(),
    })
}
