// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Admin top-up endpoint.

use crate::error::Result;
use crate::extract::ApiJson;
use crate::middleware::auth::AdminUser;
use crate::services::topup::{self, TopupRequest, TopupTarget};
use crate::services::summary;
use crate::AppState;
use axum::{extract::State, routing::post, Extension, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Top-up routes (require an admin session).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/admin/topup", post(create_topup))
        .route("/api/admin/top-up/corps", post(create_topup))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TopupBody {
    corps: Option<String>,
    user_id: Option<String>,
    amount: Option<i64>,
    title: Option<String>,
    message: Option<String>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TopupResponse {
    pub success: bool,
    pub message: String,
    pub activity_id: String,
    pub total_updated: usize,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_amount: i64,
}

/// Credit every active member of a corps, or a single member.
async fn create_topup(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AdminUser>,
    ApiJson(body): ApiJson<TopupBody>,
) -> Result<Json<TopupResponse>> {
    let request = TopupRequest::new(
        body.corps,
        body.user_id,
        body.amount,
        body.title,
        body.message,
    )?;

    let now = Utc::now();
    let outcome = topup::run(state.db.as_ref(), &request, admin.display_name(), now).await?;

    if let Err(e) = summary::refresh(state.db.as_ref(), &state.config.utc_offset, Utc::now()).await
    {
        tracing::warn!(
            activity_id = %outcome.activity_id,
            error = %e,
            "Admin summary refresh failed after top-up"
        );
    }

    let message = match &request.target {
        TopupTarget::Corps(corps) => format!(
            "Topped up {} member(s) of {}",
            outcome.total_updated, corps
        ),
        TopupTarget::User(_) => "Topped up 1 member".to_string(),
    };

    Ok(Json(TopupResponse {
        success: true,
        message,
        activity_id: outcome.activity_id,
        total_updated: outcome.total_updated,
        total_amount: outcome.total_amount,
    }))
}
