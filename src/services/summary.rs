// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Admin dashboard aggregate.
//!
//! The stored `admin_summary/main` document is always a full recomputation
//! from the users and today's activities, never an in-place increment.

use crate::db::{ActivityQuery, Store, UserQuery};
use crate::error::AppError;
use crate::models::{Activity, AdminSummary, User};
use crate::time_utils;
use chrono::{DateTime, FixedOffset, Utc};
use std::collections::HashSet;

/// Derive the summary from all users and the activities of the current local day.
pub fn compute(users: &[User], today_activities: &[Activity], now: DateTime<Utc>) -> AdminSummary {
    let total_corps = users
        .iter()
        .map(|u| u.corps.trim())
        .filter(|c| !c.is_empty())
        .collect::<HashSet<_>>()
        .len();

    AdminSummary {
        total_users: users.len() as u64,
        total_corps: total_corps as u64,
        total_cash: users.iter().map(|u| u.cash).sum(),
        today_topup: today_activities.iter().map(Activity::total_amount).sum(),
        updated_at: now,
    }
}

/// Recompute and store the summary.
pub async fn refresh(
    store: &dyn Store,
    offset: &FixedOffset,
    now: DateTime<Utc>,
) -> Result<AdminSummary, AppError> {
    let users = store.list_users(&UserQuery::default()).await?;

    let today = time_utils::today(now, offset);
    let activities = store
        .list_activities(&ActivityQuery {
            since: Some(today.start),
            until: Some(today.end),
            ..Default::default()
        })
        .await?;

    let summary = compute(&users, &activities, now);
    store.set_summary(&summary).await?;

    tracing::debug!(
        total_users = summary.total_users,
        total_cash = summary.total_cash,
        today_topup = summary.today_topup,
        "Admin summary refreshed"
    );

    Ok(summary)
}

/// Stored summary, computed on first use.
pub async fn current(
    store: &dyn Store,
    offset: &FixedOffset,
    now: DateTime<Utc>,
) -> Result<AdminSummary, AppError> {
    match store.get_summary().await? {
        Some(summary) => Ok(summary),
        None => refresh(store, offset, now).await,
    }
}
