// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity log reading and legacy-row normalization.
//!
//! Rows in the current schema list affected users by uid. Rows written
//! before that list display names, uids, or `{name, amount}` objects, and
//! may use `admin`/`totalUsers` instead of `adminName`/`totalUser`. Reading
//! handles every shape; [`normalize`] rewrites old rows into the current one.

use crate::db::{ActivityQuery, Store, UserQuery};
use crate::error::AppError;
use crate::models::activity::ACTIVITY_SCHEMA_VERSION;
use crate::models::{Activity, AffectedUser, User};
use std::collections::HashMap;

/// An affected user as shown in the admin top-up feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUser {
    /// `None` when a legacy entry no longer matches any profile
    pub uid: Option<String>,
    pub name: String,
    pub amount: i64,
}

/// Look up a legacy identifier, trying it as a uid first and then as a name.
async fn lookup(store: &dyn Store, identifier: &str) -> Result<Option<User>, AppError> {
    if let Some(user) = store.get_user(identifier).await? {
        return Ok(Some(user));
    }
    store.find_user_by_name(identifier).await
}

/// Resolve the affected users of one activity row for display.
pub async fn resolve_affected(
    store: &dyn Store,
    activity: &Activity,
) -> Result<Vec<ResolvedUser>, AppError> {
    // Rows that recorded nobody show the corps' current members.
    if activity.affected_users.is_empty() {
        let Some(corps) = activity.corps.as_ref().filter(|c| !c.trim().is_empty()) else {
            return Ok(Vec::new());
        };
        let members = store
            .list_users(&UserQuery {
                corps: Some(corps.clone()),
                ..Default::default()
            })
            .await?;
        return Ok(members
            .into_iter()
            .map(|u| ResolvedUser {
                uid: Some(u.uid),
                name: u.name,
                amount: activity.amount,
            })
            .collect());
    }

    if !activity.needs_normalization() {
        let ids: Vec<String> = activity.affected_user_ids().map(str::to_string).collect();
        let by_uid: HashMap<String, User> = store
            .get_users(&ids)
            .await?
            .into_iter()
            .map(|u| (u.uid.clone(), u))
            .collect();

        return Ok(ids
            .into_iter()
            .map(|uid| {
                let name = by_uid
                    .get(&uid)
                    .map(|u| u.name.clone())
                    .unwrap_or_else(|| uid.clone());
                ResolvedUser {
                    uid: Some(uid),
                    name,
                    amount: activity.amount,
                }
            })
            .collect());
    }

    let mut resolved = Vec::with_capacity(activity.affected_users.len());
    for entry in &activity.affected_users {
        let (identifier, amount) = match entry {
            AffectedUser::Id(id) => (id.as_str(), activity.amount),
            AffectedUser::Legacy { name, amount } => {
                (name.as_str(), amount.unwrap_or(activity.amount))
            }
        };

        let user = match lookup(store, identifier).await {
            Ok(user) => user,
            Err(e) => {
                tracing::warn!(identifier, error = %e, "Affected user lookup failed");
                None
            }
        };

        resolved.push(match user {
            Some(u) => ResolvedUser {
                uid: Some(u.uid),
                name: u.name,
                amount,
            },
            None => ResolvedUser {
                uid: None,
                name: identifier.to_string(),
                amount,
            },
        });
    }

    Ok(resolved)
}

/// Outcome of a normalization pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    pub scanned: usize,
    pub migrated: usize,
    /// Rows left untouched because an entry matched no user or none were recorded
    pub unresolved: usize,
}

/// Rewrite one legacy row into the current schema, or `None` if any entry
/// cannot be matched to a user.
///
/// Rows that recorded no users at all stay as they are; their credited
/// members are unknown.
async fn migrate(store: &dyn Store, activity: &Activity) -> Result<Option<Activity>, AppError> {
    if activity.affected_users.is_empty() {
        tracing::warn!(activity_id = %activity.id, "Activity records no affected users");
        return Ok(None);
    }

    let mut uids = Vec::with_capacity(activity.affected_users.len());

    for entry in &activity.affected_users {
        let identifier = match entry {
            AffectedUser::Id(id) => id.as_str(),
            AffectedUser::Legacy { name, .. } => name.as_str(),
        };
        match lookup(store, identifier).await? {
            Some(user) => uids.push(AffectedUser::Id(user.uid)),
            None => {
                tracing::warn!(
                    activity_id = %activity.id,
                    identifier,
                    "Cannot resolve affected user"
                );
                return Ok(None);
            }
        }
    }

    let mut migrated = activity.clone();
    if migrated.total_user == 0 {
        migrated.total_user = uids.len() as u32;
    }
    migrated.affected_users = uids;
    migrated.schema_version = ACTIVITY_SCHEMA_VERSION;
    Ok(Some(migrated))
}

/// Migrate every legacy activity row to the current schema.
///
/// Re-running is harmless: migrated rows are skipped.
pub async fn normalize(store: &dyn Store) -> Result<NormalizeReport, AppError> {
    let activities = store.list_activities(&ActivityQuery::default()).await?;
    let mut report = NormalizeReport {
        scanned: activities.len(),
        ..Default::default()
    };

    for activity in activities.iter().filter(|a| a.needs_normalization()) {
        match migrate(store, activity).await? {
            Some(updated) => {
                store.update_activity(&updated).await?;
                report.migrated += 1;
            }
            None => report.unresolved += 1,
        }
    }

    tracing::info!(
        scanned = report.scanned,
        migrated = report.migrated,
        unresolved = report.unresolved,
        "Activity normalization finished"
    );

    Ok(report)
}
