// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Balance top-up fan-out.
//!
//! A top-up credits every target user and appends one history row per
//! user. Writes are grouped into atomic batches of at most
//! [`MAX_BATCH_OPS`]; a user's increment and history row always land in the
//! same batch. Batches are independent, so a mid-run failure leaves the
//! earlier batches applied. The activity row is written only after every
//! batch has committed.

use crate::db::{Store, UserQuery, WriteOp, MAX_BATCH_OPS};
use crate::error::AppError;
use crate::models::activity::ACTIVITY_SCHEMA_VERSION;
use crate::models::history::DEFAULT_TITLE;
use crate::models::{Activity, ActivityKind, AffectedUser, HistoryEntry, User};
use chrono::{DateTime, Utc};

/// Writes queued per target user (cash increment + history row).
const OPS_PER_USER: usize = 2;

/// Users per committed batch.
pub const USERS_PER_BATCH: usize = MAX_BATCH_OPS / OPS_PER_USER;

/// Who receives the top-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopupTarget {
    /// Every active user whose corps matches exactly
    Corps(String),
    /// A single user by uid
    User(String),
}

impl TopupTarget {
    pub fn kind(&self) -> ActivityKind {
        match self {
            TopupTarget::Corps(_) => ActivityKind::TopupCorps,
            TopupTarget::User(_) => ActivityKind::Topup,
        }
    }
}

/// A validated top-up request.
#[derive(Debug, Clone)]
pub struct TopupRequest {
    pub target: TopupTarget,
    pub amount: i64,
    pub title: Option<String>,
    pub message: Option<String>,
}

impl TopupRequest {
    /// Validate raw request fields.
    ///
    /// Exactly one of `corps` / `user_id` must be non-blank and `amount`
    /// must be a positive integer.
    pub fn new(
        corps: Option<String>,
        user_id: Option<String>,
        amount: Option<i64>,
        title: Option<String>,
        message: Option<String>,
    ) -> Result<Self, AppError> {
        let non_blank = |v: Option<String>| {
            v.map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };

        let target = match (non_blank(corps), non_blank(user_id)) {
            (Some(corps), None) => TopupTarget::Corps(corps),
            (None, Some(uid)) => TopupTarget::User(uid),
            (Some(_), Some(_)) => {
                return Err(AppError::BadRequest(
                    "Specify either corps or userId, not both".to_string(),
                ))
            }
            (None, None) => {
                return Err(AppError::BadRequest(
                    "Either corps or userId is required".to_string(),
                ))
            }
        };

        let amount = amount
            .ok_or_else(|| AppError::BadRequest("amount is required".to_string()))?;
        if amount <= 0 {
            return Err(AppError::BadRequest(
                "amount must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            target,
            amount,
            title: non_blank(title),
            message: non_blank(message),
        })
    }
}

/// Result of a completed top-up.
#[derive(Debug, Clone)]
pub struct TopupOutcome {
    pub activity_id: String,
    pub kind: ActivityKind,
    pub total_updated: usize,
    pub total_amount: i64,
}

/// Load the users a request targets.
async fn resolve_targets(store: &dyn Store, target: &TopupTarget) -> Result<Vec<User>, AppError> {
    match target {
        TopupTarget::Corps(corps) => {
            let users = store
                .list_users(&UserQuery {
                    corps: Some(corps.clone()),
                    only_active: true,
                    limit: None,
                })
                .await?;
            if users.is_empty() {
                return Err(AppError::NotFound(format!(
                    "No active users in corps {corps}"
                )));
            }
            Ok(users)
        }
        TopupTarget::User(uid) => {
            let user = store
                .get_user(uid)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("User {uid} not found")))?;
            if !user.is_active {
                return Err(AppError::BadRequest(format!("User {uid} is not active")));
            }
            Ok(vec![user])
        }
    }
}

/// Group the writes for `users` into batches of at most [`MAX_BATCH_OPS`].
pub fn plan_batches(
    users: &[User],
    request: &TopupRequest,
    admin_name: &str,
    now: DateTime<Utc>,
) -> Vec<Vec<WriteOp>> {
    let kind = request.target.kind();
    let title = request
        .title
        .clone()
        .unwrap_or_else(|| DEFAULT_TITLE.to_string());

    users
        .chunks(USERS_PER_BATCH)
        .map(|chunk| {
            chunk
                .iter()
                .flat_map(|user| {
                    let entry = HistoryEntry {
                        id: uuid::Uuid::new_v4().to_string(),
                        amount: request.amount,
                        title: Some(title.clone()),
                        kind: Some(kind.as_str().to_string()),
                        message: request.message.clone(),
                        admin_name: Some(admin_name.to_string()),
                        corps: Some(user.corps.clone()),
                        created_at: now,
                    };
                    [
                        WriteOp::IncrementCash {
                            uid: user.uid.clone(),
                            amount: request.amount,
                            at: now,
                        },
                        WriteOp::AppendHistory {
                            uid: user.uid.clone(),
                            entry,
                        },
                    ]
                })
                .collect()
        })
        .collect()
}

/// Run a validated top-up on behalf of `admin_name`.
pub async fn run(
    store: &dyn Store,
    request: &TopupRequest,
    admin_name: &str,
    now: DateTime<Utc>,
) -> Result<TopupOutcome, AppError> {
    let users = resolve_targets(store, &request.target).await?;
    let batches = plan_batches(&users, request, admin_name, now);
    let batch_count = batches.len();

    let mut committed_users = 0usize;
    for (index, batch) in batches.into_iter().enumerate() {
        let batch_users = batch.len() / OPS_PER_USER;
        if let Err(e) = store.commit_batch(batch).await {
            tracing::error!(
                topup_target = ?request.target,
                batch = index,
                batch_count,
                committed_users,
                total_users = users.len(),
                error = %e,
                "Top-up fan-out failed part way"
            );
            return Err(e);
        }
        committed_users += batch_users;
    }

    let corps = match &request.target {
        TopupTarget::Corps(corps) => Some(corps.clone()),
        TopupTarget::User(_) => users.first().map(|u| u.corps.clone()),
    };

    let activity = Activity {
        id: String::new(),
        kind: request.target.kind(),
        corps,
        amount: request.amount,
        admin_name: Some(admin_name.to_string()),
        total_user: users.len() as u32,
        affected_users: users
            .iter()
            .map(|u| AffectedUser::Id(u.uid.clone()))
            .collect(),
        schema_version: ACTIVITY_SCHEMA_VERSION,
        created_at: now,
    };

    let activity_id = store.insert_activity(&activity).await?;
    let total_amount = request.amount.saturating_mul(users.len() as i64);

    tracing::info!(
        activity_id = %activity_id,
        kind = activity.kind.as_str(),
        total_users = users.len(),
        total_amount,
        batches = batch_count,
        "Top-up completed"
    );

    Ok(TopupOutcome {
        activity_id,
        kind: activity.kind,
        total_updated: users.len(),
        total_amount,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn users(n: usize) -> Vec<User> {
        (0..n)
            .map(|i| {
                User::new_member(
                    format!("u{i:04}"),
                    format!("User {i}"),
                    format!("u{i}@example.com"),
                    "SOPS".to_string(),
                    Role::User,
                    String::new(),
                    Utc::now(),
                )
            })
            .collect()
    }

    fn corps_request(amount: i64) -> TopupRequest {
        TopupRequest::new(Some("SOPS".to_string()), None, Some(amount), None, None).unwrap()
    }

    #[test]
    fn validation_requires_exactly_one_target() {
        assert!(TopupRequest::new(None, None, Some(10), None, None).is_err());
        assert!(TopupRequest::new(
            Some("SOPS".to_string()),
            Some("uid".to_string()),
            Some(10),
            None,
            None
        )
        .is_err());
        assert!(TopupRequest::new(Some("  ".to_string()), None, Some(10), None, None).is_err());

        let request =
            TopupRequest::new(Some("  ".to_string()), Some("uid".to_string()), Some(10), None, None)
                .unwrap();
        assert_eq!(request.target, TopupTarget::User("uid".to_string()));
    }

    #[test]
    fn validation_rejects_non_positive_amount() {
        let corps = || Some("SOPS".to_string());
        assert!(TopupRequest::new(corps(), None, None, None, None).is_err());
        assert!(TopupRequest::new(corps(), None, Some(0), None, None).is_err());
        assert!(TopupRequest::new(corps(), None, Some(-5), None, None).is_err());
    }

    #[test]
    fn batches_never_split_a_user() {
        let targets = users(450);
        let batches = plan_batches(&targets, &corps_request(1000), "Admin", Utc::now());

        let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![400, 400, 100]);

        for batch in &batches {
            for pair in batch.chunks(2) {
                assert!(matches!(pair[0], WriteOp::IncrementCash { .. }));
                assert!(matches!(pair[1], WriteOp::AppendHistory { .. }));
                assert_eq!(pair[0].uid(), pair[1].uid());
            }
        }
    }

    #[test]
    fn history_row_defaults() {
        let targets = users(1);
        let batches = plan_batches(&targets, &corps_request(5000), "Budi", Utc::now());

        let WriteOp::AppendHistory { entry, .. } = &batches[0][1] else {
            panic!("expected history op");
        };
        assert_eq!(entry.title.as_deref(), Some("Top Up"));
        assert_eq!(entry.kind.as_deref(), Some("TOPUP_CORPS"));
        assert_eq!(entry.admin_name.as_deref(), Some("Budi"));
        assert_eq!(entry.corps.as_deref(), Some("SOPS"));
        assert_eq!(entry.amount, 5000);
    }
}
