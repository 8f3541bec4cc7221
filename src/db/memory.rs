// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory store for local development (`STORE_BACKEND=memory`) and tests.
//!
//! All state lives behind one `RwLock`, so every batch is applied
//! all-or-nothing exactly like a Firestore batch write.

use crate::db::{check_batch_size, ActivityQuery, HistoryQuery, Store, UserQuery, WriteOp};
use crate::error::AppError;
use crate::models::{Activity, AdminSummary, HistoryEntry, User};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    /// Keyed by uid; iteration order matches Firestore document-ID order.
    users: BTreeMap<String, User>,
    history: HashMap<String, Vec<HistoryEntry>>,
    activities: Vec<Activity>,
    summary: Option<AdminSummary>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    commits: AtomicUsize,
    /// Number of batches allowed to succeed before commits start failing.
    fail_after: RwLock<Option<usize>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successfully committed batches.
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Let `n` more batches succeed, then fail every later commit.
    pub async fn fail_commits_after(&self, n: usize) {
        *self.fail_after.write().await = Some(self.commit_count() + n);
    }

    pub async fn clear_failures(&self) {
        *self.fail_after.write().await = None;
    }
}

fn in_range(
    at: &chrono::DateTime<chrono::Utc>,
    since: Option<chrono::DateTime<chrono::Utc>>,
    until: Option<chrono::DateTime<chrono::Utc>>,
) -> bool {
    since.is_none_or(|s| *at >= s) && until.is_none_or(|u| *at < u)
}

fn activity_matches(activity: &Activity, query: &ActivityQuery) -> bool {
    query.kind.is_none_or(|k| activity.kind == k)
        && in_range(&activity.created_at, query.since, query.until)
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_user(&self, uid: &str) -> Result<Option<User>, AppError> {
        Ok(self.inner.read().await.users.get(uid).cloned())
    }

    async fn get_users(&self, uids: &[String]) -> Result<Vec<User>, AppError> {
        let inner = self.inner.read().await;
        Ok(uids
            .iter()
            .filter_map(|uid| inner.users.get(uid).cloned())
            .collect())
    }

    async fn find_user_by_name(&self, name: &str) -> Result<Option<User>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner.users.values().find(|u| u.name == name).cloned())
    }

    async fn list_users(&self, query: &UserQuery) -> Result<Vec<User>, AppError> {
        let inner = self.inner.read().await;
        let limit = query.limit.map_or(usize::MAX, |l| l as usize);
        Ok(inner
            .users
            .values()
            .filter(|u| query.corps.as_ref().is_none_or(|c| &u.corps == c))
            .filter(|u| !query.only_active || u.is_active)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn create_user(&self, user: &User) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        if inner.users.contains_key(&user.uid) {
            return Err(AppError::Database(format!(
                "User document {} already exists",
                user.uid
            )));
        }
        inner.users.insert(user.uid.clone(), user.clone());
        Ok(())
    }

    async fn update_user(&self, user: &User) -> Result<(), AppError> {
        self.inner
            .write()
            .await
            .users
            .insert(user.uid.clone(), user.clone());
        Ok(())
    }

    async fn delete_user(&self, uid: &str) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        inner.users.remove(uid);
        inner.history.remove(uid);
        Ok(())
    }

    async fn list_history(
        &self,
        uid: &str,
        query: &HistoryQuery,
    ) -> Result<Vec<HistoryEntry>, AppError> {
        let inner = self.inner.read().await;
        let mut rows: Vec<HistoryEntry> = inner
            .history
            .get(uid)
            .map(|rows| {
                rows.iter()
                    .filter(|h| in_range(&h.created_at, query.since, query.until))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = query.limit {
            rows.truncate(limit as usize);
        }
        Ok(rows)
    }

    async fn commit_batch(&self, ops: Vec<WriteOp>) -> Result<(), AppError> {
        check_batch_size(&ops)?;

        if let Some(limit) = *self.fail_after.read().await {
            if self.commit_count() >= limit {
                return Err(AppError::Database("Batch write rejected".to_string()));
            }
        }

        let mut inner = self.inner.write().await;

        // Validate everything before touching state so the batch is atomic.
        for op in &ops {
            if !inner.users.contains_key(op.uid()) {
                return Err(AppError::Database(format!(
                    "Batch references missing user {}",
                    op.uid()
                )));
            }
        }

        for op in ops {
            match op {
                WriteOp::IncrementCash { uid, amount, at } => {
                    if let Some(user) = inner.users.get_mut(&uid) {
                        user.cash = user.cash.saturating_add(amount);
                        user.updated_at = at;
                    }
                }
                WriteOp::AppendHistory { uid, mut entry } => {
                    if entry.id.is_empty() {
                        entry.id = uuid::Uuid::new_v4().to_string();
                    }
                    inner.history.entry(uid).or_default().push(entry);
                }
            }
        }

        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn insert_activity(&self, activity: &Activity) -> Result<String, AppError> {
        let mut activity = activity.clone();
        if activity.id.is_empty() {
            activity.id = uuid::Uuid::new_v4().to_string();
        }
        let id = activity.id.clone();
        self.inner.write().await.activities.push(activity);
        Ok(id)
    }

    async fn update_activity(&self, activity: &Activity) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        match inner.activities.iter_mut().find(|a| a.id == activity.id) {
            Some(existing) => {
                *existing = activity.clone();
                Ok(())
            }
            None => Err(AppError::NotFound(format!(
                "Activity {} not found",
                activity.id
            ))),
        }
    }

    async fn list_activities(&self, query: &ActivityQuery) -> Result<Vec<Activity>, AppError> {
        let inner = self.inner.read().await;
        let mut rows: Vec<Activity> = inner
            .activities
            .iter()
            .filter(|a| activity_matches(a, query))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let limit = query.limit.map_or(usize::MAX, |l| l as usize);
        Ok(rows
            .into_iter()
            .skip(query.offset as usize)
            .take(limit)
            .collect())
    }

    async fn count_activities(&self, query: &ActivityQuery) -> Result<u64, AppError> {
        let inner = self.inner.read().await;
        Ok(inner
            .activities
            .iter()
            .filter(|a| activity_matches(a, query))
            .count() as u64)
    }

    async fn get_summary(&self) -> Result<Option<AdminSummary>, AppError> {
        Ok(self.inner.read().await.summary.clone())
    }

    async fn set_summary(&self, summary: &AdminSummary) -> Result<(), AppError> {
        self.inner.write().await.summary = Some(summary.clone());
        Ok(())
    }
}
