//! Database layer.
//!
//! Handlers talk to a [`Store`]; production runs on Firestore, local
//! development and tests on an in-memory store with the same semantics.

pub mod firestore;
pub mod memory;

pub use self::firestore::FirestoreStore;
pub use memory::MemoryStore;

use crate::error::AppError;
use crate::models::{Activity, ActivityKind, AdminSummary, HistoryEntry, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    /// Subcollection under `users/{uid}`
    pub const HISTORY: &str = "history";
    pub const ACTIVITIES: &str = "Activities";
    pub const ADMIN_SUMMARY: &str = "admin_summary";
    /// Single document holding the dashboard aggregate
    pub const SUMMARY_DOC: &str = "main";
}

// Firestore limits batch writes to 500 operations.
// We use a safe limit of 400 to allow headroom.
pub const MAX_BATCH_OPS: usize = 400;

/// A single write inside an atomic batch.
#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Atomic server-side increment of `users/{uid}.cash`; also sets `updatedAt`.
    IncrementCash {
        uid: String,
        amount: i64,
        at: DateTime<Utc>,
    },
    /// New document in `users/{uid}/history`.
    AppendHistory { uid: String, entry: HistoryEntry },
}

impl WriteOp {
    pub fn uid(&self) -> &str {
        match self {
            WriteOp::IncrementCash { uid, .. } => uid,
            WriteOp::AppendHistory { uid, .. } => uid,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct UserQuery {
    /// Exact corps match
    pub corps: Option<String>,
    pub only_active: bool,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct HistoryQuery {
    /// Inclusive lower bound on `createdAt`
    pub since: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `createdAt`
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct ActivityQuery {
    pub kind: Option<ActivityKind>,
    /// Inclusive lower bound on `createdAt`
    pub since: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `createdAt`
    pub until: Option<DateTime<Utc>>,
    pub offset: u32,
    pub limit: Option<u32>,
}

/// Persistence operations used by the API.
///
/// Listing operations return newest first where the collection has a
/// `createdAt` ordering.
#[async_trait]
pub trait Store: Send + Sync {
    // ─── Users ───────────────────────────────────────────────────

    async fn get_user(&self, uid: &str) -> Result<Option<User>, AppError>;

    /// Best-effort batch read; missing documents are skipped.
    async fn get_users(&self, uids: &[String]) -> Result<Vec<User>, AppError>;

    /// First user whose `name` equals `name` exactly.
    async fn find_user_by_name(&self, name: &str) -> Result<Option<User>, AppError>;

    async fn list_users(&self, query: &UserQuery) -> Result<Vec<User>, AppError>;

    async fn create_user(&self, user: &User) -> Result<(), AppError>;

    /// Overwrite the profile document.
    async fn update_user(&self, user: &User) -> Result<(), AppError>;

    async fn delete_user(&self, uid: &str) -> Result<(), AppError>;

    // ─── History ─────────────────────────────────────────────────

    async fn list_history(
        &self,
        uid: &str,
        query: &HistoryQuery,
    ) -> Result<Vec<HistoryEntry>, AppError>;

    /// Apply up to [`MAX_BATCH_OPS`] writes atomically.
    async fn commit_batch(&self, ops: Vec<WriteOp>) -> Result<(), AppError>;

    // ─── Activities ──────────────────────────────────────────────

    /// Store a new activity row, returning its document ID.
    async fn insert_activity(&self, activity: &Activity) -> Result<String, AppError>;

    /// Overwrite an existing activity row (keyed by `activity.id`).
    async fn update_activity(&self, activity: &Activity) -> Result<(), AppError>;

    /// Matching rows, newest first, after `offset`/`limit`.
    async fn list_activities(&self, query: &ActivityQuery) -> Result<Vec<Activity>, AppError>;

    /// Number of rows matching the filters of `query` (ignores offset/limit).
    async fn count_activities(&self, query: &ActivityQuery) -> Result<u64, AppError>;

    // ─── Admin summary ───────────────────────────────────────────

    async fn get_summary(&self) -> Result<Option<AdminSummary>, AppError>;

    async fn set_summary(&self, summary: &AdminSummary) -> Result<(), AppError>;
}

/// Reject batches the backend cannot apply atomically.
pub(crate) fn check_batch_size(ops: &[WriteOp]) -> Result<(), AppError> {
    if ops.len() > MAX_BATCH_OPS {
        return Err(AppError::Database(format!(
            "Batch of {} operations exceeds the limit of {}",
            ops.len(),
            MAX_BATCH_OPS
        )));
    }
    Ok(())
}
