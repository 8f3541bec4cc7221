// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore-backed [`Store`].
//!
//! Collections:
//! - `users/{uid}` profiles, with `users/{uid}/history/{id}` balance rows
//! - `Activities/{id}` global admin activity log
//! - `admin_summary/main` dashboard aggregate

use crate::db::{
    check_batch_size, collections, ActivityQuery, HistoryQuery, Store, UserQuery, WriteOp,
};
use crate::error::AppError;
use crate::models::{Activity, AdminSummary, HistoryEntry, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use firestore::{FirestoreQueryDirection, FirestoreTimestamp};
use futures_util::{stream, StreamExt};
use serde::{Deserialize, Serialize};

const MAX_CONCURRENT_DB_OPS: usize = 50;

/// Field mask document written alongside the `cash` increment.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TouchUpdatedAt {
    #[serde(with = "firestore::serialize_as_timestamp")]
    updated_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct CountAggregate {
    #[serde(default)]
    count: u64,
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreStore {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreStore {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create an offline client; every operation returns an error.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }
}

#[async_trait]
impl Store for FirestoreStore {
    // ─── User Operations ─────────────────────────────────────────

    async fn get_user(&self, uid: &str) -> Result<Option<User>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(uid)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn get_users(&self, uids: &[String]) -> Result<Vec<User>, AppError> {
        let results: Vec<Result<Option<User>, AppError>> = stream::iter(uids.to_vec())
            .map(|uid| async move { self.get_user(&uid).await })
            .buffered(MAX_CONCURRENT_DB_OPS)
            .collect()
            .await;

        let mut users = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(Some(user)) => users.push(user),
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "Skipping unreadable user document"),
            }
        }
        Ok(users)
    }

    async fn find_user_by_name(&self, name: &str) -> Result<Option<User>, AppError> {
        let users: Vec<User> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(|q| q.for_all([q.field("name").eq(name)]))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(users.into_iter().next())
    }

    async fn list_users(&self, query: &UserQuery) -> Result<Vec<User>, AppError> {
        let select = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(|q| {
                q.for_all([
                    query
                        .corps
                        .as_ref()
                        .and_then(|c| q.field("corps").eq(c.as_str())),
                    if query.only_active {
                        q.field("isActive").eq(true)
                    } else {
                        None
                    },
                ])
            });

        let select = match query.limit {
            Some(limit) => select.limit(limit),
            None => select,
        };

        select
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn create_user(&self, user: &User) -> Result<(), AppError> {
        let _: User = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::USERS)
            .document_id(&user.uid)
            .object(user)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn update_user(&self, user: &User) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&user.uid)
            .object(user)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn delete_user(&self, uid: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::USERS)
            .document_id(uid)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── History Operations ──────────────────────────────────────

    async fn list_history(
        &self,
        uid: &str,
        query: &HistoryQuery,
    ) -> Result<Vec<HistoryEntry>, AppError> {
        let client = self.get_client()?;
        let parent = client
            .parent_path(collections::USERS, uid)
            .map_err(|e| AppError::Database(e.to_string()))?;

        let select = client
            .fluent()
            .select()
            .from(collections::HISTORY)
            .parent(&parent)
            .filter(|q| {
                q.for_all([
                    query.since.and_then(|s| {
                        q.field("createdAt")
                            .greater_than_or_equal(FirestoreTimestamp(s))
                    }),
                    query
                        .until
                        .and_then(|u| q.field("createdAt").less_than(FirestoreTimestamp(u))),
                ])
            })
            .order_by([("createdAt", FirestoreQueryDirection::Descending)]);

        let select = match query.limit {
            Some(limit) => select.limit(limit),
            None => select,
        };

        select
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn commit_batch(&self, ops: Vec<WriteOp>) -> Result<(), AppError> {
        check_batch_size(&ops)?;
        if ops.is_empty() {
            return Ok(());
        }

        let client = self.get_client()?;
        let writer = client
            .create_simple_batch_writer()
            .await
            .map_err(|e| AppError::Database(format!("Failed to create batch writer: {}", e)))?;
        let mut batch = writer.new_batch();

        for op in &ops {
            match op {
                WriteOp::IncrementCash { uid, amount, at } => {
                    client
                        .fluent()
                        .update()
                        .fields(["updatedAt"])
                        .in_col(collections::USERS)
                        .document_id(uid)
                        .object(&TouchUpdatedAt { updated_at: *at })
                        .transforms(|t| t.fields([t.field("cash").increment(*amount)]))
                        .add_to_batch(&mut batch)
                        .map_err(|e| {
                            AppError::Database(format!(
                                "Failed to add cash increment to batch: {}",
                                e
                            ))
                        })?;
                }
                WriteOp::AppendHistory { uid, entry } => {
                    let parent = client
                        .parent_path(collections::USERS, uid)
                        .map_err(|e| AppError::Database(e.to_string()))?;
                    let doc_id = if entry.id.is_empty() {
                        uuid::Uuid::new_v4().to_string()
                    } else {
                        entry.id.clone()
                    };

                    client
                        .fluent()
                        .update()
                        .in_col(collections::HISTORY)
                        .document_id(&doc_id)
                        .parent(&parent)
                        .object(entry)
                        .add_to_batch(&mut batch)
                        .map_err(|e| {
                            AppError::Database(format!(
                                "Failed to add history row to batch: {}",
                                e
                            ))
                        })?;
                }
            }
        }

        batch
            .write()
            .await
            .map_err(|e| AppError::Database(format!("Batch write failed: {}", e)))?;

        tracing::debug!(ops = ops.len(), "Batch committed");
        Ok(())
    }

    // ─── Activity Operations ─────────────────────────────────────

    async fn insert_activity(&self, activity: &Activity) -> Result<String, AppError> {
        let id = if activity.id.is_empty() {
            uuid::Uuid::new_v4().to_string()
        } else {
            activity.id.clone()
        };

        let _: Activity = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::ACTIVITIES)
            .document_id(&id)
            .object(activity)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(id)
    }

    async fn update_activity(&self, activity: &Activity) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::ACTIVITIES)
            .document_id(&activity.id)
            .object(activity)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn list_activities(&self, query: &ActivityQuery) -> Result<Vec<Activity>, AppError> {
        let select = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::ACTIVITIES)
            .filter(|q| {
                q.for_all([
                    query.kind.and_then(|k| q.field("type").eq(k.as_str())),
                    query.since.and_then(|s| {
                        q.field("createdAt")
                            .greater_than_or_equal(FirestoreTimestamp(s))
                    }),
                    query
                        .until
                        .and_then(|u| q.field("createdAt").less_than(FirestoreTimestamp(u))),
                ])
            })
            .order_by([("createdAt", FirestoreQueryDirection::Descending)])
            .offset(query.offset);

        let select = match query.limit {
            Some(limit) => select.limit(limit),
            None => select,
        };

        select
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn count_activities(&self, query: &ActivityQuery) -> Result<u64, AppError> {
        let counts: Vec<CountAggregate> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::ACTIVITIES)
            .filter(|q| {
                q.for_all([
                    query.kind.and_then(|k| q.field("type").eq(k.as_str())),
                    query.since.and_then(|s| {
                        q.field("createdAt")
                            .greater_than_or_equal(FirestoreTimestamp(s))
                    }),
                    query
                        .until
                        .and_then(|u| q.field("createdAt").less_than(FirestoreTimestamp(u))),
                ])
            })
            .aggregate(|a| a.fields([a.field("count").count()]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(counts.first().map_or(0, |c| c.count))
    }

    // ─── Admin Summary ───────────────────────────────────────────

    async fn get_summary(&self) -> Result<Option<AdminSummary>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::ADMIN_SUMMARY)
            .obj()
            .one(collections::SUMMARY_DOC)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn set_summary(&self, summary: &AdminSummary) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::ADMIN_SUMMARY)
            .document_id(collections::SUMMARY_DOC)
            .object(summary)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}
