// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod activity;
pub mod corps;
pub mod history;
pub mod summary;
pub mod user;

pub use activity::{Activity, ActivityKind, AffectedUser};
pub use history::HistoryEntry;
pub use summary::AdminSummary;
pub use user::{Role, User};
