// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod activity_log;
pub mod firebase_auth;
pub mod identity_toolkit;
pub mod search;
pub mod stats;
pub mod summary;
pub mod topup;

pub use firebase_auth::{FirebaseTokenVerifier, VerifiedIdToken};
pub use identity_toolkit::IdentityToolkit;
