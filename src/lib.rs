// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Primko: mandatory savings management for corps members.
//!
//! This crate provides the backend API for admin top-ups, member balance
//! and history views, the admin activity log, and the role-gated frontend.

pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::Store;
use services::{FirebaseTokenVerifier, IdentityToolkit};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: Arc<dyn Store>,
    pub id_tokens: FirebaseTokenVerifier,
    pub identity: IdentityToolkit,
}
