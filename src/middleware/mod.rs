// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Middleware modules (authentication, page gate, security headers).

pub mod auth;
pub mod role_gate;
pub mod security;

pub use auth::{require_admin, require_session};
pub use role_gate::role_gate;
