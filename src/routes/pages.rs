// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Frontend pages, served from the built web root behind the role gate.

use crate::middleware::role_gate;
use crate::AppState;
use axum::{middleware, Router};
use std::sync::Arc;
use tower_http::services::{ServeDir, ServeFile};

/// Static files, with client-side routes falling back to `index.html`.
pub fn routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let web_root = &state.config.web_root;
    let index = web_root.join("index.html");
    let files = ServeDir::new(web_root).fallback(ServeFile::new(index));

    Router::new()
        .fallback_service(files)
        .layer(middleware::from_fn_with_state(state, role_gate))
}
