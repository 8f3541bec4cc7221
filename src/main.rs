// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Primko API Server
//!
//! Mandatory savings for corps members: admins top up balances per corps
//! or per member, members follow their balance and history.

use primko::{
    config::{Config, StoreBackend},
    db::{FirestoreStore, MemoryStore, Store},
    services::{FirebaseTokenVerifier, IdentityToolkit},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Primko API");

    let db: Arc<dyn Store> = match config.store_backend {
        StoreBackend::Firestore => Arc::new(
            FirestoreStore::new(&config.firebase_project_id)
                .await
                .expect("Failed to connect to Firestore"),
        ),
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data will not survive a restart");
            Arc::new(MemoryStore::new())
        }
    };

    let id_tokens =
        FirebaseTokenVerifier::new(&config).expect("Failed to initialize ID token verifier");
    let identity =
        IdentityToolkit::new(&config).expect("Failed to initialize Identity Toolkit client");
    tracing::info!(
        identity_toolkit = %config.identity_toolkit_url,
        web_root = %config.web_root.display(),
        "Services initialized"
    );

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        id_tokens,
        identity,
    });

    // Build router
    let app = primko::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("primko=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
