// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

#![allow(dead_code)]

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use jsonwebtoken::{encode, Algorithm, DecodingKey, EncodingKey, Header};
use primko::config::Config;
use primko::db::{MemoryStore, Store};
use primko::middleware::auth::create_session_token;
use primko::models::{Role, User};
use primko::routes::create_router;
use primko::services::{FirebaseTokenVerifier, IdentityToolkit};
use primko::AppState;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use tower::ServiceExt;

/// Shared secret and kid of the static ID token verifier used in tests.
pub const FIREBASE_TEST_SECRET: &[u8] = b"firebase-test-secret";
pub const TEST_KID: &str = "test-kid";

/// A router over an in-memory store.
pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub store: Arc<MemoryStore>,
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Session cookie header value for `uid`.
    pub fn cookie_for(&self, uid: &str) -> String {
        let token = create_session_token(uid, &self.state.config.session_signing_key).unwrap();
        format!("session={token}")
    }
}

/// Create a test app with the default test config.
pub fn create_test_app() -> TestApp {
    create_test_app_with_config(Config::test_default())
}

pub fn create_test_app_with_config(config: Config) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let id_tokens = FirebaseTokenVerifier::new_with_static_key(
        &config,
        TEST_KID,
        DecodingKey::from_secret(FIREBASE_TEST_SECRET),
        Algorithm::HS256,
    )
    .unwrap();
    let identity = IdentityToolkit::new(&config).unwrap();

    let state = Arc::new(AppState {
        config,
        db: store.clone(),
        id_tokens,
        identity,
    });

    TestApp {
        router: create_router(state.clone()),
        state,
        store,
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// A Firebase-style ID token the test verifier accepts.
pub fn mint_id_token(uid: &str, email: &str) -> String {
    let now = now_secs();
    let claims = json!({
        "iss": "https://securetoken.google.com/primko-test",
        "aud": "primko-test",
        "sub": uid,
        "email": email,
        "iat": now,
        "exp": now + 3600,
    });

    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(TEST_KID.to_string());
    encode(&header, &claims, &EncodingKey::from_secret(FIREBASE_TEST_SECRET)).unwrap()
}

/// Store a user with the given balance and active flag.
pub async fn seed_user(
    store: &MemoryStore,
    uid: &str,
    name: &str,
    corps: &str,
    role: Role,
    cash: i64,
    is_active: bool,
) -> User {
    let mut user = User::new_member(
        uid.to_string(),
        name.to_string(),
        format!("{uid}@example.com"),
        corps.to_string(),
        role,
        "08123456789".to_string(),
        chrono::Utc::now(),
    );
    user.cash = cash;
    user.is_active = is_active;
    store.create_user(&user).await.unwrap();
    user
}

pub async fn seed_admin(store: &MemoryStore, uid: &str) -> User {
    seed_user(store, uid, "Admin Utama", "HQ", Role::Admin, 0, true).await
}

// ─── Request helpers ─────────────────────────────────────────

pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn json_request(method: &str, uri: &str, cookie: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn post_json(uri: &str, cookie: Option<&str>, body: Value) -> Request<Body> {
    json_request("POST", uri, cookie, body)
}

pub async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn set_cookie_headers(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|value| value.to_str().unwrap().to_string())
        .collect()
}

/// Whether the response tells the browser to drop the session cookie.
pub fn clears_session(response: &Response) -> bool {
    set_cookie_headers(response)
        .iter()
        .any(|c| c.starts_with("session=") && c.contains("Max-Age=0"))
}

// ─── Fake Identity Toolkit ───────────────────────────────────

/// Records what the fake Identity Toolkit server was asked to do.
#[derive(Default)]
pub struct FakeIdentity {
    pub existing_emails: Mutex<Vec<String>>,
    pub sign_ups: AtomicUsize,
    pub deletes: AtomicUsize,
    pub oob_emails: Mutex<Vec<String>>,
}

fn provider_error(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": { "code": 400, "message": message } })),
    )
        .into_response()
}

async fn fake_accounts(
    State(fake): State<Arc<FakeIdentity>>,
    Path(method): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let email = body["email"].as_str().unwrap_or_default().to_string();

    match method.as_str() {
        "accounts:signUp" => {
            if fake.existing_emails.lock().unwrap().contains(&email) {
                return provider_error("EMAIL_EXISTS");
            }
            let n = fake.sign_ups.fetch_add(1, Ordering::SeqCst) + 1;
            Json(json!({
                "localId": format!("new-uid-{n}"),
                "idToken": format!("new-id-token-{n}"),
                "email": email,
            }))
            .into_response()
        }
        "accounts:delete" => {
            fake.deletes.fetch_add(1, Ordering::SeqCst);
            Json(json!({})).into_response()
        }
        "accounts:sendOobCode" => {
            if email.starts_with("unknown") {
                return provider_error("EMAIL_NOT_FOUND");
            }
            fake.oob_emails.lock().unwrap().push(email.clone());
            Json(json!({ "email": email })).into_response()
        }
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Start a fake Identity Toolkit on a random local port and return an app
/// configured to call it.
pub async fn create_test_app_with_identity() -> (TestApp, Arc<FakeIdentity>) {
    let fake = Arc::new(FakeIdentity::default());
    let router = Router::new()
        .route("/v1/{method}", post(fake_accounts))
        .with_state(fake.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let mut config = Config::test_default();
    config.identity_toolkit_url = format!("http://{addr}");
    (create_test_app_with_config(config), fake)
}

// ─── Firestore emulator ──────────────────────────────────────

/// Check if emulator is available via environment variable.
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Connect to the Firestore emulator.
pub async fn test_firestore() -> primko::db::FirestoreStore {
    primko::db::FirestoreStore::new("primko-test")
        .await
        .expect("Failed to connect to Firestore emulator")
}
