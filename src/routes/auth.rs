// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authentication routes: login exchange, logout, registration and
//! password reset.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Extension, Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::{AppError, Result};
use crate::extract::ApiJson;
use crate::middleware::auth::{
    authenticate, create_session_token, load_admin, removal_cookie, session_cookie, AuthUser,
};
use crate::models::{Role, User};
use crate::routes::member::UserResponse;
use crate::AppState;

/// Public auth routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/register", post(register))
        .route("/api/auth/reset-password", post(reset_password))
}

/// Auth routes that need a session (middleware applied in routes/mod.rs).
pub fn session_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/auth/session", get(get_session))
}

async fn role_of(state: &AppState, uid: &str) -> Role {
    match state.db.get_user(uid).await {
        Ok(Some(user)) => user.role(),
        Ok(None) => Role::User,
        Err(e) => {
            tracing::warn!(uid, error = %e, "Role lookup failed; treating as user");
            Role::User
        }
    }
}

// ─── Login / Logout ──────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest {
    id_token: Option<String>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LoginResponse {
    pub message: String,
    pub uid: String,
    pub role: String,
}

/// Exchange a Firebase ID token for a session cookie.
async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>)> {
    let id_token = body
        .id_token
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("idToken is required".to_string()))?;

    let verified = state.id_tokens.verify(id_token.trim()).await?;
    let role = role_of(&state, &verified.uid).await;

    let token = create_session_token(&verified.uid, &state.config.session_signing_key)?;
    let jar = jar.add(session_cookie(token, state.config.secure_cookies()));

    tracing::info!(uid = %verified.uid, role = role.as_str(), "Session created");

    Ok((
        jar,
        Json(LoginResponse {
            message: "Login successful".to_string(),
            uid: verified.uid,
            role: role.as_str().to_string(),
        }),
    ))
}

/// Drop the session cookie.
async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> (StatusCode, CookieJar) {
    let jar = jar.add(removal_cookie(state.config.secure_cookies()));
    (StatusCode::NO_CONTENT, jar)
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SessionResponse {
    pub uid: String,
    pub role: String,
}

async fn get_session(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Json<SessionResponse> {
    let role = role_of(&state, &user.uid).await;
    Json(SessionResponse {
        uid: user.uid,
        role: role.as_str().to_string(),
    })
}

// ─── Registration ────────────────────────────────────────────

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "name is required"))]
    name: String,
    #[serde(default)]
    #[validate(email(message = "a valid email is required"))]
    email: String,
    #[serde(default)]
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    password: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "corps is required"))]
    corps: String,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1, message = "numberPhone is required"))]
    number_phone: String,
}

impl RegisterRequest {
    fn trimmed(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            password: self.password,
            corps: self.corps.trim().to_string(),
            role: self.role,
            number_phone: self.number_phone.trim().to_string(),
        }
    }
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RegisterResponse {
    pub message: String,
    pub user: UserResponse,
}

/// Create an identity account and its profile document.
async fn register(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>)> {
    let body = body.trimmed();
    body.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let role = match body.role.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
        None => Role::User,
        Some(raw) => Role::parse_strict(raw)
            .ok_or_else(|| AppError::BadRequest(format!("Unknown role '{raw}'")))?,
    };

    if role == Role::Admin {
        let caller = authenticate(&state, &jar, &headers).map_err(|_| AppError::Forbidden)?;
        let admin = load_admin(&state, &caller).await?;
        tracing::info!(admin_uid = %admin.uid(), "Admin registering a new admin account");
    }

    let account = state
        .identity
        .sign_up(&body.email, &body.password, &body.name)
        .await?;

    let user = User::new_member(
        account.uid.clone(),
        body.name,
        body.email,
        body.corps,
        role,
        body.number_phone,
        Utc::now(),
    );

    if let Err(e) = state.db.create_user(&user).await {
        tracing::error!(uid = %account.uid, error = %e, "Profile write failed; removing identity account");
        if let Err(cleanup) = state.identity.delete_account(&account.id_token).await {
            tracing::error!(
                uid = %account.uid,
                error = %cleanup,
                "Failed to remove orphaned identity account"
            );
        }
        return Err(e);
    }

    tracing::info!(uid = %user.uid, corps = %user.corps, role = role.as_str(), "User registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered".to_string(),
            user: user.into(),
        }),
    ))
}

// ─── Password reset ──────────────────────────────────────────

#[derive(Deserialize)]
struct ResetPasswordRequest {
    #[serde(default)]
    email: Option<String>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MessageResponse {
    pub message: String,
}

async fn reset_password(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>> {
    let email = body
        .email
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AppError::BadRequest("email is required".to_string()))?;

    state.identity.send_password_reset(&email).await?;

    Ok(Json(MessageResponse {
        message: "If the address is registered, a reset email has been sent".to_string(),
    }))
}
