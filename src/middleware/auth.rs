// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session cookie and JWT authentication middleware.
//!
//! The login exchange turns a Firebase ID token into a signed session
//! token carried in the `session` cookie. Roles are not part of the token;
//! they are read from the user's profile on each admin request.

use crate::error::{AppError, ClearSession};
use crate::models::User;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "session";

/// Session lifetime (30 days).
pub const SESSION_TTL_SECS: usize = 30 * 24 * 60 * 60;

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (Firebase uid)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

/// Authenticated user extracted from the session token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub uid: String,
}

/// Admin whose profile was loaded by [`require_admin`].
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

impl AdminUser {
    pub fn uid(&self) -> &str {
        &self.0.uid
    }

    /// Name recorded on history and activity rows.
    pub fn display_name(&self) -> &str {
        if self.0.name.trim().is_empty() {
            &self.0.email
        } else {
            &self.0.name
        }
    }
}

/// Session cookie carrying `token`.
pub fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(SESSION_TTL_SECS as i64))
        .build()
}

/// Cookie that deletes the session cookie; attributes match [`session_cookie`].
pub fn removal_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::ZERO)
        .build()
}

/// Create a JWT for a user session.
pub fn create_session_token(uid: &str, signing_key: &[u8]) -> anyhow::Result<String> {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as usize;

    let claims = Claims {
        sub: uid.to_string(),
        iat: now,
        exp: now + SESSION_TTL_SECS,
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )?)
}

/// Verify a session token, distinguishing expiry from other failures.
pub fn verify_session_token(token: &str, signing_key: &[u8]) -> Result<Claims, AppError> {
    let key = DecodingKey::from_secret(signing_key);
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    let token_data = decode::<Claims>(token, &key, &validation).map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AppError::SessionExpired,
        _ => {
            tracing::debug!(error = %e, "Rejected session token");
            AppError::InvalidToken
        }
    })?;

    if token_data.claims.sub.is_empty() {
        return Err(AppError::InvalidToken);
    }

    Ok(token_data.claims)
}

/// Session token from the cookie, or failing that the `Authorization` header.
pub fn session_token(jar: &CookieJar, headers: &HeaderMap) -> Option<String> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Resolve the caller's session.
pub fn authenticate(
    state: &AppState,
    jar: &CookieJar,
    headers: &HeaderMap,
) -> Result<AuthUser, AppError> {
    let token = session_token(jar, headers).ok_or(AppError::Unauthorized)?;
    let claims = verify_session_token(&token, &state.config.session_signing_key)?;
    Ok(AuthUser { uid: claims.sub })
}

/// Load the caller's profile and require the admin role.
///
/// A missing profile or a failed lookup counts as a plain user.
pub async fn load_admin(state: &AppState, auth: &AuthUser) -> Result<AdminUser, AppError> {
    match state.db.get_user(&auth.uid).await {
        Ok(Some(user)) if user.is_admin() => Ok(AdminUser(user)),
        Ok(Some(_)) => {
            tracing::warn!(uid = %auth.uid, "Non-admin attempted admin access");
            Err(AppError::Forbidden)
        }
        Ok(None) => {
            tracing::warn!(uid = %auth.uid, "Session user has no profile");
            Err(AppError::Forbidden)
        }
        Err(e) => {
            tracing::error!(uid = %auth.uid, error = %e, "Role lookup failed");
            Err(AppError::Forbidden)
        }
    }
}

/// Middleware that requires a valid session.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_user = authenticate(&state, &jar, request.headers())?;
    request.extensions_mut().insert(auth_user);
    Ok(next.run(request).await)
}

/// Middleware that requires a valid session belonging to an admin.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_user = authenticate(&state, &jar, request.headers())?;
    let admin = load_admin(&state, &auth_user).await?;

    request.extensions_mut().insert(auth_user);
    request.extensions_mut().insert(admin);
    Ok(next.run(request).await)
}

/// Middleware that drops the session cookie when a response rejected the
/// presented session token.
pub async fn clear_rejected_session(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;

    if response.extensions().get::<ClearSession>().is_some() {
        let cookie = removal_cookie(state.config.secure_cookies()).to_string();
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const KEY: &[u8] = b"test_session_key_32_bytes_minimum!";

    #[test]
    fn expired_token_is_session_expired() {
        let claims = Claims {
            sub: "uid-1".to_string(),
            iat: 1_000,
            exp: 2_000,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(KEY),
        )
        .unwrap();

        assert!(matches!(
            verify_session_token(&token, KEY),
            Err(AppError::SessionExpired)
        ));
    }

    #[test]
    fn token_signed_with_other_key_is_invalid() {
        let token = create_session_token("uid-1", b"another_key_that_is_32_bytes_long!!").unwrap();
        assert!(matches!(
            verify_session_token(&token, KEY),
            Err(AppError::InvalidToken)
        ));
        assert!(matches!(
            verify_session_token("garbage", KEY),
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn fresh_token_names_uid() {
        let token = create_session_token("uid-1", KEY).unwrap();
        let claims = verify_session_token(&token, KEY).unwrap();
        assert_eq!(claims.sub, "uid-1");
        assert_eq!(claims.exp - claims.iat, SESSION_TTL_SECS);
    }

    #[test]
    fn cookie_attributes() {
        let set = session_cookie("tok".to_string(), true).to_string();
        assert!(set.starts_with("session=tok"));
        assert!(set.contains("HttpOnly"));
        assert!(set.contains("Secure"));
        assert!(set.contains("SameSite=Lax"));
        assert!(set.contains("Path=/"));
        assert!(set.contains("Max-Age=2592000"));

        let removal = removal_cookie(false).to_string();
        assert!(removal.starts_with("session="));
        assert!(removal.contains("Max-Age=0"));
        assert!(removal.contains("HttpOnly"));
        assert!(removal.contains("SameSite=Lax"));
        assert!(!removal.contains("Secure"));
    }

    #[test]
    fn bearer_header_is_fallback() {
        let jar = CookieJar::new();
        let mut headers = HeaderMap::new();
        assert_eq!(session_token(&jar, &headers), None);

        headers.insert(header::AUTHORIZATION, "Bearer abc".parse().unwrap());
        assert_eq!(session_token(&jar, &headers).as_deref(), Some("abc"));

        let jar = jar.add(Cookie::new(SESSION_COOKIE, "from-cookie"));
        assert_eq!(session_token(&jar, &headers).as_deref(), Some("from-cookie"));
    }
}
