// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firebase ID token verification for the login exchange.

use crate::config::Config;
use crate::error::AppError;
use anyhow::Context;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::header::CACHE_CONTROL;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::{Mutex, RwLock};

const JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";
const ISSUER_PREFIX: &str = "https://securetoken.google.com/";
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
const CLOCK_SKEW_SECS: u64 = 60;

/// Identity extracted from a valid Firebase ID token.
#[derive(Debug, Clone)]
pub struct VerifiedIdToken {
    pub uid: String,
    pub email: Option<String>,
}

#[derive(Clone)]
enum VerifierMode {
    Google,
    StaticKey {
        kid: String,
        decoding_key: Arc<DecodingKey>,
        algorithm: Algorithm,
    },
}

#[derive(Clone)]
struct JwksCacheEntry {
    keys_by_kid: HashMap<String, Arc<DecodingKey>>,
    expires_at: Instant,
}

/// Verifier for Firebase Auth ID tokens.
pub struct FirebaseTokenVerifier {
    http_client: reqwest::Client,
    project_id: String,
    mode: VerifierMode,
    jwks_cache: RwLock<Option<JwksCacheEntry>>,
    refresh_lock: Mutex<()>,
}

impl FirebaseTokenVerifier {
    /// Create a production verifier that fetches and caches Google JWKS keys.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .context("failed building ID token HTTP client")?;

        tracing::info!(
            project = %config.firebase_project_id,
            "Initialized Firebase ID token verifier"
        );

        Ok(Self {
            http_client,
            project_id: config.firebase_project_id.clone(),
            mode: VerifierMode::Google,
            jwks_cache: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        })
    }

    /// Create a verifier with a single static key.
    ///
    /// This is intended for deterministic local/integration tests.
    pub fn new_with_static_key(
        config: &Config,
        kid: impl Into<String>,
        decoding_key: DecodingKey,
        algorithm: Algorithm,
    ) -> anyhow::Result<Self> {
        let kid = kid.into();
        if kid.trim().is_empty() {
            anyhow::bail!("static ID token kid must not be empty");
        }

        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .context("failed building ID token HTTP client")?;

        Ok(Self {
            http_client,
            project_id: config.firebase_project_id.clone(),
            mode: VerifierMode::StaticKey {
                kid,
                decoding_key: Arc::new(decoding_key),
                algorithm,
            },
            jwks_cache: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        })
    }

    fn expected_algorithm(&self) -> Algorithm {
        match &self.mode {
            VerifierMode::Google => Algorithm::RS256,
            VerifierMode::StaticKey { algorithm, .. } => *algorithm,
        }
    }

    /// Verify a Firebase ID token and return the account it names.
    ///
    /// Expired tokens map to [`AppError::SessionExpired`], every other
    /// validation failure to [`AppError::InvalidToken`]. Key-fetch failures
    /// are [`AppError::IdentityProvider`].
    pub async fn verify(&self, token: &str) -> Result<VerifiedIdToken, AppError> {
        let header = decode_header(token).map_err(|e| {
            tracing::debug!(error = %e, "Invalid ID token header");
            AppError::InvalidToken
        })?;

        let algorithm = self.expected_algorithm();
        if header.alg != algorithm {
            tracing::debug!(alg = ?header.alg, "Unexpected ID token alg");
            return Err(AppError::InvalidToken);
        }

        let kid = header.kid.ok_or_else(|| {
            tracing::debug!("ID token has no kid");
            AppError::InvalidToken
        })?;

        let decoding_key = self.decoding_key_for_kid(&kid).await?;

        let issuer = format!("{}{}", ISSUER_PREFIX, self.project_id);
        let mut validation = Validation::new(algorithm);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.set_issuer(&[issuer.as_str()]);
        validation.set_audience(&[self.project_id.as_str()]);
        validation.leeway = CLOCK_SKEW_SECS;

        let token_data = decode::<FirebaseIdTokenClaims>(token, decoding_key.as_ref(), &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AppError::SessionExpired,
                _ => {
                    tracing::warn!(error = %e, "ID token validation failed");
                    AppError::InvalidToken
                }
            })?;

        let claims = token_data.claims;
        validate_iat(claims.iat)?;

        if claims.sub.trim().is_empty() {
            return Err(AppError::InvalidToken);
        }

        tracing::debug!(uid = %claims.sub, "ID token verified");

        Ok(VerifiedIdToken {
            uid: claims.sub,
            email: claims.email,
        })
    }

    async fn decoding_key_for_kid(&self, kid: &str) -> Result<Arc<DecodingKey>, AppError> {
        if let VerifierMode::StaticKey {
            kid: static_kid,
            decoding_key,
            ..
        } = &self.mode
        {
            if kid == static_kid {
                return Ok(decoding_key.clone());
            }
            tracing::debug!(kid, "Unknown kid for static verifier");
            return Err(AppError::InvalidToken);
        }

        if let Some(key) = self.lookup_cached_key(kid).await {
            return Ok(key);
        }

        for force_refresh in [false, true] {
            self.refresh_jwks(force_refresh).await?;
            if let Some(key) = self.lookup_cached_key(kid).await {
                return Ok(key);
            }
        }

        tracing::warn!(kid, "ID token kid not found in JWKS after refresh");
        Err(AppError::InvalidToken)
    }

    async fn lookup_cached_key(&self, kid: &str) -> Option<Arc<DecodingKey>> {
        let cache = self.jwks_cache.read().await;
        let now = Instant::now();
        cache
            .as_ref()
            .filter(|entry| entry.expires_at > now)
            .and_then(|entry| entry.keys_by_kid.get(kid))
            .cloned()
    }

    async fn refresh_jwks(&self, force_refresh: bool) -> Result<(), AppError> {
        let _guard = self.refresh_lock.lock().await;

        if !force_refresh {
            let cache = self.jwks_cache.read().await;
            if cache
                .as_ref()
                .is_some_and(|entry| entry.expires_at > Instant::now())
            {
                return Ok(());
            }
        }

        tracing::debug!(jwks_uri = JWKS_URL, "Refreshing Firebase JWKS cache");

        let response = self
            .http_client
            .get(JWKS_URL)
            .send()
            .await
            .map_err(|e| AppError::IdentityProvider(format!("JWKS request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::IdentityProvider(format!(
                "JWKS request returned status {}",
                response.status()
            )));
        }

        let ttl = cache_ttl_from_headers(response.headers(), DEFAULT_CACHE_TTL);

        let jwks: Jwks = response
            .json()
            .await
            .map_err(|e| AppError::IdentityProvider(format!("invalid JWKS JSON: {e}")))?;

        let keys_by_kid = usable_keys(jwks);
        if keys_by_kid.is_empty() {
            return Err(AppError::IdentityProvider(
                "JWKS response did not include any usable RSA keys".to_string(),
            ));
        }

        *self.jwks_cache.write().await = Some(JwksCacheEntry {
            keys_by_kid,
            expires_at: Instant::now() + ttl,
        });

        tracing::debug!(ttl_secs = ttl.as_secs(), "Firebase JWKS cache refreshed");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    alg: Option<String>,
    n: String,
    e: String,
    #[serde(rename = "use")]
    use_: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FirebaseIdTokenClaims {
    sub: String,
    iat: Option<usize>,
    email: Option<String>,
}

fn usable_keys(jwks: Jwks) -> HashMap<String, Arc<DecodingKey>> {
    let mut keys_by_kid = HashMap::new();

    for jwk in jwks.keys {
        if jwk.kty != "RSA" || jwk.kid.trim().is_empty() {
            continue;
        }
        if jwk.alg.as_deref().is_some_and(|alg| alg != "RS256") {
            continue;
        }
        if jwk.use_.as_deref().is_some_and(|use_| use_ != "sig") {
            continue;
        }

        match DecodingKey::from_rsa_components(&jwk.n, &jwk.e) {
            Ok(key) => {
                keys_by_kid.insert(jwk.kid, Arc::new(key));
            }
            Err(e) => {
                tracing::warn!(error = %e, kid = %jwk.kid, "Skipping invalid RSA JWKS key");
            }
        }
    }

    keys_by_kid
}

fn validate_iat(iat: Option<usize>) -> Result<(), AppError> {
    let Some(iat) = iat else {
        tracing::debug!("ID token has no iat");
        return Err(AppError::InvalidToken);
    };

    if iat as u64 > now_unix_secs() + CLOCK_SKEW_SECS {
        tracing::warn!(iat, "ID token iat is in the future");
        return Err(AppError::InvalidToken);
    }

    Ok(())
}

fn cache_ttl_from_headers(headers: &reqwest::header::HeaderMap, fallback: Duration) -> Duration {
    headers
        .get(CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_cache_control_max_age)
        .map_or(fallback, Duration::from_secs)
}

fn parse_cache_control_max_age(value: &str) -> Option<u64> {
    value
        .split(',')
        .filter_map(|directive| directive.trim().strip_prefix("max-age="))
        .find_map(|raw| raw.trim_matches('"').parse::<u64>().ok())
}

fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    const SECRET: &[u8] = b"firebase-test-secret";

    fn verifier() -> FirebaseTokenVerifier {
        FirebaseTokenVerifier::new_with_static_key(
            &Config::test_default(),
            "test-kid",
            DecodingKey::from_secret(SECRET),
            Algorithm::HS256,
        )
        .unwrap()
    }

    fn token(claims: serde_json::Value, kid: &str) -> String {
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(kid.to_string());
        encode(&header, &claims, &EncodingKey::from_secret(SECRET)).unwrap()
    }

    fn claims(exp_offset: i64, iat_offset: i64) -> serde_json::Value {
        let now = now_unix_secs() as i64;
        json!({
            "sub": "uid-123",
            "aud": "primko-test",
            "iss": "https://securetoken.google.com/primko-test",
            "iat": now + iat_offset,
            "exp": now + exp_offset,
            "email": "member@example.com",
        })
    }

    #[test]
    fn parse_cache_control_max_age_valid() {
        assert_eq!(
            parse_cache_control_max_age("public, max-age=19845, must-revalidate"),
            Some(19845)
        );
        assert_eq!(parse_cache_control_max_age("max-age=\"120\""), Some(120));
    }

    #[test]
    fn parse_cache_control_max_age_invalid() {
        assert_eq!(parse_cache_control_max_age("public, immutable"), None);
        assert_eq!(parse_cache_control_max_age("max-age=abc"), None);
        assert_eq!(parse_cache_control_max_age(""), None);
    }

    #[tokio::test]
    async fn accepts_valid_token() {
        let verified = verifier()
            .verify(&token(claims(3600, 0), "test-kid"))
            .await
            .unwrap();
        assert_eq!(verified.uid, "uid-123");
        assert_eq!(verified.email.as_deref(), Some("member@example.com"));
    }

    #[tokio::test]
    async fn expired_token_is_session_expired() {
        let result = verifier()
            .verify(&token(claims(-3600, -7200), "test-kid"))
            .await;
        assert!(matches!(result, Err(AppError::SessionExpired)));
    }

    #[tokio::test]
    async fn rejects_wrong_audience_and_kid() {
        let mut wrong_aud = claims(3600, 0);
        wrong_aud["aud"] = json!("other-project");
        let result = verifier().verify(&token(wrong_aud, "test-kid")).await;
        assert!(matches!(result, Err(AppError::InvalidToken)));

        let result = verifier().verify(&token(claims(3600, 0), "other-kid")).await;
        assert!(matches!(result, Err(AppError::InvalidToken)));
    }

    #[tokio::test]
    async fn rejects_future_iat() {
        let result = verifier()
            .verify(&token(claims(7200, 3600), "test-kid"))
            .await;
        assert!(matches!(result, Err(AppError::InvalidToken)));
    }

    #[tokio::test]
    async fn rejects_garbage() {
        let result = verifier().verify("not-a-jwt").await;
        assert!(matches!(result, Err(AppError::InvalidToken)));
    }
}
