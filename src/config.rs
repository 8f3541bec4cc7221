//! Application configuration loaded from environment variables.
//!
//! Everything is read once at startup. Secrets (the Firebase web API key and
//! the session signing key) are injected as environment variables by the
//! deployment, or come from a local `.env` file during development.

use chrono::{FixedOffset, Offset, Utc};
use std::env;
use std::path::PathBuf;

/// Minimum length of the HS256 session signing key, in bytes.
const MIN_SIGNING_KEY_LEN: usize = 32;

/// WIB (UTC+7), where all corps are located.
const DEFAULT_UTC_OFFSET_MINUTES: i32 = 7 * 60;

/// Which persistence backend to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Google Cloud Firestore (or its emulator).
    Firestore,
    /// Process-local store; data is lost on restart.
    Memory,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Firebase / GCP project ID (also the expected ID token audience)
    pub firebase_project_id: String,
    /// Base URL of the Identity Toolkit REST API
    pub identity_toolkit_url: String,
    /// Frontend URL, used for CORS and cookie attributes
    pub frontend_url: String,
    /// Server port
    pub port: u16,
    /// Persistence backend
    pub store_backend: StoreBackend,
    /// Directory holding the built frontend
    pub web_root: PathBuf,
    /// Local offset used for "today" and calendar-month boundaries
    pub utc_offset: FixedOffset,

    // --- Secrets ---
    /// Firebase web API key (Identity Toolkit calls)
    pub firebase_api_key: String,
    /// Signing key for session tokens (raw bytes)
    pub session_signing_key: Vec<u8>,
}

impl Config {
    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            firebase_project_id: "primko-test".to_string(),
            identity_toolkit_url: "http://127.0.0.1:9099/identitytoolkit.googleapis.com"
                .to_string(),
            frontend_url: "http://localhost:3000".to_string(),
            port: 8080,
            store_backend: StoreBackend::Memory,
            web_root: PathBuf::from("web/dist"),
            utc_offset: default_utc_offset(),
            firebase_api_key: "test_api_key".to_string(),
            session_signing_key: b"test_session_key_32_bytes_minimum!".to_vec(),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let session_signing_key = env::var("SESSION_SIGNING_KEY")
            .map_err(|_| ConfigError::Missing("SESSION_SIGNING_KEY"))?
            .trim()
            .as_bytes()
            .to_vec();
        if session_signing_key.len() < MIN_SIGNING_KEY_LEN {
            return Err(ConfigError::Invalid {
                name: "SESSION_SIGNING_KEY",
                reason: format!("must be at least {MIN_SIGNING_KEY_LEN} bytes"),
            });
        }

        let store_backend = match env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "firestore".to_string())
            .trim()
            .to_ascii_lowercase()
            .as_str()
        {
            "firestore" => StoreBackend::Firestore,
            "memory" => StoreBackend::Memory,
            other => {
                return Err(ConfigError::Invalid {
                    name: "STORE_BACKEND",
                    reason: format!("unknown backend '{other}'"),
                })
            }
        };

        let utc_offset = match env::var("UTC_OFFSET_MINUTES") {
            Ok(raw) => raw
                .trim()
                .parse::<i32>()
                .ok()
                .and_then(|minutes| FixedOffset::east_opt(minutes * 60))
                .ok_or_else(|| ConfigError::Invalid {
                    name: "UTC_OFFSET_MINUTES",
                    reason: format!("'{raw}' is not a valid offset in minutes"),
                })?,
            Err(_) => default_utc_offset(),
        };

        // The Auth emulator serves the same REST paths under its own host.
        let identity_toolkit_url = match env::var("FIREBASE_AUTH_EMULATOR_HOST") {
            Ok(host) => format!("http://{}/identitytoolkit.googleapis.com", host.trim()),
            Err(_) => "https://identitytoolkit.googleapis.com".to_string(),
        };

        Ok(Self {
            firebase_project_id: env::var("FIREBASE_PROJECT_ID")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("FIREBASE_PROJECT_ID"))?,
            identity_toolkit_url,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            store_backend,
            web_root: env::var("WEB_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("web/dist")),
            utc_offset,
            firebase_api_key: env::var("FIREBASE_API_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("FIREBASE_API_KEY"))?,
            session_signing_key,
        })
    }

    /// Whether session cookies must carry the `Secure` attribute.
    pub fn secure_cookies(&self) -> bool {
        self.frontend_url.starts_with("https://")
    }
}

fn default_utc_offset() -> FixedOffset {
    FixedOffset::east_opt(DEFAULT_UTC_OFFSET_MINUTES * 60).unwrap_or_else(|| Utc.fix())
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}
