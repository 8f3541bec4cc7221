// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firebase Auth account management via the Identity Toolkit REST API.
//!
//! Used for registration (`accounts:signUp`), rollback of a half-finished
//! registration (`accounts:delete`) and password reset emails
//! (`accounts:sendOobCode`).

use crate::config::Config;
use crate::error::AppError;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(5);

/// Newly created identity-provider account.
#[derive(Debug, Clone)]
pub struct CreatedAccount {
    pub uid: String,
    /// ID token of the new account; needed to delete it again.
    pub id_token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignUpRequest<'a> {
    email: &'a str,
    password: &'a str,
    display_name: &'a str,
    return_secure_token: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignUpResponse {
    local_id: String,
    #[serde(default)]
    id_token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteRequest<'a> {
    id_token: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OobCodeRequest<'a> {
    request_type: &'static str,
    email: &'a str,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Client for the Identity Toolkit `accounts:*` endpoints.
#[derive(Clone)]
pub struct IdentityToolkit {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl IdentityToolkit {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .context("failed building Identity Toolkit HTTP client")?;

        Ok(Self {
            http_client,
            base_url: config.identity_toolkit_url.trim_end_matches('/').to_string(),
            api_key: config.firebase_api_key.clone(),
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/v1/accounts:{}", self.base_url, method)
    }

    async fn call<B: Serialize>(&self, method: &str, body: &B) -> Result<reqwest::Response, AppError> {
        let response = self
            .http_client
            .post(self.endpoint(method))
            .query(&[("key", self.api_key.as_str())])
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::IdentityProvider(format!("{method} request failed: {e}")))?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let message = response
            .json::<ErrorEnvelope>()
            .await
            .map(|envelope| envelope.error.message)
            .unwrap_or_default();

        tracing::warn!(method, %status, error = %message, "Identity Toolkit call failed");
        Err(map_provider_error(&message, status))
    }

    /// Create an email/password account.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<CreatedAccount, AppError> {
        let response = self
            .call(
                "signUp",
                &SignUpRequest {
                    email,
                    password,
                    display_name,
                    return_secure_token: true,
                },
            )
            .await?;

        let body: SignUpResponse = response
            .json()
            .await
            .map_err(|e| AppError::IdentityProvider(format!("invalid signUp response: {e}")))?;

        tracing::info!(uid = %body.local_id, "Identity account created");

        Ok(CreatedAccount {
            uid: body.local_id,
            id_token: body.id_token,
        })
    }

    /// Delete the account the ID token belongs to.
    pub async fn delete_account(&self, id_token: &str) -> Result<(), AppError> {
        self.call("delete", &DeleteRequest { id_token }).await?;
        Ok(())
    }

    /// Send the provider's password reset email.
    ///
    /// Unknown addresses are reported as success so the endpoint cannot be
    /// used to probe which emails are registered.
    pub async fn send_password_reset(&self, email: &str) -> Result<(), AppError> {
        match self
            .call(
                "sendOobCode",
                &OobCodeRequest {
                    request_type: "PASSWORD_RESET",
                    email,
                },
            )
            .await
        {
            Ok(_) => Ok(()),
            Err(AppError::NotFound(_)) => {
                tracing::info!("Password reset requested for unknown email");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

/// Map an Identity Toolkit error message to an API error.
///
/// Messages look like `EMAIL_EXISTS` or `WEAK_PASSWORD : Password should be
/// at least 6 characters`.
fn map_provider_error(message: &str, status: reqwest::StatusCode) -> AppError {
    let code = message.split(':').next().unwrap_or_default().trim();

    match code {
        "EMAIL_EXISTS" => AppError::Conflict("Email is already registered".to_string()),
        "EMAIL_NOT_FOUND" | "USER_NOT_FOUND" => AppError::NotFound("Account not found".to_string()),
        "INVALID_EMAIL" | "MISSING_EMAIL" | "MISSING_PASSWORD" | "WEAK_PASSWORD"
        | "INVALID_PASSWORD" => AppError::BadRequest(message.to_string()),
        _ if code.is_empty() => {
            AppError::IdentityProvider(format!("Identity Toolkit returned status {status}"))
        }
        _ => AppError::IdentityProvider(message.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn maps_known_provider_errors() {
        assert!(matches!(
            map_provider_error("EMAIL_EXISTS", StatusCode::BAD_REQUEST),
            AppError::Conflict(_)
        ));
        assert!(matches!(
            map_provider_error(
                "WEAK_PASSWORD : Password should be at least 6 characters",
                StatusCode::BAD_REQUEST
            ),
            AppError::BadRequest(_)
        ));
        assert!(matches!(
            map_provider_error("EMAIL_NOT_FOUND", StatusCode::BAD_REQUEST),
            AppError::NotFound(_)
        ));
    }

    #[test]
    fn unknown_errors_are_upstream_failures() {
        assert!(matches!(
            map_provider_error("QUOTA_EXCEEDED", StatusCode::TOO_MANY_REQUESTS),
            AppError::IdentityProvider(_)
        ));
        assert!(matches!(
            map_provider_error("", StatusCode::SERVICE_UNAVAILABLE),
            AppError::IdentityProvider(_)
        ));
    }
}
