//! Identity provider over the provider's public REST account API.
//!
//! Covers the credential primitives (`accounts:signUp`,
//! `accounts:signInWithPassword`). Popup and redirect sign-in need a browser;
//! outside one they fail with `operation-not-supported-in-this-environment`,
//! and no redirect result is ever pending.

use std::sync::{Mutex, PoisonError};

use serde::Deserialize;

use super::provider::{ExternalCredential, ExternalPrincipal, IdentityProvider};
use crate::config::{ConfigError, IdentityConfig};
use crate::error::RawError;

const PASSWORD_PROVIDER_ID: &str = "password";
const UNSUPPORTED_CODE: &str = "auth/operation-not-supported-in-this-environment";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    local_id: String,
    id_token: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
}

pub struct RestIdentityProvider {
    client: reqwest::Client,
    config: IdentityConfig,
    current: Mutex<Option<ExternalPrincipal>>,
}

impl RestIdentityProvider {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: IdentityConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeouts.request())
            .connect_timeout(config.timeouts.connect())
            .build()
            .map_err(|e| ConfigError::HttpClientBuild(e.to_string()))?;
        Ok(Self { client, config, current: Mutex::new(None) })
    }

    async fn account_call(&self, method: &str, email: &str, password: &str) -> Result<ExternalCredential, RawError> {
        let url = format!("{}/accounts:{method}?key={}", self.config.endpoint, self.config.api_key);
        let resp = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "email": email,
                "password": password,
                "returnSecureToken": true,
            }))
            .send()
            .await
            .map_err(|e| if e.is_timeout() { RawError::Timeout } else { RawError::Network(e.to_string()) })?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| RawError::Decode(e.to_string()))?;
        if !status.is_success() {
            return Err(map_rest_error(status.as_u16(), &body));
        }

        let account: AccountResponse = serde_json::from_str(&body).map_err(|e| RawError::Decode(e.to_string()))?;
        let credential = ExternalCredential {
            uid: account.local_id,
            email: account.email,
            display_name: account.display_name,
            id_token: account.id_token,
            provider_id: PASSWORD_PROVIDER_ID.to_owned(),
        };
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(credential.principal());
        Ok(credential)
    }
}

#[async_trait::async_trait]
impl IdentityProvider for RestIdentityProvider {
    async fn sign_in_with_popup(&self) -> Result<ExternalCredential, RawError> {
        Err(RawError::provider(UNSUPPORTED_CODE, "interactive sign-in requires a browser"))
    }

    async fn start_redirect_sign_in(&self) -> Result<(), RawError> {
        Err(RawError::provider(UNSUPPORTED_CODE, "redirect sign-in requires a browser"))
    }

    async fn redirect_result(&self) -> Result<Option<ExternalCredential>, RawError> {
        Ok(None)
    }

    async fn create_user(&self, email: &str, password: &str) -> Result<ExternalCredential, RawError> {
        self.account_call("signUp", email, password).await
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<ExternalCredential, RawError> {
        self.account_call("signInWithPassword", email, password).await
    }

    async fn sign_out(&self) -> Result<(), RawError> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner).take();
        Ok(())
    }

    fn current_user(&self) -> Option<ExternalPrincipal> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// Translate a REST error body (`{"error":{"message":"EMAIL_EXISTS"}}`) into
/// the provider's client error codes. Messages may carry detail after a
/// colon, e.g. `WEAK_PASSWORD : Password should be at least 6 characters`.
fn map_rest_error(status: u16, body: &str) -> RawError {
    let raw_message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.pointer("/error/message").and_then(|m| m.as_str()).map(str::to_owned));
    let Some(raw_message) = raw_message else {
        return RawError::Http { status, body: body.to_owned() };
    };

    let (symbol, detail) = match raw_message.split_once(':') {
        Some((symbol, detail)) => (symbol.trim(), detail.trim()),
        None => (raw_message.trim(), ""),
    };
    let code = match symbol {
        "EMAIL_EXISTS" => "auth/email-already-in-use",
        "INVALID_EMAIL" => "auth/invalid-email",
        "MISSING_EMAIL" => "auth/missing-email",
        "WEAK_PASSWORD" => "auth/weak-password",
        "MISSING_PASSWORD" => "auth/missing-password",
        "EMAIL_NOT_FOUND" => "auth/user-not-found",
        "INVALID_PASSWORD" => "auth/wrong-password",
        "INVALID_LOGIN_CREDENTIALS" => "auth/invalid-credential",
        "USER_DISABLED" => "auth/user-disabled",
        "TOO_MANY_ATTEMPTS_TRY_LATER" => "auth/too-many-requests",
        _ if status >= 500 => "auth/internal-error",
        _ => "auth/unknown",
    };
    let message = if detail.is_empty() { symbol.to_owned() } else { detail.to_owned() };
    RawError::provider(code, message)
}
