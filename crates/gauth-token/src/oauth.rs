// SPDX-FileCopyrightText: 2026 Gauth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Google OAuth2 token endpoint.
//!
//! Handles the two grant types gauth uses: `authorization_code` for the
//! initial exchange and `refresh_token` for renewals. Upstream failures
//! are classified into retryable (429, 5xx, transport) and
//! non-retryable (`invalid_grant` and other 4xx) errors so the
//! scheduler knows whether backing off can help.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gauth_config::model::OauthConfig;
use gauth_core::{GauthError, RefreshError, TokenRecord};
use serde::Deserialize;
use tracing::debug;

/// A successful token endpoint response.
///
/// Google omits `refresh_token` on refresh grants and sometimes `scope`;
/// [`TokenResponse::into_record`] fills the gaps from the prior record.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl TokenResponse {
    /// Build a token record, carrying forward the refresh token and
    /// scope from `prior` when the response omits them.
    pub fn into_record(self, now: DateTime<Utc>, prior: Option<&TokenRecord>) -> TokenRecord {
        TokenRecord {
            access_token: self.access_token,
            refresh_token: self
                .refresh_token
                .or_else(|| prior.map(|p| p.refresh_token.clone()))
                .unwrap_or_default(),
            scope: self
                .scope
                .or_else(|| prior.map(|p| p.scope.clone()))
                .unwrap_or_default(),
            token_type: self.token_type,
            expires_at: now + chrono::Duration::seconds(self.expires_in),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    error_description: String,
}

/// Abstraction over the upstream token endpoint.
///
/// The scheduler only sees this trait; tests substitute a scripted
/// implementation.
#[async_trait]
pub trait TokenExchange: Send + Sync {
    /// Exchange an authorization code for a token pair.
    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, RefreshError>;

    /// Redeem a refresh token for a new access token.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, RefreshError>;
}

/// Token endpoint client backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct GoogleTokenClient {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    token_url: String,
    redirect_uri: String,
}

impl GoogleTokenClient {
    /// Requires `client_id` and `client_secret` to be configured.
    pub fn new(config: &OauthConfig, timeout: Duration) -> Result<Self, GauthError> {
        let client_id = config
            .client_id
            .clone()
            .ok_or_else(|| GauthError::Config("oauth.client_id is not configured".to_string()))?;
        let client_secret = config.client_secret.clone().ok_or_else(|| {
            GauthError::Config("oauth.client_secret is not configured".to_string())
        })?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GauthError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            client_id,
            client_secret,
            token_url: config.token_url.clone(),
            redirect_uri: config.redirect_uri.clone(),
        })
    }

    async fn post_form(&self, params: &[(&str, &str)]) -> Result<TokenResponse, RefreshError> {
        let response = self
            .client
            .post(&self.token_url)
            .form(params)
            .send()
            .await
            .map_err(|e| RefreshError::Retryable(format!("token endpoint unreachable: {e}")))?;

        let status = response.status();
        if status.is_success() {
            let parsed: TokenResponse = response
                .json()
                .await
                .map_err(|e| RefreshError::NonRetryable(format!("malformed token response: {e}")))?;
            debug!(expires_in = parsed.expires_in, "token endpoint success");
            return Ok(parsed);
        }

        let body = response.text().await.unwrap_or_default();
        let parsed: TokenErrorBody = serde_json::from_str(&body).unwrap_or(TokenErrorBody {
            error: String::new(),
            error_description: String::new(),
        });

        // 429 and 5xx are transient; 4xx means the request itself is bad.
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(RefreshError::Retryable(format!(
                "token endpoint returned {status}: {}",
                parsed.error
            )));
        }

        Err(RefreshError::NonRetryable(format!(
            "token endpoint rejected request ({status}): {} {}",
            parsed.error, parsed.error_description
        )))
    }
}

/// True when a refresh failure means the grant itself is dead and no
/// retry can recover it.
pub fn is_invalid_grant(error: &RefreshError) -> bool {
    matches!(error, RefreshError::NonRetryable(msg) if msg.contains("invalid_grant"))
}

#[async_trait]
impl TokenExchange for GoogleTokenClient {
    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, RefreshError> {
        self.post_form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("redirect_uri", &self.redirect_uri),
        ])
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, RefreshError> {
        self.post_form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
        ])
        .await
    }
}
