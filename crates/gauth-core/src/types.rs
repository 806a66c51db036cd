// SPDX-FileCopyrightText: 2026 Gauth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared across the gauth workspace.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Identifier tying audit entries from one process run together.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

/// An OAuth2 token pair with its expiry, as returned by the token
/// endpoint and persisted (encrypted) by the credential store.
///
/// The access token is short-lived and attached to API calls; the
/// refresh token is long-lived and mints new access tokens. Neither is
/// ever logged or shown in `Debug` output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRecord {
    pub access_token: String,
    pub refresh_token: String,
    pub scope: String,
    pub token_type: String,
    /// Absolute expiry of the access token.
    pub expires_at: DateTime<Utc>,
}

impl TokenRecord {
    /// Time remaining until the access token expires. Negative when
    /// already expired.
    pub fn expires_in(&self, now: DateTime<Utc>) -> Duration {
        self.expires_at - now
    }

    /// Whether the token expires within `buffer` of `now` (or has
    /// already expired). Tokens inside the buffer are refreshed
    /// preemptively rather than used until failure.
    pub fn expires_within(&self, now: DateTime<Utc>, buffer: Duration) -> bool {
        self.expires_in(now) < buffer
    }
}

impl std::fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRecord")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("scope", &self.scope)
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Refresh scheduler state machine states.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthState {
    /// No token pair stored yet; the initial OAuth exchange has not run.
    Unauthenticated,
    /// A valid token pair is stored.
    Authenticated,
    /// A refresh is in flight. Concurrent callers wait on its outcome.
    Refreshing,
    /// Retryable refresh failures exhausted the retry budget.
    Failed,
    /// The grant was rejected upstream. Only a fresh interactive OAuth
    /// flow leaves this state.
    Revoked,
}

/// Health of the credential subsystem as reported by the facade.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    /// Token valid and not expiring soon.
    Healthy,
    /// Token expiring within the preemptive buffer, or a refresh is in
    /// progress.
    Degraded,
    /// Not authenticated, refresh failed, or grant revoked.
    Unhealthy,
}
