// SPDX-FileCopyrightText: 2026 Gauth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The narrow entry point callers use for credential access.
//!
//! [`AuthFacade::get_valid_access_token`] is the only path that hands
//! out a token; [`AuthFacade::health`] is a pure read that never
//! triggers a refresh, so it is safe to poll from monitoring.

use std::sync::Arc;

use chrono::Utc;
use gauth_audit::AuditEvent;
use gauth_core::{AuthState, GauthError, HealthStatus};
use gauth_vault::CredentialStore;
use serde::Serialize;
use tracing::info;

use crate::scheduler::RefreshScheduler;

/// Snapshot of credential health for `gauth health`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: HealthStatus,
    pub state: AuthState,
    pub key_version: u32,
    /// Seconds until the access token expires; negative when already
    /// expired, absent when no credentials are stored or readable.
    pub token_expires_in_secs: Option<i64>,
    pub last_error: Option<String>,
}

pub struct AuthFacade {
    store: Arc<CredentialStore>,
    scheduler: Arc<RefreshScheduler>,
    preemptive_buffer: chrono::Duration,
}

impl AuthFacade {
    pub fn new(
        store: Arc<CredentialStore>,
        scheduler: Arc<RefreshScheduler>,
        preemptive_buffer_secs: u64,
    ) -> Self {
        Self {
            store,
            scheduler,
            preemptive_buffer: chrono::Duration::seconds(preemptive_buffer_secs as i64),
        }
    }

    pub fn scheduler(&self) -> &Arc<RefreshScheduler> {
        &self.scheduler
    }

    /// Return an access token guaranteed fresh past the preemptive
    /// buffer, refreshing first if necessary.
    ///
    /// An undecryptable store surfaces as authentication-required: the
    /// operator either changed the encryption secret or must
    /// re-authenticate, and neither is recoverable here.
    pub async fn get_valid_access_token(&self) -> Result<String, GauthError> {
        match self.scheduler.ensure_fresh().await {
            Ok(record) => Ok(record.access_token),
            Err(GauthError::Decryption(msg)) => Err(GauthError::AuthenticationRequired(format!(
                "stored credentials are unreadable ({msg}), run `gauth auth` to re-authenticate"
            ))),
            Err(e) => Err(e),
        }
    }

    /// Pure health read: no refresh, no upstream calls.
    pub async fn health(&self) -> HealthReport {
        let state = self.scheduler.state();
        let key_version = self.store.key_metadata().await.version;
        let mut last_error = self.scheduler.last_error();

        let expires_in = match self.store.load().await {
            Ok(Some(record)) => Some(record.expires_in(Utc::now()).num_seconds()),
            Ok(None) => None,
            Err(e) => {
                last_error = Some(e.to_string());
                None
            }
        };

        let status = match (state, expires_in) {
            (AuthState::Revoked | AuthState::Failed | AuthState::Unauthenticated, _) => {
                HealthStatus::Unhealthy
            }
            (_, None) => HealthStatus::Unhealthy,
            (_, Some(secs)) if secs <= self.preemptive_buffer.num_seconds() => {
                HealthStatus::Degraded
            }
            _ => HealthStatus::Healthy,
        };

        HealthReport {
            status,
            state,
            key_version,
            token_expires_in_secs: expires_in,
            last_error,
        }
    }

    /// Delete the stored credentials and reset the state machine.
    ///
    /// Returns `false` when nothing was stored.
    pub async fn revoke_all_tokens(&self) -> Result<bool, GauthError> {
        let deleted = self.store.delete(AuditEvent::TokenRevoked).await?;
        self.scheduler.mark_unauthenticated();
        if deleted {
            info!("all stored tokens deleted");
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::{TokenExchange, TokenResponse};
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use gauth_audit::MemoryAuditLog;
    use gauth_config::model::{KDF_ITERATION_FLOOR, RefreshConfig};
    use gauth_core::{RefreshError, TokenRecord};
    use gauth_vault::StorePaths;
    use secrecy::SecretString;
    use tempfile::TempDir;

    struct NoExchange;

    #[async_trait]
    impl TokenExchange for NoExchange {
        async fn exchange_code(&self, _code: &str) -> Result<TokenResponse, RefreshError> {
            panic!("facade tests must not reach upstream");
        }

        async fn refresh(&self, _refresh_token: &str) -> Result<TokenResponse, RefreshError> {
            panic!("facade tests must not reach upstream");
        }
    }

    fn record_expiring_in(secs: i64) -> TokenRecord {
        TokenRecord {
            access_token: "ya29.current".into(),
            refresh_token: "1//refresh".into(),
            scope: "drive".into(),
            token_type: "Bearer".into(),
            expires_at: Utc::now() + ChronoDuration::seconds(secs),
        }
    }

    async fn facade_with(dir: &TempDir, stored: Option<TokenRecord>) -> (AuthFacade, Arc<MemoryAuditLog>) {
        let audit = Arc::new(MemoryAuditLog::new());
        let store = Arc::new(
            CredentialStore::open(
                StorePaths::new(dir.path().join("credentials.json")),
                &SecretString::from("secret".to_string()),
                KDF_ITERATION_FLOOR,
                audit.clone(),
            )
            .unwrap(),
        );
        if let Some(record) = stored {
            store
                .save(&record, AuditEvent::TokenAcquired)
                .await
                .unwrap();
        }
        let scheduler = Arc::new(
            RefreshScheduler::new(
                store.clone(),
                Arc::new(NoExchange),
                audit.clone(),
                RefreshConfig::default(),
            )
            .await,
        );
        (AuthFacade::new(store, scheduler, 600), audit)
    }

    #[tokio::test]
    async fn fresh_token_is_handed_out() {
        let dir = tempfile::tempdir().unwrap();
        let (facade, _) = facade_with(&dir, Some(record_expiring_in(3600))).await;
        assert_eq!(
            facade.get_valid_access_token().await.unwrap(),
            "ya29.current"
        );
    }

    #[tokio::test]
    async fn missing_credentials_surface_as_authentication_required() {
        let dir = tempfile::tempdir().unwrap();
        let (facade, _) = facade_with(&dir, None).await;
        let result = facade.get_valid_access_token().await;
        assert!(matches!(result, Err(GauthError::AuthenticationRequired(_))));
    }

    #[tokio::test]
    async fn health_is_healthy_with_fresh_token() {
        let dir = tempfile::tempdir().unwrap();
        let (facade, _) = facade_with(&dir, Some(record_expiring_in(3600))).await;

        let report = facade.health().await;
        assert_eq!(report.status, HealthStatus::Healthy);
        assert_eq!(report.state, AuthState::Authenticated);
        assert_eq!(report.key_version, 1);
        assert!(report.token_expires_in_secs.unwrap() > 3000);
    }

    #[tokio::test]
    async fn health_is_degraded_inside_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let (facade, _) = facade_with(&dir, Some(record_expiring_in(60))).await;
        assert_eq!(facade.health().await.status, HealthStatus::Degraded);
    }

    #[tokio::test]
    async fn health_is_unhealthy_without_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let (facade, _) = facade_with(&dir, None).await;

        let report = facade.health().await;
        assert_eq!(report.status, HealthStatus::Unhealthy);
        assert_eq!(report.state, AuthState::Unauthenticated);
        assert_eq!(report.token_expires_in_secs, None);
    }

    #[tokio::test]
    async fn health_never_triggers_refresh() {
        let dir = tempfile::tempdir().unwrap();
        // Token deep inside the buffer; NoExchange would panic if the
        // facade tried to refresh.
        let (facade, _) = facade_with(&dir, Some(record_expiring_in(5))).await;
        let report = facade.health().await;
        assert_eq!(report.status, HealthStatus::Degraded);
    }

    #[tokio::test]
    async fn health_report_serializes_camel_case() {
        let dir = tempfile::tempdir().unwrap();
        let (facade, _) = facade_with(&dir, Some(record_expiring_in(3600))).await;

        let json = serde_json::to_string(&facade.health().await).unwrap();
        assert!(json.contains("\"status\":\"HEALTHY\""));
        assert!(json.contains("\"state\":\"AUTHENTICATED\""));
        assert!(json.contains("\"keyVersion\":1"));
        assert!(json.contains("\"tokenExpiresInSecs\""));
    }

    #[tokio::test]
    async fn revoke_all_deletes_and_resets_state() {
        let dir = tempfile::tempdir().unwrap();
        let (facade, audit) = facade_with(&dir, Some(record_expiring_in(3600))).await;

        assert!(facade.revoke_all_tokens().await.unwrap());
        assert_eq!(facade.scheduler().state(), AuthState::Unauthenticated);
        assert!(audit.events().contains(&AuditEvent::TokenRevoked));
        assert_eq!(facade.health().await.status, HealthStatus::Unhealthy);

        // Second call is a no-op.
        assert!(!facade.revoke_all_tokens().await.unwrap());
    }
}
