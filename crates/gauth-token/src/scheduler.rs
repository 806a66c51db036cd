// SPDX-FileCopyrightText: 2026 Gauth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Proactive token refresh and the credential state machine.
//!
//! States: UNAUTHENTICATED, AUTHENTICATED, REFRESHING, FAILED, REVOKED.
//! A background tick refreshes the access token when it enters the
//! preemptive buffer before expiry. Concurrent callers needing a
//! refresh collapse onto a single upstream request behind the refresh
//! gate; whoever waits re-checks freshness before issuing another call.
//!
//! The background timer never retries out of FAILED or REVOKED. An
//! explicit token request may retry from FAILED (the operator asked),
//! but REVOKED is terminal until re-authentication.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::Utc;
use gauth_audit::{AuditEvent, AuditSink};
use gauth_config::model::RefreshConfig;
use gauth_core::{AuthState, GauthError, RefreshError, TokenRecord};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use gauth_vault::CredentialStore;

use crate::oauth::{TokenExchange, is_invalid_grant};

pub struct RefreshScheduler {
    store: Arc<CredentialStore>,
    exchange: Arc<dyn TokenExchange>,
    audit: Arc<dyn AuditSink>,
    config: RefreshConfig,
    state: RwLock<AuthState>,
    last_error: RwLock<Option<String>>,
    /// Single-flight gate: at most one upstream refresh at a time.
    refresh_gate: Mutex<()>,
}

impl RefreshScheduler {
    /// Build a scheduler, deriving the initial state from the store.
    pub async fn new(
        store: Arc<CredentialStore>,
        exchange: Arc<dyn TokenExchange>,
        audit: Arc<dyn AuditSink>,
        config: RefreshConfig,
    ) -> Self {
        let (state, last_error) = match store.load().await {
            Ok(Some(_)) => (AuthState::Authenticated, None),
            Ok(None) => (AuthState::Unauthenticated, None),
            Err(e) => (AuthState::Failed, Some(e.to_string())),
        };
        debug!(%state, "scheduler initialized");
        Self {
            store,
            exchange,
            audit,
            config,
            state: RwLock::new(state),
            last_error: RwLock::new(last_error),
            refresh_gate: Mutex::new(()),
        }
    }

    pub fn state(&self) -> AuthState {
        *self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn set_state(&self, next: AuthState) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if *state != next {
            debug!(from = %*state, to = %next, "auth state transition");
            *state = next;
        }
    }

    fn set_error(&self, error: Option<String>) {
        *self.last_error.write().unwrap_or_else(|e| e.into_inner()) = error;
    }

    fn buffer(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.config.preemptive_buffer_secs as i64)
    }

    /// Forget the current grant, e.g. after the stored credentials were
    /// deleted out from under the scheduler.
    pub fn mark_unauthenticated(&self) {
        self.set_state(AuthState::Unauthenticated);
        self.set_error(None);
    }

    /// Exchange an authorization code for the initial token pair.
    pub async fn complete_initial_exchange(&self, code: &str) -> Result<TokenRecord, GauthError> {
        let response = tokio::time::timeout(
            Duration::from_secs(self.config.request_timeout_secs),
            self.exchange.exchange_code(code),
        )
        .await
        .map_err(|_| RefreshError::Retryable("token endpoint timed out".to_string()))??;

        let record = response.into_record(Utc::now(), None);
        self.store.save(&record, AuditEvent::TokenAcquired).await?;
        self.set_state(AuthState::Authenticated);
        self.set_error(None);
        info!(expires_at = %record.expires_at, "initial token exchange complete");
        Ok(record)
    }

    /// Return a token record whose access token is outside the
    /// preemptive buffer, refreshing if needed.
    ///
    /// Explicit callers may retry out of FAILED; REVOKED always yields
    /// an authentication-required error without touching upstream.
    pub async fn ensure_fresh(&self) -> Result<TokenRecord, GauthError> {
        if self.state() == AuthState::Revoked {
            return Err(GauthError::AuthenticationRequired(
                "refresh token was revoked upstream, run `gauth auth` to re-authenticate"
                    .to_string(),
            ));
        }

        let record = match self.store.load().await? {
            Some(record) => record,
            None => {
                self.set_state(AuthState::Unauthenticated);
                return Err(GauthError::AuthenticationRequired(
                    "no stored credentials, run `gauth auth` first".to_string(),
                ));
            }
        };

        if !record.expires_within(Utc::now(), self.buffer()) {
            self.set_state(AuthState::Authenticated);
            return Ok(record);
        }

        self.refresh_single_flight(record).await
    }

    /// Background driver: refresh on an interval until `shutdown` flips.
    pub async fn run(self: Arc<Self>, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut interval =
            tokio::time::interval(Duration::from_secs(self.config.interval_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = interval.tick() => self.tick().await,
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        debug!("refresh scheduler stopping");
                        return;
                    }
                }
            }
        }
    }

    /// One background pass: refresh when the token is inside the buffer.
    ///
    /// Never acts in UNAUTHENTICATED, FAILED, or REVOKED; those need an
    /// operator, not a timer.
    pub async fn tick(&self) {
        match self.state() {
            AuthState::Unauthenticated | AuthState::Failed | AuthState::Revoked => {
                debug!(state = %self.state(), "tick skipped");
                return;
            }
            AuthState::Authenticated | AuthState::Refreshing => {}
        }

        let record = match self.store.load().await {
            Ok(Some(record)) => record,
            Ok(None) => {
                self.set_state(AuthState::Unauthenticated);
                return;
            }
            Err(e) => {
                warn!(error = %e, "tick could not load credentials");
                self.set_error(Some(e.to_string()));
                self.set_state(AuthState::Failed);
                return;
            }
        };

        if !record.expires_within(Utc::now(), self.buffer()) {
            return;
        }

        if let Err(e) = self.refresh_single_flight(record).await {
            warn!(error = %e, "background refresh failed");
        }
    }

    async fn refresh_single_flight(&self, stale: TokenRecord) -> Result<TokenRecord, GauthError> {
        let _gate = self.refresh_gate.lock().await;

        // Someone else may have refreshed while we waited on the gate.
        if let Some(current) = self.store.load().await?
            && !current.expires_within(Utc::now(), self.buffer())
        {
            self.set_state(AuthState::Authenticated);
            return Ok(current);
        }

        self.refresh_with_retries(stale).await
    }

    async fn refresh_with_retries(&self, record: TokenRecord) -> Result<TokenRecord, GauthError> {
        self.set_state(AuthState::Refreshing);

        let mut last_error = String::new();
        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = Duration::from_millis(
                    self.config.retry_base_delay_ms << (attempt - 1),
                );
                debug!(attempt, delay_ms = delay.as_millis() as u64, "refresh backoff");
                tokio::time::sleep(delay).await;
            }

            let result = tokio::time::timeout(
                Duration::from_secs(self.config.request_timeout_secs),
                self.exchange.refresh(&record.refresh_token),
            )
            .await
            .unwrap_or_else(|_| {
                Err(RefreshError::Retryable("token endpoint timed out".to_string()))
            });

            match result {
                Ok(response) => {
                    let fresh = response.into_record(Utc::now(), Some(&record));
                    self.store.save(&fresh, AuditEvent::TokenRefreshed).await?;
                    self.set_state(AuthState::Authenticated);
                    self.set_error(None);
                    info!(attempt, expires_at = %fresh.expires_at, "token refreshed");
                    return Ok(fresh);
                }
                Err(e) if e.is_retryable() => {
                    warn!(attempt, error = %e, "retryable refresh failure");
                    last_error = e.to_string();
                }
                // Non-retryable means the grant itself is unusable, no
                // matter which upstream error named it.
                Err(e) => {
                    let reason = if is_invalid_grant(&e) {
                        "invalid_grant"
                    } else {
                        "non_retryable"
                    };
                    warn!(error = %e, reason, "refresh rejected upstream");
                    self.set_state(AuthState::Revoked);
                    self.set_error(Some(e.to_string()));
                    self.audit.record(
                        AuditEvent::TokenRevoked,
                        serde_json::json!({ "reason": reason, "detail": e.to_string() }),
                    )?;
                    return Err(GauthError::AuthenticationRequired(format!(
                        "upstream rejected the refresh token ({e}), run `gauth auth` to re-authenticate"
                    )));
                }
            }
        }

        self.set_state(AuthState::Failed);
        self.set_error(Some(last_error.clone()));
        Err(GauthError::AuthenticationRequired(format!(
            "token refresh failed after {} attempts: {last_error}",
            self.config.max_retries + 1
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::TokenResponse;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use gauth_audit::MemoryAuditLog;
    use gauth_config::model::KDF_ITERATION_FLOOR;
    use gauth_vault::StorePaths;
    use secrecy::SecretString;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct ScriptedExchange {
        script: std::sync::Mutex<VecDeque<Result<TokenResponse, RefreshError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedExchange {
        fn new(script: Vec<Result<TokenResponse, RefreshError>>) -> Arc<Self> {
            Arc::new(Self {
                script: std::sync::Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn next(&self) -> Result<TokenResponse, RefreshError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(RefreshError::Retryable("script exhausted".into())))
        }
    }

    #[async_trait]
    impl TokenExchange for ScriptedExchange {
        async fn exchange_code(&self, _code: &str) -> Result<TokenResponse, RefreshError> {
            self.next()
        }

        async fn refresh(&self, _refresh_token: &str) -> Result<TokenResponse, RefreshError> {
            self.next()
        }
    }

    fn ok_response(access: &str) -> Result<TokenResponse, RefreshError> {
        Ok(TokenResponse {
            access_token: access.into(),
            refresh_token: None,
            expires_in: 3600,
            scope: Some("drive".into()),
            token_type: "Bearer".into(),
        })
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

    fn config() -> RefreshConfig {
        RefreshConfig {
            interval_secs: 1800,
            preemptive_buffer_secs: 600,
            max_retries: 3,
            retry_base_delay_ms: 1000,
            request_timeout_secs: 30,
        }
    }

    async fn setup(
        dir: &TempDir,
        stored: Option<TokenRecord>,
        script: Vec<Result<TokenResponse, RefreshError>>,
    ) -> (RefreshScheduler, Arc<ScriptedExchange>, Arc<MemoryAuditLog>) {
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
        let exchange = ScriptedExchange::new(script);
        let scheduler =
            RefreshScheduler::new(store, exchange.clone(), audit.clone(), config()).await;
        (scheduler, exchange, audit)
    }

    #[tokio::test]
    async fn initial_state_follows_stored_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let (scheduler, _, _) = setup(&dir, Some(record_expiring_in(3600)), vec![]).await;
        assert_eq!(scheduler.state(), AuthState::Authenticated);

        let dir = tempfile::tempdir().unwrap();
        let (scheduler, _, _) = setup(&dir, None, vec![]).await;
        assert_eq!(scheduler.state(), AuthState::Unauthenticated);
    }

    #[tokio::test]
    async fn fresh_token_is_returned_without_upstream_call() {
        let dir = tempfile::tempdir().unwrap();
        let (scheduler, exchange, _) = setup(&dir, Some(record_expiring_in(3600)), vec![]).await;

        let record = scheduler.ensure_fresh().await.unwrap();
        assert_eq!(record.access_token, "ya29.current");
        assert_eq!(exchange.calls(), 0);
    }

    #[tokio::test]
    async fn token_inside_buffer_is_refreshed() {
        let dir = tempfile::tempdir().unwrap();
        let (scheduler, exchange, audit) =
            setup(&dir, Some(record_expiring_in(60)), vec![ok_response("ya29.new")]).await;

        let record = scheduler.ensure_fresh().await.unwrap();
        assert_eq!(record.access_token, "ya29.new");
        // The refresh response omitted the refresh token; the prior one
        // must be carried forward.
        assert_eq!(record.refresh_token, "1//refresh");
        assert_eq!(exchange.calls(), 1);
        assert_eq!(scheduler.state(), AuthState::Authenticated);
        assert!(audit.events().contains(&AuditEvent::TokenRefreshed));
    }

    #[tokio::test]
    async fn missing_credentials_require_authentication() {
        let dir = tempfile::tempdir().unwrap();
        let (scheduler, exchange, _) = setup(&dir, None, vec![]).await;

        let result = scheduler.ensure_fresh().await;
        assert!(matches!(result, Err(GauthError::AuthenticationRequired(_))));
        assert_eq!(exchange.calls(), 0);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_upstream_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let (scheduler, exchange, _) =
            setup(&dir, Some(record_expiring_in(60)), vec![ok_response("ya29.new")]).await;
        let scheduler = Arc::new(scheduler);

        let mut handles = Vec::new();
        for _ in 0..5 {
            let scheduler = scheduler.clone();
            handles.push(tokio::spawn(async move { scheduler.ensure_fresh().await }));
        }
        for handle in handles {
            let record = handle.await.unwrap().unwrap();
            assert_eq!(record.access_token, "ya29.new");
        }
        assert_eq!(exchange.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retryable_failures_back_off_then_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let (scheduler, exchange, _) = setup(
            &dir,
            Some(record_expiring_in(60)),
            vec![
                Err(RefreshError::Retryable("503".into())),
                Err(RefreshError::Retryable("timeout".into())),
                ok_response("ya29.third"),
            ],
        )
        .await;

        let record = scheduler.ensure_fresh().await.unwrap();
        assert_eq!(record.access_token, "ya29.third");
        assert_eq!(exchange.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_transition_to_failed() {
        let dir = tempfile::tempdir().unwrap();
        let (scheduler, exchange, _) = setup(
            &dir,
            Some(record_expiring_in(60)),
            vec![
                Err(RefreshError::Retryable("503".into())),
                Err(RefreshError::Retryable("503".into())),
                Err(RefreshError::Retryable("503".into())),
                Err(RefreshError::Retryable("503".into())),
            ],
        )
        .await;

        let result = scheduler.ensure_fresh().await;
        assert!(matches!(result, Err(GauthError::AuthenticationRequired(_))));
        assert_eq!(scheduler.state(), AuthState::Failed);
        // max_retries 3 means 4 attempts total.
        assert_eq!(exchange.calls(), 4);
        assert!(scheduler.last_error().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_call_retries_out_of_failed() {
        let dir = tempfile::tempdir().unwrap();
        let (scheduler, exchange, _) = setup(
            &dir,
            Some(record_expiring_in(60)),
            vec![
                Err(RefreshError::Retryable("503".into())),
                Err(RefreshError::Retryable("503".into())),
                Err(RefreshError::Retryable("503".into())),
                Err(RefreshError::Retryable("503".into())),
                ok_response("ya29.recovered"),
            ],
        )
        .await;

        assert!(scheduler.ensure_fresh().await.is_err());
        assert_eq!(scheduler.state(), AuthState::Failed);

        let record = scheduler.ensure_fresh().await.unwrap();
        assert_eq!(record.access_token, "ya29.recovered");
        assert_eq!(scheduler.state(), AuthState::Authenticated);
        assert_eq!(exchange.calls(), 5);
    }

    #[tokio::test]
    async fn invalid_grant_revokes_and_audits() {
        let dir = tempfile::tempdir().unwrap();
        let (scheduler, exchange, audit) = setup(
            &dir,
            Some(record_expiring_in(60)),
            vec![Err(RefreshError::NonRetryable(
                "token endpoint rejected request (400): invalid_grant".into(),
            ))],
        )
        .await;

        let result = scheduler.ensure_fresh().await;
        assert!(matches!(result, Err(GauthError::AuthenticationRequired(_))));
        assert_eq!(scheduler.state(), AuthState::Revoked);
        assert!(audit.events().contains(&AuditEvent::TokenRevoked));

        // REVOKED is terminal: no further upstream calls.
        assert!(scheduler.ensure_fresh().await.is_err());
        assert_eq!(exchange.calls(), 1);
    }

    #[tokio::test]
    async fn any_non_retryable_failure_revokes() {
        let dir = tempfile::tempdir().unwrap();
        let (scheduler, exchange, audit) = setup(
            &dir,
            Some(record_expiring_in(60)),
            vec![Err(RefreshError::NonRetryable(
                "token endpoint rejected request (401): invalid_client".into(),
            ))],
        )
        .await;

        let result = scheduler.ensure_fresh().await;
        assert!(matches!(result, Err(GauthError::AuthenticationRequired(_))));
        assert_eq!(scheduler.state(), AuthState::Revoked);
        assert!(audit.events().contains(&AuditEvent::TokenRevoked));
        assert_eq!(exchange.calls(), 1);
    }

    #[tokio::test]
    async fn tick_refreshes_token_inside_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let (scheduler, exchange, _) =
            setup(&dir, Some(record_expiring_in(60)), vec![ok_response("ya29.bg")]).await;

        scheduler.tick().await;
        assert_eq!(exchange.calls(), 1);
        assert_eq!(scheduler.state(), AuthState::Authenticated);
    }

    #[tokio::test]
    async fn tick_never_acts_in_failed_or_revoked() {
        let dir = tempfile::tempdir().unwrap();
        let (scheduler, exchange, _) = setup(&dir, Some(record_expiring_in(60)), vec![]).await;

        scheduler.set_state(AuthState::Failed);
        scheduler.tick().await;
        scheduler.set_state(AuthState::Revoked);
        scheduler.tick().await;

        assert_eq!(exchange.calls(), 0);
    }

    #[tokio::test]
    async fn tick_skips_fresh_token() {
        let dir = tempfile::tempdir().unwrap();
        let (scheduler, exchange, _) = setup(&dir, Some(record_expiring_in(3600)), vec![]).await;

        scheduler.tick().await;
        assert_eq!(exchange.calls(), 0);
    }

    #[tokio::test]
    async fn initial_exchange_saves_and_authenticates() {
        let dir = tempfile::tempdir().unwrap();
        let (scheduler, _, audit) = setup(
            &dir,
            None,
            vec![Ok(TokenResponse {
                access_token: "ya29.first".into(),
                refresh_token: Some("1//fresh".into()),
                expires_in: 3599,
                scope: Some("drive".into()),
                token_type: "Bearer".into(),
            })],
        )
        .await;

        let record = scheduler.complete_initial_exchange("4/code").await.unwrap();
        assert_eq!(record.refresh_token, "1//fresh");
        assert_eq!(scheduler.state(), AuthState::Authenticated);
        assert!(audit.events().contains(&AuditEvent::TokenAcquired));
    }
}
