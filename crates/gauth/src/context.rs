// SPDX-FileCopyrightText: 2026 Gauth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared wiring for the CLI commands: opens the store, audit log, and
//! token exchange from a loaded configuration.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gauth_audit::JsonlAuditLog;
use gauth_config::model::GauthConfig;
use gauth_core::{GauthError, RefreshError};
use gauth_token::oauth::{GoogleTokenClient, TokenExchange, TokenResponse};
use gauth_token::{AuthFacade, RefreshScheduler};
use gauth_vault::rotate::KeyRotator;
use gauth_vault::{BackupStore, CredentialStore, StorePaths, prompt};
use secrecy::{ExposeSecret, SecretString};

/// An opened credential store with its audit log and the secret used to
/// derive the key (verification re-derives from it).
pub struct StoreHandle {
    pub store: Arc<CredentialStore>,
    pub audit: Arc<JsonlAuditLog>,
    secret: SecretString,
}

impl StoreHandle {
    pub fn secret_copy(&self) -> SecretString {
        SecretString::from(self.secret.expose_secret().to_string())
    }
}

pub fn store_paths(config: &GauthConfig) -> StorePaths {
    StorePaths::new(&config.vault.credential_path)
}

pub fn backup_store(config: &GauthConfig) -> BackupStore {
    BackupStore::new(&config.vault.backup_dir, config.vault.backup_retention)
}

/// Acquire the encryption secret and open the store.
pub fn open_store(config: &GauthConfig) -> Result<StoreHandle, GauthError> {
    let secret = prompt::get_encryption_secret()?;
    let audit = Arc::new(JsonlAuditLog::open(&config.audit.log_path)?);
    let store = Arc::new(CredentialStore::open(
        store_paths(config),
        &secret,
        config.vault.kdf_iterations,
        audit.clone(),
    )?);
    Ok(StoreHandle {
        store,
        audit,
        secret,
    })
}

pub fn build_rotator(config: &GauthConfig, handle: &StoreHandle) -> KeyRotator {
    KeyRotator::new(
        handle.store.clone(),
        backup_store(config),
        config.vault.kdf_iterations,
    )
}

/// Stand-in exchange for commands that never reach upstream (health,
/// revoke) when `[oauth]` is not configured.
struct UnconfiguredExchange;

#[async_trait]
impl TokenExchange for UnconfiguredExchange {
    async fn exchange_code(&self, _code: &str) -> Result<TokenResponse, RefreshError> {
        Err(RefreshError::NonRetryable(
            "oauth.client_id and oauth.client_secret are not configured".to_string(),
        ))
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<TokenResponse, RefreshError> {
        Err(RefreshError::NonRetryable(
            "oauth.client_id and oauth.client_secret are not configured".to_string(),
        ))
    }
}

fn build_exchange(config: &GauthConfig) -> Result<Arc<dyn TokenExchange>, GauthError> {
    if config.oauth.client_id.is_some() && config.oauth.client_secret.is_some() {
        let timeout = Duration::from_secs(config.refresh.request_timeout_secs);
        Ok(Arc::new(GoogleTokenClient::new(&config.oauth, timeout)?))
    } else {
        Ok(Arc::new(UnconfiguredExchange))
    }
}

pub async fn build_facade(
    config: &GauthConfig,
    handle: &StoreHandle,
) -> Result<AuthFacade, GauthError> {
    let exchange = build_exchange(config)?;
    let scheduler = Arc::new(
        RefreshScheduler::new(
            handle.store.clone(),
            exchange,
            handle.audit.clone(),
            config.refresh.clone(),
        )
        .await,
    );
    Ok(AuthFacade::new(
        handle.store.clone(),
        scheduler,
        config.refresh.preemptive_buffer_secs,
    ))
}

/// True when `auth` and token refresh can actually reach upstream.
pub fn oauth_configured(config: &GauthConfig) -> bool {
    config.oauth.client_id.is_some() && config.oauth.client_secret.is_some()
}
