// SPDX-FileCopyrightText: 2026 Gauth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the gauth credential subsystem.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Minimum allowed PBKDF2 iteration count. Lower values are rejected at
/// validation time regardless of where they were configured.
pub const KDF_ITERATION_FLOOR: u32 = 100_000;

/// Top-level gauth configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment
/// variable overrides. All sections are optional and default to sensible
/// values. The encryption secret itself is never part of this file; it
/// comes from `GAUTH_ENCRYPTION_KEY` or an interactive prompt.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GauthConfig {
    /// Encrypted credential file, key metadata, and backup settings.
    #[serde(default)]
    pub vault: VaultConfig,

    /// Background refresh scheduler settings.
    #[serde(default)]
    pub refresh: RefreshConfig,

    /// Audit log settings.
    #[serde(default)]
    pub audit: AuditConfig,

    /// OAuth token endpoint settings.
    #[serde(default)]
    pub oauth: OauthConfig,
}

/// Encrypted credential file and key rotation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VaultConfig {
    /// Path to the encrypted credential file.
    #[serde(default = "default_credential_path")]
    pub credential_path: String,

    /// Directory holding pre-rotation snapshots.
    #[serde(default = "default_backup_dir")]
    pub backup_dir: String,

    /// How many rotation backups to retain. Oldest are pruned only
    /// after a successful rotation.
    #[serde(default = "default_backup_retention")]
    pub backup_retention: usize,

    /// PBKDF2 iteration count for key derivation (floor: 100,000).
    #[serde(default = "default_kdf_iterations")]
    pub kdf_iterations: u32,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            credential_path: default_credential_path(),
            backup_dir: default_backup_dir(),
            backup_retention: default_backup_retention(),
            kdf_iterations: default_kdf_iterations(),
        }
    }
}

fn data_dir() -> std::path::PathBuf {
    dirs::data_dir()
        .map(|p| p.join("gauth"))
        .unwrap_or_else(|| std::path::PathBuf::from("."))
}

fn default_credential_path() -> String {
    data_dir()
        .join("credentials.json")
        .to_string_lossy()
        .into_owned()
}

fn default_backup_dir() -> String {
    data_dir().join("backups").to_string_lossy().into_owned()
}

fn default_backup_retention() -> usize {
    5
}

fn default_kdf_iterations() -> u32 {
    KDF_ITERATION_FLOOR
}

/// Background token refresh configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RefreshConfig {
    /// Interval between periodic expiry checks, in seconds.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Preemptive buffer: tokens expiring within this window are
    /// refreshed proactively, in seconds.
    #[serde(default = "default_preemptive_buffer_secs")]
    pub preemptive_buffer_secs: u64,

    /// Maximum retry attempts for retryable refresh failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay for exponential backoff between retries, in
    /// milliseconds (`base * 2^attempt`).
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Timeout on each token-exchange network call, in seconds. A
    /// timeout counts as one retryable failure.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            preemptive_buffer_secs: default_preemptive_buffer_secs(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_interval_secs() -> u64 {
    1800 // 30 minutes
}

fn default_preemptive_buffer_secs() -> u64 {
    600 // 10 minutes
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// Audit log configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Path to the append-only JSON-lines audit log.
    #[serde(default = "default_audit_log_path")]
    pub log_path: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            log_path: default_audit_log_path(),
        }
    }
}

fn default_audit_log_path() -> String {
    data_dir().join("audit.jsonl").to_string_lossy().into_owned()
}

/// OAuth token endpoint configuration.
///
/// The interactive browser consent flow is external; this section only
/// configures the code-exchange and refresh calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OauthConfig {
    /// OAuth client ID. `None` requires an environment variable.
    #[serde(default)]
    pub client_id: Option<String>,

    /// OAuth client secret.
    #[serde(default)]
    pub client_secret: Option<String>,

    /// Token endpoint URL. Overridable for testing.
    #[serde(default = "default_token_url")]
    pub token_url: String,

    /// Redirect URI used during the initial code exchange.
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,

    /// Requested scopes.
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl Default for OauthConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            token_url: default_token_url(),
            redirect_uri: default_redirect_uri(),
            scopes: Vec::new(),
        }
    }
}

fn default_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_redirect_uri() -> String {
    "urn:ietf:wg:oauth:2.0:oob".to_string()
}
