// SPDX-FileCopyrightText: 2026 Gauth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./gauth.toml` > `~/.config/gauth/gauth.toml`
//! > `/etc/gauth/gauth.toml` with environment variable overrides via the
//! `GAUTH_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::GauthConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/gauth/gauth.toml` (system-wide)
/// 3. `~/.config/gauth/gauth.toml` (user XDG config)
/// 4. `./gauth.toml` (local directory)
/// 5. `GAUTH_*` environment variables
pub fn load_config() -> Result<GauthConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(GauthConfig::default()))
        .merge(Toml::file("/etc/gauth/gauth.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("gauth/gauth.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("gauth.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<GauthConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(GauthConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<GauthConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(GauthConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `GAUTH_VAULT_BACKUP_RETENTION` must
/// map to `vault.backup_retention`, not `vault.backup.retention`.
fn env_provider() -> Env {
    Env::prefixed("GAUTH_").map(|key| {
        // `key` is the lowercased env var name with prefix stripped.
        // Example: GAUTH_VAULT_KDF_ITERATIONS -> "vault_kdf_iterations"
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("vault_", "vault.", 1)
            .replacen("refresh_", "refresh.", 1)
            .replacen("audit_", "audit.", 1)
            .replacen("oauth_", "oauth.", 1);
        mapped.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::KDF_ITERATION_FLOOR;

    #[test]
    fn empty_string_yields_defaults() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.refresh.interval_secs, 1800);
        assert_eq!(config.refresh.preemptive_buffer_secs, 600);
        assert_eq!(config.refresh.max_retries, 3);
        assert_eq!(config.vault.backup_retention, 5);
        assert_eq!(config.vault.kdf_iterations, KDF_ITERATION_FLOOR);
    }

    #[test]
    fn toml_overrides_defaults() {
        let config = load_config_from_str(
            r#"
[vault]
backup_retention = 3
kdf_iterations = 200000

[refresh]
interval_secs = 60
"#,
        )
        .unwrap();
        assert_eq!(config.vault.backup_retention, 3);
        assert_eq!(config.vault.kdf_iterations, 200_000);
        assert_eq!(config.refresh.interval_secs, 60);
        // Untouched sections keep their defaults.
        assert_eq!(config.refresh.max_retries, 3);
    }

    #[test]
    fn unknown_key_is_rejected() {
        let result = load_config_from_str(
            r#"
[refresh]
interval_seconds = 60
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn oauth_section_parses() {
        let config = load_config_from_str(
            r#"
[oauth]
client_id = "abc.apps.googleusercontent.com"
scopes = ["https://www.googleapis.com/auth/drive"]
"#,
        )
        .unwrap();
        assert_eq!(
            config.oauth.client_id.as_deref(),
            Some("abc.apps.googleusercontent.com")
        );
        assert_eq!(config.oauth.scopes.len(), 1);
        assert!(config.oauth.token_url.contains("googleapis.com"));
    }
}
