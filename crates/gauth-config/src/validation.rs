// SPDX-FileCopyrightText: 2026 Gauth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as the KDF iteration floor and non-empty paths.

use crate::diagnostic::ConfigError;
use crate::model::{GauthConfig, KDF_ITERATION_FLOOR};

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)`
/// with all collected validation errors (does not fail fast).
pub fn validate_config(config: &GauthConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.vault.credential_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "vault.credential_path must not be empty".to_string(),
        });
    }

    if config.vault.backup_dir.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "vault.backup_dir must not be empty".to_string(),
        });
    }

    if config.vault.backup_retention == 0 {
        errors.push(ConfigError::Validation {
            message: "vault.backup_retention must be at least 1".to_string(),
        });
    }

    // The iteration floor is a hard security boundary, not a default.
    if config.vault.kdf_iterations < KDF_ITERATION_FLOOR {
        errors.push(ConfigError::Validation {
            message: format!(
                "vault.kdf_iterations must be at least {KDF_ITERATION_FLOOR}, got {}",
                config.vault.kdf_iterations
            ),
        });
    }

    if config.refresh.interval_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "refresh.interval_secs must be positive".to_string(),
        });
    }

    if config.refresh.retry_base_delay_ms == 0 {
        errors.push(ConfigError::Validation {
            message: "refresh.retry_base_delay_ms must be positive".to_string(),
        });
    }

    if config.refresh.request_timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "refresh.request_timeout_secs must be positive".to_string(),
        });
    }

    if config.audit.log_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "audit.log_path must not be empty".to_string(),
        });
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = GauthConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn kdf_iterations_below_floor_fails_validation() {
        let mut config = GauthConfig::default();
        config.vault.kdf_iterations = 10_000;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(
            |e| matches!(e, ConfigError::Validation { message } if message.contains("kdf_iterations"))
        ));
    }

    #[test]
    fn kdf_iterations_at_floor_passes() {
        let mut config = GauthConfig::default();
        config.vault.kdf_iterations = KDF_ITERATION_FLOOR;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn zero_retention_fails_validation() {
        let mut config = GauthConfig::default();
        config.vault.backup_retention = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(
            |e| matches!(e, ConfigError::Validation { message } if message.contains("backup_retention"))
        ));
    }

    #[test]
    fn empty_credential_path_fails_validation() {
        let mut config = GauthConfig::default();
        config.vault.credential_path = "".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(
            |e| matches!(e, ConfigError::Validation { message } if message.contains("credential_path"))
        ));
    }

    #[test]
    fn multiple_errors_are_collected() {
        let mut config = GauthConfig::default();
        config.vault.kdf_iterations = 1;
        config.vault.backup_retention = 0;
        config.refresh.interval_secs = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.len() >= 3);
    }
}
