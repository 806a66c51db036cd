// SPDX-FileCopyrightText: 2026 Gauth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Encryption secret acquisition.
//!
//! Headless deployments provide the secret through the
//! `GAUTH_ENCRYPTION_KEY` environment variable; interactive sessions
//! are prompted on the controlling terminal. Key rotation prompts
//! twice, since a typo there would re-encrypt the store under a secret
//! nobody knows.

use std::io::IsTerminal;

use gauth_core::GauthError;
use secrecy::SecretString;

/// Environment variable consulted before any terminal prompt.
pub const ENCRYPTION_KEY_ENV_VAR: &str = "GAUTH_ENCRYPTION_KEY";

/// Secret for unlocking the store.
pub fn get_encryption_secret() -> Result<SecretString, GauthError> {
    acquire(false)
}

/// Secret the store will be sealed under going forward (initial setup
/// and `rotate-key`). Prompted twice on a terminal; a mismatch aborts
/// before anything is re-encrypted.
pub fn get_encryption_secret_with_confirm() -> Result<SecretString, GauthError> {
    acquire(true)
}

fn acquire(confirm: bool) -> Result<SecretString, GauthError> {
    if let Some(secret) = secret_from_env() {
        return Ok(secret);
    }
    if !std::io::stdin().is_terminal() {
        return Err(GauthError::Config(format!(
            "no encryption secret: set {ENCRYPTION_KEY_ENV_VAR} or run on a terminal"
        )));
    }

    let secret = read_secret(if confirm {
        "New encryption secret: "
    } else {
        "Encryption secret: "
    })?;
    if secret.is_empty() {
        return Err(GauthError::Config(
            "encryption secret must not be empty".to_string(),
        ));
    }
    if confirm && read_secret("Confirm encryption secret: ")? != secret {
        return Err(GauthError::Config(
            "encryption secrets do not match".to_string(),
        ));
    }
    Ok(SecretString::from(secret))
}

fn secret_from_env() -> Option<SecretString> {
    std::env::var(ENCRYPTION_KEY_ENV_VAR)
        .ok()
        .filter(|value| !value.is_empty())
        .map(SecretString::from)
}

fn read_secret(prompt_text: &str) -> Result<String, GauthError> {
    rpassword::prompt_password(prompt_text)
        .map_err(|e| GauthError::Config(format!("could not read encryption secret: {e}")))
}
