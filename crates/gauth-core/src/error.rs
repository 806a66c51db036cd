// SPDX-FileCopyrightText: 2026 Gauth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the gauth credential lifecycle subsystem.

use thiserror::Error;

/// The primary error type used across all gauth crates.
#[derive(Debug, Error)]
pub enum GauthError {
    /// Configuration errors (invalid TOML, KDF iteration floor violations,
    /// missing required fields).
    #[error("configuration error: {0}")]
    Config(String),

    /// Decryption failed closed: wrong key, tampered ciphertext, or a
    /// malformed blob. Never carries partial plaintext.
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// Key rotation failed. The store has been rolled back to the
    /// pre-rotation snapshot; it is never left half-migrated.
    #[error("key rotation failed: {0}")]
    KeyRotation(String),

    /// A token refresh against the OAuth collaborator failed.
    #[error(transparent)]
    Refresh(#[from] RefreshError),

    /// No valid token and no way to obtain one automatically. Only the
    /// external interactive OAuth flow can resolve this.
    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    /// Filesystem errors on the credential file, backups, or audit log.
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The audit log could not record an entry. Operations fail rather
    /// than proceed unaudited.
    #[error("audit log error: {0}")]
    Audit(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GauthError {
    /// Wrap an I/O error as a storage error.
    pub fn storage(e: std::io::Error) -> Self {
        GauthError::Storage {
            source: Box::new(e),
        }
    }
}

/// Refresh failures, split by whether a retry can help.
///
/// Retryable errors are handled internally by the scheduler (backoff and
/// retry, then a `FAILED` state transition) and never bubble past it
/// unresolved. Non-retryable errors move the scheduler to `REVOKED`
/// immediately.
#[derive(Debug, Error)]
pub enum RefreshError {
    /// Transient failure: network error, timeout, rate limit, 5xx.
    #[error("retryable refresh failure: {0}")]
    Retryable(String),

    /// Permanent failure: the grant is invalid or has been revoked
    /// upstream. Only a fresh interactive OAuth flow can recover.
    #[error("refresh grant rejected: {0}")]
    NonRetryable(String),
}

impl RefreshError {
    /// Whether the scheduler should retry this failure with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RefreshError::Retryable(_))
    }
}
