// SPDX-FileCopyrightText: 2026 Gauth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! On-disk wire formats: the encrypted credential blob and the key
//! metadata sidecar.
//!
//! The blob is JSON with camelCase keys:
//! `{formatVersion, keyVersion, iv, authTag, ciphertext}` where the
//! binary fields are base64. The sidecar `key.json` records the current
//! key version with its KDF salt and iteration count so derivation stays
//! deterministic across restarts and for historic backups.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Duration, Utc};
use gauth_core::{GauthError, TokenRecord};
use serde::{Deserialize, Serialize};

use crate::crypto::{self, IV_LEN, TAG_LEN};
use crate::kdf::SALT_LEN;

/// Current blob format version. Any other value fails decryption closed.
pub const FORMAT_VERSION: u32 = 1;

/// The encrypted credential file contents.
///
/// Invariant: `ciphertext` is only decryptable under the key identified
/// by `keyVersion`; the file never holds two key versions at once
/// (writes are atomic replaces).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedBlob {
    pub format_version: u32,
    pub key_version: u32,
    pub iv: String,
    pub auth_tag: String,
    pub ciphertext: String,
}

impl EncryptedBlob {
    /// Serialize and encrypt a token record under `key`.
    pub fn seal_record(
        record: &TokenRecord,
        key: &[u8; 32],
        key_version: u32,
    ) -> Result<Self, GauthError> {
        let plaintext = serde_json::to_vec(record)
            .map_err(|e| GauthError::Internal(format!("failed to serialize token record: {e}")))?;
        let (ciphertext, tag, iv) = crypto::seal(key, &plaintext)?;
        Ok(Self {
            format_version: FORMAT_VERSION,
            key_version,
            iv: BASE64.encode(iv),
            auth_tag: BASE64.encode(tag),
            ciphertext: BASE64.encode(ciphertext),
        })
    }

    /// Decrypt and deserialize the token record under `key`.
    ///
    /// Fails closed on format version mismatch, malformed base64, wrong
    /// field lengths, tag mismatch, or an unparseable plaintext.
    pub fn open_record(&self, key: &[u8; 32]) -> Result<TokenRecord, GauthError> {
        if self.format_version != FORMAT_VERSION {
            return Err(GauthError::Decryption(format!(
                "unsupported blob format version {}",
                self.format_version
            )));
        }

        let iv_bytes = decode_field(&self.iv, "iv")?;
        let iv: [u8; IV_LEN] = iv_bytes
            .try_into()
            .map_err(|_| GauthError::Decryption("iv has wrong length".to_string()))?;

        let tag_bytes = decode_field(&self.auth_tag, "authTag")?;
        let tag: [u8; TAG_LEN] = tag_bytes
            .try_into()
            .map_err(|_| GauthError::Decryption("authTag has wrong length".to_string()))?;

        let ciphertext = decode_field(&self.ciphertext, "ciphertext")?;

        let plaintext = crypto::open(key, &iv, &ciphertext, &tag)?;
        serde_json::from_slice(&plaintext)
            .map_err(|e| GauthError::Decryption(format!("decrypted payload is not a token record: {e}")))
    }

    /// Parse a blob from its JSON file contents.
    pub fn from_json(json: &[u8]) -> Result<Self, GauthError> {
        serde_json::from_slice(json)
            .map_err(|e| GauthError::Decryption(format!("malformed credential blob: {e}")))
    }
}

fn decode_field(value: &str, field: &str) -> Result<Vec<u8>, GauthError> {
    BASE64
        .decode(value)
        .map_err(|_| GauthError::Decryption(format!("malformed base64 in `{field}`")))
}

/// The key metadata sidecar (`key.json`).
///
/// Exactly one current version exists at any time; rotation replaces
/// this file atomically together with the blob. Prior versions are not
/// persisted here -- only referenced by historic backups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyMetadata {
    /// Monotonically increasing key version.
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub iteration_count: u32,
    /// KDF salt, base64.
    pub salt: String,
}

impl KeyMetadata {
    /// First key version for a fresh store.
    pub fn initial(iteration_count: u32, salt: [u8; SALT_LEN]) -> Self {
        Self {
            version: 1,
            created_at: Utc::now(),
            iteration_count,
            salt: BASE64.encode(salt),
        }
    }

    /// Successor version minted during rotation.
    pub fn next(&self, iteration_count: u32, salt: [u8; SALT_LEN]) -> Self {
        Self {
            version: self.version + 1,
            created_at: Utc::now(),
            iteration_count,
            salt: BASE64.encode(salt),
        }
    }

    /// Decode the recorded salt.
    pub fn salt_bytes(&self) -> Result<[u8; SALT_LEN], GauthError> {
        let bytes = BASE64
            .decode(&self.salt)
            .map_err(|_| GauthError::Config("malformed base64 salt in key metadata".to_string()))?;
        bytes
            .try_into()
            .map_err(|_| GauthError::Config("key metadata salt has wrong length".to_string()))
    }

    /// Age of the current key version.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.created_at
    }
}
