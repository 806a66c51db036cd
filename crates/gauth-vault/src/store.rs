// SPDX-FileCopyrightText: 2026 Gauth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The encrypted credential store.
//!
//! Owns the on-disk blob and the `key.json` sidecar. All mutating
//! operations (refresh-save, rotation, delete) serialize behind one
//! mutex over the store internals -- the central invariant preventing
//! interleaved writes from corrupting the blob. Writes go to a temp
//! file in the same directory and are renamed over the target, so there
//! is no partial-write window.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use gauth_audit::{AuditEvent, AuditSink};
use gauth_core::{GauthError, TokenRecord};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::blob::{EncryptedBlob, KeyMetadata};
use crate::kdf;

/// Locations of the credential blob and its key metadata sidecar.
#[derive(Debug, Clone)]
pub struct StorePaths {
    pub credential: PathBuf,
    pub key_meta: PathBuf,
}

impl StorePaths {
    /// Place `key.json` next to the credential file.
    pub fn new(credential: impl Into<PathBuf>) -> Self {
        let credential = credential.into();
        let key_meta = credential
            .parent()
            .map(|p| p.join("key.json"))
            .unwrap_or_else(|| PathBuf::from("key.json"));
        Self {
            credential,
            key_meta,
        }
    }
}

/// Mutable store internals, guarded by the mutation mutex.
pub(crate) struct StoreInner {
    /// The current derived key -- only in memory, never on disk.
    pub(crate) key: Zeroizing<[u8; 32]>,
    pub(crate) meta: KeyMetadata,
}

/// Encrypted at-rest storage for the OAuth token pair.
pub struct CredentialStore {
    paths: StorePaths,
    audit: Arc<dyn AuditSink>,
    inner: Mutex<StoreInner>,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("paths", &self.paths)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl CredentialStore {
    /// Open the store, deriving the current key from `secret`.
    ///
    /// On first open (no `key.json` yet) a fresh salt is generated and
    /// version 1 metadata is persisted with the configured iteration
    /// count. Subsequent opens derive with the recorded salt and
    /// iterations, so the configured count only applies to new key
    /// versions.
    pub fn open(
        paths: StorePaths,
        secret: &SecretString,
        iterations: u32,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self, GauthError> {
        if let Some(parent) = paths.credential.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(GauthError::storage)?;
        }

        let meta = if paths.key_meta.exists() {
            let bytes = std::fs::read(&paths.key_meta).map_err(GauthError::storage)?;
            serde_json::from_slice::<KeyMetadata>(&bytes)
                .map_err(|e| GauthError::Config(format!("malformed key metadata: {e}")))?
        } else {
            let meta = KeyMetadata::initial(iterations, kdf::generate_salt()?);
            let bytes = serde_json::to_vec_pretty(&meta)
                .map_err(|e| GauthError::Internal(format!("failed to serialize key metadata: {e}")))?;
            atomic_write(&paths.key_meta, &bytes)?;
            info!(version = meta.version, "initialized key metadata");
            meta
        };

        let key = kdf::derive_key(
            secret.expose_secret().as_bytes(),
            &meta.salt_bytes()?,
            meta.iteration_count,
        )?;

        Ok(Self {
            paths,
            audit,
            inner: Mutex::new(StoreInner { key, meta }),
        })
    }

    /// Load and decrypt the stored token record.
    ///
    /// A missing file means "not authenticated" and returns `None`, not
    /// an error. Present-but-corrupt data is a [`GauthError::Decryption`].
    pub async fn load(&self) -> Result<Option<TokenRecord>, GauthError> {
        let inner = self.inner.lock().await;
        self.read_record_locked(&inner)
    }

    /// Encrypt and persist a token record, then audit `event`.
    pub async fn save(&self, record: &TokenRecord, event: AuditEvent) -> Result<(), GauthError> {
        let inner = self.inner.lock().await;
        self.write_record_locked(&inner, record)?;
        self.audit.record(
            event,
            serde_json::json!({
                "keyVersion": inner.meta.version,
                "scope": record.scope,
                "expiresAt": record.expires_at,
            }),
        )?;
        debug!(key_version = inner.meta.version, "token record saved");
        Ok(())
    }

    /// Delete the stored credentials, then audit `event`.
    ///
    /// Returns `false` (without auditing) when nothing was stored.
    pub async fn delete(&self, event: AuditEvent) -> Result<bool, GauthError> {
        let inner = self.inner.lock().await;
        if !self.paths.credential.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&self.paths.credential).map_err(GauthError::storage)?;
        self.audit.record(
            event,
            serde_json::json!({ "keyVersion": inner.meta.version }),
        )?;
        info!("stored credentials deleted");
        Ok(true)
    }

    /// Current key version metadata.
    pub async fn key_metadata(&self) -> KeyMetadata {
        self.inner.lock().await.meta.clone()
    }

    /// File locations.
    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    pub(crate) fn audit_sink(&self) -> &Arc<dyn AuditSink> {
        &self.audit
    }

    /// Exclusive access to the store internals, blocking until the lock
    /// is free. Used by the rotator (`force` path).
    pub(crate) async fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().await
    }

    /// Exclusive access without waiting; `None` when a refresh or
    /// another rotation holds the lock.
    pub(crate) fn try_lock(&self) -> Option<MutexGuard<'_, StoreInner>> {
        self.inner.try_lock().ok()
    }

    pub(crate) fn read_record_locked(
        &self,
        inner: &StoreInner,
    ) -> Result<Option<TokenRecord>, GauthError> {
        let bytes = match std::fs::read(&self.paths.credential) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(GauthError::storage(e)),
        };
        let blob = EncryptedBlob::from_json(&bytes)?;
        if blob.key_version != inner.meta.version {
            return Err(GauthError::Decryption(format!(
                "blob key version {} does not match current version {}",
                blob.key_version, inner.meta.version
            )));
        }
        Ok(Some(blob.open_record(&inner.key)?))
    }

    pub(crate) fn write_record_locked(
        &self,
        inner: &StoreInner,
        record: &TokenRecord,
    ) -> Result<(), GauthError> {
        let blob = EncryptedBlob::seal_record(record, &inner.key, inner.meta.version)?;
        self.write_blob_locked(&blob)
    }

    pub(crate) fn write_blob_locked(&self, blob: &EncryptedBlob) -> Result<(), GauthError> {
        let bytes = serde_json::to_vec_pretty(blob)
            .map_err(|e| GauthError::Internal(format!("failed to serialize blob: {e}")))?;
        atomic_write(&self.paths.credential, &bytes)
    }

    pub(crate) fn write_meta_locked(&self, meta: &KeyMetadata) -> Result<(), GauthError> {
        let bytes = serde_json::to_vec_pretty(meta)
            .map_err(|e| GauthError::Internal(format!("failed to serialize key metadata: {e}")))?;
        atomic_write(&self.paths.key_meta, &bytes)
    }
}

/// Write `bytes` to a temp file in the target's directory, fsync, and
/// rename over the target. Readers see either the old or the new file,
/// never a partial write.
pub(crate) fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), GauthError> {
    use std::io::Write;

    let tmp = path.with_extension("tmp");
    {
        let mut file = std::fs::File::create(&tmp).map_err(GauthError::storage)?;
        file.write_all(bytes).map_err(GauthError::storage)?;
        file.sync_all().map_err(GauthError::storage)?;
    }
    std::fs::rename(&tmp, path).map_err(GauthError::storage)
}
