// SPDX-FileCopyrightText: 2026 Gauth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Operator-invoked key rotation.
//!
//! Rotation never destroys the only decryptable copy of the
//! credentials: the old blob and key metadata are snapshotted before
//! any write, the committed blob is read back from disk and decrypted
//! with the new key, and any failure after the first live write
//! restores the snapshot. The in-memory key only changes once the
//! on-disk state has been verified.

use std::sync::Arc;

use gauth_audit::{AuditEvent, AuditSink};
use gauth_core::{GauthError, TokenRecord};
use secrecy::{ExposeSecret, SecretString};
use tracing::{info, warn};

use crate::backup::{BackupPair, BackupStore};
use crate::blob::EncryptedBlob;
use crate::kdf;
use crate::store::{CredentialStore, StoreInner};

/// Outcome of a successful rotation.
#[derive(Debug)]
pub struct RotationResult {
    pub old_version: u32,
    pub new_version: u32,
    pub backup_timestamp: String,
    pub backups_pruned: usize,
}

/// Re-encrypts the stored credentials under a freshly derived key.
pub struct KeyRotator {
    store: Arc<CredentialStore>,
    backups: BackupStore,
    iterations: u32,
}

impl KeyRotator {
    pub fn new(store: Arc<CredentialStore>, backups: BackupStore, iterations: u32) -> Self {
        Self {
            store,
            backups,
            iterations,
        }
    }

    /// Rotate to a key derived from `new_secret` (which may equal the
    /// current secret; a fresh salt still yields a new key).
    ///
    /// Without `force` the rotation fails fast when a refresh holds the
    /// store lock and checks backup-volume space first. With `force` it
    /// waits for the lock instead and skips the free-space probe; the
    /// backup, verify, and rollback steps always run.
    pub async fn rotate(
        &self,
        new_secret: &SecretString,
        force: bool,
    ) -> Result<RotationResult, GauthError> {
        let mut inner = if force {
            self.store.lock().await
        } else {
            self.store.try_lock().ok_or_else(|| {
                GauthError::KeyRotation(
                    "store is busy (refresh in progress), retry or use --force".to_string(),
                )
            })?
        };

        let old_version = inner.meta.version;
        let result = self.rotate_locked(&mut inner, new_secret, force).await;
        match result {
            Ok(outcome) => {
                self.store.audit_sink().record(
                    AuditEvent::KeyRotated,
                    serde_json::json!({
                        "oldVersion": outcome.old_version,
                        "newVersion": outcome.new_version,
                        "backupTimestamp": outcome.backup_timestamp,
                    }),
                )?;
                info!(
                    old_version = outcome.old_version,
                    new_version = outcome.new_version,
                    "key rotation committed"
                );
                Ok(outcome)
            }
            Err(e) => {
                warn!(version = old_version, error = %e, "key rotation failed");
                // The rotation error is what the operator needs; an
                // audit write failure on top of it only gets logged.
                if let Err(audit_err) = self.store.audit_sink().record(
                    AuditEvent::RotationFailed,
                    serde_json::json!({
                        "version": old_version,
                        "reason": e.to_string(),
                    }),
                ) {
                    warn!(error = %audit_err, "could not audit failed rotation");
                }
                Err(e)
            }
        }
    }

    async fn rotate_locked(
        &self,
        inner: &mut StoreInner,
        new_secret: &SecretString,
        force: bool,
    ) -> Result<RotationResult, GauthError> {
        let paths = self.store.paths();

        if !force {
            let needed = file_len(&paths.credential) + file_len(&paths.key_meta);
            self.backups.probe_free_space(needed.max(4096))?;
        }

        // Snapshot before touching anything. Also establishes that
        // credentials exist; rotating an empty store is an error.
        let backup = self.backups.snapshot(paths)?;

        let record = self
            .store
            .read_record_locked(inner)?
            .ok_or_else(|| GauthError::KeyRotation("no stored credentials to rotate".to_string()))?;

        let new_meta = inner.meta.next(self.iterations, kdf::generate_salt()?);
        let new_key = kdf::derive_key(
            new_secret.expose_secret().as_bytes(),
            &new_meta.salt_bytes()?,
            new_meta.iteration_count,
        )?;

        let new_blob = EncryptedBlob::seal_record(&record, &new_key, new_meta.version)?;

        if let Err(e) = self.commit(&new_blob, &new_meta) {
            self.rollback(&backup);
            return Err(e);
        }

        // Read back what actually landed on disk; the key is only
        // adopted once the committed file decrypts to the same record.
        if let Err(e) = self.verify_committed(&record, &new_key, new_meta.version) {
            self.rollback(&backup);
            return Err(e);
        }

        inner.key = new_key;
        inner.meta = new_meta.clone();

        let backups_pruned = match self.backups.prune() {
            Ok(n) => n,
            Err(e) => {
                // Rotation itself succeeded; a prune failure is not
                // worth rolling back a committed key.
                warn!(error = %e, "backup pruning failed after rotation");
                0
            }
        };

        Ok(RotationResult {
            old_version: new_meta.version - 1,
            new_version: new_meta.version,
            backup_timestamp: backup.timestamp,
            backups_pruned,
        })
    }

    fn commit(
        &self,
        blob: &EncryptedBlob,
        meta: &crate::blob::KeyMetadata,
    ) -> Result<(), GauthError> {
        self.store.write_blob_locked(blob)?;
        self.store.write_meta_locked(meta)
    }

    fn verify_committed(
        &self,
        expected: &TokenRecord,
        key: &[u8; 32],
        version: u32,
    ) -> Result<(), GauthError> {
        let bytes =
            std::fs::read(&self.store.paths().credential).map_err(GauthError::storage)?;
        let blob = EncryptedBlob::from_json(&bytes)?;
        if blob.key_version != version {
            return Err(GauthError::KeyRotation(format!(
                "committed blob carries key version {} instead of {version}",
                blob.key_version
            )));
        }
        if blob.open_record(key)? != *expected {
            return Err(GauthError::KeyRotation(
                "committed blob did not decrypt back to the original record".to_string(),
            ));
        }
        Ok(())
    }

    fn rollback(&self, backup: &BackupPair) {
        if let Err(e) = self.backups.restore(backup, self.store.paths()) {
            warn!(error = %e, "rollback from backup failed, live files may be stale");
        } else {
            info!(timestamp = %backup.timestamp, "rolled back to pre-rotation state");
        }
    }

    /// Check that the live blob decrypts under the current key and that
    /// every retained backup decrypts with a key derived from `secret`
    /// and the backup's recorded salt and iteration count.
    ///
    /// Returns the number of backups verified. An undecryptable live
    /// blob or backup is an error; an empty store is too, since there
    /// is nothing to attest. Backups made under an earlier, different
    /// secret cannot be verified with the current one.
    pub async fn verify(&self, secret: &SecretString) -> Result<usize, GauthError> {
        let inner = self.store.lock().await;
        self.store
            .read_record_locked(&inner)?
            .ok_or_else(|| GauthError::KeyRotation("no stored credentials to verify".to_string()))?;

        let mut verified = 0;
        for pair in self.backups.list()? {
            self.verify_backup(&pair, secret)?;
            verified += 1;
        }
        Ok(verified)
    }

    fn verify_backup(
        &self,
        pair: &BackupPair,
        secret: &SecretString,
    ) -> Result<TokenRecord, GauthError> {
        let meta_bytes = std::fs::read(&pair.key_meta).map_err(GauthError::storage)?;
        let meta: crate::blob::KeyMetadata = serde_json::from_slice(&meta_bytes)
            .map_err(|e| GauthError::KeyRotation(format!("backup {} has malformed key metadata: {e}", pair.timestamp)))?;

        let key = kdf::derive_key(
            secret.expose_secret().as_bytes(),
            &meta.salt_bytes()?,
            meta.iteration_count,
        )?;

        let blob_bytes = std::fs::read(&pair.credential).map_err(GauthError::storage)?;
        let blob = EncryptedBlob::from_json(&blob_bytes)?;
        blob.open_record(&key).map_err(|e| {
            GauthError::KeyRotation(format!("backup {} failed verification: {e}", pair.timestamp))
        })
    }

    pub fn backups(&self) -> &BackupStore {
        &self.backups
    }
}

fn file_len(path: &std::path::Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}
