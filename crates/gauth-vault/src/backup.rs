// SPDX-FileCopyrightText: 2026 Gauth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Timestamped pre-rotation backups of the credential blob and its key
//! metadata sidecar.
//!
//! Each snapshot is a pair of files in the backup directory:
//! `credentials.<timestamp>.bak` and `key.<timestamp>.bak`. The key
//! sidecar travels with the blob because a historic backup is only
//! decryptable with the salt and iteration count of its own key version.

use std::path::{Path, PathBuf};

use chrono::Utc;
use gauth_core::GauthError;
use tracing::{debug, info, warn};

use crate::store::{StorePaths, atomic_write};

const CREDENTIAL_PREFIX: &str = "credentials.";
const KEY_PREFIX: &str = "key.";
const BACKUP_SUFFIX: &str = ".bak";

/// Microsecond precision keeps names unique across rapid rotations.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S%.6fZ";

/// One snapshot: a blob backup and its matching key metadata backup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupPair {
    pub timestamp: String,
    pub credential: PathBuf,
    pub key_meta: PathBuf,
}

/// Manages the backup directory and its retention window.
#[derive(Debug, Clone)]
pub struct BackupStore {
    dir: PathBuf,
    retention: usize,
}

impl BackupStore {
    pub fn new(dir: impl Into<PathBuf>, retention: usize) -> Self {
        Self {
            dir: dir.into(),
            retention,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Copy the current blob and key sidecar into a new timestamped pair.
    ///
    /// Fails when there is no credential file to back up.
    pub fn snapshot(&self, paths: &StorePaths) -> Result<BackupPair, GauthError> {
        std::fs::create_dir_all(&self.dir).map_err(GauthError::storage)?;

        if !paths.credential.exists() {
            return Err(GauthError::KeyRotation(
                "no stored credentials to back up".to_string(),
            ));
        }

        let timestamp = Utc::now().format(TIMESTAMP_FORMAT).to_string();
        let pair = self.pair_for(&timestamp);

        std::fs::copy(&paths.credential, &pair.credential).map_err(GauthError::storage)?;
        std::fs::copy(&paths.key_meta, &pair.key_meta).map_err(GauthError::storage)?;
        info!(timestamp = %pair.timestamp, "backup snapshot written");
        Ok(pair)
    }

    /// List complete backup pairs, oldest first.
    ///
    /// The timestamp format sorts lexicographically in time order.
    /// Orphaned halves (a blob backup without its key file, or vice
    /// versa) are skipped with a warning.
    pub fn list(&self) -> Result<Vec<BackupPair>, GauthError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(GauthError::storage(e)),
        };

        let mut timestamps = Vec::new();
        for entry in entries {
            let entry = entry.map_err(GauthError::storage)?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(ts) = name
                .strip_prefix(CREDENTIAL_PREFIX)
                .and_then(|rest| rest.strip_suffix(BACKUP_SUFFIX))
            {
                timestamps.push(ts.to_string());
            }
        }
        timestamps.sort();

        let mut pairs = Vec::with_capacity(timestamps.len());
        for ts in timestamps {
            let pair = self.pair_for(&ts);
            if pair.key_meta.exists() {
                pairs.push(pair);
            } else {
                warn!(timestamp = %ts, "backup is missing its key metadata, skipping");
            }
        }
        Ok(pairs)
    }

    /// Most recent complete backup pair, if any.
    pub fn latest(&self) -> Result<Option<BackupPair>, GauthError> {
        Ok(self.list()?.pop())
    }

    /// Look up a backup by its exact timestamp string.
    pub fn find(&self, timestamp: &str) -> Result<Option<BackupPair>, GauthError> {
        Ok(self
            .list()?
            .into_iter()
            .find(|pair| pair.timestamp == timestamp))
    }

    /// Delete pairs beyond the retention window, keeping the newest.
    ///
    /// Returns the number of pairs removed.
    pub fn prune(&self) -> Result<usize, GauthError> {
        let pairs = self.list()?;
        if pairs.len() <= self.retention {
            return Ok(0);
        }
        let excess = pairs.len() - self.retention;
        for pair in &pairs[..excess] {
            std::fs::remove_file(&pair.credential).map_err(GauthError::storage)?;
            std::fs::remove_file(&pair.key_meta).map_err(GauthError::storage)?;
            debug!(timestamp = %pair.timestamp, "pruned backup");
        }
        Ok(excess)
    }

    /// Copy a backup pair back over the live files.
    ///
    /// Uses atomic replaces so a crash mid-restore cannot leave a
    /// half-written blob.
    pub fn restore(&self, pair: &BackupPair, paths: &StorePaths) -> Result<(), GauthError> {
        let blob = std::fs::read(&pair.credential).map_err(GauthError::storage)?;
        let meta = std::fs::read(&pair.key_meta).map_err(GauthError::storage)?;
        atomic_write(&paths.credential, &blob)?;
        atomic_write(&paths.key_meta, &meta)?;
        info!(timestamp = %pair.timestamp, "backup restored");
        Ok(())
    }

    /// Verify the backup volume can hold roughly `required` more bytes
    /// by writing and removing a probe file of that size.
    pub fn probe_free_space(&self, required: u64) -> Result<(), GauthError> {
        std::fs::create_dir_all(&self.dir).map_err(GauthError::storage)?;
        let probe = self.dir.join(".space-probe");
        let result = std::fs::write(&probe, vec![0u8; required as usize]);
        let _ = std::fs::remove_file(&probe);
        result.map_err(|e| {
            GauthError::KeyRotation(format!("insufficient space for backup: {e}"))
        })
    }

    fn pair_for(&self, timestamp: &str) -> BackupPair {
        BackupPair {
            timestamp: timestamp.to_string(),
            credential: self
                .dir
                .join(format!("{CREDENTIAL_PREFIX}{timestamp}{BACKUP_SUFFIX}")),
            key_meta: self.dir.join(format!("{KEY_PREFIX}{timestamp}{BACKUP_SUFFIX}")),
        }
    }
}
