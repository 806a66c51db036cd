// SPDX-FileCopyrightText: 2026 Gauth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `gauth restore-backup` command implementation.
//!
//! Copies a snapshot pair back over the live files. Works without the
//! encryption secret: restoring is exactly what an operator needs when
//! the live blob no longer decrypts, so nothing here opens the store.

use gauth_config::model::GauthConfig;
use gauth_core::GauthError;

use crate::context;

/// Run the `gauth restore-backup` command.
///
/// Restores the named snapshot, or the most recent one when no
/// timestamp is given.
pub fn run_restore(config: &GauthConfig, timestamp: Option<&str>) -> Result<(), GauthError> {
    let backups = context::backup_store(config);
    let paths = context::store_paths(config);

    let pair = match timestamp {
        Some(ts) => backups.find(ts)?.ok_or_else(|| {
            GauthError::Config(format!(
                "no backup with timestamp {ts} in {}",
                backups.dir().display()
            ))
        })?,
        None => backups.latest()?.ok_or_else(|| {
            GauthError::Config(format!("no backups in {}", backups.dir().display()))
        })?,
    };

    backups.restore(&pair, &paths)?;
    println!("Restored backup {}.", pair.timestamp);
    println!("Run `gauth verify-keys` to confirm the restored blob decrypts.");
    Ok(())
}
