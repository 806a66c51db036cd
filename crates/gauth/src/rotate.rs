// SPDX-FileCopyrightText: 2026 Gauth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `gauth rotate-key` command implementation.
//!
//! Re-encrypts the stored credentials under a key derived from a new
//! operator-supplied secret. Without `--force` the rotation fails fast
//! when the store is busy and checks free space in the backup directory
//! first; `--force` waits for the lock and skips the space probe.
//! Backup, verify, and rollback always run.

use gauth_config::model::GauthConfig;
use gauth_core::GauthError;
use gauth_vault::prompt;

use crate::context;

/// Run the `gauth rotate-key` command.
pub async fn run_rotate(config: &GauthConfig, force: bool) -> Result<(), GauthError> {
    let handle = context::open_store(config)?;
    let rotator = context::build_rotator(config, &handle);

    let new_secret = prompt::get_encryption_secret_with_confirm()?;
    let outcome = rotator.rotate(&new_secret, force).await?;
    println!(
        "Key rotated: version {} -> {} (backup {}).",
        outcome.old_version, outcome.new_version, outcome.backup_timestamp
    );
    if outcome.backups_pruned > 0 {
        println!("Pruned {} old backup(s).", outcome.backups_pruned);
    }
    Ok(())
}
