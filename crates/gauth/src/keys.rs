// SPDX-FileCopyrightText: 2026 Gauth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `gauth key-status` and `gauth verify-keys` command implementations.

use chrono::Utc;
use gauth_config::model::GauthConfig;
use gauth_core::GauthError;
use gauth_vault::{KeyMetadata, StorePaths};

use crate::context;

/// Run the `gauth key-status` command.
///
/// Reads the key metadata sidecar directly; no secret is needed because
/// nothing is decrypted.
pub fn run_key_status(config: &GauthConfig) -> Result<(), GauthError> {
    let StorePaths { key_meta, .. } = context::store_paths(config);
    let bytes = std::fs::read(&key_meta).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            GauthError::Config(format!(
                "no key metadata at {} (store not initialized, run `gauth auth`)",
                key_meta.display()
            ))
        } else {
            GauthError::storage(e)
        }
    })?;
    let meta: KeyMetadata = serde_json::from_slice(&bytes)
        .map_err(|e| GauthError::Config(format!("malformed key metadata: {e}")))?;

    let age = meta.age(Utc::now());
    println!("key version:     {}", meta.version);
    println!("iteration count: {}", meta.iteration_count);
    println!(
        "created:         {} ({} days ago)",
        meta.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
        age.num_days()
    );
    Ok(())
}

/// Run the `gauth verify-keys` command.
///
/// Fully decrypts the live blob and every retained backup. Nothing is
/// mutated; any undecryptable file is an error.
pub async fn run_verify_keys(config: &GauthConfig) -> Result<(), GauthError> {
    let handle = context::open_store(config)?;
    let rotator = context::build_rotator(config, &handle);

    let backups = rotator.verify(&handle.secret_copy()).await?;
    println!("Live credentials verified; {backups} backup(s) verified.");
    Ok(())
}
