// SPDX-FileCopyrightText: 2026 Gauth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `gauth revoke-all-tokens` command implementation.

use gauth_config::model::GauthConfig;
use gauth_core::GauthError;

use crate::context;

/// Run the `gauth revoke-all-tokens` command.
///
/// Deletes the stored token pair and records the revocation. Upstream
/// revocation at Google is left to the operator; this makes the local
/// credentials unusable.
pub async fn run_revoke(config: &GauthConfig) -> Result<(), GauthError> {
    let handle = context::open_store(config)?;
    let facade = context::build_facade(config, &handle).await?;

    if facade.revoke_all_tokens().await? {
        println!("Stored tokens deleted. Run `gauth auth` to re-authenticate.");
    } else {
        println!("No stored tokens to delete.");
    }
    Ok(())
}
