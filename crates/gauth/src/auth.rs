// SPDX-FileCopyrightText: 2026 Gauth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `gauth auth` command implementation.
//!
//! Exchanges an authorization code for the initial token pair. The
//! browser consent flow that produces the code is external; this
//! command only completes the exchange and persists the result.

use gauth_config::model::GauthConfig;
use gauth_core::GauthError;

use crate::context;

/// Run the `gauth auth` command.
pub async fn run_auth(config: &GauthConfig, code: &str) -> Result<(), GauthError> {
    if !context::oauth_configured(config) {
        return Err(GauthError::Config(
            "oauth.client_id and oauth.client_secret must be configured before `gauth auth`"
                .to_string(),
        ));
    }

    let handle = context::open_store(config)?;
    let facade = context::build_facade(config, &handle).await?;

    let record = facade.scheduler().complete_initial_exchange(code).await?;
    println!(
        "Authenticated. Access token valid until {} (scope: {}).",
        record.expires_at.format("%Y-%m-%d %H:%M:%S UTC"),
        if record.scope.is_empty() {
            "default"
        } else {
            &record.scope
        }
    );
    Ok(())
}
