// SPDX-FileCopyrightText: 2026 Gauth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `gauth run` command implementation.
//!
//! Long-running mode: keeps the background refresh scheduler alive so
//! the access token stays fresh for other processes reading through the
//! facade. Stops cleanly on ctrl-c.

use std::sync::Arc;

use gauth_config::model::GauthConfig;
use gauth_core::GauthError;
use tracing::info;

use crate::context;

/// Run the `gauth run` command until interrupted.
pub async fn run_daemon(config: &GauthConfig) -> Result<(), GauthError> {
    if !context::oauth_configured(config) {
        return Err(GauthError::Config(
            "oauth.client_id and oauth.client_secret must be configured for `gauth run`"
                .to_string(),
        ));
    }

    let handle = context::open_store(config)?;
    let facade = context::build_facade(config, &handle).await?;
    let scheduler = facade.scheduler().clone();

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let driver = tokio::spawn(Arc::clone(&scheduler).run(shutdown_rx));

    info!(
        interval_secs = config.refresh.interval_secs,
        "refresh scheduler running, ctrl-c to stop"
    );
    tokio::signal::ctrl_c()
        .await
        .map_err(GauthError::storage)?;

    shutdown_tx
        .send(true)
        .map_err(|_| GauthError::Internal("scheduler already stopped".to_string()))?;
    driver
        .await
        .map_err(|e| GauthError::Internal(format!("scheduler task panicked: {e}")))?;
    info!("refresh scheduler stopped");
    Ok(())
}
