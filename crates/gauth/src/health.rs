// SPDX-FileCopyrightText: 2026 Gauth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `gauth health` command implementation.
//!
//! Renders the credential health report without triggering a refresh,
//! so it is safe to run from cron or monitoring. Exit code 0 for
//! HEALTHY and DEGRADED (still serving), 1 for UNHEALTHY.

use gauth_config::model::GauthConfig;
use gauth_core::{GauthError, HealthStatus};
use gauth_token::HealthReport;

use crate::context;

/// Run the `gauth health` command. Returns the process exit code.
pub async fn run_health(config: &GauthConfig, json: bool) -> Result<u8, GauthError> {
    let handle = context::open_store(config)?;
    let facade = context::build_facade(config, &handle).await?;
    let report = facade.health().await;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report)
                .map_err(|e| GauthError::Internal(format!("failed to render report: {e}")))?
        );
    } else {
        print_report(&report);
    }

    Ok(match report.status {
        HealthStatus::Healthy => 0,
        HealthStatus::Degraded => {
            eprintln!("warning: access token is inside the refresh buffer");
            0
        }
        HealthStatus::Unhealthy => 1,
    })
}

fn print_report(report: &HealthReport) {
    println!("status:      {}", report.status);
    println!("auth state:  {}", report.state);
    println!("key version: {}", report.key_version);
    match report.token_expires_in_secs {
        Some(secs) if secs >= 0 => println!("token:       expires in {}", format_secs(secs)),
        Some(secs) => println!("token:       expired {} ago", format_secs(-secs)),
        None => println!("token:       none stored"),
    }
    if let Some(error) = &report.last_error {
        println!("last error:  {error}");
    }
}

fn format_secs(secs: i64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {}s", secs % 60)
    } else {
        format!("{secs}s")
    }
}
