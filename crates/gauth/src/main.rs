// SPDX-FileCopyrightText: 2026 Gauth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! gauth - encrypted OAuth2 credential lifecycle manager.
//!
//! This is the binary entry point for the gauth CLI.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod auth;
mod context;
mod health;
mod keys;
mod restore;
mod revoke;
mod rotate;
mod run;

/// gauth - encrypted OAuth2 credential lifecycle manager.
#[derive(Parser, Debug)]
#[command(name = "gauth", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Exchange an authorization code for the initial token pair.
    Auth {
        /// Authorization code from the consent flow.
        #[arg(long)]
        code: String,
    },
    /// Keep the background token refresh running until interrupted.
    Run,
    /// Show credential health (exit 1 when unhealthy).
    Health {
        /// Emit the report as JSON for scripting.
        #[arg(long)]
        json: bool,
    },
    /// Re-encrypt stored credentials under a new key version.
    RotateKey {
        /// Wait for a busy store and skip the free-space probe.
        #[arg(long)]
        force: bool,
    },
    /// Decrypt the live blob and all backups to prove the keys work.
    VerifyKeys,
    /// Show the current key version, iteration count, and age.
    KeyStatus,
    /// Roll the live files back to a snapshot.
    RestoreBackup {
        /// Backup timestamp; defaults to the most recent snapshot.
        #[arg(long)]
        timestamp: Option<String>,
    },
    /// Delete the stored token pair and record the revocation.
    RevokeAllTokens,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("GAUTH_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match gauth_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            gauth_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let exit_code = match cli.command {
        Commands::Auth { code } => to_exit(auth::run_auth(&config, &code).await),
        Commands::Run => to_exit(run::run_daemon(&config).await),
        Commands::Health { json } => match health::run_health(&config, json).await {
            Ok(code) => code,
            Err(e) => report(e),
        },
        Commands::RotateKey { force } => to_exit(rotate::run_rotate(&config, force).await),
        Commands::VerifyKeys => to_exit(keys::run_verify_keys(&config).await),
        Commands::KeyStatus => to_exit(keys::run_key_status(&config)),
        Commands::RestoreBackup { timestamp } => {
            to_exit(restore::run_restore(&config, timestamp.as_deref()))
        }
        Commands::RevokeAllTokens => to_exit(revoke::run_revoke(&config).await),
    };

    std::process::exit(exit_code.into());
}

fn to_exit(result: Result<(), gauth_core::GauthError>) -> u8 {
    match result {
        Ok(()) => 0,
        Err(e) => report(e),
    }
}

fn report(error: gauth_core::GauthError) -> u8 {
    eprintln!("gauth: {error}");
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_all_subcommands() {
        Cli::try_parse_from(["gauth", "auth", "--code", "4/abc"]).unwrap();
        Cli::try_parse_from(["gauth", "run"]).unwrap();
        Cli::try_parse_from(["gauth", "health", "--json"]).unwrap();
        Cli::try_parse_from(["gauth", "rotate-key", "--force"]).unwrap();
        Cli::try_parse_from(["gauth", "verify-keys"]).unwrap();
        Cli::try_parse_from(["gauth", "key-status"]).unwrap();
        Cli::try_parse_from(
            ["gauth", "restore-backup", "--timestamp", "2026-08-24T00-00-00.000000Z"],
        )
        .unwrap();
        Cli::try_parse_from(["gauth", "revoke-all-tokens"]).unwrap();
    }

    #[test]
    fn cli_requires_a_subcommand() {
        assert!(Cli::try_parse_from(["gauth"]).is_err());
    }
}
