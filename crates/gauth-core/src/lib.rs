// SPDX-FileCopyrightText: 2026 Gauth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the gauth credential lifecycle subsystem.
//!
//! Provides the shared error taxonomy and common types used throughout
//! the gauth workspace: the encrypted credential store, key rotation,
//! refresh scheduling, and the CLI all build on these definitions.

pub mod error;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{GauthError, RefreshError};
pub use types::{AuthState, HealthStatus, SessionId, TokenRecord};
