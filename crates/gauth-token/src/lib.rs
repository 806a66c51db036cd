// SPDX-FileCopyrightText: 2026 Gauth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OAuth2 token lifecycle for gauth: endpoint client, background
//! refresh scheduling, and the facade callers go through.

pub mod facade;
pub mod oauth;
pub mod scheduler;

pub use facade::{AuthFacade, HealthReport};
pub use oauth::{GoogleTokenClient, TokenExchange, TokenResponse};
pub use scheduler::RefreshScheduler;
