// SPDX-FileCopyrightText: 2026 Gauth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AES-256-GCM encrypted credential storage for gauth.
//!
//! The OAuth token pair lives in a single JSON blob encrypted with a
//! key derived from the operator secret via PBKDF2-HMAC-SHA256. Key
//! rotation re-encrypts the blob under a fresh salt after snapshotting
//! the old state to a timestamped backup.

pub mod backup;
pub mod blob;
pub mod crypto;
pub mod kdf;
pub mod prompt;
pub mod rotate;
pub mod store;

pub use backup::{BackupPair, BackupStore};
pub use blob::{EncryptedBlob, KeyMetadata};
pub use prompt::get_encryption_secret;
pub use rotate::{KeyRotator, RotationResult};
pub use store::{CredentialStore, StorePaths};
