// SPDX-FileCopyrightText: 2026 Gauth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! PBKDF2-HMAC-SHA256 key derivation from the operator-supplied secret.
//!
//! Derivation is deterministic: the same secret, salt, and iteration
//! count always yield the same 32-byte key, so historic backups remain
//! decryptable using the parameters recorded at their key version.

use std::num::NonZeroU32;

use gauth_config::model::KDF_ITERATION_FLOOR;
use gauth_core::GauthError;
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroizing;

/// Salt length in bytes.
pub const SALT_LEN: usize = 16;

/// Derive a 32-byte AES key from the secret using PBKDF2-HMAC-SHA256.
///
/// Iteration counts below the floor (100,000) are rejected with a
/// configuration error; slow derivation is the point.
///
/// The returned key is wrapped in [`Zeroizing`] for automatic memory
/// zeroing on drop.
pub fn derive_key(
    secret: &[u8],
    salt: &[u8; SALT_LEN],
    iterations: u32,
) -> Result<Zeroizing<[u8; 32]>, GauthError> {
    if iterations < KDF_ITERATION_FLOOR {
        return Err(GauthError::Config(format!(
            "KDF iteration count {iterations} is below the floor of {KDF_ITERATION_FLOOR}"
        )));
    }
    let iterations = NonZeroU32::new(iterations)
        .ok_or_else(|| GauthError::Config("KDF iteration count must be non-zero".to_string()))?;

    let mut output = Zeroizing::new([0u8; 32]);
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        iterations,
        salt,
        secret,
        output.as_mut(),
    );
    Ok(output)
}

/// Generate a random 16-byte salt.
pub fn generate_salt() -> Result<[u8; SALT_LEN], GauthError> {
    let rng = SystemRandom::new();
    let mut salt = [0u8; SALT_LEN];
    rng.fill(&mut salt)
        .map_err(|_| GauthError::Internal("failed to generate random salt".to_string()))?;
    Ok(salt)
}
