// SPDX-FileCopyrightText: 2026 Gauth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Low-level AES-256-GCM seal/open operations.
//!
//! Every call to [`seal`] generates a fresh random 96-bit IV via the
//! system CSPRNG. IV reuse would be catastrophic for GCM security. The
//! authentication tag is returned separately because the on-disk blob
//! format stores it in its own field.

use gauth_core::GauthError;
use ring::aead::{AES_256_GCM, Aad, LessSafeKey, Nonce, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};

/// GCM IV length in bytes (96 bits).
pub const IV_LEN: usize = 12;

/// GCM authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

/// Encrypt plaintext with AES-256-GCM using a random 96-bit IV.
///
/// Returns `(ciphertext, tag, iv)`. The caller must persist all three
/// to be able to decrypt later.
pub fn seal(
    key: &[u8; 32],
    plaintext: &[u8],
) -> Result<(Vec<u8>, [u8; TAG_LEN], [u8; IV_LEN]), GauthError> {
    let unbound = UnboundKey::new(&AES_256_GCM, key)
        .map_err(|_| GauthError::Internal("failed to create AES-256-GCM key".to_string()))?;
    let less_safe = LessSafeKey::new(unbound);

    let rng = SystemRandom::new();
    let mut iv_bytes = [0u8; IV_LEN];
    rng.fill(&mut iv_bytes)
        .map_err(|_| GauthError::Internal("failed to generate random IV".to_string()))?;

    let nonce = Nonce::assume_unique_for_key(iv_bytes);

    // Seal in place: the buffer is extended with the authentication tag,
    // which we split off into its own value.
    let mut in_out = plaintext.to_vec();
    less_safe
        .seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| GauthError::Internal("AES-256-GCM encryption failed".to_string()))?;

    let tag_vec = in_out.split_off(in_out.len() - TAG_LEN);
    let mut tag = [0u8; TAG_LEN];
    tag.copy_from_slice(&tag_vec);

    Ok((in_out, tag, iv_bytes))
}

/// Decrypt ciphertext with AES-256-GCM, verifying the authentication tag.
///
/// Fails closed: a wrong key, tampered ciphertext, or tampered tag all
/// yield [`GauthError::Decryption`] and no partial plaintext.
pub fn open(
    key: &[u8; 32],
    iv: &[u8; IV_LEN],
    ciphertext: &[u8],
    tag: &[u8; TAG_LEN],
) -> Result<Vec<u8>, GauthError> {
    let unbound = UnboundKey::new(&AES_256_GCM, key)
        .map_err(|_| GauthError::Internal("failed to create AES-256-GCM key".to_string()))?;
    let less_safe = LessSafeKey::new(unbound);

    let nonce = Nonce::assume_unique_for_key(*iv);

    let mut in_out = Vec::with_capacity(ciphertext.len() + TAG_LEN);
    in_out.extend_from_slice(ciphertext);
    in_out.extend_from_slice(tag);

    let plaintext = less_safe
        .open_in_place(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| {
            GauthError::Decryption(
                "authentication tag mismatch -- wrong key or corrupted data".to_string(),
            )
        })?;

    Ok(plaintext.to_vec())
}
