//! secrets
//!
//! Authenticated encryption for stored passwords.
//!
//! The preferences file holds the remote password encrypted, not in
//! cleartext. The encryption key is derived at runtime from a user-supplied
//! key phrase (HKDF-SHA256 over a random per-secret salt); the cipher is
//! AES-256-GCM, so tampering and wrong keys are detected rather than
//! producing garbage.
//!
//! # Payload format
//!
//! `base64( salt(16) || nonce(12) || ciphertext+tag )`
//!
//! # Security
//!
//! - Derived keys are zeroized on drop
//! - Secrets are never logged or included in error messages
//!
//! # Example
//!
//! ```
//! use bibsync::secrets::{decrypt_secret, encrypt_secret};
//!
//! let stored = encrypt_secret("hunter2", "my key phrase").unwrap();
//! assert_eq!(decrypt_secret(&stored, "my key phrase").unwrap(), "hunter2");
//! assert!(decrypt_secret(&stored, "wrong phrase").is_err());
//! ```

use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::Aes256Gcm;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of the AES-256 key in bytes.
const KEY_SIZE: usize = 32;
/// Size of the per-secret salt in bytes.
const SALT_SIZE: usize = 16;
/// Size of the GCM nonce in bytes.
const NONCE_SIZE: usize = 12;

/// Errors from secret encryption and decryption.
///
/// Deliberately free of any secret material.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SecretError {
    /// The stored payload is not valid base64 or is too short.
    #[error("malformed encrypted secret")]
    Malformed,

    /// Decryption failed (wrong key phrase or tampered payload).
    #[error("secret decryption failed")]
    DecryptionFailed,

    /// Encryption failed.
    #[error("secret encryption failed")]
    EncryptionFailed,

    /// The decrypted secret is not valid UTF-8.
    #[error("decrypted secret is not valid UTF-8")]
    InvalidUtf8,
}

/// Derived AES-256 key, zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
struct SecretKey {
    bytes: [u8; KEY_SIZE],
}

impl SecretKey {
    /// Derive a key from a key phrase and a per-secret salt using
    /// HKDF-SHA256.
    fn derive(key_phrase: &str, salt: &[u8]) -> Result<Self, SecretError> {
        let hk = Hkdf::<Sha256>::new(Some(salt), key_phrase.as_bytes());
        let mut bytes = [0u8; KEY_SIZE];
        hk.expand(b"bibsync-password-key-v1", &mut bytes)
            .map_err(|_| SecretError::EncryptionFailed)?;
        Ok(Self { bytes })
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(GenericArray::from_slice(&self.bytes))
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Encrypt `plaintext` under a key derived from `key_phrase`.
///
/// Each call uses a fresh random salt and nonce, so encrypting the same
/// secret twice yields different payloads.
pub fn encrypt_secret(plaintext: &str, key_phrase: &str) -> Result<String, SecretError> {
    let mut salt = [0u8; SALT_SIZE];
    let mut nonce = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut salt);
    rand::thread_rng().fill_bytes(&mut nonce);

    let key = SecretKey::derive(key_phrase, &salt)?;
    let ciphertext = key
        .cipher()
        .encrypt(GenericArray::from_slice(&nonce), plaintext.as_bytes())
        .map_err(|_| SecretError::EncryptionFailed)?;

    let mut payload = Vec::with_capacity(SALT_SIZE + NONCE_SIZE + ciphertext.len());
    payload.extend_from_slice(&salt);
    payload.extend_from_slice(&nonce);
    payload.extend_from_slice(&ciphertext);

    Ok(BASE64.encode(payload))
}

/// Decrypt a payload produced by [`encrypt_secret`].
///
/// # Errors
///
/// - [`SecretError::Malformed`] if the payload is not base64 or too short
/// - [`SecretError::DecryptionFailed`] on a wrong key phrase or a
///   tampered payload (GCM authentication failure)
pub fn decrypt_secret(payload: &str, key_phrase: &str) -> Result<String, SecretError> {
    let raw = BASE64.decode(payload).map_err(|_| SecretError::Malformed)?;
    if raw.len() < SALT_SIZE + NONCE_SIZE {
        return Err(SecretError::Malformed);
    }

    let (salt, rest) = raw.split_at(SALT_SIZE);
    let (nonce, ciphertext) = rest.split_at(NONCE_SIZE);

    let key = SecretKey::derive(key_phrase, salt).map_err(|_| SecretError::DecryptionFailed)?;
    let mut plaintext = key
        .cipher()
        .decrypt(GenericArray::from_slice(nonce), ciphertext)
        .map_err(|_| SecretError::DecryptionFailed)?;

    match String::from_utf8(plaintext.clone()) {
        Ok(s) => {
            plaintext.zeroize();
            Ok(s)
        }
        Err(_) => {
            plaintext.zeroize();
            Err(SecretError::InvalidUtf8)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let stored = encrypt_secret("s3cret", "phrase").unwrap();
        assert_eq!(decrypt_secret(&stored, "phrase").unwrap(), "s3cret");
    }

    #[test]
    fn wrong_phrase_fails() {
        let stored = encrypt_secret("s3cret", "phrase").unwrap();
        assert_eq!(
            decrypt_secret(&stored, "other"),
            Err(SecretError::DecryptionFailed)
        );
    }

    #[test]
    fn payloads_are_salted() {
        let a = encrypt_secret("s3cret", "phrase").unwrap();
        let b = encrypt_secret("s3cret", "phrase").unwrap();
        assert_ne!(a, b);
        assert_eq!(decrypt_secret(&a, "phrase").unwrap(), "s3cret");
        assert_eq!(decrypt_secret(&b, "phrase").unwrap(), "s3cret");
    }

    #[test]
    fn empty_secret_round_trips() {
        let stored = encrypt_secret("", "phrase").unwrap();
        assert_eq!(decrypt_secret(&stored, "phrase").unwrap(), "");
    }

    #[test]
    fn tampered_payload_rejected() {
        let stored = encrypt_secret("s3cret", "phrase").unwrap();
        let mut raw = BASE64.decode(&stored).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        let tampered = BASE64.encode(raw);

        assert_eq!(
            decrypt_secret(&tampered, "phrase"),
            Err(SecretError::DecryptionFailed)
        );
    }

    #[test]
    fn garbage_payload_is_malformed() {
        assert_eq!(
            decrypt_secret("not base64!!", "phrase"),
            Err(SecretError::Malformed)
        );
        assert_eq!(decrypt_secret("AAAA", "phrase"), Err(SecretError::Malformed));
    }

    #[test]
    fn unicode_secret_round_trips() {
        let stored = encrypt_secret("pässwörd €", "phrase").unwrap();
        assert_eq!(decrypt_secret(&stored, "phrase").unwrap(), "pässwörd €");
    }
}
