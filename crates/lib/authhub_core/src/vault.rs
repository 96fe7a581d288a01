//! AES-256-GCM vault for per-service signing secrets.
//!
//! Secrets are encrypted before they touch the database and decrypted only
//! at token issuance/verification time. The blob format is
//! `b64(iv):b64(tag):b64(ciphertext)` — three independently encoded
//! components, so a malformed blob fails fast with a format error while a
//! tampered one fails the AEAD integrity check.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::error;

use crate::{HubError, Result};

/// Nonce size for AES-256-GCM (12 bytes).
const NONCE_SIZE: usize = 12;
/// AES-256 key size (32 bytes).
const KEY_SIZE: usize = 32;
/// GCM tag size (16 bytes).
const TAG_SIZE: usize = 16;

/// Symmetric vault keyed by a SHA-256-derived 256-bit key.
///
/// The master value is hashed, so it need not itself be 32 bytes.
pub struct SecretVault {
    key: [u8; KEY_SIZE],
}

impl SecretVault {
    pub fn new(master: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(master.as_bytes());
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(&hasher.finalize());
        Self { key }
    }

    fn cipher(&self) -> Result<Aes256Gcm> {
        Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| HubError::Internal(format!("vault key init: {e}")))
    }

    /// Encrypt plaintext, drawing a fresh random IV.
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let cipher = self.cipher()?;

        let mut iv = [0u8; NONCE_SIZE];
        rand::rng().fill_bytes(&mut iv);
        let nonce = Nonce::from_slice(&iv);

        // aes-gcm appends the 16-byte tag to the ciphertext.
        let sealed = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| HubError::Internal(format!("vault encrypt: {e}")))?;
        let (body, tag) = sealed.split_at(sealed.len() - TAG_SIZE);

        Ok(format!(
            "{}:{}:{}",
            B64.encode(iv),
            B64.encode(tag),
            B64.encode(body)
        ))
    }

    /// Decrypt a `iv:tag:ciphertext` blob, verifying integrity.
    pub fn decrypt(&self, blob: &str) -> Result<String> {
        let parts: Vec<&str> = blob.split(':').collect();
        if parts.len() != 3 {
            return Err(HubError::SecretFormat(format!(
                "expected 3 components, got {}",
                parts.len()
            )));
        }

        let iv = B64
            .decode(parts[0])
            .map_err(|e| HubError::SecretFormat(format!("iv: {e}")))?;
        let tag = B64
            .decode(parts[1])
            .map_err(|e| HubError::SecretFormat(format!("tag: {e}")))?;
        let body = B64
            .decode(parts[2])
            .map_err(|e| HubError::SecretFormat(format!("ciphertext: {e}")))?;

        if iv.len() != NONCE_SIZE {
            return Err(HubError::SecretFormat(format!("iv length {}", iv.len())));
        }
        if tag.len() != TAG_SIZE {
            return Err(HubError::SecretFormat(format!("tag length {}", tag.len())));
        }

        let mut sealed = body;
        sealed.extend_from_slice(&tag);

        let cipher = self.cipher()?;
        let plaintext = cipher
            .decrypt(Nonce::from_slice(&iv), sealed.as_ref())
            .map_err(|_| {
                // Security-relevant: either the blob was tampered with or the
                // master key changed underneath us.
                error!("stored secret failed AEAD integrity check");
                HubError::TamperedSecret
            })?;

        String::from_utf8(plaintext)
            .map_err(|e| HubError::Internal(format!("vault utf-8 decode: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_decrypt_round_trip() {
        let vault = SecretVault::new("test-master-key");
        let plaintext = "sk-super-secret-signing-key-12345";
        let blob = vault.encrypt(plaintext).unwrap();
        assert_eq!(vault.decrypt(&blob).unwrap(), plaintext);
    }

    #[test]
    fn fresh_iv_per_encryption() {
        let vault = SecretVault::new("test-master-key");
        let a = vault.encrypt("secret").unwrap();
        let b = vault.encrypt("secret").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_master_fails() {
        let vault = SecretVault::new("correct-master");
        let blob = vault.encrypt("secret").unwrap();
        let other = SecretVault::new("wrong-master");
        assert!(matches!(
            other.decrypt(&blob),
            Err(HubError::TamperedSecret)
        ));
    }

    #[test]
    fn flipped_tag_byte_is_tampered() {
        let vault = SecretVault::new("test-master-key");
        let blob = vault.encrypt("secret").unwrap();
        let parts: Vec<&str> = blob.split(':').collect();

        let mut tag = B64.decode(parts[1]).unwrap();
        tag[0] ^= 0x01;
        let tampered = format!("{}:{}:{}", parts[0], B64.encode(&tag), parts[2]);

        assert!(matches!(
            vault.decrypt(&tampered),
            Err(HubError::TamperedSecret)
        ));
    }

    #[test]
    fn wrong_component_count_is_format_error() {
        let vault = SecretVault::new("test-master-key");
        assert!(matches!(
            vault.decrypt("only-one-component"),
            Err(HubError::SecretFormat(_))
        ));
        assert!(matches!(
            vault.decrypt("a:b:c:d"),
            Err(HubError::SecretFormat(_))
        ));
    }

    #[test]
    fn empty_plaintext() {
        let vault = SecretVault::new("test-master-key");
        let blob = vault.encrypt("").unwrap();
        assert_eq!(vault.decrypt(&blob).unwrap(), "");
    }
}
