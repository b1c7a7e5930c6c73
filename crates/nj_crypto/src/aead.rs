//! Authenticated Encryption with Associated Data
//!
//! Uses AES-256-GCM. Key size: 32 bytes. Nonce: 12 bytes (random). Tag: 16 bytes.
//!
//! Two framings:
//! - detached: the caller stores the nonce separately (password envelopes
//!   record it as their own field);
//! - prefixed: `[ nonce (12 bytes) | ciphertext + tag ]` in one blob
//!   (device session persistence).

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng as AeadOsRng},
    Aes256Gcm, Nonce,
};
use zeroize::Zeroizing;

use crate::error::CryptoError;

/// GCM nonce length in bytes.
pub const IV_LEN: usize = 12;

/// Encrypt `plaintext` with a 32-byte key and a fresh random 12-byte nonce.
/// Returns the nonce and the ciphertext (tag appended) separately.
pub fn encrypt_detached(
    key: &[u8; 32],
    plaintext: &[u8],
) -> Result<([u8; IV_LEN], Vec<u8>), CryptoError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::AeadEncrypt)?;
    let nonce = Aes256Gcm::generate_nonce(&mut AeadOsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| CryptoError::AeadEncrypt)?;

    let mut iv = [0u8; IV_LEN];
    iv.copy_from_slice(&nonce);
    Ok((iv, ciphertext))
}

/// Decrypt a detached ciphertext. Authentication failure is a clean error,
/// never garbled plaintext.
pub fn decrypt_detached(
    key: &[u8; 32],
    iv: &[u8],
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if iv.len() != IV_LEN {
        return Err(CryptoError::AeadDecrypt);
    }
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::AeadDecrypt)?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(iv), ciphertext)
        .map_err(|_| CryptoError::AeadDecrypt)?;
    Ok(Zeroizing::new(plaintext))
}

/// Encrypt to wire format (nonce || ciphertext+tag).
pub fn encrypt_prefixed(key: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let (iv, ciphertext) = encrypt_detached(key, plaintext)?;
    let mut out = Vec::with_capacity(IV_LEN + ciphertext.len());
    out.extend_from_slice(&iv);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt wire-format bytes (nonce || ciphertext+tag).
pub fn decrypt_prefixed(key: &[u8; 32], data: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if data.len() < IV_LEN {
        return Err(CryptoError::AeadDecrypt);
    }
    let (iv, ciphertext) = data.split_at(IV_LEN);
    decrypt_detached(key, iv, ciphertext)
}

/// Generate a fresh random 32-byte content key.
pub fn generate_key() -> Zeroizing<[u8; 32]> {
    use rand::RngCore;
    let mut key = Zeroizing::new([0u8; 32]);
    rand::rngs::OsRng.fill_bytes(&mut *key);
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detached_roundtrip() {
        let key = generate_key();
        let (iv, ct) = encrypt_detached(&key, b"attack at dawn").unwrap();
        let pt = decrypt_detached(&key, &iv, &ct).unwrap();
        assert_eq!(&pt[..], b"attack at dawn");
    }

    #[test]
    fn prefixed_roundtrip() {
        let key = generate_key();
        let blob = encrypt_prefixed(&key, b"session state").unwrap();
        let pt = decrypt_prefixed(&key, &blob).unwrap();
        assert_eq!(&pt[..], b"session state");
    }

    #[test]
    fn wrong_key_fails() {
        let key = generate_key();
        let other = generate_key();
        let blob = encrypt_prefixed(&key, b"secret").unwrap();
        assert!(decrypt_prefixed(&other, &blob).is_err());
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let key = generate_key();
        let mut blob = encrypt_prefixed(&key, b"secret").unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0x01;
        assert!(decrypt_prefixed(&key, &blob).is_err());
    }

    #[test]
    fn nonces_are_fresh_per_call() {
        let key = generate_key();
        let (iv1, _) = encrypt_detached(&key, b"x").unwrap();
        let (iv2, _) = encrypt_detached(&key, b"x").unwrap();
        assert_ne!(iv1, iv2);
    }

    #[test]
    fn truncated_blob_fails() {
        let key = generate_key();
        assert!(decrypt_prefixed(&key, &[0u8; 5]).is_err());
    }
}
