//! Versioned password-based encryption envelope.
//!
//! A `PasswordEnvelope` is the self-describing container every
//! password-protected blob in Nightjar is stored as (encrypted usernames,
//! encrypted private keys). The header names the KDF and records the salt
//! and iteration count, so future formats stay decodable next to v1 blobs.
//!
//! Construction: PBKDF2-SHA256(password, salt, iterations) → 256-bit key,
//! AES-256-GCM with a fresh random 12-byte iv. Salt and iv are random per
//! seal call and never reused; the same password can safely protect any
//! number of envelopes.

use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::aead;
use crate::error::CryptoError;
use crate::kdf;

/// Format version this build produces and accepts.
pub const ENVELOPE_VERSION: u8 = 1;

/// KDF identifier recorded in every v1 envelope.
pub const ENVELOPE_KDF: &str = "PBKDF2-SHA256";

/// A password-derived authenticated ciphertext (`StoredEncryptedBlobV1`).
///
/// All binary fields are standard base64. The struct is the durable wire
/// shape; field names must not change for version 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordEnvelope {
    pub version: u8,
    pub kdf: String,
    pub iterations: u32,
    pub salt: String,
    pub iv: String,
    pub ciphertext: String,
}

impl PasswordEnvelope {
    /// Encrypt `plaintext` under `password` with the given iteration count.
    pub fn seal(plaintext: &[u8], password: &str, iterations: u32) -> Result<Self, CryptoError> {
        let salt = kdf::generate_salt();
        let key = kdf::derive_key(password, &salt, iterations);
        let (iv, ciphertext) = aead::encrypt_detached(&key, plaintext)?;
        Ok(Self {
            version: ENVELOPE_VERSION,
            kdf: ENVELOPE_KDF.to_string(),
            iterations,
            salt: B64.encode(salt),
            iv: B64.encode(iv),
            ciphertext: B64.encode(ciphertext),
        })
    }

    /// Decrypt with `password`.
    ///
    /// Unknown version/KDF fails as `UnsupportedFormat` before any key
    /// derivation. An authentication-tag mismatch surfaces as
    /// `WrongPassword` — the envelope either decrypts or fails cleanly,
    /// never yields corrupted-but-accepted plaintext.
    pub fn open(&self, password: &str) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        if self.version != ENVELOPE_VERSION {
            return Err(CryptoError::UnsupportedFormat(format!(
                "envelope version {}",
                self.version
            )));
        }
        if self.kdf != ENVELOPE_KDF {
            return Err(CryptoError::UnsupportedFormat(format!("kdf {:?}", self.kdf)));
        }

        let salt = B64
            .decode(&self.salt)
            .map_err(|_| CryptoError::CorruptBlob("salt is not valid base64".into()))?;
        let iv = B64
            .decode(&self.iv)
            .map_err(|_| CryptoError::CorruptBlob("iv is not valid base64".into()))?;
        let ciphertext = B64
            .decode(&self.ciphertext)
            .map_err(|_| CryptoError::CorruptBlob("ciphertext is not valid base64".into()))?;

        let key = kdf::derive_key(password, &salt, self.iterations);
        aead::decrypt_detached(&key, &iv, &ciphertext).map_err(|_| CryptoError::WrongPassword)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // Production iteration counts take ~1s each; tests use a small count.
    // The format records the count, so round-trips are unaffected.
    const TEST_ITERATIONS: u32 = 1_000;

    #[test]
    fn seal_open_roundtrip() {
        let env = PasswordEnvelope::seal(b"alice", "correcthorse123", TEST_ITERATIONS).unwrap();
        assert_eq!(env.version, ENVELOPE_VERSION);
        assert_eq!(env.kdf, ENVELOPE_KDF);
        let pt = env.open("correcthorse123").unwrap();
        assert_eq!(&pt[..], b"alice");
    }

    #[test]
    fn wrong_password_is_typed_error() {
        let env = PasswordEnvelope::seal(b"alice", "correcthorse123", TEST_ITERATIONS).unwrap();
        match env.open("wrong") {
            Err(CryptoError::WrongPassword) => {}
            other => panic!("expected WrongPassword, got {other:?}"),
        }
    }

    #[test]
    fn unknown_version_rejected_before_kdf() {
        let mut env = PasswordEnvelope::seal(b"x", "pw", TEST_ITERATIONS).unwrap();
        env.version = 9;
        match env.open("pw") {
            Err(CryptoError::UnsupportedFormat(_)) => {}
            other => panic!("expected UnsupportedFormat, got {other:?}"),
        }
    }

    #[test]
    fn unknown_kdf_rejected() {
        let mut env = PasswordEnvelope::seal(b"x", "pw", TEST_ITERATIONS).unwrap();
        env.kdf = "scrypt".into();
        assert!(matches!(env.open("pw"), Err(CryptoError::UnsupportedFormat(_))));
    }

    #[test]
    fn garbage_base64_is_corrupt_blob() {
        let mut env = PasswordEnvelope::seal(b"x", "pw", TEST_ITERATIONS).unwrap();
        env.salt = "not base64 !!!".into();
        assert!(matches!(env.open("pw"), Err(CryptoError::CorruptBlob(_))));
    }

    #[test]
    fn salt_and_iv_fresh_per_seal() {
        let a = PasswordEnvelope::seal(b"x", "pw", TEST_ITERATIONS).unwrap();
        let b = PasswordEnvelope::seal(b"x", "pw", TEST_ITERATIONS).unwrap();
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn json_shape_is_stable() {
        let env = PasswordEnvelope::seal(b"x", "pw", TEST_ITERATIONS).unwrap();
        let json = serde_json::to_value(&env).unwrap();
        for field in ["version", "kdf", "iterations", "salt", "iv", "ciphertext"] {
            assert!(json.get(field).is_some(), "missing field {field}");
        }
        let back: PasswordEnvelope = serde_json::from_value(json).unwrap();
        assert_eq!(back, env);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn roundtrip_any_plaintext(plaintext in proptest::collection::vec(any::<u8>(), 0..512),
                                   password in "[a-zA-Z0-9]{1,24}") {
            let env = PasswordEnvelope::seal(&plaintext, &password, 100).unwrap();
            let pt = env.open(&password).unwrap();
            prop_assert_eq!(&pt[..], &plaintext[..]);
        }
    }
}
