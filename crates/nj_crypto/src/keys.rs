//! Account key pair management.
//!
//! Each registered account has one long-term RSA key pair (OAEP, SHA-256,
//! 4096-bit modulus). The public half is shareable key material; the
//! private half exists in plaintext only inside an unlocked session and is
//! otherwise stored sealed in a password envelope.
//!
//! Export format: base64 DER — SPKI for the public half, PKCS#8 for the
//! private half. The pair is created once at registration and replaced
//! wholesale only by a destructive account recreation.

use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::CryptoError;

/// Production modulus size in bits.
pub const MODULUS_BITS: usize = 4096;

const CONTENT_KEY_LEN: usize = 32;

// ── Public half ───────────────────────────────────────────────────────────────

/// A recipient's shareable public key (SPKI DER, base64 on the wire).
#[derive(Debug, Clone, PartialEq)]
pub struct PublicKeyMaterial(RsaPublicKey);

impl PublicKeyMaterial {
    pub fn to_b64(&self) -> Result<String, CryptoError> {
        let der = self
            .0
            .to_public_key_der()
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(B64.encode(der.as_bytes()))
    }

    pub fn from_b64(s: &str) -> Result<Self, CryptoError> {
        let der = B64.decode(s)?;
        let key = RsaPublicKey::from_public_key_der(&der)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(Self(key))
    }

    /// Human-readable fingerprint: BLAKE3 of the SPKI DER, truncated to
    /// 20 bytes, hex in groups of 4 for manual comparison.
    pub fn fingerprint(&self) -> Result<String, CryptoError> {
        let der = self
            .0
            .to_public_key_der()
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        let hash = blake3::hash(der.as_bytes());
        let hex = hex::encode(&hash.as_bytes()[..20]);
        Ok(hex
            .as_bytes()
            .chunks(4)
            .map(|c| String::from_utf8_lossy(c).into_owned())
            .collect::<Vec<_>>()
            .join(" "))
    }

    /// Largest plaintext this key can RSA-OAEP-encrypt directly:
    /// modulus bytes − 2·hash_len − 2. A hard ceiling, not a soft limit.
    pub fn max_direct_plaintext(&self) -> usize {
        self.0.size() - 2 * 32 - 2
    }

    /// Wrap a 32-byte content key for this recipient (RSA-OAEP-SHA256).
    pub fn wrap_content_key(&self, content_key: &[u8; 32]) -> Result<Vec<u8>, CryptoError> {
        let mut rng = rand::rngs::OsRng;
        self.0
            .encrypt(&mut rng, Oaep::new::<Sha256>(), content_key)
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))
    }

    /// Encrypt a short control payload directly with this public key.
    /// Rejects plaintexts above the OAEP ceiling; never truncates.
    pub fn encrypt_small_string(&self, plaintext: &str) -> Result<Vec<u8>, CryptoError> {
        let max = self.max_direct_plaintext();
        if plaintext.len() > max {
            return Err(CryptoError::PlaintextTooLarge {
                len: plaintext.len(),
                max,
            });
        }
        let mut rng = rand::rngs::OsRng;
        self.0
            .encrypt(&mut rng, Oaep::new::<Sha256>(), plaintext.as_bytes())
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))
    }
}

// ── Key pair ──────────────────────────────────────────────────────────────────

/// The account's asymmetric key pair. The private half zeroizes on drop
/// (the `rsa` crate implements `ZeroizeOnDrop` for `RsaPrivateKey`).
#[derive(Debug, Clone)]
pub struct AccountKeyPair {
    private: RsaPrivateKey,
}

impl AccountKeyPair {
    /// Generate a production key pair ([`MODULUS_BITS`]-bit modulus).
    /// Expensive (seconds); callers run it off the interaction thread.
    pub fn generate() -> Result<Self, CryptoError> {
        Self::generate_with_bits(MODULUS_BITS)
    }

    /// Generate with an explicit modulus size. Exists for tests and
    /// constrained targets; production callers use [`Self::generate`].
    pub fn generate_with_bits(bits: usize) -> Result<Self, CryptoError> {
        let mut rng = rand::rngs::OsRng;
        let private = RsaPrivateKey::new(&mut rng, bits)
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
        Ok(Self { private })
    }

    pub fn public(&self) -> PublicKeyMaterial {
        PublicKeyMaterial(self.private.to_public_key())
    }

    /// Export the private half as base64 PKCS#8 DER. The returned string
    /// is key material: callers seal it into an envelope immediately.
    pub fn private_to_b64(&self) -> Result<Zeroizing<String>, CryptoError> {
        let der = self
            .private
            .to_pkcs8_der()
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(Zeroizing::new(B64.encode(der.as_bytes())))
    }

    pub fn from_private_b64(s: &str) -> Result<Self, CryptoError> {
        let der = Zeroizing::new(B64.decode(s.trim())?);
        let private = RsaPrivateKey::from_pkcs8_der(&der)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(Self { private })
    }

    /// Unwrap a content key wrapped for this account.
    pub fn unwrap_content_key(&self, wrapped: &[u8]) -> Result<Zeroizing<[u8; 32]>, CryptoError> {
        let plaintext = Zeroizing::new(
            self.private
                .decrypt(Oaep::new::<Sha256>(), wrapped)
                .map_err(|_| CryptoError::CorruptBlob("content key unwrap failed".into()))?,
        );
        if plaintext.len() != CONTENT_KEY_LEN {
            return Err(CryptoError::InvalidKey(
                "unwrapped content key wrong length".into(),
            ));
        }
        let mut key = Zeroizing::new([0u8; 32]);
        key.copy_from_slice(&plaintext);
        Ok(key)
    }

    /// Decrypt a short control payload produced by
    /// [`PublicKeyMaterial::encrypt_small_string`].
    pub fn decrypt_small_string(&self, ciphertext: &[u8]) -> Result<Zeroizing<String>, CryptoError> {
        let plaintext = Zeroizing::new(
            self.private
                .decrypt(Oaep::new::<Sha256>(), ciphertext)
                .map_err(|_| CryptoError::CorruptBlob("RSA-OAEP decryption failed".into()))?,
        );
        let s = String::from_utf8(plaintext.to_vec())
            .map_err(|_| CryptoError::CorruptBlob("decrypted payload is not UTF-8".into()))?;
        Ok(Zeroizing::new(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 4096-bit generation takes tens of seconds unoptimized; tests use the
    // documented size override.
    const TEST_BITS: usize = 2048;

    fn test_pair() -> AccountKeyPair {
        AccountKeyPair::generate_with_bits(TEST_BITS).unwrap()
    }

    #[test]
    fn wrap_unwrap_content_key() {
        let pair = test_pair();
        let content_key = [0x42u8; 32];
        let wrapped = pair.public().wrap_content_key(&content_key).unwrap();
        let unwrapped = pair.unwrap_content_key(&wrapped).unwrap();
        assert_eq!(*unwrapped, content_key);
    }

    #[test]
    fn unwrap_with_wrong_key_fails() {
        let pair = test_pair();
        let other = test_pair();
        let wrapped = pair.public().wrap_content_key(&[1u8; 32]).unwrap();
        assert!(other.unwrap_content_key(&wrapped).is_err());
    }

    #[test]
    fn private_export_import_roundtrip() {
        let pair = test_pair();
        let b64 = pair.private_to_b64().unwrap();
        let restored = AccountKeyPair::from_private_b64(&b64).unwrap();
        assert_eq!(
            pair.public().to_b64().unwrap(),
            restored.public().to_b64().unwrap()
        );
    }

    #[test]
    fn public_export_import_roundtrip() {
        let pair = test_pair();
        let b64 = pair.public().to_b64().unwrap();
        let restored = PublicKeyMaterial::from_b64(&b64).unwrap();
        assert_eq!(restored, pair.public());
    }

    #[test]
    fn small_string_roundtrip() {
        let pair = test_pair();
        let ct = pair.public().encrypt_small_string("join-token:xyz").unwrap();
        let pt = pair.decrypt_small_string(&ct).unwrap();
        assert_eq!(&*pt, "join-token:xyz");
    }

    #[test]
    fn oversized_small_payload_rejected() {
        let pair = test_pair();
        let max = pair.public().max_direct_plaintext();
        let big = "x".repeat(max + 1);
        assert!(matches!(
            pair.public().encrypt_small_string(&big),
            Err(CryptoError::PlaintextTooLarge { .. })
        ));
        // At the ceiling it must succeed.
        let at_max = "x".repeat(max);
        assert!(pair.public().encrypt_small_string(&at_max).is_ok());
    }

    #[test]
    fn fingerprint_is_stable_and_grouped() {
        let pair = test_pair();
        let f1 = pair.public().fingerprint().unwrap();
        let f2 = pair.public().fingerprint().unwrap();
        assert_eq!(f1, f2);
        assert_eq!(f1.split(' ').count(), 10);
    }
}
