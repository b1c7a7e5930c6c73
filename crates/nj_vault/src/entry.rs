//! The portable vault entry.
//!
//! One entry is one password-protected account: the padded username and
//! the private key, each sealed in its own [`PasswordEnvelope`] under the
//! *same* password but with distinct, deliberately large iteration counts.
//! The two envelopes share no other secret; the ciphertexts are opaque and
//! safe to export verbatim as backup files (a bare JSON array of entries).

use serde::{Deserialize, Serialize};

use nj_crypto::envelope::PasswordEnvelope;
use nj_crypto::error::CryptoError;
use nj_crypto::kdf::KdfProfile;
use nj_crypto::keys::AccountKeyPair;
use nj_crypto::padding;

/// Entry format version this build produces and accepts.
pub const VAULT_ENTRY_VERSION: u8 = 2;

/// One password-protected account record. Wire names are camelCase and
/// part of the durable backup format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultEntry {
    pub version: u8,
    pub encrypted_username: PasswordEnvelope,
    pub encrypted_private_key: PasswordEnvelope,
}

impl VaultEntry {
    /// Seal a new entry: pad the username (hiding its length inside the
    /// ciphertext), then seal both halves under `password` with the two
    /// iteration counts from `profile`. Fresh salts and ivs per call.
    pub fn create(
        username: &str,
        password: &str,
        keypair: &AccountKeyPair,
        profile: KdfProfile,
    ) -> Result<Self, CryptoError> {
        let padded = padding::pad_username(username)?;
        let encrypted_username =
            PasswordEnvelope::seal(padded.as_bytes(), password, profile.username_iterations)?;
        let private_b64 = keypair.private_to_b64()?;
        let encrypted_private_key = PasswordEnvelope::seal(
            private_b64.as_bytes(),
            password,
            profile.private_key_iterations,
        )?;
        Ok(Self {
            version: VAULT_ENTRY_VERSION,
            encrypted_username,
            encrypted_private_key,
        })
    }

    /// Structural identity: BLAKE3 over the two ciphertexts. Used to
    /// deduplicate imports and to address removals without touching any
    /// plaintext.
    pub fn signature(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.encrypted_username.ciphertext.as_bytes());
        hasher.update(b"\x00");
        hasher.update(self.encrypted_private_key.ciphertext.as_bytes());
        hasher.finalize().to_hex().to_string()
    }

    /// Shape check applied to import candidates before admission.
    pub fn is_valid_shape(value: &serde_json::Value) -> bool {
        match serde_json::from_value::<VaultEntry>(value.clone()) {
            Ok(entry) => entry.version == VAULT_ENTRY_VERSION,
            Err(_) => false,
        }
    }
}
