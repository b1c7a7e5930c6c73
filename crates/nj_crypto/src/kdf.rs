//! Password key derivation.
//!
//! `derive_key` — PBKDF2-HMAC-SHA256, derives the 256-bit AES key that
//! protects a password envelope. Deliberately expensive: the default
//! iteration counts run for hundreds of milliseconds on desktop hardware.
//! Callers must not run this on an interaction thread.

use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use zeroize::Zeroizing;

/// Iterations for the encrypted-username envelope of a vault entry.
pub const USERNAME_KDF_ITERATIONS: u32 = 1_212_123;

/// Iterations for the encrypted-private-key envelope of a vault entry.
/// Distinct from the username count so the two envelopes share nothing
/// but the password itself.
pub const PRIVATE_KEY_KDF_ITERATIONS: u32 = 612_345;

/// Iteration counts used when sealing the two envelopes of a vault entry.
///
/// The defaults are the production values; they are part of no format
/// (each envelope records its own count) and exist as a struct so tests
/// and future tuning can override them without touching call sites.
#[derive(Debug, Clone, Copy)]
pub struct KdfProfile {
    pub username_iterations: u32,
    pub private_key_iterations: u32,
}

impl Default for KdfProfile {
    fn default() -> Self {
        Self {
            username_iterations: USERNAME_KDF_ITERATIONS,
            private_key_iterations: PRIVATE_KEY_KDF_ITERATIONS,
        }
    }
}

/// Derive a 32-byte AES key from a password + salt. Zeroized on drop.
pub fn derive_key(password: &str, salt: &[u8], iterations: u32) -> Zeroizing<[u8; 32]> {
    let mut key = Zeroizing::new([0u8; 32]);
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut *key);
    key
}

/// Generate a fresh random 16-byte salt (one per encryption call, never reused).
pub fn generate_salt() -> [u8; 16] {
    use rand::RngCore;
    let mut salt = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    salt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_inputs_same_key() {
        let salt = [7u8; 16];
        let a = derive_key("hunter2", &salt, 1_000);
        let b = derive_key("hunter2", &salt, 1_000);
        assert_eq!(*a, *b);
    }

    #[test]
    fn salt_and_iterations_change_key() {
        let a = derive_key("hunter2", &[7u8; 16], 1_000);
        let b = derive_key("hunter2", &[8u8; 16], 1_000);
        let c = derive_key("hunter2", &[7u8; 16], 1_001);
        assert_ne!(*a, *b);
        assert_ne!(*a, *c);
    }

    #[test]
    fn salts_are_random() {
        assert_ne!(generate_salt(), generate_salt());
    }
}
