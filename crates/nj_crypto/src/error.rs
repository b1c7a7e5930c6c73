use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    /// AEAD authentication failed under a password-derived key. The most
    /// likely cause is a wrong password; tampering is indistinguishable.
    #[error("Wrong password (authentication tag mismatch)")]
    WrongPassword,

    /// The blob announces a version or KDF this build does not speak.
    /// Decryption is never attempted for these.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Username too long: {len} chars (max {max})")]
    UsernameTooLong { len: usize, max: usize },

    /// RSA-OAEP has a hard plaintext ceiling set by the modulus; inputs
    /// above it are rejected before any crypto call.
    #[error("Plaintext too large for direct RSA encryption: {len} bytes (max {max})")]
    PlaintextTooLarge { len: usize, max: usize },

    #[error("Message is not addressed to this recipient")]
    NoKeyForRecipient,

    #[error("Corrupt blob: {0}")]
    CorruptBlob(String),

    #[error("AEAD encryption failed")]
    AeadEncrypt,

    #[error("AEAD decryption failed (authentication tag mismatch — possible tampering)")]
    AeadDecrypt,

    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    #[error("Serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),

    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),
}
