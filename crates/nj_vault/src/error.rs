use thiserror::Error;

#[derive(Debug, Error)]
pub enum VaultError {
    /// The trial-decryption scan exhausted every entry. Deliberately the
    /// same error for "unknown username" and "wrong password" — callers
    /// must not be able to tell which of the stored entries the input
    /// almost matched.
    #[error("No vault entry matches the given credentials")]
    EntryNotFound,

    /// Another writer persisted the vault between our read and write.
    /// The operation was not applied; re-read and retry.
    #[error("Vault revision conflict: expected {expected}, found {actual}")]
    RevisionConflict { expected: u64, actual: u64 },

    #[error("Vault backend error: {0}")]
    Backend(String),

    #[error("No usable persisted session")]
    SessionUnavailable,

    #[error("Keyring error: {0}")]
    Keyring(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),

    #[error("Crypto error: {0}")]
    Crypto(#[from] nj_crypto::CryptoError),

    #[error("Background task failed: {0}")]
    TaskJoin(String),
}
