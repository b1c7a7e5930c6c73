//! Device session persistence.
//!
//! Opt-in non-interactive re-unlock: a serialized session vault (the
//! current plaintext private key + cached public key + expiry) is wrapped
//! under a device-bound symmetric key and persisted. At app start the blob
//! is tried once; any failure — missing key, tampered blob, expired vault —
//! is "no usable session", never a fatal error.
//!
//! # Reduced guarantee
//! The device key lives in the OS credential store (keyring). That store
//! cannot give non-extractable keys: anyone with access to the local
//! credential store can recover the key bytes and unwrap the blob. This is
//! a convenience/theft-of-opportunity control, not protection against an
//! attacker who owns the profile.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use nj_crypto::aead;

use crate::error::VaultError;

// ── Serialized session vault ─────────────────────────────────────────────────

/// What gets wrapped under the device key. The private key field is
/// plaintext key material; this struct must only ever reach persistent
/// storage through [`DeviceSession::encrypt_session_vault`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionVault {
    pub private_key_b64: String,
    pub public_key_b64: String,
    pub expires_at_iso: DateTime<Utc>,
}

impl SessionVault {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at_iso
    }
}

// ── Device key storage ───────────────────────────────────────────────────────

/// Where the 32-byte device key lives.
pub trait DeviceKeyStore: Send + Sync {
    fn load(&self) -> Result<Option<[u8; 32]>, VaultError>;
    fn store(&self, key: &[u8; 32]) -> Result<(), VaultError>;
    fn delete(&self) -> Result<(), VaultError>;
}

/// OS credential store (Windows Credential Manager, macOS Keychain, Linux
/// Secret Service), key bytes base64-encoded as the stored password.
pub struct KeyringKeyStore {
    service: String,
    account: String,
}

impl KeyringKeyStore {
    pub fn new(service: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            account: account.into(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, VaultError> {
        keyring::Entry::new(&self.service, &self.account)
            .map_err(|e| VaultError::Keyring(format!("keyring init: {e}")))
    }
}

impl DeviceKeyStore for KeyringKeyStore {
    fn load(&self) -> Result<Option<[u8; 32]>, VaultError> {
        let encoded = match self.entry()?.get_password() {
            Ok(p) => p,
            Err(keyring::Error::NoEntry) => return Ok(None),
            Err(e) => return Err(VaultError::Keyring(format!("load device key: {e}"))),
        };
        let bytes = B64
            .decode(encoded)
            .map_err(|e| VaultError::Keyring(format!("decode device key: {e}")))?;
        let key: [u8; 32] = bytes
            .try_into()
            .map_err(|_| VaultError::Keyring("device key wrong length".into()))?;
        Ok(Some(key))
    }

    fn store(&self, key: &[u8; 32]) -> Result<(), VaultError> {
        self.entry()?
            .set_password(&B64.encode(key))
            .map_err(|e| VaultError::Keyring(format!("store device key: {e}")))
    }

    fn delete(&self) -> Result<(), VaultError> {
        match self.entry()?.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(VaultError::Keyring(format!("delete device key: {e}"))),
        }
    }
}

/// In-memory key store for tests and ephemeral profiles.
#[derive(Default)]
pub struct MemoryKeyStore {
    key: std::sync::Mutex<Option<[u8; 32]>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DeviceKeyStore for MemoryKeyStore {
    fn load(&self) -> Result<Option<[u8; 32]>, VaultError> {
        Ok(*self.key.lock().map_err(|_| VaultError::Backend("key store poisoned".into()))?)
    }

    fn store(&self, key: &[u8; 32]) -> Result<(), VaultError> {
        *self.key.lock().map_err(|_| VaultError::Backend("key store poisoned".into()))? =
            Some(*key);
        Ok(())
    }

    fn delete(&self) -> Result<(), VaultError> {
        *self.key.lock().map_err(|_| VaultError::Backend("key store poisoned".into()))? = None;
        Ok(())
    }
}

// ── Session blob storage ─────────────────────────────────────────────────────

/// Where the single encrypted session-vault blob lives.
pub trait SessionBlobStore: Send + Sync {
    fn load(&self) -> Result<Option<Vec<u8>>, VaultError>;
    fn store(&self, blob: &[u8]) -> Result<(), VaultError>;
    fn delete(&self) -> Result<(), VaultError>;
}

/// Blob as a single file in the profile directory.
pub struct FileBlobStore {
    path: PathBuf,
}

impl FileBlobStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SessionBlobStore for FileBlobStore {
    fn load(&self) -> Result<Option<Vec<u8>>, VaultError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn store(&self, blob: &[u8]) -> Result<(), VaultError> {
        fs::write(&self.path, blob)?;
        Ok(())
    }

    fn delete(&self) -> Result<(), VaultError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory blob store for tests.
#[derive(Default)]
pub struct MemoryBlobStore {
    blob: std::sync::Mutex<Option<Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionBlobStore for MemoryBlobStore {
    fn load(&self) -> Result<Option<Vec<u8>>, VaultError> {
        Ok(self
            .blob
            .lock()
            .map_err(|_| VaultError::Backend("blob store poisoned".into()))?
            .clone())
    }

    fn store(&self, blob: &[u8]) -> Result<(), VaultError> {
        *self.blob.lock().map_err(|_| VaultError::Backend("blob store poisoned".into()))? =
            Some(blob.to_vec());
        Ok(())
    }

    fn delete(&self) -> Result<(), VaultError> {
        *self.blob.lock().map_err(|_| VaultError::Backend("blob store poisoned".into()))? = None;
        Ok(())
    }
}

// ── Device session ───────────────────────────────────────────────────────────

/// Wraps and unwraps the session vault under the device-bound key.
pub struct DeviceSession {
    keys: Box<dyn DeviceKeyStore>,
    blobs: Box<dyn SessionBlobStore>,
}

impl DeviceSession {
    pub fn new(keys: Box<dyn DeviceKeyStore>, blobs: Box<dyn SessionBlobStore>) -> Self {
        Self { keys, blobs }
    }

    /// Return the device key, lazily creating and persisting it on first use.
    pub fn get_or_create_device_key(&self) -> Result<Zeroizing<[u8; 32]>, VaultError> {
        if let Some(key) = self.keys.load()? {
            return Ok(Zeroizing::new(key));
        }
        let key = aead::generate_key();
        self.keys.store(&key)?;
        debug!("device key created");
        Ok(key)
    }

    /// Serialize and wrap a session vault: AES-256-GCM, iv prepended to the
    /// ciphertext in the stored blob.
    pub fn encrypt_session_vault(&self, vault: &SessionVault) -> Result<Vec<u8>, VaultError> {
        let key = self.get_or_create_device_key()?;
        let plaintext = Zeroizing::new(serde_json::to_vec(vault)?);
        Ok(aead::encrypt_prefixed(&key, &plaintext)?)
    }

    /// Unwrap and parse a session-vault blob. Any failure is
    /// `SessionUnavailable` — a corrupt or foreign blob is "no usable
    /// session", not a fatal error.
    pub fn decrypt_session_vault(&self, blob: &[u8]) -> Result<SessionVault, VaultError> {
        let key = match self.keys.load()? {
            Some(key) => Zeroizing::new(key),
            None => return Err(VaultError::SessionUnavailable),
        };
        let plaintext = aead::decrypt_prefixed(&key, blob).map_err(|_| {
            debug!("persisted session vault failed authentication");
            VaultError::SessionUnavailable
        })?;
        serde_json::from_slice(&plaintext).map_err(|_| VaultError::SessionUnavailable)
    }

    /// Encrypt `vault` and persist the blob.
    pub fn persist(&self, vault: &SessionVault) -> Result<(), VaultError> {
        let blob = self.encrypt_session_vault(vault)?;
        self.blobs.store(&blob)
    }

    /// Restore the persisted session, if one exists, is intact, and has
    /// not expired.
    pub fn restore(&self) -> Result<SessionVault, VaultError> {
        let blob = self.blobs.load()?.ok_or(VaultError::SessionUnavailable)?;
        let vault = self.decrypt_session_vault(&blob)?;
        if vault.is_expired(Utc::now()) {
            return Err(VaultError::SessionUnavailable);
        }
        Ok(vault)
    }

    /// Delete the device key and any persisted blob. No soft-delete; after
    /// this the blob is undecryptable even if a copy survives.
    pub fn wipe(&self) -> Result<(), VaultError> {
        self.blobs.delete()?;
        self.keys.delete()?;
        warn!("device session wiped");
        Ok(())
    }
}

// ── In-memory session lifecycle ──────────────────────────────────────────────

/// Session lifecycle: `Locked → Unlocking → Unlocked → Locked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Locked,
    Unlocking,
    Unlocked,
}

enum Slot {
    Locked,
    Unlocking,
    Unlocked(UnlockedSession),
}

/// Plaintext key material of an unlocked session. Volatile memory only;
/// the private key zeroizes when the slot is dropped or locked.
struct UnlockedSession {
    private_key_b64: Zeroizing<String>,
    public_key_b64: String,
    expires_at: DateTime<Utc>,
}

/// Thread-safe session handle. Clone to share across UI-facing tasks.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<RwLock<Slot>>,
}

impl SessionHandle {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Slot::Locked)),
        }
    }

    pub async fn state(&self) -> SessionState {
        let guard = self.inner.read().await;
        match &*guard {
            Slot::Locked => SessionState::Locked,
            Slot::Unlocking => SessionState::Unlocking,
            Slot::Unlocked(session) => {
                if session.expires_at <= Utc::now() {
                    drop(guard);
                    self.lock().await;
                    SessionState::Locked
                } else {
                    SessionState::Unlocked
                }
            }
        }
    }

    /// Mark an unlock attempt in flight. Returns false if the session is
    /// already unlocked or another attempt is running.
    pub async fn begin_unlock(&self) -> bool {
        let mut guard = self.inner.write().await;
        match &*guard {
            Slot::Locked => {
                *guard = Slot::Unlocking;
                true
            }
            _ => false,
        }
    }

    /// Install the key material of a successful unlock.
    pub async fn complete_unlock(&self, vault: &SessionVault) {
        let mut guard = self.inner.write().await;
        *guard = Slot::Unlocked(UnlockedSession {
            private_key_b64: Zeroizing::new(vault.private_key_b64.clone()),
            public_key_b64: vault.public_key_b64.clone(),
            expires_at: vault.expires_at_iso,
        });
    }

    /// Abandon an in-flight unlock (wrong password, cancellation). There
    /// is nothing to unwind; the slot just returns to `Locked`.
    pub async fn fail_unlock(&self) {
        let mut guard = self.inner.write().await;
        if matches!(&*guard, Slot::Unlocking) {
            *guard = Slot::Locked;
        }
    }

    /// Lock and zeroize the resident private key.
    pub async fn lock(&self) {
        let mut guard = self.inner.write().await;
        *guard = Slot::Locked;
    }

    /// Run `f` over the resident private key. `SessionUnavailable` when
    /// locked, mid-unlock, or expired.
    pub async fn with_private_key<F, R>(&self, f: F) -> Result<R, VaultError>
    where
        F: FnOnce(&str, &str) -> R,
    {
        let guard = self.inner.read().await;
        match &*guard {
            Slot::Unlocked(session) if session.expires_at > Utc::now() => {
                Ok(f(&session.private_key_b64, &session.public_key_b64))
            }
            Slot::Unlocked(_) => {
                drop(guard);
                self.lock().await;
                Err(VaultError::SessionUnavailable)
            }
            _ => Err(VaultError::SessionUnavailable),
        }
    }
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn device_session() -> DeviceSession {
        DeviceSession::new(Box::new(MemoryKeyStore::new()), Box::new(MemoryBlobStore::new()))
    }

    fn vault_expiring_in(hours: i64) -> SessionVault {
        SessionVault {
            private_key_b64: "cHJpdmF0ZQ==".into(),
            public_key_b64: "cHVibGlj".into(),
            expires_at_iso: Utc::now() + Duration::hours(hours),
        }
    }

    #[test]
    fn device_key_created_once() {
        let session = device_session();
        let a = session.get_or_create_device_key().unwrap();
        let b = session.get_or_create_device_key().unwrap();
        assert_eq!(*a, *b);
    }

    #[test]
    fn persist_restore_roundtrip() {
        let session = device_session();
        let vault = vault_expiring_in(24);
        session.persist(&vault).unwrap();
        assert_eq!(session.restore().unwrap(), vault);
    }

    #[test]
    fn tampered_blob_is_no_usable_session() {
        let session = device_session();
        let vault = vault_expiring_in(24);
        let mut blob = session.encrypt_session_vault(&vault).unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0x01;
        assert!(matches!(
            session.decrypt_session_vault(&blob),
            Err(VaultError::SessionUnavailable)
        ));
    }

    #[test]
    fn expired_session_not_restored() {
        let session = device_session();
        session.persist(&vault_expiring_in(-1)).unwrap();
        assert!(matches!(session.restore(), Err(VaultError::SessionUnavailable)));
    }

    #[test]
    fn missing_blob_is_no_usable_session() {
        let session = device_session();
        assert!(matches!(session.restore(), Err(VaultError::SessionUnavailable)));
    }

    #[test]
    fn wipe_is_irreversible() {
        let session = device_session();
        let vault = vault_expiring_in(24);
        let blob = session.encrypt_session_vault(&vault).unwrap();
        session.persist(&vault).unwrap();

        session.wipe().unwrap();
        assert!(session.restore().is_err());
        // Even a surviving copy of the blob is dead: the key is gone and a
        // recreated key cannot authenticate it.
        session.get_or_create_device_key().unwrap();
        assert!(session.decrypt_session_vault(&blob).is_err());
    }

    #[test]
    fn file_blob_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBlobStore::new(dir.path().join("session.bin"));
        assert!(store.load().unwrap().is_none());
        store.store(b"blob").unwrap();
        assert_eq!(store.load().unwrap().unwrap(), b"blob");
        store.delete().unwrap();
        assert!(store.load().unwrap().is_none());
        // Deleting twice is fine.
        store.delete().unwrap();
    }

    #[tokio::test]
    async fn lifecycle_transitions() {
        let handle = SessionHandle::new();
        assert_eq!(handle.state().await, SessionState::Locked);

        assert!(handle.begin_unlock().await);
        assert_eq!(handle.state().await, SessionState::Unlocking);
        // No concurrent second attempt.
        assert!(!handle.begin_unlock().await);

        handle.complete_unlock(&vault_expiring_in(24)).await;
        assert_eq!(handle.state().await, SessionState::Unlocked);
        assert!(!handle.begin_unlock().await);

        handle
            .with_private_key(|private, public| {
                assert_eq!(private, "cHJpdmF0ZQ==");
                assert_eq!(public, "cHVibGlj");
            })
            .await
            .unwrap();

        handle.lock().await;
        assert_eq!(handle.state().await, SessionState::Locked);
        assert!(handle.with_private_key(|_, _| ()).await.is_err());
    }

    #[tokio::test]
    async fn failed_unlock_returns_to_locked() {
        let handle = SessionHandle::new();
        assert!(handle.begin_unlock().await);
        handle.fail_unlock().await;
        assert_eq!(handle.state().await, SessionState::Locked);
    }

    #[tokio::test]
    async fn expiry_locks_automatically() {
        let handle = SessionHandle::new();
        handle.complete_unlock(&vault_expiring_in(-1)).await;
        assert_eq!(handle.state().await, SessionState::Locked);
        assert!(handle.with_private_key(|_, _| ()).await.is_err());
    }
}
