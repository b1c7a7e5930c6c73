//! Vault operations.
//!
//! The store owns an injected backend and performs every mutation as a
//! read-modify-write under the backend's revision check. Lookup is trial
//! decryption: O(n) in vault size with the full PBKDF2 cost per candidate.
//! That cost is the documented price of storing no plaintext index — the
//! entry list alone reveals nothing about the accounts on the device.
//!
//! PBKDF2 and RSA key generation run on `spawn_blocking`; each operation
//! is one awaitable unit and cancelling it (dropping the future) simply
//! discards the result, there are no side effects to unwind before the
//! final backend write.

use std::sync::Arc;

use tracing::{debug, info, warn};

use nj_crypto::kdf::KdfProfile;
use nj_crypto::keys::{AccountKeyPair, MODULUS_BITS};
use nj_crypto::padding;

use crate::backend::VaultBackend;
use crate::entry::VaultEntry;
use crate::error::VaultError;

/// Outcome of an import-merge, per candidate record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// New entries appended.
    pub added: usize,
    /// Structural duplicates of entries already present.
    pub ignored: usize,
    /// Records that failed the shape check.
    pub invalid: usize,
}

/// A successful credential match: the plaintext username, the account key
/// pair recovered from the entry, and the entry itself.
pub struct UnlockedEntry {
    pub username: String,
    pub keypair: AccountKeyPair,
    pub entry: VaultEntry,
}

/// The on-device list of password-protected account entries.
pub struct VaultStore {
    backend: Arc<dyn VaultBackend>,
    profile: KdfProfile,
    modulus_bits: usize,
}

impl VaultStore {
    pub fn new(backend: Arc<dyn VaultBackend>) -> Self {
        Self {
            backend,
            profile: KdfProfile::default(),
            modulus_bits: MODULUS_BITS,
        }
    }

    /// Override the KDF iteration counts (tests, future tuning).
    pub fn with_profile(mut self, profile: KdfProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Override the RSA modulus size (tests, constrained targets).
    pub fn with_modulus_bits(mut self, bits: usize) -> Self {
        self.modulus_bits = bits;
        self
    }

    // ── Basic list operations ─────────────────────────────────────────────

    pub async fn list(&self) -> Result<Vec<VaultEntry>, VaultError> {
        Ok(self.backend.load()?.entries)
    }

    pub async fn add(&self, entry: VaultEntry) -> Result<(), VaultError> {
        let snapshot = self.backend.load()?;
        let mut entries = snapshot.entries;
        entries.push(entry);
        self.backend.store(&entries, snapshot.revision)?;
        Ok(())
    }

    /// Remove one entry, addressed by structural signature.
    /// Returns whether anything was removed.
    pub async fn remove(&self, entry: &VaultEntry) -> Result<bool, VaultError> {
        let signature = entry.signature();
        let snapshot = self.backend.load()?;
        let mut entries = snapshot.entries;
        let before = entries.len();
        entries.retain(|e| e.signature() != signature);
        if entries.len() == before {
            return Ok(false);
        }
        self.backend.store(&entries, snapshot.revision)?;
        Ok(true)
    }

    /// Clear the entire list. Irreversible.
    pub async fn remove_all(&self) -> Result<(), VaultError> {
        let snapshot = self.backend.load()?;
        self.backend.store(&[], snapshot.revision)?;
        warn!(removed = snapshot.entries.len(), "vault cleared");
        Ok(())
    }

    // ── Account bootstrap ─────────────────────────────────────────────────

    /// Registration: generate the account key pair, seal a new entry under
    /// `password`, and append it. The heavy work runs off-thread.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(AccountKeyPair, VaultEntry), VaultError> {
        let username = username.to_string();
        let password = password.to_string();
        let profile = self.profile;
        let bits = self.modulus_bits;

        let (keypair, entry) = tokio::task::spawn_blocking(
            move || -> Result<(AccountKeyPair, VaultEntry), VaultError> {
                let keypair = AccountKeyPair::generate_with_bits(bits)?;
                let entry = VaultEntry::create(&username, &password, &keypair, profile)?;
                Ok((keypair, entry))
            },
        )
        .await
        .map_err(|e| VaultError::TaskJoin(e.to_string()))??;

        self.add(entry.clone()).await?;
        debug!("account registered");
        Ok((keypair, entry))
    }

    // ── Trial-decryption lookup ───────────────────────────────────────────

    /// Find the entry matching `username` + `password` by attempting
    /// decryption of every stored entry in turn.
    ///
    /// Wrong password and unknown username are the same `EntryNotFound`;
    /// the scan always visits every entry so the answer does not leak
    /// which stored ciphertext the input almost matched. Never retried
    /// automatically — the same wrong password cannot start matching.
    pub async fn find_by_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<UnlockedEntry, VaultError> {
        let entries = self.backend.load()?.entries;
        let username = username.to_string();
        let password = password.to_string();

        tokio::task::spawn_blocking(move || scan_entries(entries, &username, &password))
            .await
            .map_err(|e| VaultError::TaskJoin(e.to_string()))?
    }

    // ── Backup / restore ──────────────────────────────────────────────────

    /// Entries are already opaque ciphertext; export is verbatim.
    pub async fn export_all(&self) -> Result<Vec<VaultEntry>, VaultError> {
        self.list().await
    }

    pub async fn export_one(&self, signature: &str) -> Result<Option<VaultEntry>, VaultError> {
        Ok(self
            .backend
            .load()?
            .entries
            .into_iter()
            .find(|e| e.signature() == signature))
    }

    /// Merge backup records into the vault. Pure append: shape-invalid
    /// records are counted and skipped, structural duplicates ignored,
    /// nothing is ever overwritten or removed.
    pub async fn import_merge(
        &self,
        candidates: &[serde_json::Value],
    ) -> Result<ImportReport, VaultError> {
        let snapshot = self.backend.load()?;
        let mut entries = snapshot.entries;
        let mut seen: std::collections::HashSet<String> =
            entries.iter().map(VaultEntry::signature).collect();

        let mut report = ImportReport::default();
        for candidate in candidates {
            if !VaultEntry::is_valid_shape(candidate) {
                report.invalid += 1;
                continue;
            }
            let entry: VaultEntry = serde_json::from_value(candidate.clone())?;
            let signature = entry.signature();
            if seen.contains(&signature) {
                report.ignored += 1;
                continue;
            }
            seen.insert(signature);
            entries.push(entry);
            report.added += 1;
        }

        if report.added > 0 {
            self.backend.store(&entries, snapshot.revision)?;
        }
        info!(
            added = report.added,
            ignored = report.ignored,
            invalid = report.invalid,
            "vault import merged"
        );
        Ok(report)
    }

    // ── Password rotation ─────────────────────────────────────────────────

    /// Re-seal the matching entry under `new_password` with fresh salts
    /// and ivs, replacing the old entry in one backend write.
    pub async fn rotate_password(
        &self,
        username: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), VaultError> {
        let snapshot = self.backend.load()?;
        let entries = snapshot.entries.clone();
        let username_owned = username.to_string();
        let old = old_password.to_string();
        let new = new_password.to_string();
        let profile = self.profile;

        let (old_signature, new_entry) = tokio::task::spawn_blocking(
            move || -> Result<(String, VaultEntry), VaultError> {
                let unlocked = scan_entries(entries, &username_owned, &old)?;
                let new_entry =
                    VaultEntry::create(&unlocked.username, &new, &unlocked.keypair, profile)?;
                Ok((unlocked.entry.signature(), new_entry))
            },
        )
        .await
        .map_err(|e| VaultError::TaskJoin(e.to_string()))??;

        let mut entries = snapshot.entries;
        entries.retain(|e| e.signature() != old_signature);
        entries.push(new_entry);
        self.backend.store(&entries, snapshot.revision)?;
        debug!("vault entry password rotated");
        Ok(())
    }
}

/// The scan itself. Visits every entry even after a match; the first
/// matching entry wins. Entries that fail to decrypt, unpad, or parse are
/// simply not matches — a mixed-version vault must not abort the scan.
fn scan_entries(
    entries: Vec<VaultEntry>,
    username: &str,
    password: &str,
) -> Result<UnlockedEntry, VaultError> {
    let mut found: Option<UnlockedEntry> = None;
    for entry in entries {
        let Ok(padded) = entry.encrypted_username.open(password) else {
            continue;
        };
        let Ok(padded_str) = std::str::from_utf8(&padded) else {
            continue;
        };
        let Ok(name) = padding::unpad_username(padded_str) else {
            continue;
        };
        if found.is_some() || name != username {
            continue;
        }
        let Ok(private_b64) = entry.encrypted_private_key.open(password) else {
            continue;
        };
        let Ok(private_str) = std::str::from_utf8(&private_b64) else {
            continue;
        };
        let Ok(keypair) = AccountKeyPair::from_private_b64(private_str) else {
            continue;
        };
        found = Some(UnlockedEntry {
            username: name,
            keypair,
            entry,
        });
    }
    found.ok_or(VaultError::EntryNotFound)
}
