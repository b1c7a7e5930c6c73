//! nj_vault — Nightjar local account vault and device session persistence
//!
//! The vault is the on-device list of password-protected account entries.
//! There is no plaintext username index: entries are discovered only by
//! trial decryption, so the list leaks nothing about who uses the device.
//!
//! # Module layout
//! - `entry`   — the portable v2 vault entry (two password envelopes)
//! - `backend` — injected persistence with an optimistic revision counter
//! - `store`   — vault operations (scan, merge, rotate, export)
//! - `session` — device-bound key + persisted session vault + lifecycle
//! - `error`   — unified error type

pub mod backend;
pub mod entry;
pub mod error;
pub mod session;
pub mod store;

pub use backend::{FileBackend, MemoryBackend, VaultBackend};
pub use entry::VaultEntry;
pub use error::VaultError;
pub use session::{DeviceSession, SessionHandle, SessionState, SessionVault};
pub use store::{ImportReport, UnlockedEntry, VaultStore};
