//! nj_crypto — Nightjar client cryptographic primitives
//!
//! # Design principles
//! - NO custom crypto; all primitives come from audited Rust crates.
//! - Zeroize all secret material on drop.
//! - Durable formats are versioned and fail closed on anything unknown.
//!
//! # Module layout
//! - `kdf`      — PBKDF2-SHA256 password key derivation
//! - `aead`     — AES-256-GCM encrypt/decrypt helpers
//! - `envelope` — versioned password-based encryption envelope
//! - `padding`  — fixed-length username padding codec
//! - `keys`     — RSA-OAEP account key pair (generate / export / wrap)
//! - `error`    — unified error type

pub mod aead;
pub mod envelope;
pub mod error;
pub mod kdf;
pub mod keys;
pub mod padding;

pub use error::CryptoError;
