//! nj_proto — Nightjar message envelope format and hybrid encryption
//!
//! # Module layout
//! - `message`  — plaintext payload types (inside the encrypted envelope)
//! - `envelope` — the durable `MessageEnvelope` interchange shape
//! - `seal`     — hybrid one-to-many encrypt / decrypt

pub mod envelope;
pub mod message;
pub mod seal;

pub use envelope::MessageEnvelope;
pub use message::MessagePayload;
