//! Encrypted message envelope — the durable interchange format.
//!
//! What the channel carries for one message, however many recipients it
//! has: one AES-256-GCM ciphertext plus the per-recipient wrapped content
//! keys. The JSON shape (`version`, `algorithm`, `iv`, `ciphertext`,
//! `keys`) must remain byte-for-byte stable across builds sharing the
//! same version tag; `keys` is a `BTreeMap` so serialization order is
//! deterministic.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Envelope version this build produces and accepts.
pub const MESSAGE_ENVELOPE_VERSION: u8 = 1;

/// Algorithm tag recorded in every v1 envelope.
pub const MESSAGE_ENVELOPE_ALGORITHM: &str = "AES-256-GCM + RSA-OAEP-SHA256";

/// On-wire envelope for one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    pub version: u8,
    /// Self-describing algorithm tag (informational; `version` governs).
    pub algorithm: String,
    /// 96-bit GCM iv, base64.
    pub iv: String,
    /// AES-256-GCM ciphertext + tag, base64.
    pub ciphertext: String,
    /// recipient id → RSA-OAEP-wrapped content key, base64.
    /// Exactly one entry per intended recipient, the sender included.
    pub keys: BTreeMap<String, String>,
}

impl MessageEnvelope {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_roundtrip_preserves_shape() {
        let mut keys = BTreeMap::new();
        keys.insert("alice".to_string(), "d2hhdGV2ZXI=".to_string());
        keys.insert("bob".to_string(), "c29tZXRoaW5n".to_string());
        let env = MessageEnvelope {
            version: MESSAGE_ENVELOPE_VERSION,
            algorithm: MESSAGE_ENVELOPE_ALGORITHM.to_string(),
            iv: "aXZpdml2aXZpdg==".to_string(),
            ciphertext: "Y3Q=".to_string(),
            keys,
        };
        let json = env.to_json().unwrap();
        assert_eq!(MessageEnvelope::from_json(&json).unwrap(), env);
        // Deterministic map order: alice before bob.
        assert!(json.find("alice").unwrap() < json.find("bob").unwrap());
    }

    #[test]
    fn shape_mismatch_fails_closed() {
        assert!(MessageEnvelope::from_json(r#"{"version":1}"#).is_err());
    }
}
