//! Plaintext message types (inside the encrypted envelope).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Deserialised plaintext carried inside a `MessageEnvelope` ciphertext.
///
/// Wire names are camelCase and part of the durable format. Optional
/// fields default to absent on decode rather than failing — older clients
/// produce payloads without them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    /// Message body.
    pub text: String,
    /// Sender-side timestamp.
    pub sent_at_iso: DateTime<Utc>,
    /// Message this one replies to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<String>,
    /// Set when the message was edited after sending.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at_iso: Option<DateTime<Utc>>,
}

impl MessagePayload {
    pub fn new(text: impl Into<String>, sent_at: DateTime<Utc>) -> Self {
        Self {
            text: text.into(),
            sent_at_iso: sent_at,
            reply_to_id: None,
            modified_at_iso: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_fields_default_on_decode() {
        let json = r#"{"text":"hi","sentAtIso":"2026-08-24T10:00:00Z"}"#;
        let payload: MessagePayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.text, "hi");
        assert!(payload.reply_to_id.is_none());
        assert!(payload.modified_at_iso.is_none());
    }

    #[test]
    fn wire_names_are_camel_case() {
        let payload = MessagePayload {
            text: "hi".into(),
            sent_at_iso: Utc::now(),
            reply_to_id: Some("m-1".into()),
            modified_at_iso: None,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("sentAtIso").is_some());
        assert!(json.get("replyToId").is_some());
        // Absent optionals are omitted, not nulled.
        assert!(json.get("modifiedAtIso").is_none());
    }
}
