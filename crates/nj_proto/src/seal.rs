//! Hybrid one-to-many message encryption.
//!
//! One fresh AES-256 content key per message, one symmetric encryption of
//! the body regardless of recipient count, one RSA-OAEP wrap of the raw
//! content key per recipient. Group messages never re-encrypt the body per
//! member; cost is O(recipients) asymmetric operations only.
//!
//! The sender must appear in the recipient list so it can re-read its own
//! sent history; the caller owns that invariant.

use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use std::collections::BTreeMap;

use nj_crypto::aead;
use nj_crypto::error::CryptoError;
use nj_crypto::keys::{AccountKeyPair, PublicKeyMaterial};

use crate::envelope::{MessageEnvelope, MESSAGE_ENVELOPE_ALGORITHM, MESSAGE_ENVELOPE_VERSION};
use crate::message::MessagePayload;

/// One intended reader of a message.
#[derive(Debug, Clone)]
pub struct Recipient {
    pub id: String,
    pub public_key: PublicKeyMaterial,
}

/// Encrypt `payload` once and wrap the content key for every recipient.
///
/// The content key is generated fresh per call, zeroized on return, and
/// never reused across two messages.
pub fn encrypt_for_recipients(
    payload: &MessagePayload,
    recipients: &[Recipient],
) -> Result<MessageEnvelope, CryptoError> {
    if recipients.is_empty() {
        return Err(CryptoError::InvalidKey(
            "a message envelope needs at least one recipient".into(),
        ));
    }

    let plaintext = serde_json::to_vec(payload)?;
    let content_key = aead::generate_key();
    let (iv, ciphertext) = aead::encrypt_detached(&content_key, &plaintext)?;

    let mut keys = BTreeMap::new();
    for recipient in recipients {
        let wrapped = recipient.public_key.wrap_content_key(&content_key)?;
        keys.insert(recipient.id.clone(), B64.encode(wrapped));
    }

    Ok(MessageEnvelope {
        version: MESSAGE_ENVELOPE_VERSION,
        algorithm: MESSAGE_ENVELOPE_ALGORITHM.to_string(),
        iv: B64.encode(iv),
        ciphertext: B64.encode(ciphertext),
        keys,
    })
}

/// Decrypt an envelope as recipient `my_id`.
///
/// `NoKeyForRecipient` means "not addressed to this identity", not
/// corruption. Structural damage — bad base64, failed unwrap, AEAD tag
/// mismatch, unparseable payload — is `CorruptBlob`.
pub fn decrypt_as_recipient(
    envelope: &MessageEnvelope,
    my_id: &str,
    my_key: &AccountKeyPair,
) -> Result<MessagePayload, CryptoError> {
    if envelope.version != MESSAGE_ENVELOPE_VERSION {
        return Err(CryptoError::UnsupportedFormat(format!(
            "message envelope version {}",
            envelope.version
        )));
    }

    let wrapped_b64 = envelope.keys.get(my_id).ok_or(CryptoError::NoKeyForRecipient)?;
    let wrapped = B64
        .decode(wrapped_b64)
        .map_err(|_| CryptoError::CorruptBlob("wrapped key is not valid base64".into()))?;
    let iv = B64
        .decode(&envelope.iv)
        .map_err(|_| CryptoError::CorruptBlob("iv is not valid base64".into()))?;
    let ciphertext = B64
        .decode(&envelope.ciphertext)
        .map_err(|_| CryptoError::CorruptBlob("ciphertext is not valid base64".into()))?;

    let content_key = my_key.unwrap_content_key(&wrapped)?;
    let plaintext = aead::decrypt_detached(&content_key, &iv, &ciphertext)
        .map_err(|_| CryptoError::CorruptBlob("message body failed authentication".into()))?;

    serde_json::from_slice(&plaintext)
        .map_err(|_| CryptoError::CorruptBlob("message payload is not valid JSON".into()))
}
