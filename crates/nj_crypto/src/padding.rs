//! Fixed-length username padding codec.
//!
//! Without padding, the ciphertext of an encrypted username leaks its
//! length (3–64 chars), letting an observer fingerprint accounts sharing
//! one device. Every username is therefore normalized to exactly 75
//! characters before encryption:
//!
//!   [ marker (2 chars) | length (4 hex digits) | username | random filler ]
//!
//! Filler is drawn from a fixed 90-symbol alphabet. `unpad_username`
//! validates the marker, the length field, and that the trailing filler is
//! drawn entirely from the alphabet — the last check keeps legacy
//! non-padded plaintext from being mistaken for a padded value.

use crate::error::CryptoError;

/// Total padded length in characters. Part of the durable format.
pub const PADDED_LEN: usize = 75;

/// 2-character marker opening every padded username.
pub const MARKER: &str = "nj";

const LEN_FIELD: usize = 4;

/// Longest username the format can carry.
pub const MAX_USERNAME_LEN: usize = PADDED_LEN - MARKER.len() - LEN_FIELD;

/// 90-symbol filler alphabet.
const FILLER_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!#$%&()*+,-./:;<=>?@[]^_{|}~";

/// Pad `username` to exactly [`PADDED_LEN`] characters.
pub fn pad_username(username: &str) -> Result<String, CryptoError> {
    let len = username.chars().count();
    if len > MAX_USERNAME_LEN {
        return Err(CryptoError::UsernameTooLong {
            len,
            max: MAX_USERNAME_LEN,
        });
    }

    let mut out = String::with_capacity(PADDED_LEN);
    out.push_str(MARKER);
    out.push_str(&format!("{len:04x}"));
    out.push_str(username);

    use rand::Rng;
    let mut rng = rand::rngs::OsRng;
    for _ in 0..(MAX_USERNAME_LEN - len) {
        let idx = rng.gen_range(0..FILLER_ALPHABET.len());
        out.push(FILLER_ALPHABET[idx] as char);
    }
    Ok(out)
}

/// Recover the username from a padded value.
///
/// Accepts only well-formed padded strings; anything else — wrong length,
/// missing marker, bad length field, out-of-bounds slice, filler outside
/// the alphabet — fails as `UnsupportedFormat`.
pub fn unpad_username(padded: &str) -> Result<String, CryptoError> {
    let chars: Vec<char> = padded.chars().collect();
    if chars.len() != PADDED_LEN {
        return Err(CryptoError::UnsupportedFormat(format!(
            "padded username must be {PADDED_LEN} chars, got {}",
            chars.len()
        )));
    }
    if !padded.starts_with(MARKER) {
        return Err(CryptoError::UnsupportedFormat(
            "padded username marker missing".into(),
        ));
    }

    let len_field: String = chars[MARKER.len()..MARKER.len() + LEN_FIELD].iter().collect();
    let len = usize::from_str_radix(&len_field, 16).map_err(|_| {
        CryptoError::UnsupportedFormat("padded username length field is not hex".into())
    })?;
    if len > MAX_USERNAME_LEN {
        return Err(CryptoError::UnsupportedFormat(format!(
            "padded username length {len} out of bounds"
        )));
    }

    let body_start = MARKER.len() + LEN_FIELD;
    let filler = &chars[body_start + len..];
    if !filler
        .iter()
        .all(|c| c.is_ascii() && FILLER_ALPHABET.contains(&(*c as u8)))
    {
        return Err(CryptoError::UnsupportedFormat(
            "padded username filler outside alphabet".into(),
        ));
    }

    Ok(chars[body_start..body_start + len].iter().collect())
}
