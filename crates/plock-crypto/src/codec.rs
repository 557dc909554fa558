//! Binary ↔ text conversion tolerant of malformed padding.
//!
//! Envelopes travel to the storage collaborator as base64 text. Inputs come
//! back from URLs, copy-paste, and older clients, so the decoder accepts
//! missing padding and stray characters before giving up.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use plock_core::{PlockError, PlockResult};

/// Encodes bytes as standard-alphabet base64 with padding.
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decodes base64 text, normalizing malformed input on a second attempt.
///
/// First tries a strict decode. On failure, strips every character outside
/// the standard alphabet, re-pads to a multiple of four, and retries. Both
/// attempts failing is `MalformedEncoding`; valid data is never truncated.
pub fn decode(text: &str) -> PlockResult<Vec<u8>> {
    if let Ok(bytes) = STANDARD.decode(text) {
        return Ok(bytes);
    }

    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/'))
        .collect();
    if cleaned.is_empty() {
        // nothing salvageable; an empty result here would mask the garbage
        return Err(PlockError::MalformedEncoding);
    }
    let mut padded = cleaned;
    while padded.len() % 4 != 0 {
        padded.push('=');
    }

    STANDARD
        .decode(&padded)
        .map_err(|_| PlockError::MalformedEncoding)
}
