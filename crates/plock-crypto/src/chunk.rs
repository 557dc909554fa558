//! Chunked AES-256-GCM: payloads of any size under a single key
//!
//! One random 12-byte base nonce is drawn per encryption; chunk `i` is
//! sealed under the base nonce with its last 4 bytes XOR'd with the
//! big-endian chunk index. For a fixed base nonce all chunk nonces are
//! pairwise distinct while the chunk count stays below 2^32.
//!
//! Sealed chunks are concatenated with no length prefixes; the reader
//! recovers the boundaries from the same fixed chunk size used at write
//! time (`chunk_size + 16` per sealed chunk, last one shorter). Payloads
//! that fit in one chunk skip the index bookkeeping entirely and are sealed
//! directly under the base nonce.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use plock_core::{PhaseRange, PlockError, PlockResult, ProgressReporter};
use rand::RngCore;

use crate::envelope::{Envelope, FORMAT_VERSION};
use crate::keys::ContentKey;
use crate::{NONCE_SIZE, SALT_SIZE, TAG_SIZE};

/// Chunk nonce = base nonce with BE32(index) XOR'd into the last 4 bytes.
///
/// This schedule must be identical on the encrypt and decrypt side; it is a
/// wire-compatibility requirement, not a tunable.
pub fn derive_chunk_nonce(base: &[u8; NONCE_SIZE], index: u32) -> [u8; NONCE_SIZE] {
    let mut nonce = *base;
    let idx = index.to_be_bytes();
    for i in 0..4 {
        nonce[NONCE_SIZE - 4 + i] ^= idx[i];
    }
    nonce
}

/// Encrypts a payload of any size, drawing a fresh random base nonce.
///
/// Per-chunk progress is scaled into the caller-assigned `phase` sub-range.
pub fn encrypt_chunked(
    key: &ContentKey,
    plaintext: &[u8],
    chunk_size: usize,
    salt: Option<[u8; SALT_SIZE]>,
    reporter: &ProgressReporter,
    phase: PhaseRange,
) -> PlockResult<Envelope> {
    let mut base_nonce = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut base_nonce);
    encrypt_with_base_nonce(key, plaintext, chunk_size, base_nonce, salt, reporter, phase)
}

/// Deterministic inner encrypt used by the equivalence tests. Callers must
/// never reuse a base nonce under the same key; go through
/// [`encrypt_chunked`].
pub(crate) fn encrypt_with_base_nonce(
    key: &ContentKey,
    plaintext: &[u8],
    chunk_size: usize,
    base_nonce: [u8; NONCE_SIZE],
    salt: Option<[u8; SALT_SIZE]>,
    reporter: &ProgressReporter,
    phase: PhaseRange,
) -> PlockResult<Envelope> {
    if chunk_size == 0 {
        return Err(PlockError::Encryption("chunk size must be non-zero".into()));
    }
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    let ciphertext = if plaintext.len() <= chunk_size {
        // Common small-payload path: one seal under the base nonce itself.
        let sealed = cipher
            .encrypt(Nonce::from_slice(&base_nonce), plaintext)
            .map_err(|e| PlockError::Encryption(format!("seal failed: {e}")))?;
        reporter.emit_scaled(phase, 100);
        sealed
    } else {
        let chunk_count = plaintext.len().div_ceil(chunk_size);
        if chunk_count > u32::MAX as usize {
            return Err(PlockError::Encryption(
                "payload exceeds the 2^32 chunk limit".into(),
            ));
        }

        let mut out = Vec::with_capacity(plaintext.len() + chunk_count * TAG_SIZE);
        for (i, chunk) in plaintext.chunks(chunk_size).enumerate() {
            let nonce = derive_chunk_nonce(&base_nonce, i as u32);
            let sealed = cipher
                .encrypt(Nonce::from_slice(&nonce), chunk)
                .map_err(|e| PlockError::Encryption(format!("seal failed: {e}")))?;
            out.extend_from_slice(&sealed);
            reporter.emit_scaled(phase, (((i + 1) * 100) / chunk_count) as u8);
        }
        out
    };

    Ok(Envelope {
        version: FORMAT_VERSION,
        base_nonce,
        salt,
        ciphertext,
    })
}

/// Decrypts a chunked envelope, returning the complete plaintext or nothing.
///
/// Any chunk failing to authenticate surfaces as the generic
/// `DecryptionFailed` without revealing which chunk it was. Plaintext is
/// only assembled after every chunk opens (atomicity: partial output is
/// never exposed).
pub fn decrypt_chunked(
    key: &ContentKey,
    envelope: &Envelope,
    chunk_size: usize,
    reporter: &ProgressReporter,
    phase: PhaseRange,
) -> PlockResult<Vec<u8>> {
    if chunk_size == 0 {
        return Err(PlockError::DecryptionFailed);
    }
    let cipher = Aes256Gcm::new(key.as_bytes().into());
    let ct = &envelope.ciphertext;

    // Single unsplit ciphertext: the write side never splits payloads that
    // fit one chunk, so the boundary test is exact, never ambiguous.
    if ct.len() <= chunk_size + TAG_SIZE {
        let plaintext = cipher
            .decrypt(Nonce::from_slice(&envelope.base_nonce), ct.as_slice())
            .map_err(|_| PlockError::DecryptionFailed)?;
        reporter.emit_scaled(phase, 100);
        return Ok(plaintext);
    }

    let sealed_size = chunk_size + TAG_SIZE;
    let chunk_count = ct.len().div_ceil(sealed_size);
    if chunk_count > u32::MAX as usize {
        return Err(PlockError::DecryptionFailed);
    }

    let mut out = Vec::with_capacity(ct.len().saturating_sub(chunk_count * TAG_SIZE));
    for (i, sealed) in ct.chunks(sealed_size).enumerate() {
        let nonce = derive_chunk_nonce(&envelope.base_nonce, i as u32);
        let plaintext = cipher
            .decrypt(Nonce::from_slice(&nonce), sealed)
            .map_err(|_| PlockError::DecryptionFailed)?;
        out.extend_from_slice(&plaintext);
        reporter.emit_scaled(phase, (((i + 1) * 100) / chunk_count) as u8);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::generate_key;
    use plock_core::Operation;
    use proptest::prelude::*;

    const CHUNK: usize = 64;
    const FULL: PhaseRange = PhaseRange::new(0, 100);

    fn quiet() -> ProgressReporter {
        ProgressReporter::disabled(Operation::Encrypt)
    }

    fn roundtrip(plaintext: &[u8]) -> Vec<u8> {
        let key = generate_key();
        let env = encrypt_chunked(&key, plaintext, CHUNK, None, &quiet(), FULL).unwrap();
        decrypt_chunked(&key, &env, CHUNK, &quiet(), FULL).unwrap()
    }

    #[test]
    fn test_roundtrip_small() {
        assert_eq!(roundtrip(b"hello, sealed world"), b"hello, sealed world");
    }

    #[test]
    fn test_roundtrip_empty() {
        assert_eq!(roundtrip(b""), b"");
    }

    #[test]
    fn test_empty_ciphertext_is_tag_only() {
        let key = generate_key();
        let env = encrypt_chunked(&key, b"", CHUNK, None, &quiet(), FULL).unwrap();
        assert_eq!(env.ciphertext.len(), TAG_SIZE);
    }

    #[test]
    fn test_roundtrip_multi_chunk() {
        let plaintext = vec![0x42u8; CHUNK * 10 + 7];
        assert_eq!(roundtrip(&plaintext), plaintext);
    }

    #[test]
    fn test_exact_boundary_has_no_trailing_empty_chunk() {
        let key = generate_key();
        let plaintext = vec![7u8; CHUNK * 3];
        let env = encrypt_chunked(&key, &plaintext, CHUNK, None, &quiet(), FULL).unwrap();
        // 3 sealed chunks, not 4
        assert_eq!(env.ciphertext.len(), CHUNK * 3 + 3 * TAG_SIZE);
        assert_eq!(
            decrypt_chunked(&key, &env, CHUNK, &quiet(), FULL).unwrap(),
            plaintext
        );
    }

    #[test]
    fn test_single_chunk_boundary_stays_unsplit() {
        let key = generate_key();
        let plaintext = vec![7u8; CHUNK];
        let env = encrypt_chunked(&key, &plaintext, CHUNK, None, &quiet(), FULL).unwrap();
        assert_eq!(env.ciphertext.len(), CHUNK + TAG_SIZE);
    }

    #[test]
    fn test_chunk_nonces_pairwise_distinct() {
        let base = [0xA5u8; NONCE_SIZE];
        let mut seen = std::collections::HashSet::new();
        for i in 0..1000u32 {
            assert!(seen.insert(derive_chunk_nonce(&base, i)));
        }
    }

    #[test]
    fn test_chunk_nonce_zero_is_base() {
        let base = [0x11u8; NONCE_SIZE];
        assert_eq!(derive_chunk_nonce(&base, 0), base);
    }

    #[test]
    fn test_chunk_nonce_touches_only_last_four_bytes() {
        let base = [0u8; NONCE_SIZE];
        let nonce = derive_chunk_nonce(&base, 0xDEAD_BEEF);
        assert_eq!(&nonce[..NONCE_SIZE - 4], &[0u8; NONCE_SIZE - 4]);
        assert_eq!(&nonce[NONCE_SIZE - 4..], &0xDEAD_BEEFu32.to_be_bytes());
    }

    #[test]
    fn test_decrypt_wrong_key() {
        let k1 = generate_key();
        let k2 = generate_key();
        let env = encrypt_chunked(&k1, b"secret data", CHUNK, None, &quiet(), FULL).unwrap();
        assert!(matches!(
            decrypt_chunked(&k2, &env, CHUNK, &quiet(), FULL),
            Err(PlockError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_tampered_chunk_fails_generically() {
        let key = generate_key();
        let plaintext = vec![1u8; CHUNK * 4];
        let mut env = encrypt_chunked(&key, &plaintext, CHUNK, None, &quiet(), FULL).unwrap();
        // flip one bit in the third sealed chunk
        let offset = 2 * (CHUNK + TAG_SIZE) + 5;
        env.ciphertext[offset] ^= 0x01;
        assert!(matches!(
            decrypt_chunked(&key, &env, CHUNK, &quiet(), FULL),
            Err(PlockError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_fixed_base_nonce_is_deterministic() {
        let key = generate_key();
        let base = [3u8; NONCE_SIZE];
        let plaintext = vec![9u8; CHUNK * 2 + 1];
        let a =
            encrypt_with_base_nonce(&key, &plaintext, CHUNK, base, None, &quiet(), FULL).unwrap();
        let b =
            encrypt_with_base_nonce(&key, &plaintext, CHUNK, base, None, &quiet(), FULL).unwrap();
        assert_eq!(a.to_bytes(), b.to_bytes());
    }

    #[test]
    fn test_fresh_base_nonces_differ() {
        let key = generate_key();
        let a = encrypt_chunked(&key, b"x", CHUNK, None, &quiet(), FULL).unwrap();
        let b = encrypt_chunked(&key, b"x", CHUNK, None, &quiet(), FULL).unwrap();
        assert_ne!(a.base_nonce, b.base_nonce, "base nonce must be fresh");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_roundtrip(plaintext in proptest::collection::vec(any::<u8>(), 0..CHUNK * 12)) {
            prop_assert_eq!(roundtrip(&plaintext), plaintext);
        }
    }
}
