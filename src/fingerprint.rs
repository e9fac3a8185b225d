//! Content fingerprinting: a keyed content hash for exact-text identity and a
//! 64-bit SimHash for near-duplicate detection within a source.
use blake2::Blake2bMac512;
use blake2::digest::{KeyInit, Update, FixedOutput, consts::U8};

type Blake2b64 = Blake2bMac512<U8>;

const FINGERPRINT_KEY: &[u8] = b"trend-pipeline-content-fingerprint";

/// `content_hash(text) -> 64-bit`: BLAKE2b keyed and truncated to 8 bytes over
/// the UTF-8 bytes of the extracted plain text (§4.A).
#[must_use]
pub fn content_hash(text: &str) -> i64 {
    let mut hasher = Blake2b64::new_from_slice(FINGERPRINT_KEY).expect("key length fits digest");
    hasher.update(text.as_bytes());
    let digest = hasher.finalize_fixed();
    i64::from_be_bytes(digest.into())
}

/// Lowercase whitespace tokens, the resolved SimHash tokenisation contract
/// (§9, Open question — simhash tokenisation).
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// `simhash(text) -> 64-bit`: standard 64-bit SimHash over tokenised text.
///
/// Each token is hashed with XXH3, and each of its 64 bits votes +1/-1 into a
/// running per-bit accumulator; the final hash sets bit `i` when the
/// accumulator for bit `i` is positive. Stable across runs and independent of
/// token order.
#[must_use]
pub fn simhash(text: &str) -> i64 {
    let tokens = tokenize(text);
    if tokens.is_empty() {
        return 0;
    }

    let mut weights = [0i64; 64];
    for token in &tokens {
        let hash = xxhash_rust::xxh3::xxh3_64(token.as_bytes());
        for bit in 0..64 {
            if hash & (1 << bit) != 0 {
                weights[bit] += 1;
            } else {
                weights[bit] -= 1;
            }
        }
    }

    let mut result: u64 = 0;
    for bit in 0..64 {
        if weights[bit] > 0 {
            result |= 1 << bit;
        }
    }
    result as i64
}

/// `hamming(a, b) -> int`: popcount of XOR.
#[must_use]
pub fn hamming(a: i64, b: i64) -> u32 {
    (a ^ b).count_ones()
}

/// Two articles are near-duplicates within a source iff their SimHash values
/// are within Hamming distance 3 (§4.A).
pub const NEAR_DUPLICATE_HAMMING_THRESHOLD: u32 = 3;

#[must_use]
pub fn is_near_duplicate(a: i64, b: i64) -> bool {
    hamming(a, b) <= NEAR_DUPLICATE_HAMMING_THRESHOLD
}
