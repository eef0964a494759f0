//! API key generation and hashing
//!
//! Keys are random `tbl_`-prefixed hex strings. Only the SHA-256 digest of a
//! key is ever persisted; the plaintext is shown to the caller exactly once
//! at creation time.

use sha2::{Digest, Sha256};

/// Prefix identifying Tabula API keys
pub const KEY_PREFIX: &str = "tbl_";

/// Random bytes per key (48 hex chars once encoded)
const KEY_RANDOM_BYTES: usize = 24;

/// Generate a new API key
#[must_use]
pub fn generate_api_key() -> String {
    let mut rng = rand::thread_rng();
    let bytes: Vec<u8> = (0..KEY_RANDOM_BYTES).map(|_| rand::Rng::r#gen(&mut rng)).collect();
    format!("{KEY_PREFIX}{}", hex::encode(bytes))
}

/// Hex-encoded SHA-256 digest of a key, as stored in the database
#[must_use]
pub fn hash_api_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Constant-time byte comparison to prevent timing attacks
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
