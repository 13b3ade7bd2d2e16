//! Cryptographic helpers for request ids, API key digests and nonces.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Computes SHA-256 hash of the input and returns it as a hex string.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Computes HMAC-SHA256 of `message` keyed by `secret`, hex encoded.
pub fn hmac_sha256_hex(secret: &[u8], message: &str) -> String {
    // HMAC accepts keys of any length.
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Verifies a hex encoded HMAC-SHA256 tag in constant time.
pub fn verify_hmac_sha256_hex(secret: &[u8], message: &str, tag_hex: &str) -> bool {
    let Ok(tag) = hex::decode(tag_hex) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(message.as_bytes());
    mac.verify_slice(&tag).is_ok()
}

/// Extracts the prefix from an API key (first 8 characters after "ee_").
pub fn extract_key_prefix(key: &str) -> Option<&str> {
    if key.starts_with("ee_") && key.len() >= 11 {
        key.get(3..11)
    } else {
        None
    }
}
