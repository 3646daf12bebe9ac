//! Salted password hashing.
//!
//! Passwords are stored as hex-encoded `SHA-256(salt || password)` with a
//! per-user 16-byte random salt.

use rand::RngCore;
use sha2::{Digest, Sha256};

/// Hashes a password with a fresh random salt.
///
/// Returns `(hash_hex, salt_hex)`.
pub fn hash_password(password: &str) -> (String, String) {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    let salt_hex = hex_encode(&salt);
    (digest_hex(&salt, password), salt_hex)
}

/// Verifies a password against a stored hash and salt.
pub fn verify_password(password: &str, hash_hex: &str, salt_hex: &str) -> bool {
    let Some(salt) = hex_decode(salt_hex) else {
        return false;
    };
    digest_hex(&salt, password) == hash_hex
}

fn digest_hex(salt: &[u8], password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

fn hex_decode(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify() {
        let (hash, salt) = hash_password("opening-night");
        assert!(verify_password("opening-night", &hash, &salt));
        assert!(!verify_password("closing-night", &hash, &salt));
    }

    #[test]
    fn salts_differ_between_hashes() {
        let (hash_a, salt_a) = hash_password("same");
        let (hash_b, salt_b) = hash_password("same");
        assert_ne!(salt_a, salt_b);
        assert_ne!(hash_a, hash_b);
    }

    #[test]
    fn bad_salt_never_verifies() {
        let (hash, _) = hash_password("x");
        assert!(!verify_password("x", &hash, "not-hex"));
    }
}
