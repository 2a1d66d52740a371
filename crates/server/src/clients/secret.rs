//! Client secret hashing. Secrets are high-entropy, so a plain SHA-256 digest
//! is stored rather than a password hash.

use base64::Engine;
use sha2::{Digest, Sha256};

pub fn hash_secret(secret: &str) -> String {
    let digest = Sha256::digest(secret.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(digest)
}

/// True when `presented` hashes to any of the stored values.
pub fn verify_secret(presented: &str, stored_hashes: &[String]) -> bool {
    let candidate = hash_secret(presented);
    stored_hashes
        .iter()
        .fold(false, |found, stored| found | constant_time_eq(stored, &candidate))
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    a.len() == b.len()
        && a
            .bytes()
            .zip(b.bytes())
            .fold(0u8, |diff, (x, y)| diff | (x ^ y))
            == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_digest() {
        // sha256("secret")
        assert_eq!(
            hash_secret("secret"),
            "K7gNU3sdo+OL0wNhqoVWhr3g6s1xYv72ol/pe/Unols="
        );
    }

    #[test]
    fn verify_against_any_stored_hash() {
        let stored = vec![hash_secret("old"), hash_secret("new")];
        assert!(verify_secret("new", &stored));
        assert!(verify_secret("old", &stored));
        assert!(!verify_secret("other", &stored));
        assert!(!verify_secret("new", &[]));
    }
}
