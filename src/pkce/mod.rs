//! PKCE (RFC 7636) verifier and challenge generation.
//!
//! The verifier stays server-side in the pending session; the S256 challenge
//! is sent in the authorization URL so Lichess can verify that the eventual
//! token exchange comes from the party that initiated the flow.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Number of random bytes behind a code verifier.
const VERIFIER_BYTES: usize = 32;

/// Generate a cryptographically random code verifier.
///
/// 32 random bytes encoded as URL-safe base64 without padding, giving
/// 43 characters (RFC 7636 allows 43-128).
pub fn generate_verifier() -> String {
    let mut bytes = [0u8; VERIFIER_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Compute the S256 code challenge for a verifier.
///
/// `challenge = BASE64URL(SHA256(verifier))`. Deterministic: the same
/// verifier always produces the same challenge.
pub fn compute_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_url_safe(value: &str) {
        assert!(
            value
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'),
            "expected URL-safe base64 without padding: {value}"
        );
    }

    #[test]
    fn test_verifier_is_url_safe_base64() {
        let verifier = generate_verifier();
        // 32 bytes -> 43 base64url chars, no padding
        assert_eq!(verifier.len(), 43);
        assert_url_safe(&verifier);
    }

    #[test]
    fn test_verifiers_are_unique() {
        let a = generate_verifier();
        let b = generate_verifier();
        assert_ne!(a, b);
    }

    #[test]
    fn test_challenge_is_deterministic() {
        let c1 = compute_challenge("test-verifier-value");
        let c2 = compute_challenge("test-verifier-value");
        assert_eq!(c1, c2);
    }

    #[test]
    fn test_challenge_is_url_safe_base64() {
        let challenge = compute_challenge("test-verifier");
        // SHA-256 produces 32 bytes -> 43 base64url chars
        assert_eq!(challenge.len(), 43);
        assert_url_safe(&challenge);
    }

    #[test]
    fn test_challenge_matches_known_value() {
        // SHA256("hello") = 2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824
        let challenge = compute_challenge("hello");
        assert_eq!(challenge, "LPJNul-wow4m6DsqxbninhsWHlwfp0JecwQzYpOLmCQ");
    }

    #[test]
    fn test_challenge_decodes_to_sha256_digest() {
        let verifier = generate_verifier();
        let challenge = compute_challenge(&verifier);

        let decoded = URL_SAFE_NO_PAD.decode(&challenge).expect("valid base64url");
        assert_eq!(decoded.len(), 32);
    }
}
