//! AES-256-GCM encryption for Lichess access tokens.
//!
//! The service this one replaces encrypted every token with AES-256-CBC under
//! a single static IV from the environment, so identical tokens produced
//! identical ciphertext across records. Here every encryption draws a fresh
//! random 96-bit nonce, stored next to the ciphertext, and GCM authenticates
//! the result. `ENCRYPTION_IV` is therefore no longer consulted when writing
//! records; see the config module for how a leftover value is handled.
//!
//! Ciphertext and nonce are hex-encoded for storage.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use anyhow::{anyhow, Context, Result};

/// Size of the encryption key in bytes (256 bits)
const KEY_SIZE: usize = 32;

/// Size of the nonce in bytes (96 bits, standard for GCM)
const NONCE_SIZE: usize = 12;

/// Validates that the master key is exactly 32 bytes when hex decoded.
///
/// # Arguments
/// * `key_hex` - Hex-encoded master key
///
/// # Returns
/// * `Ok(Vec<u8>)` - Decoded key bytes (32 bytes)
/// * `Err` - If key is invalid length or invalid hex
pub fn validate_key(key_hex: &str) -> Result<Vec<u8>> {
    let key_bytes = hex::decode(key_hex).context("Failed to decode hex encryption key")?;

    if key_bytes.len() != KEY_SIZE {
        return Err(anyhow!(
            "Encryption key must be {} bytes (256 bits), got {} bytes",
            KEY_SIZE,
            key_bytes.len()
        ));
    }

    Ok(key_bytes)
}

/// Encrypts plaintext using AES-256-GCM with a random nonce.
///
/// # Arguments
/// * `plaintext` - Data to encrypt (the access token)
/// * `key` - 32-byte encryption key
///
/// # Returns
/// * `Ok((ciphertext, nonce))` - Encrypted data and the nonce used (both hex-encoded)
/// * `Err` - If encryption fails
pub fn encrypt(plaintext: &str, key: &[u8]) -> Result<(String, String)> {
    if key.len() != KEY_SIZE {
        return Err(anyhow!("Encryption key must be {} bytes", KEY_SIZE));
    }

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| anyhow!("Failed to create cipher: {}", e))?;

    // Fresh nonce per record, never reused
    let nonce_bytes = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext_bytes = cipher
        .encrypt(&nonce_bytes, plaintext.as_bytes())
        .map_err(|e| anyhow!("Encryption failed: {}", e))?;

    Ok((hex::encode(ciphertext_bytes), hex::encode(nonce_bytes)))
}

/// Decrypts ciphertext using AES-256-GCM.
///
/// # Arguments
/// * `ciphertext` - Hex-encoded encrypted data
/// * `nonce` - Hex-encoded nonce (must match the one used during encryption)
/// * `key` - 32-byte encryption key (must match the one used during encryption)
///
/// # Returns
/// * `Ok(String)` - Decrypted plaintext
/// * `Err` - If decryption fails (wrong key, corrupted data, or tampered)
pub fn decrypt(ciphertext: &str, nonce: &str, key: &[u8]) -> Result<String> {
    if key.len() != KEY_SIZE {
        return Err(anyhow!("Encryption key must be {} bytes", KEY_SIZE));
    }

    let ciphertext_bytes = hex::decode(ciphertext).context("Failed to decode ciphertext")?;
    let nonce_bytes = hex::decode(nonce).context("Failed to decode nonce")?;

    if nonce_bytes.len() != NONCE_SIZE {
        return Err(anyhow!(
            "Invalid nonce size: expected {}, got {}",
            NONCE_SIZE,
            nonce_bytes.len()
        ));
    }

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| anyhow!("Failed to create cipher: {}", e))?;

    let nonce = Nonce::from_slice(&nonce_bytes);

    let plaintext_bytes = cipher
        .decrypt(nonce, ciphertext_bytes.as_ref())
        .map_err(|e| anyhow!("Decryption failed (wrong key or corrupted data): {}", e))?;

    String::from_utf8(plaintext_bytes).context("Decrypted data is not valid UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_validation() {
        // Valid 32-byte key (hex-encoded)
        let valid_key = hex::encode([0u8; 32]);
        assert!(validate_key(&valid_key).is_ok());

        // Too short
        let short_key = hex::encode([0u8; 16]);
        assert!(validate_key(&short_key).is_err());

        // Too long
        let long_key = hex::encode([0u8; 64]);
        assert!(validate_key(&long_key).is_err());

        // Invalid hex
        assert!(validate_key("not-valid-hex!@#$").is_err());
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = [0u8; 32];
        let plaintext = "lio_secret-access-token-12345";

        let (ciphertext, nonce) = encrypt(plaintext, &key).expect("Encryption failed");
        assert_ne!(ciphertext, plaintext);

        let decrypted = decrypt(&ciphertext, &nonce, &key).expect("Decryption failed");
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_output_is_hex() {
        let key = [0u8; 32];
        let (ciphertext, nonce) = encrypt("token", &key).unwrap();

        assert!(ciphertext.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(nonce.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(nonce.len(), NONCE_SIZE * 2);
    }

    #[test]
    fn test_different_nonces() {
        let key = [0u8; 32];
        let plaintext = "same-plaintext";

        let (ciphertext1, nonce1) = encrypt(plaintext, &key).unwrap();
        let (ciphertext2, nonce2) = encrypt(plaintext, &key).unwrap();

        // Nonces are random, so ciphertexts differ even for equal plaintext
        assert_ne!(nonce1, nonce2);
        assert_ne!(ciphertext1, ciphertext2);

        assert_eq!(decrypt(&ciphertext1, &nonce1, &key).unwrap(), plaintext);
        assert_eq!(decrypt(&ciphertext2, &nonce2, &key).unwrap(), plaintext);
    }

    #[test]
    fn test_wrong_key_fails() {
        let key1 = [0u8; 32];
        let key2 = [1u8; 32];

        let (ciphertext, nonce) = encrypt("secret", &key1).unwrap();
        assert!(decrypt(&ciphertext, &nonce, &key2).is_err());
    }

    #[test]
    fn test_wrong_nonce_fails() {
        let key = [0u8; 32];

        let (ciphertext, _) = encrypt("secret", &key).unwrap();
        let (_, wrong_nonce) = encrypt("other", &key).unwrap();

        assert!(decrypt(&ciphertext, &wrong_nonce, &key).is_err());
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let key = [0u8; 32];

        let (mut ciphertext, nonce) = encrypt("secret", &key).unwrap();

        // Flip one hex digit
        let first = ciphertext.remove(0);
        let flipped = if first == '0' { '1' } else { '0' };
        ciphertext.insert(0, flipped);

        assert!(decrypt(&ciphertext, &nonce, &key).is_err());
    }
}
