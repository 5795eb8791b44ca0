//! Secret and token primitives: fast token hashing, HMAC signing,
//! cryptographically random code generation, and authenticated encryption.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::engine::{general_purpose::STANDARD, Engine};
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, Rng, RngCore};
use sha2::{Digest, Sha256};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("decryption failed")]
    Decryption,

    #[error("malformed ciphertext")]
    MalformedCiphertext,
}

/// Hash a high-entropy token for storage.
///
/// Tokens are random, so a fast one-way hash is sufficient; the adaptive
/// hash is reserved for passwords.
pub fn hash_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

/// HMAC-SHA256 signature over an arbitrary payload, hex-encoded.
pub fn hmac_sign(secret: &[u8], payload: &[u8]) -> Result<String, CryptoError> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Generate a random token of `len` bytes, hex-encoded.
pub fn generate_token(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Generate a random numeric one-time code of `len` digits.
pub fn generate_otp(len: usize) -> String {
    let mut rng = OsRng;
    (0..len).map(|_| rng.gen_range(0..10).to_string()).collect()
}

/// Generate a random short code of `len` uppercase alphanumeric characters.
pub fn generate_short_code(len: usize) -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
    let mut rng = OsRng;
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

fn cipher_from_hex_key(key_hex: &str) -> Result<Aes256Gcm, CryptoError> {
    let key_bytes = hex::decode(key_hex)
        .map_err(|e| CryptoError::InvalidKey(format!("key is not valid hex: {}", e)))?;
    if key_bytes.len() != 32 {
        return Err(CryptoError::InvalidKey(format!(
            "key must be 32 bytes (256 bits), got {}",
            key_bytes.len()
        )));
    }
    let key = aes_gcm::Key::<Aes256Gcm>::from_slice(&key_bytes);
    Ok(Aes256Gcm::new(key))
}

/// Encrypt with AES-256-GCM under a hex-encoded 256-bit key.
///
/// Output is base64 of `nonce (12 bytes) || ciphertext || tag`; the nonce is
/// random per call.
pub fn encrypt(key_hex: &str, plaintext: &str) -> Result<String, CryptoError> {
    let cipher = cipher_from_hex_key(key_hex)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(STANDARD.encode(out))
}

/// Decrypt a value produced by [`encrypt`]. Fails closed on tag mismatch.
pub fn decrypt(key_hex: &str, encoded: &str) -> Result<String, CryptoError> {
    let cipher = cipher_from_hex_key(key_hex)?;

    let data = STANDARD
        .decode(encoded)
        .map_err(|_| CryptoError::MalformedCiphertext)?;
    if data.len() < NONCE_LEN {
        return Err(CryptoError::MalformedCiphertext);
    }

    let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
    let nonce = Nonce::from_slice(nonce_bytes);

    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CryptoError::Decryption)?;

    String::from_utf8(plaintext).map_err(|_| CryptoError::Decryption)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &str = "0f1e2d3c4b5a69788796a5b4c3d2e1f00f1e2d3c4b5a69788796a5b4c3d2e1f0";

    #[test]
    fn test_hash_token_deterministic() {
        let a = hash_token("some-token");
        let b = hash_token("some-token");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, hash_token("other-token"));
    }

    #[test]
    fn test_generate_token_length_and_uniqueness() {
        let t1 = generate_token(32);
        let t2 = generate_token(32);
        assert_eq!(t1.len(), 64);
        assert_ne!(t1, t2);
    }

    #[test]
    fn test_generate_otp_digits_only() {
        let otp = generate_otp(6);
        assert_eq!(otp.len(), 6);
        assert!(otp.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_generate_short_code() {
        let code = generate_short_code(8);
        assert_eq!(code.len(), 8);
        assert!(code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_encrypt_decrypt_round_trip() {
        let encrypted = encrypt(TEST_KEY, "sensitive value").unwrap();
        assert_ne!(encrypted, "sensitive value");
        let decrypted = decrypt(TEST_KEY, &encrypted).unwrap();
        assert_eq!(decrypted, "sensitive value");
    }

    #[test]
    fn test_encrypt_nonce_varies() {
        let a = encrypt(TEST_KEY, "same input").unwrap();
        let b = encrypt(TEST_KEY, "same input").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_decrypt_rejects_tampering() {
        let encrypted = encrypt(TEST_KEY, "payload").unwrap();
        let mut data = STANDARD.decode(&encrypted).unwrap();
        let last = data.len() - 1;
        data[last] ^= 0x01;
        let tampered = STANDARD.encode(data);

        assert!(matches!(
            decrypt(TEST_KEY, &tampered),
            Err(CryptoError::Decryption)
        ));
    }

    #[test]
    fn test_non_hex_key_fails_closed() {
        assert!(matches!(
            encrypt("not-a-hex-key", "payload"),
            Err(CryptoError::InvalidKey(_))
        ));
        assert!(matches!(
            decrypt("abcd", "whatever"),
            Err(CryptoError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_hmac_sign_is_stable_per_key() {
        let sig1 = hmac_sign(b"secret-key", b"payload").unwrap();
        let sig2 = hmac_sign(b"secret-key", b"payload").unwrap();
        let sig3 = hmac_sign(b"other-key", b"payload").unwrap();
        assert_eq!(sig1, sig2);
        assert_ne!(sig1, sig3);
    }
}
