//! Encryption of users' extraction API keys at rest.
//!
//! Keys are sealed with AES-256-GCM under a key derived from the service `secret_key` with
//! SHA-256. The stored form is base64 of `nonce || ciphertext`. Only a masked hint of the key is
//! ever returned to clients.

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};
use base64::{Engine as _, engine::general_purpose};
use sha2::{Digest, Sha256};

const NONCE_LEN: usize = 12;
const HINT_SUFFIX_LEN: usize = 4;

fn cipher(secret_key: &str) -> Result<Aes256Gcm, anyhow::Error> {
    let key = Sha256::digest(secret_key.as_bytes());
    Aes256Gcm::new_from_slice(&key).map_err(|e| anyhow::anyhow!("Failed to create cipher: {}", e))
}

/// Encrypts `plaintext` and returns base64 of `nonce || ciphertext`.
pub fn encrypt_secret(secret_key: &str, plaintext: &str) -> Result<String, anyhow::Error> {
    let cipher = cipher(secret_key)?;
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext.as_bytes())
        .map_err(|e| anyhow::anyhow!("Encryption failed: {}", e))?;

    let mut result = nonce.to_vec();
    result.extend_from_slice(&ciphertext);

    Ok(general_purpose::STANDARD.encode(result))
}

/// Decrypts a value produced by [`encrypt_secret`] with the same `secret_key`.
pub fn decrypt_secret(secret_key: &str, encrypted_b64: &str) -> Result<String, anyhow::Error> {
    let cipher = cipher(secret_key)?;

    let encrypted_data = general_purpose::STANDARD
        .decode(encrypted_b64)
        .map_err(|e| anyhow::anyhow!("Failed to decode encrypted data: {}", e))?;

    if encrypted_data.len() < NONCE_LEN {
        return Err(anyhow::anyhow!("Encrypted data too short"));
    }

    let (nonce_bytes, ciphertext) = encrypted_data.split_at(NONCE_LEN);
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|e| anyhow::anyhow!("Decryption failed: {}", e))?;

    String::from_utf8(plaintext).map_err(|e| anyhow::anyhow!("Decrypted value is not UTF-8: {}", e))
}

/// Masked form of an API key that is safe to show back to its owner, e.g. `sk-...9xQz`.
pub fn mask_api_key(api_key: &str) -> String {
    let chars: Vec<char> = api_key.trim().chars().collect();
    if chars.len() <= HINT_SUFFIX_LEN * 2 {
        return "****".to_string();
    }
    let suffix: String = chars[chars.len() - HINT_SUFFIX_LEN..].iter().collect();
    let prefix = if api_key.starts_with("sk-") { "sk-" } else { "" };
    format!("{prefix}...{suffix}")
}
