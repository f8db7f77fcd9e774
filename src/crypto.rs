// src/crypto.rs
// Minimal symmetric cipher gating ModelConfig.api_key storage at rest.
// Grounding for this module is manifest-level only — see DESIGN.md.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key};
use base64::Engine;

pub struct Cipher {
    cipher: Aes256Gcm,
}

impl Cipher {
    /// `key` is a base64-encoded 32-byte key (config `encryption.key` /
    /// `LLM_AGENT_ENCRYPTION_KEY`).
    pub fn from_base64_key(key: &str) -> anyhow::Result<Self> {
        let bytes = base64::engine::general_purpose::STANDARD.decode(key.trim())?;
        if bytes.len() != 32 {
            anyhow::bail!("encryption key must decode to 32 bytes, got {}", bytes.len());
        }
        let key = Key::<Aes256Gcm>::from_slice(&bytes);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    /// Encrypts `plaintext`, returning `base64(nonce || ciphertext)`.
    pub fn encrypt(&self, plaintext: &str) -> anyhow::Result<String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| anyhow::anyhow!("encryption failed: {e}"))?;

        let mut out = nonce.to_vec();
        out.extend_from_slice(&ciphertext);
        Ok(base64::engine::general_purpose::STANDARD.encode(out))
    }

    pub fn decrypt(&self, encoded: &str) -> anyhow::Result<String> {
        let bytes = base64::engine::general_purpose::STANDARD.decode(encoded.trim())?;
        if bytes.len() < 12 {
            anyhow::bail!("ciphertext too short");
        }
        let (nonce_bytes, ciphertext) = bytes.split_at(12);
        let nonce = aes_gcm::Nonce::from_slice(nonce_bytes);
        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| anyhow::anyhow!("decryption failed: {e}"))?;
        Ok(String::from_utf8(plaintext)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cipher() -> Cipher {
        let key = base64::engine::general_purpose::STANDARD.encode([7u8; 32]);
        Cipher::from_base64_key(&key).unwrap()
    }

    #[test]
    fn round_trips_plaintext() {
        let cipher = test_cipher();
        let ciphertext = cipher.encrypt("sk-super-secret").unwrap();
        assert_ne!(ciphertext, "sk-super-secret");
        assert_eq!(cipher.decrypt(&ciphertext).unwrap(), "sk-super-secret");
    }

    #[test]
    fn rejects_undersized_key() {
        let short = base64::engine::general_purpose::STANDARD.encode([1u8; 16]);
        assert!(Cipher::from_base64_key(&short).is_err());
    }
}
