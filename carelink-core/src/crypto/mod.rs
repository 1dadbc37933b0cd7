// carelink-core/src/crypto/mod.rs

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::rngs::OsRng;
use rand_core::TryRngCore;
use std::sync::Arc;

use crate::Error;

/// A secret at rest: base64 ciphertext plus the base64 nonce it was
/// sealed with. The two land in separate columns; neither is useful
/// without the master key.
#[derive(Debug, Clone, PartialEq)]
pub struct EncryptedSecret {
    pub ciphertext: String,
    pub iv: String,
}

#[derive(Clone)]
pub struct Encryptor {
    cipher: Arc<Aes256Gcm>,
}

impl Encryptor {
    /// Creates a new `Encryptor` using a 32-byte key for AES-256.
    pub fn new(key_bytes: &[u8]) -> Result<Self, Error> {
        // AES-256-GCM requires a 256-bit (32 bytes) key.
        if key_bytes.len() != 32 {
            return Err(Error::KeyDerivation(format!(
                "AES-256 key must be 32 bytes, got {}",
                key_bytes.len()
            )));
        }
        let key = Key::<Aes256Gcm>::clone_from_slice(key_bytes);
        let cipher = Aes256Gcm::new(&key);

        Ok(Self {
            cipher: Arc::new(cipher),
        })
    }

    /// Encrypts `data` under a fresh random 12-byte nonce. The nonce is
    /// never reused for a given key; it travels alongside the ciphertext
    /// as the stored `iv`.
    pub fn encrypt(&self, data: &str) -> Result<EncryptedSecret, Error> {
        let mut nonce_bytes = [0u8; 12];
        let mut rng = OsRng;
        rng.try_fill_bytes(&mut nonce_bytes)
            .map_err(|e| Error::Encryption(e.to_string()))?;

        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, data.as_bytes())
            .map_err(|e| Error::Encryption(e.to_string()))?;

        Ok(EncryptedSecret {
            ciphertext: BASE64.encode(ciphertext),
            iv: BASE64.encode(nonce_bytes),
        })
    }

    /// Decrypts a stored (ciphertext, iv) pair back into a `String`.
    ///
    /// GCM authentication failure (tampered ciphertext or wrong key)
    /// surfaces as `Error::Decryption` and is fatal for that credential;
    /// it must never be swallowed or reported as "not connected".
    pub fn decrypt(&self, secret: &EncryptedSecret) -> Result<String, Error> {
        let nonce_bytes = BASE64
            .decode(&secret.iv)
            .map_err(|e| Error::Decryption(e.to_string()))?;
        if nonce_bytes.len() != 12 {
            return Err(Error::Decryption(format!(
                "Nonce must be 12 bytes, got {}",
                nonce_bytes.len()
            )));
        }
        let ciphertext = BASE64
            .decode(&secret.ciphertext)
            .map_err(|e| Error::Decryption(e.to_string()))?;

        let nonce = Nonce::from_slice(&nonce_bytes);

        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext.as_slice())
            .map_err(|e| Error::Decryption(e.to_string()))?;

        String::from_utf8(plaintext).map_err(|e| Error::Decryption(e.to_string()))
    }
}
