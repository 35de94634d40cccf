//! AES-256-GCM sealing of secret values.
//!
//! Mirrors `wallet_serde.rs::EncryptedWallet` and `auth_crypto.rs`'s
//! `encrypt_aes_gcm`/`decrypt_aes_gcm`: one key size, one nonce size, a fresh
//! random nonce per call, ciphertext and tag kept together as `aes-gcm`
//! already concatenates them.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{CoreError, CoreResult};

pub const AEAD_KEY_SIZE: usize = 32;
pub const AEAD_NONCE_SIZE: usize = 12;

/// The raw 256-bit master key. Zeroized on drop so a dropped `MasterKey`
/// never lingers in a stack frame or heap allocation.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey([u8; AEAD_KEY_SIZE]);

impl MasterKey {
    pub fn generate() -> Self {
        let mut bytes = [0u8; AEAD_KEY_SIZE];
        OsRng.fill_bytes(&mut bytes);
        MasterKey(bytes)
    }

    pub fn from_bytes(bytes: [u8; AEAD_KEY_SIZE]) -> Self {
        MasterKey(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; AEAD_KEY_SIZE] {
        &self.0
    }
}

/// A sealed value as it is written to disk: base64 nonce and ciphertext, the
/// shape `secrets.json` and `rotation` snapshots both use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedValue {
    pub nonce: String,
    pub ciphertext: String,
}

impl EncryptedValue {
    pub fn to_bytes(&self) -> CoreResult<(Vec<u8>, Vec<u8>)> {
        let nonce = BASE64
            .decode(&self.nonce)
            .map_err(|e| CoreError::Crypto(format!("invalid nonce encoding: {e}")))?;
        let ciphertext = BASE64
            .decode(&self.ciphertext)
            .map_err(|e| CoreError::Crypto(format!("invalid ciphertext encoding: {e}")))?;
        if nonce.len() != AEAD_NONCE_SIZE {
            return Err(CoreError::Crypto(format!(
                "nonce has wrong length: expected {AEAD_NONCE_SIZE}, got {}",
                nonce.len()
            )));
        }
        Ok((nonce, ciphertext))
    }
}

pub fn encrypt(key: &MasterKey, plaintext: &[u8]) -> CoreResult<EncryptedValue> {
    let cipher_key = Key::<Aes256Gcm>::from_slice(key.as_bytes());
    let cipher = Aes256Gcm::new(cipher_key);

    let mut nonce_bytes = [0u8; AEAD_NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| CoreError::Crypto(format!("encryption failed: {e}")))?;

    Ok(EncryptedValue {
        nonce: BASE64.encode(nonce_bytes),
        ciphertext: BASE64.encode(ciphertext),
    })
}

pub fn decrypt(key: &MasterKey, value: &EncryptedValue) -> CoreResult<Vec<u8>> {
    let (nonce_bytes, ciphertext) = value.to_bytes()?;
    let cipher_key = Key::<Aes256Gcm>::from_slice(key.as_bytes());
    let cipher = Aes256Gcm::new(cipher_key);
    let nonce = Nonce::from_slice(&nonce_bytes);

    cipher
        .decrypt(nonce, ciphertext.as_ref())
        .map_err(|_| CoreError::Crypto("ciphertext failed authentication".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_plaintext() {
        let key = MasterKey::generate();
        let sealed = encrypt(&key, b"hunter2").expect("encrypt");
        let opened = decrypt(&key, &sealed).expect("decrypt");
        assert_eq!(opened, b"hunter2");
    }

    #[test]
    fn rejects_wrong_key() {
        let key_a = MasterKey::generate();
        let key_b = MasterKey::generate();
        let sealed = encrypt(&key_a, b"top secret").expect("encrypt");
        assert!(decrypt(&key_b, &sealed).is_err());
    }

    #[test]
    fn rejects_tampered_ciphertext() {
        let key = MasterKey::generate();
        let mut sealed = encrypt(&key, b"top secret").expect("encrypt");
        let mut raw = BASE64.decode(&sealed.ciphertext).unwrap();
        raw[0] ^= 0xff;
        sealed.ciphertext = BASE64.encode(raw);
        assert!(decrypt(&key, &sealed).is_err());
    }

    #[test]
    fn nonces_are_not_reused() {
        let key = MasterKey::generate();
        let a = encrypt(&key, b"same plaintext").unwrap();
        let b = encrypt(&key, b"same plaintext").unwrap();
        assert_ne!(a.nonce, b.nonce);
    }
}
