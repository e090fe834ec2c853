//! Authenticated symmetric encryption over the tagged, canonical message
//! bytes.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;

use crate::error::{ProtocolError, Result};
use crate::key::SecretKey;

pub const NONCE_LEN: usize = 12;

fn cipher_for(key: &SecretKey) -> Aes256Gcm {
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()))
}

/// Encrypt `plaintext` under `key`, returning `(nonce, ciphertext)`. A fresh
/// random nonce is drawn for every call — required for GCM's security
/// guarantees to hold under repeated use of the same key.
pub fn encrypt(key: &SecretKey, plaintext: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher_for(key)
        .encrypt(nonce, plaintext)
        .expect("AES-256-GCM encryption of an in-memory buffer cannot fail");

    (nonce_bytes.to_vec(), ciphertext)
}

/// Decrypt `ciphertext` under `key` and `nonce`. Any failure (wrong key,
/// corrupt ciphertext, wrong nonce length) is reported as `DecryptionError`.
pub fn decrypt(key: &SecretKey, nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    if nonce.len() != NONCE_LEN {
        return Err(ProtocolError::Decryption);
    }
    let nonce = Nonce::from_slice(nonce);
    cipher_for(key)
        .decrypt(nonce, ciphertext)
        .map_err(|_| ProtocolError::Decryption)
}
