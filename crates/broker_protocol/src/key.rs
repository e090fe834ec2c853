//! Shared symmetric secret used for both the AEAD cipher and the
//! authentication tag. Broker, producers, and workers all hold the same
//! key material out of band.

use base64::{engine::general_purpose::STANDARD, Engine as _};

pub const KEY_LEN: usize = 32;

#[derive(Clone)]
pub struct SecretKey([u8; KEY_LEN]);

#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("secret key must be valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("secret key must decode to {KEY_LEN} bytes, got {0}")]
    WrongLength(usize),
}

impl SecretKey {
    /// Parse a base64-encoded 32-byte key, as produced by
    /// `openssl rand -base64 32` and read from `BROKER_SECRET_KEY`.
    pub fn from_base64(s: &str) -> Result<Self, KeyError> {
        let bytes = STANDARD.decode(s.trim())?;
        let bytes: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| KeyError::WrongLength(v.len()))?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    #[cfg(any(test, feature = "test-util"))]
    pub fn for_tests() -> Self {
        Self([7u8; KEY_LEN])
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretKey(..)")
    }
}
