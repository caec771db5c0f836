//! Secure memory handling with automatic zeroization

use crypto_box::{PublicKey, SecretKey};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::encode_base58;

/// Ephemeral X25519 key pair generated for one connect. The secret half is
/// zeroed when dropped.
pub struct DappKeyPair {
    secret: SecretKey,
    public: PublicKey,
}

impl DappKeyPair {
    /// Generate a fresh key pair from the OS-seeded thread RNG
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let pair = Self::from_secret_bytes(bytes);
        bytes.zeroize();
        pair
    }

    /// Rebuild a key pair from raw secret bytes
    pub fn from_secret_bytes(bytes: [u8; 32]) -> Self {
        let secret = SecretKey::from(bytes);
        let public = secret.public_key();
        Self { secret, public }
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Secret half (use carefully - never log or persist)
    pub fn secret_key(&self) -> &SecretKey {
        &self.secret
    }

    pub fn public_key_base58(&self) -> String {
        encode_base58(self.public.as_bytes())
    }
}

impl std::fmt::Debug for DappKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DappKeyPair")
            .field("public", &self.public_key_base58())
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Session token issued by the wallet - automatically zeroed when dropped
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SessionToken {
    value: String,
}

impl SessionToken {
    pub fn new(value: String) -> Self {
        Self { value }
    }

    /// Get the token (use carefully)
    pub fn expose(&self) -> &str {
        &self.value
    }
}

impl Clone for SessionToken {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
        }
    }
}

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionToken")
            .field("value", &"[REDACTED]")
            .finish()
    }
}
