//! X25519-XSalsa20-Poly1305 authenticated boxes
//!
//! Wire format: ciphertext and nonce travel as two separate base58 query
//! parameters (`data`/`payload` and `nonce`).
//! - Nonce: 24 bytes, fresh random per message
//! - Ciphertext: Poly1305 tag followed by the encrypted bytes

use crypto_box::aead::generic_array::GenericArray;
use crypto_box::aead::Aead;
use crypto_box::{PublicKey, SalsaBox, SecretKey};
use rand::RngCore;

use super::{decode_base58, encode_base58};
use crate::error::{Result, WalletError};

/// Nonce length of the XSalsa20 box
pub const NONCE_LENGTH: usize = 24;

/// Sealed message with the nonce it was sealed under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedPayload {
    pub nonce: [u8; NONCE_LENGTH],
    pub ciphertext: Vec<u8>,
}

impl EncryptedPayload {
    /// Parse the base58 `data` and `nonce` parameters of an inbound callback
    pub fn from_base58(data: &str, nonce: &str) -> Result<Self> {
        let ciphertext = decode_base58(data)?;
        let nonce_bytes = decode_base58(nonce)?;

        if nonce_bytes.len() != NONCE_LENGTH {
            return Err(WalletError::UnexpectedResponse(format!(
                "Invalid nonce length: expected {}, got {}",
                NONCE_LENGTH,
                nonce_bytes.len()
            )));
        }

        let mut nonce = [0u8; NONCE_LENGTH];
        nonce.copy_from_slice(&nonce_bytes);

        Ok(Self { nonce, ciphertext })
    }

    pub fn data_base58(&self) -> String {
        encode_base58(&self.ciphertext)
    }

    pub fn nonce_base58(&self) -> String {
        encode_base58(&self.nonce)
    }
}

/// Generate a random 24-byte nonce
pub fn generate_nonce() -> [u8; NONCE_LENGTH] {
    let mut nonce = [0u8; NONCE_LENGTH];
    rand::thread_rng().fill_bytes(&mut nonce);
    nonce
}

/// Seal `plaintext` for `peer_public` under a fresh random nonce
pub fn seal(plaintext: &[u8], peer_public: &PublicKey, own_secret: &SecretKey) -> Result<EncryptedPayload> {
    seal_with_nonce(plaintext, generate_nonce(), peer_public, own_secret)
}

/// Seal `plaintext` under a caller-chosen nonce. A nonce must never be reused
/// with the same key pair.
pub fn seal_with_nonce(
    plaintext: &[u8],
    nonce: [u8; NONCE_LENGTH],
    peer_public: &PublicKey,
    own_secret: &SecretKey,
) -> Result<EncryptedPayload> {
    let salsa_box = SalsaBox::new(peer_public, own_secret);
    let ciphertext = salsa_box
        .encrypt(GenericArray::from_slice(&nonce[..]), plaintext)
        .map_err(|_| WalletError::InvalidInput("Failed to seal payload".to_string()))?;

    Ok(EncryptedPayload { nonce, ciphertext })
}

/// Open a box sealed by `peer_public` for our key pair
pub fn open(payload: &EncryptedPayload, peer_public: &PublicKey, own_secret: &SecretKey) -> Result<Vec<u8>> {
    let salsa_box = SalsaBox::new(peer_public, own_secret);
    salsa_box
        .decrypt(GenericArray::from_slice(&payload.nonce[..]), payload.ciphertext.as_slice())
        .map_err(|_| {
            WalletError::UnexpectedResponse("Failed to open encrypted payload".to_string())
        })
}
