//! Base58 (Bitcoin alphabet) codec

use crypto_box::PublicKey;

use crate::error::{Result, WalletError};

pub fn encode_base58(bytes: &[u8]) -> String {
    bs58::encode(bytes).into_string()
}

/// Decode base58 text. Malformed input is treated as a bad wallet response.
pub fn decode_base58(encoded: &str) -> Result<Vec<u8>> {
    bs58::decode(encoded)
        .into_vec()
        .map_err(|e| WalletError::UnexpectedResponse(format!("Invalid base58: {}", e)))
}

/// Decode a base58 X25519 public key (must be exactly 32 bytes)
pub fn public_key_from_base58(encoded: &str) -> Result<PublicKey> {
    let bytes = decode_base58(encoded)?;
    let key: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
        WalletError::UnexpectedResponse(format!(
            "Invalid public key length: expected 32, got {}",
            bytes.len()
        ))
    })?;
    Ok(PublicKey::from(key))
}
