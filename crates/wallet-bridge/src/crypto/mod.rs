//! Cryptographic primitives for the encrypted deep-link protocol
//!
//! This module provides:
//! - X25519-XSalsa20-Poly1305 authenticated boxes
//! - Base58 encoding of keys, nonces and payloads
//! - Zeroize-on-drop holders for key pairs and session tokens

mod base58;
mod encryption;
mod secure_memory;

pub use base58::{decode_base58, encode_base58, public_key_from_base58};
pub use encryption::{generate_nonce, open, seal, seal_with_nonce, EncryptedPayload, NONCE_LENGTH};
pub use secure_memory::{DappKeyPair, SessionToken};
