//! # wallet-catalog
//!
//! Wallet catalog for wallet-bridge.
//! Parses wallet descriptors and builds the links that hand a pairing URI to an
//! installed wallet app.

mod types;
mod parser;
mod links;
mod error;

pub use types::*;
pub use parser::WalletCatalog;
pub use links::{encode_pairing_uri, wallet_link};
pub use error::{CatalogError, CatalogResult};
