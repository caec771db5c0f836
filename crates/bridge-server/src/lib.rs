//! # bridge-server
//!
//! Feeds inbound wallet callback URIs into a [`ResponseDispatcher`].
//! Supports a stdio line transport and an HTTP redirect endpoint.
//!
//! [`ResponseDispatcher`]: wallet_bridge::ResponseDispatcher

mod opener;
mod server;
pub mod transport;

pub use opener::PrintOpener;
pub use server::{CallbackServer, ServerMode};
pub use transport::{CallbackAck, HttpTransport, StdioTransport, TransportError};
