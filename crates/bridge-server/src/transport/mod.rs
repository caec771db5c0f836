//! Transports delivering callback URIs to the dispatcher

mod http;
mod stdio;

use serde::Serialize;
use thiserror::Error;

pub use http::HttpTransport;
pub use stdio::StdioTransport;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Acknowledgement written back for every callback line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallbackAck {
    pub uri: String,
    pub handled: bool,
}
