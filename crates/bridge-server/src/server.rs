//! Callback server orchestration

use tracing::info;
use wallet_bridge::ResponseDispatcher;

use crate::transport::{HttpTransport, StdioTransport, TransportError};

/// Server mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerMode {
    /// Callback URIs are pasted on stdin
    #[default]
    Stdio,
    /// Wallets redirect to an HTTP endpoint
    Http { port: u16 },
}

/// Runs the transport that feeds callbacks to the dispatcher
pub struct CallbackServer {
    dispatcher: ResponseDispatcher,
    mode: ServerMode,
    public_url: Option<String>,
}

impl CallbackServer {
    pub fn new(dispatcher: ResponseDispatcher) -> Self {
        Self {
            dispatcher,
            mode: ServerMode::default(),
            public_url: None,
        }
    }

    pub fn with_mode(mut self, mode: ServerMode) -> Self {
        self.mode = mode;
        self
    }

    /// Base URL wallets redirect to in HTTP mode. Defaults to
    /// `http://localhost:<port>`.
    pub fn with_public_url(mut self, public_url: impl Into<String>) -> Self {
        self.public_url = Some(public_url.into());
        self
    }

    pub async fn run(&self) -> Result<(), TransportError> {
        match self.mode {
            ServerMode::Stdio => {
                info!("Starting callback server in stdio mode");
                StdioTransport::new(self.dispatcher.clone()).run().await
            }
            ServerMode::Http { port } => {
                let public_url = self
                    .public_url
                    .clone()
                    .unwrap_or_else(|| format!("http://localhost:{}", port));
                info!("Starting callback server on {}", public_url);
                HttpTransport::new(self.dispatcher.clone(), port, public_url)
                    .run()
                    .await
            }
        }
    }
}
