//! stdio transport: one callback URI per line in, one JSON ack per line out

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info};
use wallet_bridge::ResponseDispatcher;

use super::{CallbackAck, TransportError};

pub struct StdioTransport {
    dispatcher: ResponseDispatcher,
}

impl StdioTransport {
    pub fn new(dispatcher: ResponseDispatcher) -> Self {
        Self { dispatcher }
    }

    /// Read callbacks from stdin until EOF
    pub async fn run(&self) -> Result<(), TransportError> {
        info!("Reading callback URIs from stdin");
        self.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }

    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<(), TransportError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();

        while let Some(line) = lines.next_line().await? {
            let uri = line.trim();
            if uri.is_empty() {
                continue;
            }

            debug!("Received callback: {}", uri);
            let handled = self.dispatcher.handle_response(uri).await;

            let ack = serde_json::to_string(&CallbackAck {
                uri: uri.to_string(),
                handled,
            })?;
            writer.write_all(ack.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }

        info!("EOF received, shutting down");
        Ok(())
    }
}
