//! Process-wide entry point for inbound callback URIs

use std::sync::Arc;

use tracing::{debug, warn};
use url::Url;

use crate::router::ConnectionRouter;

/// Feeds callback URIs from the host (stdin, HTTP redirect, OS intent) to
/// whichever handler the router has current
#[derive(Clone)]
pub struct ResponseDispatcher {
    router: Arc<ConnectionRouter>,
}

impl ResponseDispatcher {
    pub fn new(router: Arc<ConnectionRouter>) -> Self {
        Self { router }
    }

    pub fn router(&self) -> &Arc<ConnectionRouter> {
        &self.router
    }

    /// Returns whether a handler consumed the URI
    pub async fn handle_response(&self, uri: &str) -> bool {
        let uri = match Url::parse(uri.trim()) {
            Ok(uri) => uri,
            Err(e) => {
                warn!("Ignoring malformed callback URI: {}", e);
                return false;
            }
        };

        let handled = self.router.handle_response(&uri).await;
        if !handled {
            debug!("Callback was not consumed: {}", uri);
        }
        handled
    }
}
