//! Deep-link opener for terminal use

use tracing::info;
use url::Url;
use wallet_bridge::DeepLinkOpener;

/// Prints outbound deep links so the user can open them on the wallet's device
#[derive(Debug, Default, Clone, Copy)]
pub struct PrintOpener;

impl DeepLinkOpener for PrintOpener {
    fn open(&self, uri: &Url) -> bool {
        info!("Opening wallet link");
        // stdout is reserved for the protocol in stdio mode
        eprintln!("Open this link with your wallet:\n{}", uri);
        true
    }
}
