//! Protocol handlers, one per wallet connection protocol

mod phantom;
mod relay;
mod segue;
mod wallet_connect;

pub use phantom::{CallbackAction, PhantomHandler};
pub use relay::{
    ApprovedSession, ConnectParams, JsonRpcResult, NamespaceProposal, Pairing, PeerMetadata,
    RelayError, RelayEvent, RelayTransport, SessionRequest, SessionResponse,
};
pub use segue::{
    ActionResult, Handshake, SegueAccount, SegueAction, SegueClient, SegueError, SegueHandler,
};
pub use wallet_connect::WalletConnectHandler;

use url::Url;

/// Whether `uri` is addressed to `callback_url` or a path below it.
///
/// Scheme, host and port must be equal and the path must continue at a
/// segment boundary, so `dapp://phantomX` is not a callback for `dapp://phantom`.
pub(crate) fn is_callback_for(uri: &Url, callback_url: &str) -> bool {
    let Ok(base) = Url::parse(callback_url) else {
        return false;
    };
    if uri.scheme() != base.scheme()
        || uri.host_str() != base.host_str()
        || uri.port_or_known_default() != base.port_or_known_default()
    {
        return false;
    }

    let prefix = base.path().trim_end_matches('/');
    match uri.path().strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
