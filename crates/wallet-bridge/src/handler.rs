//! Contract shared by every connection protocol

use std::sync::Arc;

use async_trait::async_trait;
use url::Url;
use wallet_catalog::{ConnectionType, Wallet};

use crate::error::Result;
use crate::operation::Progress;
use crate::providers::{PhantomHandler, SegueHandler, WalletConnectHandler};
use crate::request::{AddChainRequest, TypedData, WalletRequest, WalletTransactionRequest};
use crate::status::{WalletInfo, WalletStatus, WalletStatusDelegate};

/// A stateful connection protocol.
///
/// Operations first make sure a usable session exists (reporting
/// `connected` on `progress`), then hand the request to the wallet
/// (reporting `needs_app_switch`) and resolve exactly once with the
/// wallet's answer.
#[async_trait]
pub trait ConnectionHandler: Send + Sync {
    fn connection_type(&self) -> ConnectionType;

    /// Current status snapshot
    async fn status(&self) -> WalletStatus;

    /// Attach (or with `None` detach) the receiver of status changes
    async fn set_status_delegate(&self, delegate: Option<Arc<dyn WalletStatusDelegate>>);

    async fn connect(&self, request: &WalletRequest) -> Result<WalletInfo>;

    /// Tear down the session and drop every pending completion. Safe to call
    /// when idle.
    async fn disconnect(&self);

    async fn sign_message(
        &self,
        request: &WalletRequest,
        message: &str,
        progress: &Progress,
    ) -> Result<String>;

    async fn sign_typed_data(
        &self,
        request: &WalletRequest,
        typed_data: &TypedData,
        progress: &Progress,
    ) -> Result<String>;

    async fn send(&self, request: &WalletTransactionRequest, progress: &Progress) -> Result<String>;

    async fn add_chain(
        &self,
        request: &WalletRequest,
        chain: &AddChainRequest,
        progress: &Progress,
    ) -> Result<String>;

    /// Offer an inbound callback URI. Returns whether this handler consumed it.
    async fn handle_response(&self, uri: &Url) -> bool;
}

/// Platform hook that launches external apps
pub trait DeepLinkOpener: Send + Sync {
    /// Open `uri`; `false` when nothing could handle it
    fn open(&self, uri: &Url) -> bool;

    /// Whether the wallet's app is installed on this device
    fn is_installed(&self, _wallet: &Wallet) -> bool {
        true
    }
}

/// The closed set of handlers the router can make current
#[derive(Clone)]
pub enum Handler {
    Phantom(Arc<PhantomHandler>),
    WalletConnect(Arc<WalletConnectHandler>),
    Segue(Arc<SegueHandler>),
    Custom(Arc<dyn ConnectionHandler>),
}

impl Handler {
    pub fn as_handler(&self) -> &dyn ConnectionHandler {
        match self {
            Handler::Phantom(h) => h.as_ref(),
            Handler::WalletConnect(h) => h.as_ref(),
            Handler::Segue(h) => h.as_ref(),
            Handler::Custom(h) => h.as_ref(),
        }
    }

    /// Whether both refer to the same handler instance
    pub fn same_as(&self, other: &Handler) -> bool {
        match (self, other) {
            (Handler::Phantom(a), Handler::Phantom(b)) => Arc::ptr_eq(a, b),
            (Handler::WalletConnect(a), Handler::WalletConnect(b)) => Arc::ptr_eq(a, b),
            (Handler::Segue(a), Handler::Segue(b)) => Arc::ptr_eq(a, b),
            (Handler::Custom(a), Handler::Custom(b)) => {
                Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
            }
            _ => false,
        }
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Handler")
            .field(&self.as_handler().connection_type())
            .finish()
    }
}
