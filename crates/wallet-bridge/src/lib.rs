//! wallet-bridge: connect an application to external crypto wallets
//!
//! Each wallet protocol is a [`ConnectionHandler`]:
//! - `PhantomHandler`: encrypted deep links (X25519 box, base58 query params)
//! - `WalletConnectHandler`: relay pairing and CAIP-scoped sessions
//! - `SegueHandler`: SDK-mediated handshake
//!
//! The [`ConnectionRouter`] picks the handler for each request, keeps exactly
//! one current and gates transactions behind a [`ConsentHandler`]. Inbound
//! callback URIs enter through the [`ResponseDispatcher`].

pub mod chain;
pub mod config;
pub mod consent;
pub mod crypto;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod operation;
pub mod pending;
pub mod providers;
pub mod registry;
pub mod request;
pub mod router;
pub mod status;

#[cfg(test)]
pub(crate) mod testing;

pub use chain::{AccountId, ChainId};
pub use config::{BridgeConfig, ConfigError, PhantomConfig, SegueConfig, WalletConnectConfig};
pub use consent::{ConsentHandler, ConsentStatus, SkippedConsent};
pub use dispatcher::ResponseDispatcher;
pub use error::{ErrorCode, Result, WalletError};
pub use handler::{ConnectionHandler, DeepLinkOpener, Handler};
pub use operation::{OperationEvent, Progress, ProgressEvent};
pub use providers::{PhantomHandler, SegueHandler, WalletConnectHandler};
pub use registry::{Collaborators, ConnectionRegistry};
pub use request::{
    AddChainRequest, EthereumTransactionRequest, TransactionPayload, TypedData, WalletRequest,
    WalletTransactionRequest,
};
pub use router::ConnectionRouter;
pub use status::{WalletInfo, WalletState, WalletStatus, WalletStatusDelegate};

pub use wallet_catalog::{ConnectionType, Wallet, WalletCatalog};
