//! SDK-mediated handshake protocol (Coinbase Wallet segue)
//!
//! The SDK owns the transport to the wallet app. Connect runs an account
//! request as the handshake; every later operation is a single SDK request.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;
use wallet_catalog::ConnectionType;

use crate::config::SegueConfig;
use crate::error::{Result, WalletError};
use crate::handler::ConnectionHandler;
use crate::operation::Progress;
use crate::request::{
    AddChainRequest, EthereumTransactionRequest, TypedData, WalletRequest,
    WalletTransactionRequest,
};
use crate::status::{StatusCell, WalletInfo, WalletState, WalletStatus, WalletStatusDelegate};

/// Action sent to the wallet through the SDK
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegueAction {
    RequestAccounts,
    PersonalSign { address: String, message: String },
    SignTypedDataV3 { address: String, typed_data_json: String },
    SendTransaction(EthereumTransactionRequest),
    AddEthereumChain { chain_id: String },
}

impl SegueAction {
    pub fn method(&self) -> &'static str {
        match self {
            SegueAction::RequestAccounts => "eth_requestAccounts",
            SegueAction::PersonalSign { .. } => "personal_sign",
            SegueAction::SignTypedDataV3 { .. } => "eth_signTypedData_v3",
            SegueAction::SendTransaction(_) => "eth_sendTransaction",
            SegueAction::AddEthereumChain { .. } => "wallet_addEthereumChain",
        }
    }
}

/// Account reported by the wallet during the handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegueAccount {
    pub chain: String,
    pub network_id: u64,
    pub address: String,
}

/// Per-action outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionResult {
    Value(String),
    Error { code: i64, message: String },
}

/// Outcome of a handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub results: Vec<ActionResult>,
    pub account: Option<SegueAccount>,
}

/// Failure reported by the SDK itself
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct SegueError(pub String);

/// The wallet SDK the segue handler drives
#[async_trait]
pub trait SegueClient: Send + Sync {
    /// Whether the SDK still holds a session with the wallet
    fn is_connected(&self) -> bool;

    async fn initiate_handshake(&self, actions: Vec<SegueAction>) -> std::result::Result<Handshake, SegueError>;

    async fn make_request(
        &self,
        actions: Vec<SegueAction>,
    ) -> std::result::Result<Vec<ActionResult>, SegueError>;

    /// Hand a callback URI to the SDK. Returns whether it was consumed.
    fn handle_response(&self, uri: &Url) -> bool;

    fn reset_session(&self);
}

#[derive(Default)]
struct SegueState {
    status: StatusCell,
    /// Bumped on every handshake and disconnect so a stale handshake can tell
    /// it was abandoned
    generation: u64,
}

/// Handler for the SDK-mediated protocol
pub struct SegueHandler {
    config: SegueConfig,
    client: Arc<dyn SegueClient>,
    state: Mutex<SegueState>,
}

impl SegueHandler {
    pub fn new(config: SegueConfig, client: Arc<dyn SegueClient>) -> Self {
        Self {
            config,
            client,
            state: Mutex::new(SegueState::default()),
        }
    }

    fn verify(
        outcome: std::result::Result<Handshake, SegueError>,
        request: &WalletRequest,
    ) -> Result<WalletInfo> {
        let handshake = outcome.map_err(|e| WalletError::ConnectionFailed(e.0))?;

        if let Some(ActionResult::Error { code, message }) = handshake.results.first() {
            return Err(WalletError::RefusedByWallet(format!("{} ({})", message, code)));
        }

        let account = handshake
            .account
            .ok_or(WalletError::WalletContainsNoAccount)?;

        if let Some(chain_id) = request.chain_id.as_deref() {
            if account.network_id.to_string() != chain_id {
                return Err(WalletError::NetworkMismatch(format!(
                    "Wallet is on network {} but {} was requested. Switch networks in the wallet and try again",
                    account.network_id, chain_id
                )));
            }
        }

        if let Some(expected) = request.address.as_deref() {
            if !expected.eq_ignore_ascii_case(&account.address) {
                return Err(WalletError::WalletMismatch(format!(
                    "Wallet returned account {} but {} was requested",
                    account.address, expected
                )));
            }
        }

        Ok(WalletInfo {
            address: Some(account.address),
            chain_id: Some(account.network_id.to_string()),
            wallet: request.wallet.clone(),
            peer_name: request.wallet.as_ref().map(|w| w.name.clone()),
            peer_image_url: request
                .wallet
                .as_ref()
                .and_then(|w| w.image_url())
                .map(String::from),
        })
    }

    async fn perform<F>(&self, request: &WalletRequest, progress: &Progress, build: F) -> Result<String>
    where
        F: FnOnce(String) -> SegueAction + Send,
    {
        let info = self.connect(request).await?;
        progress.connected(&info);

        let address = info
            .address
            .clone()
            .ok_or(WalletError::WalletContainsNoAccount)?;
        let action = build(address);
        debug!("Sending {} through the wallet SDK", action.method());

        progress.needs_app_switch();
        let failure = match self.client.make_request(vec![action]).await {
            Ok(results) => match results.into_iter().next() {
                Some(ActionResult::Value(value)) => return Ok(value),
                Some(ActionResult::Error { code, message }) => format!("{} ({})", message, code),
                None => {
                    return Err(WalletError::UnexpectedResponse(
                        "Wallet returned no result".to_string(),
                    ))
                }
            },
            Err(e) => e.0,
        };

        warn!("Wallet refused request: {}", failure);
        self.disconnect().await;
        Err(WalletError::RefusedByWallet(failure))
    }
}

#[async_trait]
impl ConnectionHandler for SegueHandler {
    fn connection_type(&self) -> ConnectionType {
        ConnectionType::WalletSegue
    }

    async fn status(&self) -> WalletStatus {
        self.state.lock().await.status.get().clone()
    }

    async fn set_status_delegate(&self, delegate: Option<Arc<dyn WalletStatusDelegate>>) {
        self.state.lock().await.status.set_delegate(delegate);
    }

    async fn connect(&self, request: &WalletRequest) -> Result<WalletInfo> {
        let generation = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;

            match state.status.state() {
                WalletState::Listening => {
                    return Err(WalletError::ConnectionFailed(
                        "A handshake with the wallet is already in progress".to_string(),
                    ));
                }
                WalletState::ConnectedToWallet if self.client.is_connected() => {
                    if let Some(info) = state
                        .status
                        .get()
                        .connected_wallet
                        .as_ref()
                        .filter(|info| info.satisfies(request))
                    {
                        return Ok(info.clone());
                    }
                    info!("Wallet session does not match the request, reconnecting");
                }
                _ => {}
            }

            state.generation += 1;
            state.status.update(|status| {
                status.state = WalletState::Listening;
                status.connected_wallet = Some(WalletInfo::pending(request));
                status.connection_deeplink = None;
            });
            state.generation
        };

        debug!("Starting wallet SDK handshake");
        let outcome = self
            .client
            .initiate_handshake(vec![SegueAction::RequestAccounts])
            .await;

        let mut state = self.state.lock().await;
        if state.generation != generation || state.status.state() != WalletState::Listening {
            return Err(WalletError::ConnectionFailed(
                "Handshake abandoned".to_string(),
            ));
        }

        match Self::verify(outcome, request) {
            Ok(info) => {
                info!("Connected to wallet via SDK handshake");
                state.status.update(|status| {
                    status.state = WalletState::ConnectedToWallet;
                    status.connected_wallet = Some(info.clone());
                });
                Ok(info)
            }
            Err(e) => {
                warn!("Wallet handshake failed: {}", e);
                state.status.reset();
                Err(e)
            }
        }
    }

    async fn disconnect(&self) {
        let mut state = self.state.lock().await;
        state.generation += 1;
        state.status.reset();
        self.client.reset_session();
    }

    async fn sign_message(
        &self,
        request: &WalletRequest,
        message: &str,
        progress: &Progress,
    ) -> Result<String> {
        let message = message.to_string();
        self.perform(request, progress, move |address| SegueAction::PersonalSign {
            address,
            message,
        })
        .await
    }

    async fn sign_typed_data(
        &self,
        request: &WalletRequest,
        typed_data: &TypedData,
        progress: &Progress,
    ) -> Result<String> {
        let typed_data_json = typed_data.to_json_string();
        self.perform(request, progress, move |address| {
            SegueAction::SignTypedDataV3 {
                address,
                typed_data_json,
            }
        })
        .await
    }

    async fn send(&self, request: &WalletTransactionRequest, progress: &Progress) -> Result<String> {
        let transaction = request.as_ethereum().ok_or_else(|| {
            WalletError::InvalidInput("The wallet SDK requires an Ethereum transaction".to_string())
        })?;
        let mut transaction = transaction.clone();
        transaction.data = transaction.normalized_data()?;

        self.perform(&request.wallet_request, progress, move |_| {
            SegueAction::SendTransaction(transaction)
        })
        .await
    }

    async fn add_chain(
        &self,
        request: &WalletRequest,
        chain: &AddChainRequest,
        progress: &Progress,
    ) -> Result<String> {
        let chain_id = chain.hex_chain_id()?;
        self.perform(request, progress, move |_| SegueAction::AddEthereumChain { chain_id })
            .await
    }

    async fn handle_response(&self, uri: &Url) -> bool {
        if !super::is_callback_for(uri, &self.config.callback_url) {
            return false;
        }
        self.client.handle_response(uri)
    }
}
