//! Encrypted deep-link protocol (Phantom)
//!
//! Every request is an app link to the wallet. Every answer comes back as a
//! redirect to `<callback>/on<Action>`. After connect, request and response
//! bodies are sealed in a box keyed by our ephemeral key pair and the
//! wallet's public key.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use crypto_box::PublicKey;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;
use wallet_catalog::ConnectionType;

use crate::config::PhantomConfig;
use crate::crypto::{
    encode_base58, open, public_key_from_base58, seal, DappKeyPair, EncryptedPayload, SessionToken,
};
use crate::error::{Result, WalletError};
use crate::handler::{ConnectionHandler, DeepLinkOpener};
use crate::operation::Progress;
use crate::pending::{wait, PendingTable};
use crate::request::{
    AddChainRequest, TransactionPayload, TypedData, WalletRequest, WalletTransactionRequest,
};
use crate::status::{StatusCell, WalletInfo, WalletState, WalletStatus, WalletStatusDelegate};

use super::is_callback_for;

/// Actions of the deep-link protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackAction {
    Connect,
    Disconnect,
    SignMessage,
    SignTransaction,
    SendTransaction,
}

impl CallbackAction {
    /// Path of the outbound request under the wallet's base URL
    pub fn request_path(&self) -> &'static str {
        match self {
            CallbackAction::Connect => "connect",
            CallbackAction::Disconnect => "disconnect",
            CallbackAction::SignMessage => "signMessage",
            CallbackAction::SignTransaction => "signTransaction",
            CallbackAction::SendTransaction => "signAndSendTransaction",
        }
    }

    /// Last path segment of the redirect carrying the answer
    pub fn callback_name(&self) -> &'static str {
        match self {
            CallbackAction::Connect => "onConnect",
            CallbackAction::Disconnect => "onDisconnect",
            CallbackAction::SignMessage => "onSignMessage",
            CallbackAction::SignTransaction => "onSignTransaction",
            CallbackAction::SendTransaction => "onSendTransaction",
        }
    }

    pub fn from_callback_name(name: &str) -> Option<Self> {
        match name {
            "onConnect" => Some(CallbackAction::Connect),
            "onDisconnect" => Some(CallbackAction::Disconnect),
            "onSignMessage" => Some(CallbackAction::SignMessage),
            "onSignTransaction" => Some(CallbackAction::SignTransaction),
            "onSendTransaction" => Some(CallbackAction::SendTransaction),
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct SignMessageBody<'a> {
    session: &'a str,
    message: String,
    display: &'static str,
}

#[derive(Serialize)]
struct TransactionBody<'a> {
    session: &'a str,
    transaction: String,
}

#[derive(Deserialize)]
struct ConnectResponse {
    public_key: String,
    session: String,
}

#[derive(Deserialize)]
struct SignatureResponse {
    signature: String,
}

#[derive(Deserialize)]
struct SignedTransactionResponse {
    transaction: String,
}

/// Payload of an outbound request, before the session token is attached
enum OutboundBody {
    Message(Vec<u8>),
    Transaction(Vec<u8>),
}

impl OutboundBody {
    fn to_json(&self, session: &str) -> Result<Vec<u8>> {
        let encoded = match self {
            OutboundBody::Message(message) => serde_json::to_vec(&SignMessageBody {
                session,
                message: encode_base58(message),
                display: "utf8",
            }),
            OutboundBody::Transaction(transaction) => serde_json::to_vec(&TransactionBody {
                session,
                transaction: encode_base58(transaction),
            }),
        };
        encoded.map_err(|e| WalletError::InvalidInput(format!("Failed to encode request: {}", e)))
    }
}

#[derive(Default)]
struct PhantomState {
    status: StatusCell,
    keys: Option<DappKeyPair>,
    peer_public_key: Option<PublicKey>,
    session: Option<SessionToken>,
    connect_waiters: PendingTable<(), WalletInfo>,
    operations: PendingTable<CallbackAction, String>,
}

impl PhantomState {
    /// Forget keys, session and every waiter. Returns how many waiters were dropped.
    fn reset(&mut self) -> usize {
        self.keys = None;
        self.peer_public_key = None;
        self.session = None;
        let dropped = self.connect_waiters.clear() + self.operations.clear();
        self.status.reset();
        dropped
    }
}

/// Handler for the encrypted deep-link protocol
pub struct PhantomHandler {
    config: PhantomConfig,
    opener: Arc<dyn DeepLinkOpener>,
    state: Mutex<PhantomState>,
}

impl PhantomHandler {
    pub fn new(config: PhantomConfig, opener: Arc<dyn DeepLinkOpener>) -> Self {
        Self {
            config,
            opener,
            state: Mutex::new(PhantomState::default()),
        }
    }

    /// Have the wallet sign a serialized transaction without submitting it.
    /// Resolves with the signed transaction, base58 encoded.
    pub async fn sign_transaction(
        &self,
        request: &WalletRequest,
        transaction: &[u8],
        progress: &Progress,
    ) -> Result<String> {
        self.perform(
            request,
            CallbackAction::SignTransaction,
            OutboundBody::Transaction(transaction.to_vec()),
            progress,
        )
        .await
    }

    /// Cluster name for a chain reference
    fn cluster(chain_id: Option<&str>) -> &'static str {
        match chain_id {
            Some("1") => "mainnet-beta",
            _ => "devnet",
        }
    }

    fn action_url(&self, action: CallbackAction) -> Result<Url> {
        let base = self.config.base_url.trim_end_matches('/');
        Url::parse(&format!("{}/{}", base, action.request_path()))
            .map_err(|e| WalletError::ConnectionFailed(format!("Invalid Phantom base URL: {}", e)))
    }

    fn redirect_link(&self, action: CallbackAction) -> String {
        format!(
            "{}/{}",
            self.config.callback_url.trim_end_matches('/'),
            action.callback_name()
        )
    }

    fn connect_url(&self, keys: &DappKeyPair, chain_id: Option<&str>) -> Result<Url> {
        let mut url = self.action_url(CallbackAction::Connect)?;
        url.query_pairs_mut()
            .append_pair("dapp_encryption_public_key", &keys.public_key_base58())
            .append_pair("cluster", Self::cluster(chain_id))
            .append_pair("app_url", &self.config.app_url)
            .append_pair("redirect_link", &self.redirect_link(CallbackAction::Connect));
        Ok(url)
    }

    fn request_url(
        &self,
        action: CallbackAction,
        keys: &DappKeyPair,
        peer: &PublicKey,
        body: &[u8],
    ) -> Result<Url> {
        let sealed = seal(body, peer, keys.secret_key())?;
        let mut url = self.action_url(action)?;
        url.query_pairs_mut()
            .append_pair("dapp_encryption_public_key", &keys.public_key_base58())
            .append_pair("nonce", &sealed.nonce_base58())
            .append_pair("redirect_link", &self.redirect_link(action))
            .append_pair("payload", &sealed.data_base58());
        Ok(url)
    }

    async fn perform(
        &self,
        request: &WalletRequest,
        action: CallbackAction,
        body: OutboundBody,
        progress: &Progress,
    ) -> Result<String> {
        let info = self.connect(request).await?;
        progress.connected(&info);

        let rx = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;

            let (Some(keys), Some(peer), Some(session)) =
                (&state.keys, &state.peer_public_key, &state.session)
            else {
                return Err(WalletError::ConnectionFailed(
                    "No Phantom session, connect first".to_string(),
                ));
            };

            if state.operations.is_pending(&action) {
                return Err(WalletError::ConnectionFailed(format!(
                    "A {} request is already waiting for Phantom",
                    action.request_path()
                )));
            }

            let payload = body.to_json(session.expose())?;
            let url = self.request_url(action, keys, peer, &payload)?;

            debug!("Opening Phantom {} request", action.request_path());
            if !self.opener.open(&url) {
                return Err(WalletError::ConnectionFailed(
                    "Failed to open Phantom app".to_string(),
                ));
            }
            state.operations.register(action)
        };

        progress.needs_app_switch();
        wait(rx).await
    }

    fn on_connect(state: &mut PhantomState, params: &HashMap<String, String>) -> bool {
        if !state.connect_waiters.is_pending(&()) {
            warn!("Phantom connect callback with no pending connect");
            return false;
        }

        let result = match callback_error(params) {
            Some(message) => Err(WalletError::ConnectionFailed(message)),
            None => Self::read_connect(state, params),
        };

        match result {
            Ok((peer, response)) => {
                let mut info = state.status.get().connected_wallet.clone().unwrap_or_default();
                info.address = Some(response.public_key);

                state.peer_public_key = Some(peer);
                state.session = Some(SessionToken::new(response.session));
                state.status.update(|status| {
                    status.state = WalletState::ConnectedToWallet;
                    status.connected_wallet = Some(info.clone());
                });

                info!("Connected to Phantom");
                state.connect_waiters.resolve(&(), Ok(info));
            }
            Err(e) => {
                warn!("Phantom connect failed: {}", e);
                state.keys = None;
                state.peer_public_key = None;
                state.session = None;
                state.status.reset();
                state.connect_waiters.resolve(&(), Err(e));
            }
        }
        true
    }

    fn read_connect(
        state: &PhantomState,
        params: &HashMap<String, String>,
    ) -> Result<(PublicKey, ConnectResponse)> {
        let keys = state.keys.as_ref().ok_or_else(|| {
            WalletError::UnexpectedResponse("No key pair for this connect".to_string())
        })?;

        let peer = public_key_from_base58(required(params, "phantom_encryption_public_key")?)?;
        let payload =
            EncryptedPayload::from_base58(required(params, "data")?, required(params, "nonce")?)?;
        let plaintext = open(&payload, &peer, keys.secret_key())?;
        let response = parse_body::<ConnectResponse>(&plaintext)?;

        Ok((peer, response))
    }

    fn on_operation(
        state: &mut PhantomState,
        action: CallbackAction,
        params: &HashMap<String, String>,
    ) -> bool {
        if !state.operations.is_pending(&action) {
            warn!(
                "Phantom {} callback with no pending request",
                action.callback_name()
            );
            return false;
        }

        let result = match callback_error(params) {
            Some(message) => Err(WalletError::UnexpectedResponse(message)),
            None => Self::read_operation(state, action, params),
        };
        if let Err(e) = &result {
            warn!("Phantom {} failed: {}", action.request_path(), e);
        }

        state.operations.resolve(&action, result);
        true
    }

    fn read_operation(
        state: &PhantomState,
        action: CallbackAction,
        params: &HashMap<String, String>,
    ) -> Result<String> {
        let (Some(keys), Some(peer)) = (&state.keys, &state.peer_public_key) else {
            return Err(WalletError::UnexpectedResponse(
                "No Phantom session for this callback".to_string(),
            ));
        };

        let payload =
            EncryptedPayload::from_base58(required(params, "data")?, required(params, "nonce")?)?;
        let plaintext = open(&payload, peer, keys.secret_key())?;

        match action {
            CallbackAction::SignTransaction => {
                parse_body::<SignedTransactionResponse>(&plaintext).map(|r| r.transaction)
            }
            _ => parse_body::<SignatureResponse>(&plaintext).map(|r| r.signature),
        }
    }
}

/// `errorMessage (errorCode)` when the wallet reported a failure
fn callback_error(params: &HashMap<String, String>) -> Option<String> {
    let code = params.get("errorCode")?;
    let message = params
        .get("errorMessage")
        .map(String::as_str)
        .unwrap_or("Unknown error");
    Some(format!("{} ({})", message, code))
}

fn required<'a>(params: &'a HashMap<String, String>, name: &str) -> Result<&'a str> {
    params
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| WalletError::UnexpectedResponse(format!("Missing {} in callback", name)))
}

fn parse_body<T: DeserializeOwned>(plaintext: &[u8]) -> Result<T> {
    serde_json::from_slice(plaintext)
        .map_err(|e| WalletError::UnexpectedResponse(format!("Invalid response payload: {}", e)))
}

#[async_trait]
impl ConnectionHandler for PhantomHandler {
    fn connection_type(&self) -> ConnectionType {
        ConnectionType::PhantomWallet
    }

    async fn status(&self) -> WalletStatus {
        self.state.lock().await.status.get().clone()
    }

    async fn set_status_delegate(&self, delegate: Option<Arc<dyn WalletStatusDelegate>>) {
        self.state.lock().await.status.set_delegate(delegate);
    }

    async fn connect(&self, request: &WalletRequest) -> Result<WalletInfo> {
        let rx = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;

            let connected = state.status.state() == WalletState::ConnectedToWallet;
            if connected {
                if let Some(info) = state
                    .status
                    .get()
                    .connected_wallet
                    .as_ref()
                    .filter(|info| info.satisfies(request))
                {
                    return Ok(info.clone());
                }
            }

            if state.connect_waiters.is_pending(&()) {
                let in_flight_chain = state
                    .status
                    .get()
                    .connected_wallet
                    .as_ref()
                    .and_then(|info| info.chain_id.clone());
                if request.chain_id.is_some() && request.chain_id != in_flight_chain {
                    return Err(WalletError::ConnectionFailed(
                        "A Phantom connect for another chain is already in progress".to_string(),
                    ));
                }
                debug!("Joining in-flight Phantom connect");
                state.connect_waiters.register(())
            } else {
                let keys = DappKeyPair::generate();
                let url = self.connect_url(&keys, request.chain_id.as_deref())?;

                info!(
                    "Connecting to Phantom on {}",
                    Self::cluster(request.chain_id.as_deref())
                );
                if !self.opener.open(&url) {
                    warn!("Failed to open Phantom app");
                    return Err(WalletError::ConnectionFailed(
                        "Failed to open Phantom app".to_string(),
                    ));
                }

                if connected {
                    info!("Phantom session does not match the request, reconnecting");
                    state.reset();
                }
                state.keys = Some(keys);
                state.status.update(|status| {
                    status.state = WalletState::Listening;
                    status.connected_wallet = Some(WalletInfo::pending(request));
                });
                state.connect_waiters.register(())
            }
        };

        wait(rx).await
    }

    async fn disconnect(&self) {
        let dropped = self.state.lock().await.reset();
        if dropped > 0 {
            debug!("Dropped {} pending Phantom requests", dropped);
        }
    }

    async fn sign_message(
        &self,
        request: &WalletRequest,
        message: &str,
        progress: &Progress,
    ) -> Result<String> {
        self.perform(
            request,
            CallbackAction::SignMessage,
            OutboundBody::Message(message.as_bytes().to_vec()),
            progress,
        )
        .await
    }

    async fn sign_typed_data(
        &self,
        request: &WalletRequest,
        typed_data: &TypedData,
        progress: &Progress,
    ) -> Result<String> {
        self.sign_message(request, &typed_data.to_json_string(), progress)
            .await
    }

    async fn send(&self, request: &WalletTransactionRequest, progress: &Progress) -> Result<String> {
        match &request.payload {
            TransactionPayload::Solana(transaction) => {
                self.perform(
                    &request.wallet_request,
                    CallbackAction::SendTransaction,
                    OutboundBody::Transaction(transaction.clone()),
                    progress,
                )
                .await
            }
            TransactionPayload::Ethereum(_) => Err(WalletError::InvalidInput(
                "Phantom only sends serialized Solana transactions".to_string(),
            )),
        }
    }

    async fn add_chain(
        &self,
        _request: &WalletRequest,
        _chain: &AddChainRequest,
        _progress: &Progress,
    ) -> Result<String> {
        Err(WalletError::InvalidInput(
            "Phantom does not support adding chains".to_string(),
        ))
    }

    async fn handle_response(&self, uri: &Url) -> bool {
        if !is_callback_for(uri, &self.config.callback_url) {
            return false;
        }

        let Some(name) = uri
            .path_segments()
            .and_then(|segments| segments.last())
            .filter(|name| !name.is_empty())
        else {
            return false;
        };
        let Some(action) = CallbackAction::from_callback_name(name) else {
            debug!("Ignoring unknown Phantom callback: {}", name);
            return false;
        };

        let params: HashMap<String, String> = uri.query_pairs().into_owned().collect();
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        match action {
            CallbackAction::Connect => Self::on_connect(state, &params),
            CallbackAction::Disconnect => {
                match callback_error(&params) {
                    Some(message) => warn!("Phantom disconnect failed: {}", message),
                    None => debug!("Phantom acknowledged disconnect"),
                }
                true
            }
            action => Self::on_operation(state, action, &params),
        }
    }
}
