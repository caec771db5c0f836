//! Fakes for the external collaborators, shared by the unit tests

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Notify;
use url::Url;
use wallet_catalog::{ConnectionType, Wallet, WalletConfig, WalletConnections};

use crate::consent::{ConsentHandler, ConsentStatus};
use crate::crypto::{open, public_key_from_base58, seal, DappKeyPair, EncryptedPayload};
use crate::error::Result as BridgeResult;
use crate::handler::{ConnectionHandler, DeepLinkOpener};
use crate::operation::Progress;
use crate::providers::{
    ActionResult, ConnectParams, Handshake, Pairing, RelayError, RelayTransport, SegueAccount,
    SegueAction, SegueClient, SegueError, SessionRequest,
};
use crate::request::{AddChainRequest, TypedData, WalletRequest, WalletTransactionRequest};
use crate::status::{WalletInfo, WalletState, WalletStatus, WalletStatusDelegate};

pub fn wallet(id: &str, connection_type: ConnectionType, universal: Option<&str>) -> Wallet {
    let mut wallet = Wallet::new(id, id);
    wallet.config = Some(WalletConfig {
        connections: vec![WalletConnections {
            connection_type,
            native: None,
            universal: universal.map(String::from),
        }],
        ..Default::default()
    });
    wallet
}

pub fn phantom_wallet() -> Wallet {
    wallet("phantom", ConnectionType::PhantomWallet, None)
}

pub fn relay_wallet() -> Wallet {
    wallet(
        "metamask",
        ConnectionType::WalletConnectV2,
        Some("https://metamask.app.link"),
    )
}

pub fn segue_wallet() -> Wallet {
    wallet("coinbase", ConnectionType::WalletSegue, None)
}

pub fn query(url: &Url) -> HashMap<String, String> {
    url.query_pairs().into_owned().collect()
}

/// Yield to spawned tasks until `condition` holds
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..10_000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition never became true");
}

/// Yield until the opener has seen at least `count` URIs, returning the last one
pub async fn wait_for_opened(opener: &RecordingOpener, count: usize) -> Url {
    wait_until(|| opener.opened().len() >= count).await;
    opener.opened()[count - 1].clone()
}

/// Opener that records every URI it is asked to open
#[derive(Default)]
pub struct RecordingOpener {
    opened: Mutex<Vec<Url>>,
    refuse: AtomicBool,
    not_installed: AtomicBool,
}

impl RecordingOpener {
    pub fn refusing() -> Self {
        let opener = Self::default();
        opener.refuse.store(true, Ordering::SeqCst);
        opener
    }

    pub fn set_refusing(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    pub fn set_installed(&self, installed: bool) {
        self.not_installed.store(!installed, Ordering::SeqCst);
    }

    pub fn opened(&self) -> Vec<Url> {
        self.opened.lock().unwrap().clone()
    }
}

impl DeepLinkOpener for RecordingOpener {
    fn open(&self, uri: &Url) -> bool {
        if self.refuse.load(Ordering::SeqCst) {
            return false;
        }
        self.opened.lock().unwrap().push(uri.clone());
        true
    }

    fn is_installed(&self, _wallet: &Wallet) -> bool {
        !self.not_installed.load(Ordering::SeqCst)
    }
}

/// Records every published status
#[derive(Default)]
pub struct RecordingDelegate {
    statuses: Mutex<Vec<WalletStatus>>,
}

impl RecordingDelegate {
    pub fn statuses(&self) -> Vec<WalletStatus> {
        self.statuses.lock().unwrap().clone()
    }

    pub fn states(&self) -> Vec<WalletState> {
        self.statuses().iter().map(|s| s.state).collect()
    }
}

impl WalletStatusDelegate for RecordingDelegate {
    fn status_changed(&self, status: &WalletStatus) {
        self.statuses.lock().unwrap().push(status.clone());
    }
}

/// Consent handler with a fixed answer that counts how often it was asked
pub struct FixedConsent {
    answer: ConsentStatus,
    asked: AtomicUsize,
}

impl FixedConsent {
    pub fn new(answer: ConsentStatus) -> Self {
        Self {
            answer,
            asked: AtomicUsize::new(0),
        }
    }

    pub fn asked(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConsentHandler for FixedConsent {
    async fn request_consent(&self, _request: &WalletTransactionRequest) -> ConsentStatus {
        self.asked.fetch_add(1, Ordering::SeqCst);
        self.answer
    }
}

/// Wallet side of the encrypted deep-link protocol
pub struct FakePhantomWallet {
    keys: DappKeyPair,
}

impl FakePhantomWallet {
    pub fn new() -> Self {
        Self {
            keys: DappKeyPair::generate(),
        }
    }

    pub fn public_key_base58(&self) -> String {
        self.keys.public_key_base58()
    }

    /// Redirect approving the connect request in `connect_url`
    pub fn approve_connect(&self, connect_url: &Url, address: &str, session: &str) -> Url {
        let body = json!({"public_key": address, "session": session});
        let mut callback = self.sealed_redirect(connect_url, &body);
        callback
            .query_pairs_mut()
            .append_pair("phantom_encryption_public_key", &self.public_key_base58());
        callback
    }

    /// Decrypted body of an outbound request
    pub fn read_request(&self, request_url: &Url) -> Value {
        let params = query(request_url);
        let dapp = public_key_from_base58(&params["dapp_encryption_public_key"]).unwrap();
        let payload = EncryptedPayload::from_base58(&params["payload"], &params["nonce"]).unwrap();
        let plaintext = open(&payload, &dapp, self.keys.secret_key()).unwrap();
        serde_json::from_slice(&plaintext).unwrap()
    }

    /// Redirect answering the request in `request_url` with `body`
    pub fn answer(&self, request_url: &Url, body: Value) -> Url {
        self.sealed_redirect(request_url, &body)
    }

    fn sealed_redirect(&self, request_url: &Url, body: &Value) -> Url {
        let params = query(request_url);
        let dapp = public_key_from_base58(&params["dapp_encryption_public_key"]).unwrap();
        let sealed = seal(body.to_string().as_bytes(), &dapp, self.keys.secret_key()).unwrap();

        let mut callback = Url::parse(&params["redirect_link"]).unwrap();
        callback
            .query_pairs_mut()
            .append_pair("nonce", &sealed.nonce_base58())
            .append_pair("data", &sealed.data_base58());
        callback
    }
}

/// Relay transport that records every command
#[derive(Default)]
pub struct ScriptedRelay {
    pairings: AtomicUsize,
    connects: Mutex<Vec<ConnectParams>>,
    requests: Mutex<Vec<SessionRequest>>,
    disconnected: Mutex<Vec<String>>,
    fail_connect: AtomicBool,
    fail_requests: AtomicBool,
}

impl ScriptedRelay {
    pub fn fail_connect(&self) {
        self.fail_connect.store(true, Ordering::SeqCst);
    }

    pub fn fail_requests(&self) {
        self.fail_requests.store(true, Ordering::SeqCst);
    }

    pub fn pairings(&self) -> usize {
        self.pairings.load(Ordering::SeqCst)
    }

    pub fn connects(&self) -> Vec<ConnectParams> {
        self.connects.lock().unwrap().clone()
    }

    pub fn requests(&self) -> Vec<SessionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn disconnected(&self) -> Vec<String> {
        self.disconnected.lock().unwrap().clone()
    }
}

#[async_trait]
impl RelayTransport for ScriptedRelay {
    async fn create_pairing(&self) -> Result<Pairing, RelayError> {
        let n = self.pairings.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Pairing {
            topic: format!("pairing-{}", n),
            uri: format!("wc:pairing-{}@2?relay-protocol=irn&symKey=abc", n),
        })
    }

    async fn connect(&self, params: ConnectParams) -> Result<(), RelayError> {
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(RelayError("relay unreachable".into()));
        }
        self.connects.lock().unwrap().push(params);
        Ok(())
    }

    async fn request(&self, request: SessionRequest) -> Result<u64, RelayError> {
        if self.fail_requests.load(Ordering::SeqCst) {
            return Err(RelayError("relay unreachable".into()));
        }
        let mut requests = self.requests.lock().unwrap();
        requests.push(request);
        Ok(requests.len() as u64)
    }

    async fn disconnect_pairing(&self, topic: &str) -> Result<(), RelayError> {
        self.disconnected.lock().unwrap().push(topic.to_string());
        Ok(())
    }
}

/// Wallet SDK with scripted handshake and request outcomes
pub struct ScriptedSegue {
    handshake: Mutex<Result<Handshake, SegueError>>,
    results: Mutex<VecDeque<Result<Vec<ActionResult>, SegueError>>>,
    handshakes: Mutex<Vec<Vec<SegueAction>>>,
    requests: Mutex<Vec<Vec<SegueAction>>>,
    handled: Mutex<Vec<Url>>,
    connected: AtomicBool,
    hold: AtomicBool,
    waiting: AtomicBool,
    release: Notify,
    resets: AtomicUsize,
}

impl ScriptedSegue {
    /// SDK whose handshake returns `address` on `network_id`
    pub fn on_network(network_id: u64, address: &str) -> Self {
        Self {
            handshake: Mutex::new(Ok(Handshake {
                results: vec![ActionResult::Value(format!("[\"{}\"]", address))],
                account: Some(SegueAccount {
                    chain: "eth".into(),
                    network_id,
                    address: address.into(),
                }),
            })),
            results: Mutex::new(VecDeque::new()),
            handshakes: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
            handled: Mutex::new(Vec::new()),
            connected: AtomicBool::new(false),
            hold: AtomicBool::new(false),
            waiting: AtomicBool::new(false),
            release: Notify::new(),
            resets: AtomicUsize::new(0),
        }
    }

    pub fn answer_handshake(&self, outcome: Result<Handshake, SegueError>) {
        *self.handshake.lock().unwrap() = outcome;
    }

    pub fn push_result(&self, outcome: Result<Vec<ActionResult>, SegueError>) {
        self.results.lock().unwrap().push_back(outcome);
    }

    /// Block handshakes until [`ScriptedSegue::release_handshake`]
    pub fn hold_handshake(&self) {
        self.hold.store(true, Ordering::SeqCst);
    }

    pub fn release_handshake(&self) {
        self.hold.store(false, Ordering::SeqCst);
        self.release.notify_one();
    }

    /// Whether a held handshake is waiting to be released
    pub fn waiting(&self) -> bool {
        self.waiting.load(Ordering::SeqCst)
    }

    pub fn handshakes(&self) -> Vec<Vec<SegueAction>> {
        self.handshakes.lock().unwrap().clone()
    }

    pub fn requests(&self) -> Vec<Vec<SegueAction>> {
        self.requests.lock().unwrap().clone()
    }

    pub fn handled(&self) -> Vec<Url> {
        self.handled.lock().unwrap().clone()
    }

    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SegueClient for ScriptedSegue {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn initiate_handshake(&self, actions: Vec<SegueAction>) -> Result<Handshake, SegueError> {
        self.handshakes.lock().unwrap().push(actions);
        if self.hold.load(Ordering::SeqCst) {
            self.waiting.store(true, Ordering::SeqCst);
            self.release.notified().await;
            self.waiting.store(false, Ordering::SeqCst);
        }

        let outcome = self.handshake.lock().unwrap().clone();
        if outcome.is_ok() {
            self.connected.store(true, Ordering::SeqCst);
        }
        outcome
    }

    async fn make_request(&self, actions: Vec<SegueAction>) -> Result<Vec<ActionResult>, SegueError> {
        self.requests.lock().unwrap().push(actions);
        let next = self.results.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(vec![ActionResult::Value("0x".into())]))
    }

    fn handle_response(&self, uri: &Url) -> bool {
        self.handled.lock().unwrap().push(uri.clone());
        true
    }

    fn reset_session(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.resets.fetch_add(1, Ordering::SeqCst);
    }
}

/// Handler that answers immediately and appends `<name>:<call>` to a log
pub struct RecordingHandler {
    name: String,
    connection_type: ConnectionType,
    log: Arc<Mutex<Vec<String>>>,
    status: Mutex<WalletStatus>,
    delegate: Mutex<Option<Arc<dyn WalletStatusDelegate>>>,
    response_gate: Option<Arc<Notify>>,
}

impl RecordingHandler {
    pub fn new(name: &str, connection_type: ConnectionType) -> Self {
        Self::with_log(name, connection_type, Arc::default())
    }

    /// Handler appending to a log shared with other handlers
    pub fn with_log(
        name: &str,
        connection_type: ConnectionType,
        log: Arc<Mutex<Vec<String>>>,
    ) -> Self {
        Self {
            name: name.to_string(),
            connection_type,
            log,
            status: Mutex::new(WalletStatus::default()),
            delegate: Mutex::new(None),
            response_gate: None,
        }
    }

    /// Make `handle_response` wait for `gate` before returning
    pub fn with_response_gate(mut self, gate: Arc<Notify>) -> Self {
        self.response_gate = Some(gate);
        self
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn record(&self, call: impl std::fmt::Display) {
        self.log
            .lock()
            .unwrap()
            .push(format!("{}:{}", self.name, call));
    }

    fn publish(&self, status: WalletStatus) {
        {
            let mut current = self.status.lock().unwrap();
            if *current == status {
                return;
            }
            *current = status.clone();
        }
        let delegate = self.delegate.lock().unwrap().clone();
        if let Some(delegate) = delegate {
            delegate.status_changed(&status);
        }
    }
}

#[async_trait]
impl ConnectionHandler for RecordingHandler {
    fn connection_type(&self) -> ConnectionType {
        self.connection_type.clone()
    }

    async fn status(&self) -> WalletStatus {
        self.status.lock().unwrap().clone()
    }

    async fn set_status_delegate(&self, delegate: Option<Arc<dyn WalletStatusDelegate>>) {
        self.record(if delegate.is_some() { "attach" } else { "detach" });
        *self.delegate.lock().unwrap() = delegate;
    }

    async fn connect(&self, request: &WalletRequest) -> BridgeResult<WalletInfo> {
        self.record("connect");
        let info = WalletInfo {
            address: Some("0xabc".into()),
            chain_id: request.chain_id.clone(),
            wallet: request.wallet.clone(),
            ..Default::default()
        };
        self.publish(WalletStatus {
            state: WalletState::ConnectedToWallet,
            connected_wallet: Some(info.clone()),
            connection_deeplink: None,
        });
        Ok(info)
    }

    async fn disconnect(&self) {
        self.record("disconnect");
        self.publish(WalletStatus::default());
    }

    async fn sign_message(
        &self,
        request: &WalletRequest,
        message: &str,
        progress: &Progress,
    ) -> BridgeResult<String> {
        let info = self.connect(request).await?;
        progress.connected(&info);
        self.record(format!("sign_message:{}", message));
        Ok(format!("{}-signature", self.name))
    }

    async fn sign_typed_data(
        &self,
        request: &WalletRequest,
        _typed_data: &TypedData,
        progress: &Progress,
    ) -> BridgeResult<String> {
        let info = self.connect(request).await?;
        progress.connected(&info);
        self.record("sign_typed_data");
        Ok(format!("{}-typed-signature", self.name))
    }

    async fn send(
        &self,
        request: &WalletTransactionRequest,
        progress: &Progress,
    ) -> BridgeResult<String> {
        let info = self.connect(&request.wallet_request).await?;
        progress.connected(&info);
        self.record("send");
        Ok("0xhash".into())
    }

    async fn add_chain(
        &self,
        request: &WalletRequest,
        chain: &AddChainRequest,
        _progress: &Progress,
    ) -> BridgeResult<String> {
        self.record(format!(
            "add_chain:{:?}:{:?}",
            request.chain_id, request.address
        ));
        Ok(chain.chain_id.clone())
    }

    async fn handle_response(&self, uri: &Url) -> bool {
        self.record("handle_response");
        if let Some(gate) = &self.response_gate {
            gate.notified().await;
            self.record("handle_response:done");
        }
        uri.as_str().contains(&self.name)
    }
}
