//! Relay/session protocol (WalletConnect v2)
//!
//! Connect creates a pairing, proposes an `eip155` session over it and hands
//! the pairing URI to the wallet. The wallet's approval, rejection and
//! request responses arrive later as [`RelayEvent`]s.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use indexmap::IndexMap;
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::Url;
use wallet_catalog::{wallet_link, ConnectionType};

use super::relay::{
    ApprovedSession, ConnectParams, JsonRpcResult, NamespaceProposal, Pairing, RelayEvent,
    RelayTransport, SessionRequest, SessionResponse,
};
use crate::chain::{AccountId, ChainId};
use crate::config::WalletConnectConfig;
use crate::error::{Result, WalletError};
use crate::handler::{ConnectionHandler, DeepLinkOpener};
use crate::operation::Progress;
use crate::pending::{wait, PendingTable};
use crate::request::{AddChainRequest, TypedData, WalletRequest, WalletTransactionRequest};
use crate::status::{StatusCell, WalletInfo, WalletState, WalletStatus, WalletStatusDelegate};

const NAMESPACE: &str = "eip155";
const METHODS: &[&str] = &["personal_sign", "eth_sendTransaction", "eth_signTypedData"];
const OPTIONAL_METHODS: &[&str] = &["wallet_addEthereumChain"];
const EVENTS: &[&str] = &["accountsChanged", "chainChanged"];

#[derive(Default)]
struct WalletConnectState {
    status: StatusCell,
    /// Request that started the current handshake
    requesting: Option<WalletRequest>,
    pairing: Option<Pairing>,
    session: Option<ApprovedSession>,
    connect_waiters: PendingTable<(), WalletInfo>,
    /// Keyed by session topic
    operations: PendingTable<String, String>,
}

impl WalletConnectState {
    /// Clear session and waiters. Returns the pairing to tear down.
    fn reset(&mut self) -> Option<Pairing> {
        self.requesting = None;
        self.session = None;
        let dropped = self.connect_waiters.clear() + self.operations.clear();
        if dropped > 0 {
            debug!("Dropped {} pending WalletConnect requests", dropped);
        }
        self.status.reset();
        self.pairing.take()
    }
}

/// Where a handshake stands once the proposal has been sent
enum Proposal {
    Waiting,
    AlreadyApproved,
    Abandoned,
}

/// Handler for the relay/session protocol
pub struct WalletConnectHandler {
    config: WalletConnectConfig,
    transport: Arc<dyn RelayTransport>,
    opener: Arc<dyn DeepLinkOpener>,
    state: Mutex<WalletConnectState>,
}

impl WalletConnectHandler {
    pub fn new(
        config: WalletConnectConfig,
        transport: Arc<dyn RelayTransport>,
        opener: Arc<dyn DeepLinkOpener>,
    ) -> Self {
        Self {
            config,
            transport,
            opener,
            state: Mutex::new(WalletConnectState::default()),
        }
    }

    /// Feed relay events to this handler until the sender side is dropped
    pub fn spawn_event_listener(
        self: &Arc<Self>,
        mut events: mpsc::UnboundedReceiver<RelayEvent>,
    ) -> JoinHandle<()> {
        let handler = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                handler.handle_event(event).await;
            }
            debug!("Relay event stream closed");
        })
    }

    pub async fn handle_event(&self, event: RelayEvent) {
        match event {
            RelayEvent::SessionApproved(session) => self.on_session_approved(session).await,
            RelayEvent::SessionRejected { reason } => self.on_session_rejected(reason).await,
            RelayEvent::SessionDeleted { topic } => self.on_session_deleted(&topic).await,
            RelayEvent::SessionResponse(response) => self.on_session_response(response).await,
        }
    }

    fn requested_chain(&self, request: &WalletRequest) -> Result<ChainId> {
        let chain = request
            .chain_id
            .as_deref()
            .unwrap_or(&self.config.default_chain_id);
        if chain.contains(':') {
            chain.parse()
        } else {
            ChainId::eip155(chain)
        }
    }

    fn connect_params(&self, pairing_topic: &str, chain: &ChainId) -> ConnectParams {
        let to_strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();

        let mut required_namespaces = IndexMap::new();
        required_namespaces.insert(
            NAMESPACE.to_string(),
            NamespaceProposal {
                chains: vec![chain.to_string()],
                methods: to_strings(METHODS),
                events: to_strings(EVENTS),
            },
        );

        let mut optional_namespaces = IndexMap::new();
        optional_namespaces.insert(
            NAMESPACE.to_string(),
            NamespaceProposal {
                chains: vec![chain.to_string()],
                methods: to_strings(OPTIONAL_METHODS),
                events: Vec::new(),
            },
        );

        let expiry = Utc::now() + Duration::days(i64::from(self.config.session_expiry_days));
        let mut session_properties = IndexMap::new();
        session_properties.insert("sessionExpiry".to_string(), expiry.timestamp().to_string());

        ConnectParams {
            pairing_topic: pairing_topic.to_string(),
            required_namespaces,
            optional_namespaces,
            session_properties,
        }
    }

    async fn start_handshake(&self, request: &WalletRequest) -> Result<()> {
        let chain = self.requested_chain(request)?;

        let pairing = self.transport.create_pairing().await.map_err(|e| {
            error!("Failed to create pairing: {}", e);
            WalletError::ConnectionFailed(e.to_string())
        })?;
        debug!("Created pairing {}", pairing.topic);

        if let Err(e) = self
            .transport
            .connect(self.connect_params(&pairing.topic, &chain))
            .await
        {
            error!("Failed to propose session: {}", e);
            self.teardown_pairing(&pairing).await;
            return Err(WalletError::ConnectionFailed(e.to_string()));
        }

        let proposal = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;

            if state.status.state() == WalletState::ConnectedToWallet {
                state.pairing = Some(pairing.clone());
                Proposal::AlreadyApproved
            } else if !state.connect_waiters.is_pending(&()) {
                Proposal::Abandoned
            } else {
                state.pairing = Some(pairing.clone());
                state.status.update(|status| {
                    status.state = WalletState::ConnectedToServer;
                    status.connection_deeplink = Some(pairing.deeplink());
                    if request.wallet.is_some() {
                        status.connected_wallet = Some(WalletInfo::pending(request));
                    }
                });
                Proposal::Waiting
            }
        };

        match proposal {
            Proposal::Waiting => {
                info!("Waiting for a wallet to approve pairing {}", pairing.topic);
                self.open_wallet(request, Some(&pairing.uri));
            }
            Proposal::AlreadyApproved => {}
            Proposal::Abandoned => {
                debug!("Handshake abandoned, tearing down pairing {}", pairing.topic);
                self.teardown_pairing(&pairing).await;
            }
        }
        Ok(())
    }

    /// The connected session, if it serves `request`. A session that does not
    /// is torn down.
    async fn reusable_session(&self, request: &WalletRequest) -> Option<WalletInfo> {
        {
            let state = self.state.lock().await;
            if state.status.state() != WalletState::ConnectedToWallet {
                return None;
            }
            if let Some(info) = state
                .status
                .get()
                .connected_wallet
                .as_ref()
                .filter(|info| info.satisfies(request))
            {
                return Some(info.clone());
            }
        }

        info!("WalletConnect session does not match the request, reconnecting");
        self.disconnect().await;
        None
    }

    /// Open the wallet app, with the pairing URI when there is one
    fn open_wallet(&self, request: &WalletRequest, pairing_uri: Option<&str>) -> bool {
        let Some(wallet) = request.wallet.as_ref() else {
            debug!("No wallet selected, waiting for any wallet to pair");
            return false;
        };

        let installed = self.opener.is_installed(wallet);
        match wallet_link(wallet, pairing_uri, &ConnectionType::WalletConnectV2, installed) {
            Some(link) => {
                let opened = self.opener.open(&link);
                if !opened {
                    debug!("No app can open {}", link);
                }
                opened
            }
            None => {
                debug!("No link to open {}", wallet.name);
                false
            }
        }
    }

    async fn teardown_pairing(&self, pairing: &Pairing) {
        if let Err(e) = self.transport.disconnect_pairing(&pairing.topic).await {
            error!("Failed to disconnect pairing {}: {}", pairing.topic, e);
        }
    }

    fn verify_session(
        &self,
        session: &ApprovedSession,
        request: &WalletRequest,
    ) -> Result<WalletInfo> {
        let account = session
            .account()
            .ok_or(WalletError::WalletContainsNoAccount)?;

        if let Some(requested) = request.chain_id.as_deref() {
            if !account.chain().matches(requested) {
                return Err(WalletError::WalletMismatch(format!(
                    "Wallet approved {} but chain {} was requested",
                    account.chain(),
                    requested
                )));
            }
        }

        if let Some(expected) = request.address.as_deref() {
            if !expected.eq_ignore_ascii_case(account.address()) {
                return Err(WalletError::WalletMismatch(format!(
                    "Wallet approved account {} but {} was requested",
                    account.address(),
                    expected
                )));
            }
        }

        Ok(WalletInfo {
            address: Some(account.address().to_string()),
            chain_id: Some(account.chain().reference().to_string()),
            wallet: request.wallet.clone(),
            peer_name: session.peer.as_ref().map(|p| p.name.clone()),
            peer_image_url: session.peer.as_ref().and_then(|p| p.icons.first().cloned()),
        })
    }

    async fn on_session_approved(&self, session: ApprovedSession) {
        let stale = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;

            if !state.connect_waiters.is_pending(&()) {
                warn!("Ignoring session approval with no pending connect");
                return;
            }

            let request = state.requesting.take().unwrap_or_default();
            match self.verify_session(&session, &request) {
                Ok(info) => {
                    info!(
                        "WalletConnect session {} approved by {}",
                        session.topic,
                        info.peer_name.as_deref().unwrap_or("wallet")
                    );
                    state.session = Some(session);
                    state.status.update(|status| {
                        status.state = WalletState::ConnectedToWallet;
                        status.connected_wallet = Some(info.clone());
                        status.connection_deeplink = None;
                    });
                    state.connect_waiters.resolve(&(), Ok(info));
                    None
                }
                Err(e) => {
                    warn!("Discarding approved session: {}", e);
                    state.session = None;
                    state.status.reset();
                    state.connect_waiters.resolve(&(), Err(e));
                    state.pairing.take()
                }
            }
        };

        if let Some(pairing) = stale {
            self.teardown_pairing(&pairing).await;
        }
    }

    async fn on_session_rejected(&self, reason: String) {
        let stale = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;

            if !state.connect_waiters.is_pending(&()) {
                warn!("Ignoring session rejection with no pending connect");
                return;
            }

            info!("WalletConnect session rejected: {}", reason);
            state.requesting = None;
            state.session = None;
            state.status.reset();
            state
                .connect_waiters
                .resolve(&(), Err(WalletError::RefusedByWallet(reason)));
            state.pairing.take()
        };

        if let Some(pairing) = stale {
            self.teardown_pairing(&pairing).await;
        }
    }

    async fn on_session_deleted(&self, topic: &str) {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        if state.session.as_ref().map(|s| s.topic.as_str()) != Some(topic) {
            debug!("Ignoring deletion of unknown session {}", topic);
            return;
        }

        info!("WalletConnect session {} deleted by the wallet", topic);
        state.session = None;
        state.status.reset();
        state
            .operations
            .resolve(&topic.to_string(), Err(WalletError::InvalidSession));
    }

    async fn on_session_response(&self, response: SessionResponse) {
        let result = match response.result {
            JsonRpcResult::Result(value) => Ok(value),
            JsonRpcResult::Error { code, message } => Err(WalletError::UnexpectedResponse(
                format!("{} ({})", message, code),
            )),
        };

        let mut state = self.state.lock().await;
        if state.operations.resolve(&response.topic, result) == 0 {
            warn!(
                "Response {} on {} has no pending request",
                response.id, response.topic
            );
        }
    }

    async fn perform<F>(&self, request: &WalletRequest, progress: &Progress, build: F) -> Result<String>
    where
        F: FnOnce(&AccountId) -> Result<(&'static str, Value)> + Send,
    {
        let info = self.connect(request).await?;
        progress.connected(&info);

        let (session_request, rx) = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;

            let Some(session) = state.session.as_ref() else {
                return Err(WalletError::InvalidSession);
            };
            let account = session.account().ok_or(WalletError::InvalidSession)?;

            if state.operations.is_pending(&session.topic) {
                return Err(WalletError::ConnectionFailed(
                    "A request is already waiting for the wallet on this session".to_string(),
                ));
            }

            let (method, params) = build(&account)?;
            let session_request = SessionRequest {
                topic: session.topic.clone(),
                chain_id: account.chain().to_string(),
                method: method.to_string(),
                params,
            };
            let rx = state.operations.register(session.topic.clone());
            (session_request, rx)
        };

        let topic = session_request.topic.clone();
        debug!("Sending {} on session {}", session_request.method, topic);

        match self.transport.request(session_request).await {
            Ok(id) => {
                debug!("Submitted request {}", id);
                self.open_wallet(request, None);
                progress.needs_app_switch();
            }
            Err(e) => {
                error!("Failed to submit request: {}", e);
                self.state
                    .lock()
                    .await
                    .operations
                    .resolve(&topic, Err(WalletError::ConnectionFailed(e.to_string())));
            }
        }

        wait(rx).await
    }
}

#[async_trait]
impl ConnectionHandler for WalletConnectHandler {
    fn connection_type(&self) -> ConnectionType {
        ConnectionType::WalletConnectV2
    }

    async fn status(&self) -> WalletStatus {
        self.state.lock().await.status.get().clone()
    }

    async fn set_status_delegate(&self, delegate: Option<Arc<dyn WalletStatusDelegate>>) {
        self.state.lock().await.status.set_delegate(delegate);
    }

    async fn connect(&self, request: &WalletRequest) -> Result<WalletInfo> {
        if let Some(info) = self.reusable_session(request).await {
            return Ok(info);
        }

        let (rx, start) = {
            let mut state = self.state.lock().await;
            if state.connect_waiters.is_pending(&()) {
                debug!("Joining in-flight WalletConnect handshake");
                (state.connect_waiters.register(()), false)
            } else {
                state.requesting = Some(request.clone());
                (state.connect_waiters.register(()), true)
            }
        };

        if start {
            if let Err(e) = self.start_handshake(request).await {
                let mut state = self.state.lock().await;
                state.requesting = None;
                state.status.reset();
                state.connect_waiters.resolve(&(), Err(e));
            }
        }

        wait(rx).await
    }

    async fn disconnect(&self) {
        let pairing = self.state.lock().await.reset();
        if let Some(pairing) = pairing {
            info!("Disconnecting pairing {}", pairing.topic);
            self.teardown_pairing(&pairing).await;
        }
    }

    async fn sign_message(
        &self,
        request: &WalletRequest,
        message: &str,
        progress: &Progress,
    ) -> Result<String> {
        self.perform(request, progress, |account| {
            Ok(("personal_sign", json!([message, account.address()])))
        })
        .await
    }

    async fn sign_typed_data(
        &self,
        request: &WalletRequest,
        typed_data: &TypedData,
        progress: &Progress,
    ) -> Result<String> {
        self.perform(request, progress, |account| {
            Ok((
                "eth_signTypedData",
                json!([account.address(), typed_data.as_value()]),
            ))
        })
        .await
    }

    async fn send(&self, request: &WalletTransactionRequest, progress: &Progress) -> Result<String> {
        let transaction = request.as_ethereum().ok_or_else(|| {
            WalletError::InvalidInput("WalletConnect requires an Ethereum transaction".to_string())
        })?;
        let transaction = transaction.to_json_rpc()?;

        self.perform(&request.wallet_request, progress, move |_| {
            Ok(("eth_sendTransaction", json!([transaction])))
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

        self.perform(request, progress, move |_| {
            Ok(("wallet_addEthereumChain", json!([{ "chainId": chain_id }])))
        })
        .await
    }

    async fn handle_response(&self, _uri: &Url) -> bool {
        // Answers arrive as relay events, never as callback URIs
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::providers::relay::PeerMetadata;
    use crate::request::EthereumTransactionRequest;
    use crate::testing::{relay_wallet, wait_until, RecordingDelegate, RecordingOpener, ScriptedRelay};

    fn handler(
        relay: Arc<ScriptedRelay>,
        opener: Arc<RecordingOpener>,
    ) -> Arc<WalletConnectHandler> {
        let config = WalletConnectConfig::new("project", "Dapp");
        Arc::new(WalletConnectHandler::new(config, relay, opener))
    }

    fn request(chain_id: &str) -> WalletRequest {
        WalletRequest::new(Some(relay_wallet())).with_chain_id(chain_id)
    }

    fn approved(account: &str) -> RelayEvent {
        RelayEvent::SessionApproved(ApprovedSession {
            topic: "session-1".into(),
            accounts: vec![account.into()],
            peer: Some(PeerMetadata {
                name: "MetaMask Wallet".into(),
                icons: vec!["https://metamask.io/icon.png".into()],
                ..Default::default()
            }),
        })
    }

    fn response(result: JsonRpcResult) -> RelayEvent {
        RelayEvent::SessionResponse(SessionResponse {
            topic: "session-1".into(),
            id: 1,
            result,
        })
    }

    async fn connected(handler: &Arc<WalletConnectHandler>, relay: &ScriptedRelay) -> WalletInfo {
        let task = {
            let handler = Arc::clone(handler);
            tokio::spawn(async move { handler.connect(&request("1")).await })
        };
        wait_until(|| relay.connects().len() == 1).await;
        handler.handle_event(approved("eip155:1:0xAbC")).await;
        task.await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_connect_proposes_session_and_opens_wallet() {
        let relay = Arc::new(ScriptedRelay::default());
        let opener = Arc::new(RecordingOpener::default());
        let delegate = Arc::new(RecordingDelegate::default());
        let handler = handler(relay.clone(), opener.clone());
        handler.set_status_delegate(Some(delegate.clone())).await;

        let task = {
            let handler = Arc::clone(&handler);
            tokio::spawn(async move { handler.connect(&request("1")).await })
        };
        wait_until(|| !opener.opened().is_empty()).await;

        let params = relay.connects()[0].clone();
        assert_eq!(params.pairing_topic, "pairing-1");
        let required = &params.required_namespaces["eip155"];
        assert_eq!(required.chains, vec!["eip155:1"]);
        assert_eq!(
            required.methods,
            vec!["personal_sign", "eth_sendTransaction", "eth_signTypedData"]
        );
        assert_eq!(required.events, vec!["accountsChanged", "chainChanged"]);
        assert_eq!(
            params.optional_namespaces["eip155"].methods,
            vec!["wallet_addEthereumChain"]
        );

        let expiry: i64 = params.session_properties["sessionExpiry"].parse().unwrap();
        let expected = (Utc::now() + Duration::days(7)).timestamp();
        assert!((expiry - expected).abs() < 60);

        let status = handler.status().await;
        assert_eq!(status.state, WalletState::ConnectedToServer);
        assert_eq!(
            status.connection_deeplink.as_deref(),
            Some("wc://pairing-1@2?relay-protocol=irn&symKey=abc")
        );
        assert!(opener.opened()[0]
            .as_str()
            .starts_with("https://metamask.app.link/wc?uri=wc:pairing-1"));

        handler.handle_event(approved("eip155:1:0xAbC")).await;
        let info = task.await.unwrap().unwrap();

        assert_eq!(info.address.as_deref(), Some("0xAbC"));
        assert_eq!(info.chain_id.as_deref(), Some("1"));
        assert_eq!(info.peer_name.as_deref(), Some("MetaMask Wallet"));
        assert_eq!(
            info.peer_image_url.as_deref(),
            Some("https://metamask.io/icon.png")
        );
        assert_eq!(
            delegate.states(),
            vec![WalletState::ConnectedToServer, WalletState::ConnectedToWallet]
        );
    }

    #[tokio::test]
    async fn test_concurrent_connects_share_one_handshake() {
        let relay = Arc::new(ScriptedRelay::default());
        let opener = Arc::new(RecordingOpener::default());
        let handler = handler(relay.clone(), opener);

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let handler = Arc::clone(&handler);
                tokio::spawn(async move { handler.connect(&request("1")).await })
            })
            .collect();
        wait_until(|| relay.connects().len() == 1).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        handler.handle_event(approved("eip155:1:0xAbC")).await;

        let mut results = 0;
        for task in tasks {
            assert!(task.await.unwrap().is_ok());
            results += 1;
        }
        assert_eq!(results, 4);
        assert_eq!(relay.pairings(), 1);
    }

    #[tokio::test]
    async fn test_chain_mismatch_fails_every_waiter() {
        let relay = Arc::new(ScriptedRelay::default());
        let opener = Arc::new(RecordingOpener::default());
        let handler = handler(relay.clone(), opener);

        let tasks: Vec<_> = (0..2)
            .map(|_| {
                let handler = Arc::clone(&handler);
                tokio::spawn(async move { handler.connect(&request("1")).await })
            })
            .collect();
        wait_until(|| relay.connects().len() == 1).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        handler.handle_event(approved("eip155:5:0xAbC")).await;

        for task in tasks {
            let err = task.await.unwrap().unwrap_err();
            assert_eq!(err.code(), ErrorCode::WalletMismatch);
        }
        assert_eq!(handler.status().await, WalletStatus::default());
        assert_eq!(relay.disconnected(), vec!["pairing-1"]);
        assert!(relay.requests().is_empty());
    }

    #[tokio::test]
    async fn test_any_chain_accepted_when_none_requested() {
        let relay = Arc::new(ScriptedRelay::default());
        let opener = Arc::new(RecordingOpener::default());
        let handler = handler(relay.clone(), opener);

        let task = {
            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                handler
                    .connect(&WalletRequest::new(Some(relay_wallet())))
                    .await
            })
        };
        wait_until(|| relay.connects().len() == 1).await;
        // the proposal still scopes to the default chain
        assert_eq!(
            relay.connects()[0].required_namespaces["eip155"].chains,
            vec!["eip155:5"]
        );

        handler.handle_event(approved("eip155:1:0xAbC")).await;

        let info = task.await.unwrap().unwrap();
        assert_eq!(info.chain_id.as_deref(), Some("1"));
        assert_eq!(
            handler.status().await.state,
            WalletState::ConnectedToWallet
        );
        assert!(relay.disconnected().is_empty());
    }

    #[tokio::test]
    async fn test_rejection_is_refused_by_wallet() {
        let relay = Arc::new(ScriptedRelay::default());
        let opener = Arc::new(RecordingOpener::default());
        let handler = handler(relay.clone(), opener);

        let task = {
            let handler = Arc::clone(&handler);
            tokio::spawn(async move { handler.connect(&request("1")).await })
        };
        wait_until(|| relay.connects().len() == 1).await;

        handler
            .handle_event(RelayEvent::SessionRejected {
                reason: "User rejected".into(),
            })
            .await;

        let err = task.await.unwrap().unwrap_err();
        assert_eq!(err, WalletError::RefusedByWallet("User rejected".into()));
        assert_eq!(handler.status().await.state, WalletState::Idle);
    }

    #[tokio::test]
    async fn test_session_without_accounts() {
        let relay = Arc::new(ScriptedRelay::default());
        let opener = Arc::new(RecordingOpener::default());
        let handler = handler(relay.clone(), opener);

        let task = {
            let handler = Arc::clone(&handler);
            tokio::spawn(async move { handler.connect(&request("1")).await })
        };
        wait_until(|| relay.connects().len() == 1).await;

        handler
            .handle_event(RelayEvent::SessionApproved(ApprovedSession {
                topic: "session-1".into(),
                accounts: vec![],
                peer: None,
            }))
            .await;

        let err = task.await.unwrap().unwrap_err();
        assert_eq!(err.code(), ErrorCode::WalletContainsNoAccount);
    }

    #[tokio::test]
    async fn test_proposal_failure_is_connection_failed() {
        let relay = Arc::new(ScriptedRelay::default());
        relay.fail_connect();
        let opener = Arc::new(RecordingOpener::default());
        let handler = handler(relay.clone(), opener.clone());

        let err = handler.connect(&request("1")).await.unwrap_err();

        assert_eq!(err.code(), ErrorCode::ConnectionFailed);
        assert_eq!(handler.status().await.state, WalletState::Idle);
        assert_eq!(relay.disconnected(), vec!["pairing-1"]);
        assert!(opener.opened().is_empty());
    }

    #[tokio::test]
    async fn test_debug_pairing_opens_nothing() {
        let relay = Arc::new(ScriptedRelay::default());
        let opener = Arc::new(RecordingOpener::default());
        let handler = handler(relay.clone(), opener.clone());

        let task = {
            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                handler
                    .connect(&WalletRequest::default().with_chain_id("5"))
                    .await
            })
        };
        wait_until(|| relay.connects().len() == 1).await;

        let status = handler.status().await;
        assert_eq!(status.state, WalletState::ConnectedToServer);
        assert!(status.connected_wallet.is_none());
        assert!(opener.opened().is_empty());

        handler.handle_event(approved("eip155:5:0xAbC")).await;
        let info = task.await.unwrap().unwrap();
        assert!(info.wallet.is_none());
    }

    #[tokio::test]
    async fn test_sign_message_round_trip() {
        let relay = Arc::new(ScriptedRelay::default());
        let opener = Arc::new(RecordingOpener::default());
        let handler = handler(relay.clone(), opener.clone());
        connected(&handler, &relay).await;

        let task = {
            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                handler
                    .sign_message(&request("1"), "hello", &Progress::silent())
                    .await
            })
        };
        wait_until(|| relay.requests().len() == 1).await;

        let sent = relay.requests()[0].clone();
        assert_eq!(sent.topic, "session-1");
        assert_eq!(sent.chain_id, "eip155:1");
        assert_eq!(sent.method, "personal_sign");
        assert_eq!(sent.params, json!(["hello", "0xAbC"]));

        handler
            .handle_event(response(JsonRpcResult::Result("0xsig".into())))
            .await;
        assert_eq!(task.await.unwrap().unwrap(), "0xsig");
    }

    #[tokio::test]
    async fn test_json_rpc_error_is_unexpected_response() {
        let relay = Arc::new(ScriptedRelay::default());
        let opener = Arc::new(RecordingOpener::default());
        let handler = handler(relay.clone(), opener);
        connected(&handler, &relay).await;

        let task = {
            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                let typed = TypedData::new(json!({"primaryType": "Mail"}));
                handler
                    .sign_typed_data(&request("1"), &typed, &Progress::silent())
                    .await
            })
        };
        wait_until(|| relay.requests().len() == 1).await;
        assert_eq!(relay.requests()[0].method, "eth_signTypedData");
        assert_eq!(
            relay.requests()[0].params,
            json!(["0xAbC", {"primaryType": "Mail"}])
        );

        handler
            .handle_event(response(JsonRpcResult::Error {
                code: 4001,
                message: "User rejected".into(),
            }))
            .await;

        let err = task.await.unwrap().unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnexpectedResponse);
    }

    #[tokio::test]
    async fn test_send_builds_transaction_object() {
        let relay = Arc::new(ScriptedRelay::default());
        let opener = Arc::new(RecordingOpener::default());
        let handler = handler(relay.clone(), opener);
        connected(&handler, &relay).await;

        let tx = EthereumTransactionRequest {
            from_address: "0xAbC".into(),
            to_address: Some("0xdef".into()),
            wei_value: 16,
            data: "0x".into(),
            chain_id: "1".into(),
            ..Default::default()
        };
        let task = {
            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                handler
                    .send(
                        &WalletTransactionRequest::ethereum(request("1"), tx),
                        &Progress::silent(),
                    )
                    .await
            })
        };
        wait_until(|| relay.requests().len() == 1).await;

        let sent = relay.requests()[0].clone();
        assert_eq!(sent.method, "eth_sendTransaction");
        assert_eq!(sent.params[0]["to"], "0xdef");
        assert_eq!(sent.params[0]["value"], "0x10");

        handler
            .handle_event(response(JsonRpcResult::Result("0xhash".into())))
            .await;
        assert_eq!(task.await.unwrap().unwrap(), "0xhash");
    }

    #[tokio::test]
    async fn test_solana_payload_is_invalid_input() {
        let relay = Arc::new(ScriptedRelay::default());
        let opener = Arc::new(RecordingOpener::default());
        let handler = handler(relay.clone(), opener);

        let request = WalletTransactionRequest::solana(request("1"), vec![1]);
        let err = handler.send(&request, &Progress::silent()).await.unwrap_err();

        assert_eq!(err.code(), ErrorCode::InvalidInput);
        assert_eq!(relay.pairings(), 0);
    }

    #[tokio::test]
    async fn test_add_chain_request() {
        let relay = Arc::new(ScriptedRelay::default());
        let opener = Arc::new(RecordingOpener::default());
        let handler = handler(relay.clone(), opener);
        connected(&handler, &relay).await;

        let task = {
            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                handler
                    .add_chain(
                        &WalletRequest::new(Some(relay_wallet())),
                        &AddChainRequest::new("137"),
                        &Progress::silent(),
                    )
                    .await
            })
        };
        wait_until(|| relay.requests().len() == 1).await;
        assert_eq!(relay.requests()[0].method, "wallet_addEthereumChain");
        assert_eq!(relay.requests()[0].params, json!([{"chainId": "0x89"}]));

        handler
            .handle_event(response(JsonRpcResult::Result("null".into())))
            .await;
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_session_deleted_fails_pending_request() {
        let relay = Arc::new(ScriptedRelay::default());
        let opener = Arc::new(RecordingOpener::default());
        let handler = handler(relay.clone(), opener);
        connected(&handler, &relay).await;

        let task = {
            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                handler
                    .sign_message(&request("1"), "hello", &Progress::silent())
                    .await
            })
        };
        wait_until(|| relay.requests().len() == 1).await;

        handler
            .handle_event(RelayEvent::SessionDeleted {
                topic: "session-1".into(),
            })
            .await;

        assert_eq!(
            task.await.unwrap().unwrap_err(),
            WalletError::InvalidSession
        );
        assert_eq!(handler.status().await.state, WalletState::Idle);
    }

    #[tokio::test]
    async fn test_disconnect_drops_pending_and_ignores_late_response() {
        let relay = Arc::new(ScriptedRelay::default());
        let opener = Arc::new(RecordingOpener::default());
        let handler = handler(relay.clone(), opener);
        connected(&handler, &relay).await;

        let task = {
            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                handler
                    .sign_message(&request("1"), "hello", &Progress::silent())
                    .await
            })
        };
        wait_until(|| relay.requests().len() == 1).await;

        handler.disconnect().await;
        assert_eq!(
            task.await.unwrap().unwrap_err().code(),
            ErrorCode::ConnectionFailed
        );
        assert_eq!(relay.disconnected(), vec!["pairing-1"]);

        handler
            .handle_event(response(JsonRpcResult::Result("late".into())))
            .await;
        assert_eq!(handler.status().await, WalletStatus::default());

        // Disconnect is idempotent
        handler.disconnect().await;
        assert_eq!(relay.disconnected().len(), 1);
    }

    #[tokio::test]
    async fn test_request_submission_failure() {
        let relay = Arc::new(ScriptedRelay::default());
        let opener = Arc::new(RecordingOpener::default());
        let handler = handler(relay.clone(), opener);
        connected(&handler, &relay).await;
        relay.fail_requests();

        let err = handler
            .sign_message(&request("1"), "hello", &Progress::silent())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ConnectionFailed);
    }

    #[tokio::test]
    async fn test_event_listener_pumps_events() {
        let relay = Arc::new(ScriptedRelay::default());
        let opener = Arc::new(RecordingOpener::default());
        let handler = handler(relay.clone(), opener);
        let (tx, rx) = mpsc::unbounded_channel();
        let listener = handler.spawn_event_listener(rx);

        let task = {
            let handler = Arc::clone(&handler);
            tokio::spawn(async move { handler.connect(&request("1")).await })
        };
        wait_until(|| relay.connects().len() == 1).await;

        tx.send(approved("eip155:1:0xAbC")).unwrap();
        assert!(task.await.unwrap().is_ok());

        drop(tx);
        listener.await.unwrap();
    }
}
