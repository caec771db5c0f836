//! Facade routing every request to the handler for its protocol
//!
//! Exactly one handler is current. Switching handlers disconnects the old
//! one first, and inbound callbacks only ever reach the current handler.

use std::sync::Arc;

use futures::Stream;
use tokio::sync::RwLock;
use tracing::{debug, info};
use url::Url;
use wallet_catalog::ConnectionType;

use crate::consent::{ConsentHandler, ConsentStatus, SkippedConsent};
use crate::error::{Result, WalletError};
use crate::handler::Handler;
use crate::operation::{operation_events, OperationEvent, Progress};
use crate::registry::ConnectionRegistry;
use crate::request::{AddChainRequest, TypedData, WalletRequest, WalletTransactionRequest};
use crate::status::{WalletInfo, WalletState, WalletStatus, WalletStatusDelegate};

struct Current {
    connection_type: ConnectionType,
    handler: Handler,
}

/// Routes requests to the registered handlers
pub struct ConnectionRouter {
    registry: Arc<ConnectionRegistry>,
    current: RwLock<Option<Current>>,
    status_delegate: RwLock<Option<Arc<dyn WalletStatusDelegate>>>,
}

impl ConnectionRouter {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            registry,
            current: RwLock::new(None),
            status_delegate: RwLock::new(None),
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Modal override, else the wallet's own protocol, else the debug protocol
    fn desired_type(&self, request: &WalletRequest) -> ConnectionType {
        if request.use_modal {
            ConnectionType::WalletConnectModal
        } else if let Some(wallet) = &request.wallet {
            wallet.connection_type()
        } else {
            self.registry.debug_type().clone()
        }
    }

    fn consent_for(&self, connection_type: &ConnectionType) -> Arc<dyn ConsentHandler> {
        self.registry
            .consent_handler(connection_type)
            .unwrap_or_else(|| Arc::new(SkippedConsent))
    }

    /// Make the handler for `request` current and return it
    async fn route(&self, request: &WalletRequest) -> Result<Handler> {
        let connection_type = self.desired_type(request);
        let handler = self.registry.handler(&connection_type).ok_or_else(|| {
            WalletError::ConnectionFailed(format!(
                "No handler registered for {}",
                connection_type
            ))
        })?;

        let mut current = self.current.write().await;

        let swap = current
            .as_ref()
            .map_or(true, |c| !c.handler.same_as(&handler));
        if swap {
            if let Some(old) = current.take() {
                info!(
                    "Switching from {} to {}",
                    old.connection_type, connection_type
                );
                old.handler.as_handler().disconnect().await;
                old.handler.as_handler().set_status_delegate(None).await;
            }

            if let Some(delegate) = self.status_delegate.read().await.clone() {
                handler.as_handler().set_status_delegate(Some(delegate)).await;
            }
            *current = Some(Current {
                connection_type,
                handler: handler.clone(),
            });
        }

        let status = handler.as_handler().status().await;
        if status.state != WalletState::Idle {
            let connected = status.connected_wallet.as_ref().and_then(|w| w.wallet_id());
            if connected != request.wallet_id() {
                debug!(
                    "Requested wallet {:?} differs from connected {:?}, disconnecting",
                    request.wallet_id(),
                    connected
                );
                handler.as_handler().disconnect().await;
            }
        }

        Ok(handler)
    }

    pub async fn connect(&self, request: &WalletRequest) -> Result<WalletInfo> {
        let handler = self.route(request).await?;
        handler.as_handler().connect(request).await
    }

    /// Connect through the debug protocol with no wallet, e.g. to show a
    /// pairing QR code any wallet can scan
    pub async fn start_debug_link(&self, chain_id: Option<&str>) -> Result<WalletInfo> {
        let mut request = WalletRequest::new(None);
        request.chain_id = chain_id.map(String::from);
        self.connect(&request).await
    }

    pub async fn disconnect(&self) {
        let handler = self.current.read().await.as_ref().map(|c| c.handler.clone());
        if let Some(handler) = handler {
            handler.as_handler().disconnect().await;
        }
    }

    pub async fn sign_message(
        &self,
        request: &WalletRequest,
        message: &str,
        progress: &Progress,
    ) -> Result<String> {
        let handler = self.route(request).await?;
        handler
            .as_handler()
            .sign_message(request, message, progress)
            .await
    }

    pub async fn sign_typed_data(
        &self,
        request: &WalletRequest,
        typed_data: &TypedData,
        progress: &Progress,
    ) -> Result<String> {
        let handler = self.route(request).await?;
        handler
            .as_handler()
            .sign_typed_data(request, typed_data, progress)
            .await
    }

    /// Ask for consent, then forward the transaction unchanged
    pub async fn send(&self, request: &WalletTransactionRequest, progress: &Progress) -> Result<String> {
        let connection_type = self.desired_type(&request.wallet_request);
        let consent = self.consent_for(&connection_type);

        match consent.request_consent(request).await {
            ConsentStatus::Consented => {}
            ConsentStatus::Rejected => {
                info!("Transaction declined by the user");
                return Err(WalletError::UserCanceled);
            }
        }

        let handler = self.route(&request.wallet_request).await?;
        handler.as_handler().send(request, progress).await
    }

    /// Forwarded without chain id or address
    pub async fn add_chain(
        &self,
        request: &WalletRequest,
        chain: &AddChainRequest,
        progress: &Progress,
    ) -> Result<String> {
        let request = request.without_chain();
        let handler = self.route(&request).await?;
        handler.as_handler().add_chain(&request, chain, progress).await
    }

    /// Offer a callback URI to the current handler only
    pub async fn handle_response(&self, uri: &Url) -> bool {
        let current = self.current.read().await;
        match current.as_ref() {
            Some(current) => current.handler.as_handler().handle_response(uri).await,
            None => {
                debug!("No current handler for callback");
                false
            }
        }
    }

    /// Status of the current handler
    pub async fn status(&self) -> WalletStatus {
        let handler = self.current.read().await.as_ref().map(|c| c.handler.clone());
        match handler {
            Some(handler) => handler.as_handler().status().await,
            None => WalletStatus::default(),
        }
    }

    pub async fn current_connection_type(&self) -> Option<ConnectionType> {
        self.current
            .read()
            .await
            .as_ref()
            .map(|c| c.connection_type.clone())
    }

    /// Receive the status changes of whichever handler is current
    pub async fn set_status_delegate(&self, delegate: Option<Arc<dyn WalletStatusDelegate>>) {
        *self.status_delegate.write().await = delegate.clone();
        if let Some(current) = self.current.read().await.as_ref() {
            current.handler.as_handler().set_status_delegate(delegate).await;
        }
    }

    pub fn sign_message_events(
        self: &Arc<Self>,
        request: WalletRequest,
        message: String,
    ) -> impl Stream<Item = OperationEvent<String>> {
        let router = Arc::clone(self);
        operation_events(move |progress| async move {
            router.sign_message(&request, &message, &progress).await
        })
    }

    pub fn sign_typed_data_events(
        self: &Arc<Self>,
        request: WalletRequest,
        typed_data: TypedData,
    ) -> impl Stream<Item = OperationEvent<String>> {
        let router = Arc::clone(self);
        operation_events(move |progress| async move {
            router
                .sign_typed_data(&request, &typed_data, &progress)
                .await
        })
    }

    pub fn send_events(
        self: &Arc<Self>,
        request: WalletTransactionRequest,
    ) -> impl Stream<Item = OperationEvent<String>> {
        let router = Arc::clone(self);
        operation_events(move |progress| async move { router.send(&request, &progress).await })
    }

    pub fn add_chain_events(
        self: &Arc<Self>,
        request: WalletRequest,
        chain: AddChainRequest,
    ) -> impl Stream<Item = OperationEvent<String>> {
        let router = Arc::clone(self);
        operation_events(move |progress| async move {
            router.add_chain(&request, &chain, &progress).await
        })
    }
}
