//! Handlers and consent handlers by connection type
//!
//! Built explicitly and handed to the router. [`ConnectionRegistry::from_config`]
//! builds a handler for every protocol that has a config section.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use wallet_catalog::{ConnectionType, Wallet, WalletCatalog};

use crate::config::BridgeConfig;
use crate::consent::ConsentHandler;
use crate::handler::{DeepLinkOpener, Handler};
use crate::providers::{
    PhantomHandler, RelayEvent, RelayTransport, SegueClient, SegueHandler, WalletConnectHandler,
};

/// A handler and the consent handler that gates its transactions
#[derive(Clone)]
pub struct Registration {
    pub handler: Handler,
    pub consent: Option<Arc<dyn ConsentHandler>>,
}

/// External collaborators the built-in handlers need
pub struct Collaborators {
    pub opener: Arc<dyn DeepLinkOpener>,
    /// Relay transport and the receiving end of its event stream
    pub relay: Option<(Arc<dyn RelayTransport>, mpsc::UnboundedReceiver<RelayEvent>)>,
    pub segue: Option<Arc<dyn SegueClient>>,
}

impl Collaborators {
    pub fn new(opener: Arc<dyn DeepLinkOpener>) -> Self {
        Self {
            opener,
            relay: None,
            segue: None,
        }
    }

    pub fn with_relay(
        mut self,
        transport: Arc<dyn RelayTransport>,
        events: mpsc::UnboundedReceiver<RelayEvent>,
    ) -> Self {
        self.relay = Some((transport, events));
        self
    }

    pub fn with_segue(mut self, client: Arc<dyn SegueClient>) -> Self {
        self.segue = Some(client);
        self
    }
}

/// Registered handlers plus the wallet catalog
pub struct ConnectionRegistry {
    registrations: HashMap<ConnectionType, Registration>,
    catalog: WalletCatalog,
    /// Used when a request names no wallet
    debug_type: ConnectionType,
}

impl ConnectionRegistry {
    pub fn new(catalog: WalletCatalog) -> Self {
        Self {
            registrations: HashMap::new(),
            catalog,
            debug_type: ConnectionType::WalletConnectV2,
        }
    }

    pub fn with_debug_type(mut self, debug_type: ConnectionType) -> Self {
        self.debug_type = debug_type;
        self
    }

    /// Build handlers for every configured protocol.
    ///
    /// Must be called inside a tokio runtime: the relay handler's event
    /// listener is spawned here.
    pub fn from_config(
        config: &BridgeConfig,
        catalog: WalletCatalog,
        collaborators: Collaborators,
    ) -> Self {
        let mut registry = Self::new(catalog);
        let Collaborators {
            opener,
            relay,
            segue,
        } = collaborators;

        if let Some(phantom) = &config.phantom {
            let handler = PhantomHandler::new(phantom.clone(), Arc::clone(&opener));
            registry.register(
                ConnectionType::PhantomWallet,
                Handler::Phantom(Arc::new(handler)),
                None,
            );
        }

        match (&config.wallet_connect, relay) {
            (Some(wallet_connect), Some((transport, events))) => {
                let handler = Arc::new(WalletConnectHandler::new(
                    wallet_connect.clone(),
                    transport,
                    Arc::clone(&opener),
                ));
                handler.spawn_event_listener(events);

                registry.register(
                    ConnectionType::WalletConnectV2,
                    Handler::WalletConnect(Arc::clone(&handler)),
                    None,
                );
                registry.register(
                    ConnectionType::WalletConnectModal,
                    Handler::WalletConnect(handler),
                    None,
                );
            }
            (Some(_), None) => {
                warn!("WalletConnect is configured but no relay transport was provided");
            }
            (None, _) => {}
        }

        match (&config.wallet_segue, segue) {
            (Some(wallet_segue), Some(client)) => {
                let handler = SegueHandler::new(wallet_segue.clone(), client);
                registry.register(
                    ConnectionType::WalletSegue,
                    Handler::Segue(Arc::new(handler)),
                    None,
                );
            }
            (Some(_), None) => {
                warn!("Wallet segue is configured but no SDK client was provided");
            }
            (None, _) => {}
        }

        info!(
            "Registered {} connection types for {} wallets",
            registry.registrations.len(),
            registry.catalog.len()
        );
        registry
    }

    /// Register `handler` for `connection_type`, replacing any previous one
    pub fn register(
        &mut self,
        connection_type: ConnectionType,
        handler: Handler,
        consent: Option<Arc<dyn ConsentHandler>>,
    ) {
        debug!("Registering handler for {}", connection_type);
        self.registrations
            .insert(connection_type, Registration { handler, consent });
    }

    /// Attach a consent handler to an already registered type
    pub fn set_consent_handler(
        &mut self,
        connection_type: &ConnectionType,
        consent: Arc<dyn ConsentHandler>,
    ) -> bool {
        match self.registrations.get_mut(connection_type) {
            Some(registration) => {
                registration.consent = Some(consent);
                true
            }
            None => false,
        }
    }

    pub fn handler(&self, connection_type: &ConnectionType) -> Option<Handler> {
        self.registrations
            .get(connection_type)
            .map(|r| r.handler.clone())
    }

    pub fn consent_handler(
        &self,
        connection_type: &ConnectionType,
    ) -> Option<Arc<dyn ConsentHandler>> {
        self.registrations
            .get(connection_type)
            .and_then(|r| r.consent.clone())
    }

    pub fn debug_type(&self) -> &ConnectionType {
        &self.debug_type
    }

    pub fn debug_handler(&self) -> Option<Handler> {
        self.handler(&self.debug_type)
    }

    pub fn is_registered(&self, connection_type: &ConnectionType) -> bool {
        self.registrations.contains_key(connection_type)
    }

    pub fn catalog(&self) -> &WalletCatalog {
        &self.catalog
    }

    pub fn wallets(&self) -> &[Wallet] {
        self.catalog.wallets()
    }

    pub fn find_wallet(&self, id: &str) -> Option<&Wallet> {
        self.catalog.find(id)
    }
}
