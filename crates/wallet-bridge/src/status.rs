//! Connection status published by each handler

use std::sync::Arc;

use serde::Serialize;
use wallet_catalog::Wallet;

use crate::request::WalletRequest;

/// Handler lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum WalletState {
    #[default]
    Idle,
    /// A request is outstanding that must not be issued again
    Listening,
    /// Paired with the relay, waiting for the wallet to approve
    ConnectedToServer,
    ConnectedToWallet,
}

/// Snapshot of the account a handler is connected (or connecting) to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalletInfo {
    /// `None` until the wallet has reported an account
    pub address: Option<String>,
    pub chain_id: Option<String>,
    pub wallet: Option<Wallet>,
    pub peer_name: Option<String>,
    pub peer_image_url: Option<String>,
}

impl WalletInfo {
    /// Placeholder for a wallet whose account is not known yet
    pub fn pending(request: &WalletRequest) -> Self {
        Self {
            wallet: request.wallet.clone(),
            chain_id: request.chain_id.clone(),
            ..Default::default()
        }
    }

    pub fn wallet_id(&self) -> Option<&str> {
        self.wallet.as_ref().map(|w| w.id.as_str())
    }

    /// Whether this session can serve `request` without a new handshake.
    ///
    /// Chain ids must be equal when the request names one. Addresses must be
    /// equal when the request names one, ignoring case for `0x` addresses.
    pub fn satisfies(&self, request: &WalletRequest) -> bool {
        if let Some(chain_id) = request.chain_id.as_deref() {
            if self.chain_id.as_deref() != Some(chain_id) {
                return false;
            }
        }
        if let Some(expected) = request.address.as_deref() {
            let Some(address) = self.address.as_deref() else {
                return false;
            };
            let same = if expected.starts_with("0x") {
                expected.eq_ignore_ascii_case(address)
            } else {
                expected == address
            };
            if !same {
                return false;
            }
        }
        true
    }
}

/// Status of one handler
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalletStatus {
    pub state: WalletState,
    pub connected_wallet: Option<WalletInfo>,
    /// URI a UI can render as a QR code while pairing
    pub connection_deeplink: Option<String>,
}

/// Receives every status change of the handler it is attached to
pub trait WalletStatusDelegate: Send + Sync {
    fn status_changed(&self, status: &WalletStatus);
}

/// Status owned by a single handler. Every change is pushed to the delegate
/// before the mutating call returns.
#[derive(Default)]
pub struct StatusCell {
    status: WalletStatus,
    delegate: Option<Arc<dyn WalletStatusDelegate>>,
}

impl StatusCell {
    pub fn get(&self) -> &WalletStatus {
        &self.status
    }

    pub fn state(&self) -> WalletState {
        self.status.state
    }

    pub fn set_delegate(&mut self, delegate: Option<Arc<dyn WalletStatusDelegate>>) {
        self.delegate = delegate;
    }

    pub fn update(&mut self, mutate: impl FnOnce(&mut WalletStatus)) {
        let before = self.status.clone();
        mutate(&mut self.status);
        if self.status != before {
            if let Some(delegate) = &self.delegate {
                delegate.status_changed(&self.status);
            }
        }
    }

    /// Back to `Idle` with no wallet and no deep link
    pub fn reset(&mut self) {
        self.update(|status| *status = WalletStatus::default());
    }
}

impl std::fmt::Debug for StatusCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusCell")
            .field("status", &self.status)
            .field("has_delegate", &self.delegate.is_some())
            .finish()
    }
}
