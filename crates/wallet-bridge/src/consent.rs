//! User consent for transactions

use async_trait::async_trait;

use crate::request::WalletTransactionRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentStatus {
    Consented,
    Rejected,
}

/// Asks the user whether a transaction may be sent to the wallet
#[async_trait]
pub trait ConsentHandler: Send + Sync {
    async fn request_consent(&self, request: &WalletTransactionRequest) -> ConsentStatus;
}

/// Consents to everything. Used when no handler is registered for a protocol.
#[derive(Debug, Default, Clone, Copy)]
pub struct SkippedConsent;

#[async_trait]
impl ConsentHandler for SkippedConsent {
    async fn request_consent(&self, _request: &WalletTransactionRequest) -> ConsentStatus {
        ConsentStatus::Consented
    }
}
