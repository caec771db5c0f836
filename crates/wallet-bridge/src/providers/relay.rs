//! Relay transport consumed by the WalletConnect handler
//!
//! The transport owns the relay socket and the session SDK. The handler only
//! issues commands through [`RelayTransport`] and receives [`RelayEvent`]s.

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::chain::AccountId;

/// Failure reported by the relay transport
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct RelayError(pub String);

/// Metadata a peer advertises about itself
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PeerMetadata {
    pub name: String,
    pub description: Option<String>,
    pub url: Option<String>,
    pub icons: Vec<String>,
}

/// A pairing waiting to be picked up by a wallet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pairing {
    pub topic: String,
    /// `wc:` URI carrying the pairing topic and symmetric key
    pub uri: String,
}

impl Pairing {
    /// URI form that renders as a scannable deep link
    pub fn deeplink(&self) -> String {
        match self.uri.strip_prefix("wc:") {
            Some(rest) if !rest.starts_with("//") => format!("wc://{}", rest),
            _ => self.uri.clone(),
        }
    }
}

/// Methods, chains and events proposed for one namespace
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NamespaceProposal {
    pub chains: Vec<String>,
    pub methods: Vec<String>,
    pub events: Vec<String>,
}

/// Session proposal sent over a pairing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectParams {
    pub pairing_topic: String,
    pub required_namespaces: IndexMap<String, NamespaceProposal>,
    pub optional_namespaces: IndexMap<String, NamespaceProposal>,
    pub session_properties: IndexMap<String, String>,
}

/// Session approved by a wallet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovedSession {
    pub topic: String,
    /// CAIP-10 accounts, e.g. `eip155:1:0xab...`
    pub accounts: Vec<String>,
    pub peer: Option<PeerMetadata>,
}

impl ApprovedSession {
    /// First account that parses as CAIP-10
    pub fn account(&self) -> Option<AccountId> {
        self.accounts.iter().find_map(|a| a.parse().ok())
    }
}

/// JSON-RPC request scoped to a session and chain
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    pub topic: String,
    /// CAIP-2 chain id
    pub chain_id: String,
    pub method: String,
    pub params: Value,
}

/// Outcome of a JSON-RPC request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonRpcResult {
    Result(String),
    Error { code: i64, message: String },
}

/// Answer to a [`SessionRequest`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionResponse {
    pub topic: String,
    pub id: u64,
    pub result: JsonRpcResult,
}

/// Events the transport delivers to the handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    SessionApproved(ApprovedSession),
    SessionRejected { reason: String },
    SessionDeleted { topic: String },
    SessionResponse(SessionResponse),
}

/// Commands the handler issues to the relay
#[async_trait]
pub trait RelayTransport: Send + Sync {
    async fn create_pairing(&self) -> Result<Pairing, RelayError>;

    /// Propose a session over an existing pairing
    async fn connect(&self, params: ConnectParams) -> Result<(), RelayError>;

    /// Submit a request; returns its JSON-RPC id
    async fn request(&self, request: SessionRequest) -> Result<u64, RelayError>;

    async fn disconnect_pairing(&self, topic: &str) -> Result<(), RelayError>;
}
