//! Wallet descriptor types

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Connection protocol a wallet is reached through
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConnectionType {
    /// Relay-based pairing and session protocol
    WalletConnectV2,
    /// Relay protocol driven through a wallet picker instead of a wallet-specific link
    WalletConnectModal,
    /// SDK-mediated handshake protocol
    WalletSegue,
    /// Encrypted deep-link protocol
    PhantomWallet,
    /// Protocol registered by the embedding application
    Custom(String),
    Unknown,
}

impl ConnectionType {
    /// Parse the raw name used in wallet descriptors
    pub fn from_raw(raw: &str) -> Self {
        match raw {
            "walletConnectV2" => ConnectionType::WalletConnectV2,
            "walletConnectModal" => ConnectionType::WalletConnectModal,
            "walletSegue" => ConnectionType::WalletSegue,
            "phantomWallet" => ConnectionType::PhantomWallet,
            "" | "unknown" => ConnectionType::Unknown,
            other => ConnectionType::Custom(other.to_string()),
        }
    }

    /// Raw name as written in wallet descriptors
    pub fn as_str(&self) -> &str {
        match self {
            ConnectionType::WalletConnectV2 => "walletConnectV2",
            ConnectionType::WalletConnectModal => "walletConnectModal",
            ConnectionType::WalletSegue => "walletSegue",
            ConnectionType::PhantomWallet => "phantomWallet",
            ConnectionType::Custom(raw) => raw,
            ConnectionType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ConnectionType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ConnectionType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(ConnectionType::from_raw(&raw))
    }
}

/// A wallet application known to the catalog. Immutable after load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub id: String,
    pub name: String,
    pub homepage: Option<String>,
    pub app: Option<WalletApp>,
    pub mobile: Option<WalletLinks>,
    pub config: Option<WalletConfig>,
}

/// Store listings for the wallet app
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WalletApp {
    pub android: Option<String>,
    pub ios: Option<String>,
}

/// App-level link prefixes
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WalletLinks {
    pub native: Option<String>,
    pub universal: Option<String>,
}

/// Connection configuration for a wallet
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletConfig {
    pub comment: Option<String>,
    /// When set, pairing URIs are percent-encoded before being embedded in links
    pub encoding: Option<String>,
    pub image_url: Option<String>,
    /// Package id used by the host platform for install detection
    pub android_package: Option<String>,
    #[serde(default)]
    pub connections: Vec<WalletConnections>,
}

/// Link templates for one connection protocol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletConnections {
    #[serde(rename = "type")]
    pub connection_type: ConnectionType,
    pub native: Option<String>,
    pub universal: Option<String>,
}

impl WalletConfig {
    /// Protocol of the first configured connection
    pub fn connection_type(&self) -> ConnectionType {
        self.connections
            .first()
            .map(|c| c.connection_type.clone())
            .unwrap_or(ConnectionType::Unknown)
    }

    /// Link templates for the given protocol
    pub fn connections(&self, connection_type: &ConnectionType) -> Option<&WalletConnections> {
        self.connections
            .iter()
            .find(|c| &c.connection_type == connection_type)
    }
}

impl Wallet {
    /// Create a wallet with no links or connections
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            homepage: None,
            app: None,
            mobile: None,
            config: None,
        }
    }

    /// Protocol this wallet is configured for
    pub fn connection_type(&self) -> ConnectionType {
        self.config
            .as_ref()
            .map(WalletConfig::connection_type)
            .unwrap_or(ConnectionType::Unknown)
    }

    /// App-store link, used when the wallet app is not installed
    pub fn app_link(&self) -> Option<&str> {
        self.app.as_ref()?.android.as_deref()
    }

    /// Native scheme prefix of the wallet app
    pub fn native_link(&self) -> Option<&str> {
        self.mobile.as_ref()?.native.as_deref()
    }

    pub fn android_package(&self) -> Option<&str> {
        self.config.as_ref()?.android_package.as_deref()
    }

    pub fn image_url(&self) -> Option<&str> {
        self.config.as_ref()?.image_url.as_deref()
    }
}
