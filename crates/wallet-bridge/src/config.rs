//! Bridge configuration
//!
//! One optional section per protocol. A handler is only built for the
//! protocols that have a section.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Encrypted deep-link protocol settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhantomConfig {
    /// Identifies this app to the wallet
    pub app_url: String,
    /// Prefix of the URIs the wallet redirects back to
    pub callback_url: String,
    #[serde(default = "default_phantom_base_url")]
    pub base_url: String,
}

impl PhantomConfig {
    pub fn new(app_url: impl Into<String>, callback_url: impl Into<String>) -> Self {
        Self {
            app_url: app_url.into(),
            callback_url: callback_url.into(),
            base_url: default_phantom_base_url(),
        }
    }
}

/// Relay protocol settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletConnectConfig {
    pub project_id: String,
    pub client_name: String,
    #[serde(default)]
    pub client_description: String,
    #[serde(default)]
    pub client_url: String,
    #[serde(default)]
    pub icon_urls: Vec<String>,
    /// Chain reference proposed when a request names none
    #[serde(default = "default_chain_id")]
    pub default_chain_id: String,
    #[serde(default = "default_session_expiry_days")]
    pub session_expiry_days: u32,
}

impl WalletConnectConfig {
    pub fn new(project_id: impl Into<String>, client_name: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            client_name: client_name.into(),
            client_description: String::new(),
            client_url: String::new(),
            icon_urls: Vec::new(),
            default_chain_id: default_chain_id(),
            session_expiry_days: default_session_expiry_days(),
        }
    }

    /// Relay endpoint for this project, for transport adapters
    pub fn relay_url(&self) -> String {
        format!("wss://relay.walletconnect.com?projectId={}", self.project_id)
    }
}

/// SDK-mediated handshake settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegueConfig {
    /// Prefix of the URIs the wallet redirects back to
    pub callback_url: String,
}

/// Bridge configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeConfig {
    pub phantom: Option<PhantomConfig>,
    pub wallet_connect: Option<WalletConnectConfig>,
    pub wallet_segue: Option<SegueConfig>,
}

impl BridgeConfig {
    /// Load configuration from a JSON file. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!("No config file at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: BridgeConfig = serde_json::from_str(&contents)?;
        debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub async fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = serde_json::to_string_pretty(self)?;

        // Write atomically using temp file
        let temp_path = path.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents).await?;
        tokio::fs::rename(&temp_path, path).await?;

        debug!("Saved config to {:?}", path);
        Ok(())
    }
}

fn default_phantom_base_url() -> String {
    "https://phantom.app/ul/v1".to_string()
}

fn default_chain_id() -> String {
    "5".to_string()
}

fn default_session_expiry_days() -> u32 {
    7
}
