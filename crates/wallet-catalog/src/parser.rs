//! Wallet catalog loading

use crate::error::{CatalogError, CatalogResult};
use crate::types::Wallet;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

/// Immutable list of wallets known to the application
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalletCatalog {
    wallets: Vec<Wallet>,
}

impl WalletCatalog {
    /// Build a catalog from already-parsed wallets
    pub fn new(wallets: Vec<Wallet>) -> CatalogResult<Self> {
        Self::validate(&wallets)?;
        Ok(Self { wallets })
    }

    /// Parse a catalog from a string (auto-detects JSON/YAML)
    pub fn parse(content: &str) -> CatalogResult<Self> {
        let trimmed = content.trim_start();
        if trimmed.starts_with('[') || trimmed.starts_with('{') {
            Self::parse_json(content)
        } else {
            Self::parse_yaml(content)
        }
    }

    /// Parse a catalog from a JSON array of wallets
    pub fn parse_json(content: &str) -> CatalogResult<Self> {
        let wallets: Vec<Wallet> = serde_json::from_str(content)?;
        Self::new(wallets)
    }

    /// Parse a catalog from a YAML sequence of wallets
    pub fn parse_yaml(content: &str) -> CatalogResult<Self> {
        let wallets: Vec<Wallet> = serde_yaml::from_str(content)?;
        Self::new(wallets)
    }

    /// Load a catalog file from disk
    pub fn load(path: &Path) -> CatalogResult<Self> {
        debug!("Loading wallet catalog from {:?}", path);
        let content = std::fs::read_to_string(path)?;

        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e == "yaml" || e == "yml")
            .unwrap_or(false);

        if is_yaml {
            Self::parse_yaml(&content)
        } else {
            Self::parse(&content)
        }
    }

    /// Fetch and parse a catalog from a URL
    pub async fn fetch_and_parse(url: &str) -> CatalogResult<Self> {
        info!("Fetching wallet catalog from: {}", url);

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| CatalogError::HttpError(e.to_string()))?;

        let response = client
            .get(url)
            .header("Accept", "application/json, application/yaml, text/yaml")
            .send()
            .await
            .map_err(|e| CatalogError::FetchError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CatalogError::FetchError(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .unwrap_or_default();

        let content = response
            .text()
            .await
            .map_err(|e| CatalogError::FetchError(e.to_string()))?;

        if content_type.contains("yaml") || url.ends_with(".yaml") || url.ends_with(".yml") {
            Self::parse_yaml(&content)
        } else {
            Self::parse(&content)
        }
    }

    pub fn wallets(&self) -> &[Wallet] {
        &self.wallets
    }

    /// Find a wallet by id
    pub fn find(&self, id: &str) -> Option<&Wallet> {
        self.wallets.iter().find(|w| w.id == id)
    }

    /// Find a wallet by display name (case-insensitive)
    pub fn find_by_name(&self, name: &str) -> Option<&Wallet> {
        self.wallets
            .iter()
            .find(|w| w.name.eq_ignore_ascii_case(name))
    }

    pub fn len(&self) -> usize {
        self.wallets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }

    fn validate(wallets: &[Wallet]) -> CatalogResult<()> {
        let mut seen = HashSet::new();
        for wallet in wallets {
            if wallet.id.trim().is_empty() {
                return Err(CatalogError::MissingField(format!(
                    "id of wallet '{}'",
                    wallet.name
                )));
            }
            if !seen.insert(wallet.id.as_str()) {
                return Err(CatalogError::DuplicateWallet(wallet.id.clone()));
            }
        }

        debug!("Validated catalog with {} wallets", wallets.len());
        Ok(())
    }
}
