//! CAIP-2 chain ids and CAIP-10 account ids

use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::error::WalletError;

fn namespace_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[-a-z0-9]{3,8}$").unwrap())
}

fn reference_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[-_a-zA-Z0-9]{1,32}$").unwrap())
}

fn address_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[-.%a-zA-Z0-9]{1,128}$").unwrap())
}

/// Chain scoped to a namespace, written `<namespace>:<reference>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChainId {
    namespace: String,
    reference: String,
}

impl ChainId {
    pub fn new(namespace: &str, reference: &str) -> Result<Self, WalletError> {
        if !namespace_pattern().is_match(namespace) {
            return Err(WalletError::InvalidInput(format!(
                "Invalid chain namespace: {}",
                namespace
            )));
        }
        if !reference_pattern().is_match(reference) {
            return Err(WalletError::InvalidInput(format!(
                "Invalid chain reference: {}",
                reference
            )));
        }
        Ok(Self {
            namespace: namespace.to_string(),
            reference: reference.to_string(),
        })
    }

    /// EVM chain from its decimal reference
    pub fn eip155(reference: &str) -> Result<Self, WalletError> {
        Self::new("eip155", reference)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// Whether a requested chain names this chain. Accepts a bare reference
    /// (`"1"`) or a full chain id (`"eip155:1"`).
    pub fn matches(&self, requested: &str) -> bool {
        match requested.split_once(':') {
            Some((namespace, reference)) => {
                namespace == self.namespace && reference == self.reference
            }
            None => requested == self.reference,
        }
    }
}

impl FromStr for ChainId {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, reference) = s
            .split_once(':')
            .ok_or_else(|| WalletError::InvalidInput(format!("Invalid chain id: {}", s)))?;
        Self::new(namespace, reference)
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.reference)
    }
}

/// Account on a chain, written `<namespace>:<reference>:<address>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccountId {
    chain: ChainId,
    address: String,
}

impl AccountId {
    pub fn chain(&self) -> &ChainId {
        &self.chain
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

impl FromStr for AccountId {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let (Some(namespace), Some(reference), Some(address)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(WalletError::UnexpectedResponse(format!(
                "Invalid account id: {}",
                s
            )));
        };

        if !address_pattern().is_match(address) {
            return Err(WalletError::UnexpectedResponse(format!(
                "Invalid account address: {}",
                address
            )));
        }

        Ok(Self {
            chain: ChainId::new(namespace, reference)?,
            address: address.to_string(),
        })
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chain, self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chain_id() {
        let chain: ChainId = "eip155:1".parse().unwrap();
        assert_eq!(chain.namespace(), "eip155");
        assert_eq!(chain.reference(), "1");
        assert_eq!(chain.to_string(), "eip155:1");

        assert!("eip155".parse::<ChainId>().is_err());
        assert!("EIP155:1".parse::<ChainId>().is_err());
        assert!(ChainId::eip155("").is_err());
    }

    #[test]
    fn test_chain_matches_reference_or_full_id() {
        let chain = ChainId::eip155("5").unwrap();
        assert!(chain.matches("5"));
        assert!(chain.matches("eip155:5"));
        assert!(!chain.matches("1"));
        assert!(!chain.matches("solana:5"));
    }

    #[test]
    fn test_parse_account_id() {
        let account: AccountId = "eip155:5:0xAb5801a7D398351b8bE11C439e05C5B3259aeC9B"
            .parse()
            .unwrap();
        assert_eq!(account.chain().reference(), "5");
        assert_eq!(account.address(), "0xAb5801a7D398351b8bE11C439e05C5B3259aeC9B");

        assert!("eip155:5".parse::<AccountId>().is_err());
    }
}
