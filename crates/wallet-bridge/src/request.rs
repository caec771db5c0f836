//! Request value types passed to every handler

use serde_json::{json, Map, Value};
use wallet_catalog::Wallet;

use crate::error::{Result, WalletError};

/// What the caller wants to connect to. Constructed per call, carries no
/// protocol state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalletRequest {
    /// Target wallet; `None` means any wallet (debug pairing)
    pub wallet: Option<Wallet>,
    /// Address the connected account is expected to have
    pub address: Option<String>,
    /// Chain reference, e.g. `"1"`
    pub chain_id: Option<String>,
    /// Force the wallet-picker protocol instead of the wallet's own
    pub use_modal: bool,
}

impl WalletRequest {
    pub fn new(wallet: Option<Wallet>) -> Self {
        Self {
            wallet,
            ..Default::default()
        }
    }

    pub fn with_chain_id(mut self, chain_id: impl Into<String>) -> Self {
        self.chain_id = Some(chain_id.into());
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_modal(mut self, use_modal: bool) -> Self {
        self.use_modal = use_modal;
        self
    }

    pub fn wallet_id(&self) -> Option<&str> {
        self.wallet.as_ref().map(|w| w.id.as_str())
    }

    /// Same wallet, with no expectation about chain or account
    pub fn without_chain(&self) -> Self {
        Self {
            wallet: self.wallet.clone(),
            address: None,
            chain_id: None,
            use_modal: self.use_modal,
        }
    }
}

/// Chain-specific body of a transaction request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionPayload {
    Ethereum(EthereumTransactionRequest),
    /// Serialized transaction for chains whose wallets sign opaque blobs
    Solana(Vec<u8>),
}

/// A transaction to sign and submit, with exactly one chain payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletTransactionRequest {
    pub wallet_request: WalletRequest,
    pub payload: TransactionPayload,
}

impl WalletTransactionRequest {
    pub fn ethereum(wallet_request: WalletRequest, transaction: EthereumTransactionRequest) -> Self {
        Self {
            wallet_request,
            payload: TransactionPayload::Ethereum(transaction),
        }
    }

    pub fn solana(wallet_request: WalletRequest, transaction: Vec<u8>) -> Self {
        Self {
            wallet_request,
            payload: TransactionPayload::Solana(transaction),
        }
    }

    pub fn as_ethereum(&self) -> Option<&EthereumTransactionRequest> {
        match &self.payload {
            TransactionPayload::Ethereum(tx) => Some(tx),
            TransactionPayload::Solana(_) => None,
        }
    }

    pub fn as_solana(&self) -> Option<&[u8]> {
        match &self.payload {
            TransactionPayload::Solana(bytes) => Some(bytes),
            TransactionPayload::Ethereum(_) => None,
        }
    }
}

/// Unsigned EVM transaction. Quantities are in wei.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EthereumTransactionRequest {
    pub from_address: String,
    pub to_address: Option<String>,
    pub wei_value: u128,
    /// Hex call data, with or without `0x`
    pub data: String,
    pub nonce: Option<u64>,
    pub gas_price_in_wei: Option<u128>,
    pub max_fee_per_gas: Option<u128>,
    pub max_priority_fee_per_gas: Option<u128>,
    pub gas_limit: Option<u128>,
    pub chain_id: String,
}

impl EthereumTransactionRequest {
    /// Call data normalized to `0x`-prefixed hex
    pub fn normalized_data(&self) -> Result<String> {
        let stripped = self.data.strip_prefix("0x").unwrap_or(&self.data);
        hex::decode(stripped)
            .map_err(|e| WalletError::InvalidInput(format!("Invalid transaction data: {}", e)))?;
        Ok(format!("0x{}", stripped))
    }

    /// JSON-RPC transaction object with hex quantities. Unset optional fields
    /// are omitted.
    pub fn to_json_rpc(&self) -> Result<Value> {
        let mut tx = Map::new();
        tx.insert("from".into(), json!(self.from_address));
        tx.insert(
            "to".into(),
            json!(self.to_address.as_deref().unwrap_or("0x")),
        );
        if let Some(gas) = self.gas_limit {
            tx.insert("gas".into(), json!(hex_quantity(gas)));
        }
        if let Some(price) = self.gas_price_in_wei {
            tx.insert("gasPrice".into(), json!(hex_quantity(price)));
        }
        if let Some(max_fee) = self.max_fee_per_gas {
            tx.insert("maxFeePerGas".into(), json!(hex_quantity(max_fee)));
        }
        if let Some(tip) = self.max_priority_fee_per_gas {
            tx.insert("maxPriorityFeePerGas".into(), json!(hex_quantity(tip)));
        }
        tx.insert("value".into(), json!(hex_quantity(self.wei_value)));
        tx.insert("data".into(), json!(self.normalized_data()?));
        if let Some(nonce) = self.nonce {
            tx.insert("nonce".into(), json!(hex_quantity(nonce as u128)));
        }
        Ok(Value::Object(tx))
    }
}

/// Request to add (and switch to) an EVM chain in the wallet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddChainRequest {
    /// Decimal chain reference or `0x` hex
    pub chain_id: String,
}

impl AddChainRequest {
    pub fn new(chain_id: impl Into<String>) -> Self {
        Self {
            chain_id: chain_id.into(),
        }
    }

    /// Chain id as a `0x` hex quantity
    pub fn hex_chain_id(&self) -> Result<String> {
        if let Some(hex) = self.chain_id.strip_prefix("0x") {
            u64::from_str_radix(hex, 16)
                .map_err(|_| WalletError::InvalidInput(format!("Invalid chain id: {}", self.chain_id)))?;
            return Ok(self.chain_id.clone());
        }
        let id: u64 = self
            .chain_id
            .parse()
            .map_err(|_| WalletError::InvalidInput(format!("Invalid chain id: {}", self.chain_id)))?;
        Ok(format!("{:#x}", id))
    }
}

/// EIP-712 typed data document
#[derive(Debug, Clone, PartialEq)]
pub struct TypedData(Value);

impl TypedData {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn to_json_string(&self) -> String {
        self.0.to_string()
    }
}

fn hex_quantity(value: u128) -> String {
    format!("{:#x}", value)
}
