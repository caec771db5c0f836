//! Error types for wallet-bridge

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias for wallet operations
pub type Result<T> = std::result::Result<T, WalletError>;

/// Stable error codes reported to the embedding application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ConnectionFailed,
    RefusedByWallet,
    WalletMismatch,
    NetworkMismatch,
    UnexpectedResponse,
    UserCanceled,
    InvalidSession,
    WalletContainsNoAccount,
    InvalidInput,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConnectionFailed => "CONNECTION_FAILED",
            ErrorCode::RefusedByWallet => "REFUSED_BY_WALLET",
            ErrorCode::WalletMismatch => "WALLET_MISMATCH",
            ErrorCode::NetworkMismatch => "NETWORK_MISMATCH",
            ErrorCode::UnexpectedResponse => "UNEXPECTED_RESPONSE",
            ErrorCode::UserCanceled => "USER_CANCELED",
            ErrorCode::InvalidSession => "INVALID_SESSION",
            ErrorCode::WalletContainsNoAccount => "WALLET_CONTAINS_NO_ACCOUNT",
            ErrorCode::InvalidInput => "INVALID_INPUT",
        }
    }

    /// Short title suitable for an error dialog
    pub fn title(&self) -> &'static str {
        match self {
            ErrorCode::ConnectionFailed => "Connection Failed",
            ErrorCode::RefusedByWallet => "Request Refused",
            ErrorCode::WalletMismatch => "Wallet Mismatch",
            ErrorCode::NetworkMismatch => "Network Mismatch",
            ErrorCode::UnexpectedResponse => "Unexpected Response",
            ErrorCode::UserCanceled => "Canceled",
            ErrorCode::InvalidSession => "Invalid Session",
            ErrorCode::WalletContainsNoAccount => "No Account",
            ErrorCode::InvalidInput => "Invalid Input",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wallet error types.
///
/// Cloneable so that one failure can resolve every waiter coalesced on the
/// same handshake.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Refused by wallet: {0}")]
    RefusedByWallet(String),

    #[error("Wallet mismatch: {0}")]
    WalletMismatch(String),

    #[error("Network mismatch: {0}")]
    NetworkMismatch(String),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Request canceled by the user")]
    UserCanceled,

    #[error("No valid wallet session")]
    InvalidSession,

    #[error("Wallet contains no account")]
    WalletContainsNoAccount,

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl WalletError {
    pub fn code(&self) -> ErrorCode {
        match self {
            WalletError::ConnectionFailed(_) => ErrorCode::ConnectionFailed,
            WalletError::RefusedByWallet(_) => ErrorCode::RefusedByWallet,
            WalletError::WalletMismatch(_) => ErrorCode::WalletMismatch,
            WalletError::NetworkMismatch(_) => ErrorCode::NetworkMismatch,
            WalletError::UnexpectedResponse(_) => ErrorCode::UnexpectedResponse,
            WalletError::UserCanceled => ErrorCode::UserCanceled,
            WalletError::InvalidSession => ErrorCode::InvalidSession,
            WalletError::WalletContainsNoAccount => ErrorCode::WalletContainsNoAccount,
            WalletError::InvalidInput(_) => ErrorCode::InvalidInput,
        }
    }
}
