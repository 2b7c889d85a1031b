//! Error types for wallet, session and swap operations
//!
//! Provider failures arrive as EIP-1193 [`ProviderError`]s carrying a numeric
//! code. They are classified into [`WalletError`] so callers can tell a
//! declined prompt from an unknown chain or a node failure.

use alloy::primitives::B256;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// User rejected the request
pub const USER_REJECTED_REQUEST: i64 = 4001;
/// The requested method or account has not been authorized
pub const UNAUTHORIZED: i64 = 4100;
/// The provider does not support the requested method
pub const UNSUPPORTED_METHOD: i64 = 4200;
/// The wallet does not recognize the requested chain
pub const UNRECOGNIZED_CHAIN: i64 = 4902;
/// JSON-RPC invalid method parameters
pub const INVALID_PARAMS: i64 = -32602;
/// JSON-RPC internal error
pub const INTERNAL_ERROR: i64 = -32603;

/// Error object returned by a wallet provider `request` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{message} (code {code})")]
pub struct ProviderError {
    pub code: i64,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn user_rejected() -> Self {
        Self::new(USER_REJECTED_REQUEST, "User rejected the request")
    }

    pub fn unrecognized_chain(chain_id: &str) -> Self {
        Self::new(
            UNRECOGNIZED_CHAIN,
            format!("Unrecognized chain ID \"{}\"", chain_id),
        )
    }

    pub fn unsupported_method(method: &str) -> Self {
        Self::new(
            UNSUPPORTED_METHOD,
            format!("Method {} is not supported", method),
        )
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMS, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(INTERNAL_ERROR, message)
    }
}

/// Coarse classification used by front ends to decide how to present an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No wallet is available; terminal for the session
    ProviderAbsent,
    /// The user declined a prompt; retrying is possible
    UserRejected,
    /// The wallet does not know the chain; recovered with add-chain
    UnsupportedChain,
    /// Anything else; the workflow stays in its last stable state
    Other,
}

/// Errors produced by the session manager, bindings and swap workflow
#[derive(Debug, Clone, Error)]
pub enum WalletError {
    #[error("No wallet provider detected. Install a wallet to continue.")]
    ProviderMissing,

    #[error("Request rejected by user: {0}")]
    UserRejected(String),

    #[error("Chain not recognized by wallet: {0}")]
    UnrecognizedChain(String),

    #[error("Wallet returned no accounts")]
    NoAccounts,

    #[error("Wallet provider error: {0}")]
    Rpc(ProviderError),

    #[error("Malformed response to {method}: {reason}")]
    MalformedResponse { method: String, reason: String },

    #[error("Session is not connected")]
    NotConnected,

    #[error("{contract} binding is stale; reconnect the session")]
    StaleBinding { contract: String },

    #[error("Invalid amount {amount:?}: {reason}")]
    InvalidAmount { amount: String, reason: String },

    #[error("Transaction {tx_hash} reverted")]
    Reverted { tx_hash: B256 },

    #[error("Transaction {tx_hash} not confirmed after {waited_ms}ms")]
    ConfirmationTimeout { tx_hash: B256, waited_ms: u128 },

    #[error("Another transaction is already in flight")]
    Busy,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid private key")]
    InvalidKey,
}

impl WalletError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WalletError::ProviderMissing => ErrorKind::ProviderAbsent,
            WalletError::UserRejected(_) => ErrorKind::UserRejected,
            WalletError::UnrecognizedChain(_) => ErrorKind::UnsupportedChain,
            _ => ErrorKind::Other,
        }
    }

    pub fn is_user_rejected(&self) -> bool {
        self.kind() == ErrorKind::UserRejected
    }

    pub(crate) fn malformed(method: &str, reason: impl ToString) -> Self {
        WalletError::MalformedResponse {
            method: method.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        WalletError::InvalidConfig(reason.into())
    }

    pub(crate) fn invalid_amount(amount: &str, reason: impl Into<String>) -> Self {
        WalletError::InvalidAmount {
            amount: amount.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<ProviderError> for WalletError {
    fn from(err: ProviderError) -> Self {
        match err.code {
            USER_REJECTED_REQUEST => WalletError::UserRejected(err.message),
            UNRECOGNIZED_CHAIN => WalletError::UnrecognizedChain(err.message),
            _ => WalletError::Rpc(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_classification() {
        let rejected: WalletError = ProviderError::user_rejected().into();
        assert_eq!(rejected.kind(), ErrorKind::UserRejected);
        assert!(rejected.is_user_rejected());

        let unknown: WalletError = ProviderError::unrecognized_chain("0x4268").into();
        assert_eq!(unknown.kind(), ErrorKind::UnsupportedChain);

        let other: WalletError = ProviderError::internal("node down").into();
        assert!(matches!(other, WalletError::Rpc(ref e) if e.code == INTERNAL_ERROR));
        assert_eq!(other.kind(), ErrorKind::Other);
    }

    #[test]
    fn test_provider_absent_kind() {
        assert_eq!(WalletError::ProviderMissing.kind(), ErrorKind::ProviderAbsent);
    }

    #[test]
    fn test_provider_error_roundtrips_json_shape() {
        let json = serde_json::json!({ "code": 4902, "message": "unknown chain" });
        let err: ProviderError = serde_json::from_value(json).unwrap();
        assert_eq!(err.code, UNRECOGNIZED_CHAIN);
        assert_eq!(err.to_string(), "unknown chain (code 4902)");
    }
}
