//! Wallet Provider Surface
//!
//! A wallet is reached through one generic call, `request(method, params)`,
//! the way browser extensions expose EIP-1193. Everything the session and
//! swap workflow need is layered on top of that call by the typed helpers
//! in this module, which decode JSON results into alloy primitives.
//!
//! ## Methods used
//!
//! - `eth_requestAccounts`
//! - `eth_chainId`
//! - `wallet_switchEthereumChain` / `wallet_addEthereumChain`
//! - `eth_getBalance`, `eth_call`
//! - `eth_sendTransaction`, `eth_getTransactionReceipt`

use alloy::primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::chain::{format_chain_id, parse_chain_id, ChainTarget};
use crate::error::{ProviderError, WalletError};

/// EIP-1193 style provider: one request surface for every wallet operation
#[async_trait]
pub trait WalletProvider: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError>;
}

// ============================================================================
// Account & Network
// ============================================================================

/// Ask the wallet for account access (may prompt the user)
pub async fn request_accounts(provider: &dyn WalletProvider) -> Result<Vec<Address>, WalletError> {
    let result = provider.request("eth_requestAccounts", json!([])).await?;
    decode("eth_requestAccounts", result)
}

/// Chain the wallet is currently operating against
pub async fn chain_id(provider: &dyn WalletProvider) -> Result<u64, WalletError> {
    let result = provider.request("eth_chainId", json!([])).await?;
    let raw: String = decode("eth_chainId", result)?;
    parse_chain_id(&raw).map_err(|e| WalletError::malformed("eth_chainId", e))
}

/// Ask the wallet to switch to `chain_id`
pub async fn switch_chain(provider: &dyn WalletProvider, chain_id: u64) -> Result<(), WalletError> {
    debug!(chain_id, "Requesting chain switch");
    provider
        .request(
            "wallet_switchEthereumChain",
            json!([{ "chainId": format_chain_id(chain_id) }]),
        )
        .await?;
    Ok(())
}

/// Ask the wallet to register (and select) the full chain descriptor
pub async fn add_chain(provider: &dyn WalletProvider, target: &ChainTarget) -> Result<(), WalletError> {
    debug!(chain_id = target.chain_id, name = %target.chain_name, "Requesting chain addition");
    let descriptor =
        serde_json::to_value(target).map_err(|e| WalletError::malformed("wallet_addEthereumChain", e))?;
    provider
        .request("wallet_addEthereumChain", json!([descriptor]))
        .await?;
    Ok(())
}

/// Native currency balance of `address` at the latest block
pub async fn get_balance(provider: &dyn WalletProvider, address: Address) -> Result<U256, WalletError> {
    let result = provider
        .request("eth_getBalance", json!([address, "latest"]))
        .await?;
    decode("eth_getBalance", result)
}

// ============================================================================
// Contract Calls & Transactions
// ============================================================================

/// Read-only contract call, returning the raw ABI-encoded result
pub async fn call(
    provider: &dyn WalletProvider,
    from: Address,
    to: Address,
    data: Bytes,
) -> Result<Bytes, WalletError> {
    let result = provider
        .request(
            "eth_call",
            json!([{ "from": from, "to": to, "data": data }, "latest"]),
        )
        .await?;
    decode("eth_call", result)
}

/// Submit a transaction for signing; returns its hash once the wallet accepts it
pub async fn send_transaction(
    provider: &dyn WalletProvider,
    from: Address,
    to: Address,
    data: Bytes,
) -> Result<B256, WalletError> {
    let result = provider
        .request(
            "eth_sendTransaction",
            json!([{ "from": from, "to": to, "data": data }]),
        )
        .await?;
    decode("eth_sendTransaction", result)
}

/// Minimal receipt view; only the fields the workflow acts on
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReceiptSummary {
    #[serde(rename = "transactionHash")]
    pub tx_hash: B256,
    #[serde(rename = "blockNumber", default)]
    pub block_number: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl ReceiptSummary {
    /// Post-Byzantium status flag; a missing status is treated as success
    pub fn succeeded(&self) -> bool {
        !matches!(self.status.as_deref(), Some("0x0") | Some("0x00"))
    }

    pub fn block(&self) -> Option<u64> {
        self.block_number
            .as_deref()
            .and_then(|b| parse_chain_id(b).ok())
    }
}

/// Receipt for `tx_hash`, or `None` while the transaction is pending
pub async fn transaction_receipt(
    provider: &dyn WalletProvider,
    tx_hash: B256,
) -> Result<Option<ReceiptSummary>, WalletError> {
    let result = provider
        .request("eth_getTransactionReceipt", json!([tx_hash]))
        .await?;
    decode("eth_getTransactionReceipt", result)
}

fn decode<T: serde::de::DeserializeOwned>(method: &str, value: Value) -> Result<T, WalletError> {
    serde_json::from_value(value).map_err(|e| WalletError::malformed(method, e))
}
