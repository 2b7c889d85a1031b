//! Chain target descriptor
//!
//! The session requires the wallet to operate on one specific chain. The
//! descriptor doubles as the `wallet_addEthereumChain` parameter, so its
//! serialized form follows EIP-3085 exactly (camelCase keys, hex chain id).

use serde::{Deserialize, Serialize};

use crate::error::WalletError;

/// Holesky testnet chain id
pub const HOLESKY_CHAIN_ID: u64 = 17000;

/// Native currency of a chain as presented to the wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// Network the session must be aligned with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainTarget {
    #[serde(with = "hex_chain_id")]
    pub chain_id: u64,
    pub chain_name: String,
    pub native_currency: NativeCurrency,
    pub rpc_urls: Vec<String>,
    pub block_explorer_urls: Vec<String>,
}

impl ChainTarget {
    /// Holesky, as the deployed contracts expect
    pub fn holesky() -> Self {
        Self {
            chain_id: HOLESKY_CHAIN_ID,
            chain_name: "Holsky".to_string(),
            native_currency: NativeCurrency {
                name: "holsky".to_string(),
                symbol: "ETH".to_string(),
                decimals: 18,
            },
            rpc_urls: vec!["https://rpc.ankr.com/eth_holesky".to_string()],
            block_explorer_urls: vec!["https://holesky.etherscan.io/".to_string()],
        }
    }

    /// Chain id in the `0x`-prefixed form wallets exchange
    pub fn chain_id_hex(&self) -> String {
        format_chain_id(self.chain_id)
    }

    /// Check that the descriptor is usable for an add-chain request
    pub fn validate(&self) -> Result<(), WalletError> {
        if self.chain_id == 0 {
            return Err(WalletError::invalid_config("chain id must be non-zero"));
        }
        if self.chain_name.trim().is_empty() {
            return Err(WalletError::invalid_config("chain name is empty"));
        }
        if self.rpc_urls.is_empty() {
            return Err(WalletError::invalid_config(format!(
                "{} has no RPC URL",
                self.chain_name
            )));
        }
        for url in &self.rpc_urls {
            validate_rpc_url(url, &self.chain_name)?;
        }
        Ok(())
    }
}

impl Default for ChainTarget {
    fn default() -> Self {
        Self::holesky()
    }
}

/// Format a chain id as a `0x`-prefixed lowercase hex quantity
pub fn format_chain_id(chain_id: u64) -> String {
    format!("0x{:x}", chain_id)
}

/// Parse a chain id given as hex quantity (`0x4268`) or decimal (`17000`)
pub fn parse_chain_id(raw: &str) -> Result<u64, WalletError> {
    let raw = raw.trim();
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).map_err(|e| {
            WalletError::invalid_config(format!("invalid hex chain id {:?}: {}", raw, e))
        }),
        None => raw.parse::<u64>().map_err(|e| {
            WalletError::invalid_config(format!("invalid chain id {:?}: {}", raw, e))
        }),
    }
}

/// Validates that a URL uses http/https and has a host component.
pub fn validate_rpc_url(url_str: &str, name: &str) -> Result<url::Url, WalletError> {
    let parsed = url::Url::parse(url_str)
        .map_err(|e| WalletError::invalid_config(format!("{} must be a valid URL: {}", name, e)))?;

    let scheme = parsed.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(WalletError::invalid_config(format!(
            "{} must use http:// or https:// scheme, got {}",
            name, scheme
        )));
    }

    if parsed.host_str().is_none() {
        return Err(WalletError::invalid_config(format!(
            "{} must have a host component",
            name
        )));
    }

    if scheme == "http" {
        tracing::warn!("{} uses unencrypted http://, use https:// in production", name);
    }

    Ok(parsed)
}

/// Parse a comma-separated URL list into individual trimmed URLs.
pub fn parse_url_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

mod hex_chain_id {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(chain_id: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_chain_id(*chain_id))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_chain_id(&raw).map_err(serde::de::Error::custom)
    }
}
