//! TokenSwap CLI configuration

use std::env;
use std::str::FromStr;
use std::time::Duration;

use alloy::primitives::Address;
use eyre::{eyre, Result, WrapErr};
use tokenswap_rs::chain::{parse_chain_id, parse_url_list, validate_rpc_url};
use tokenswap_rs::{
    ChainTarget, ConfirmationPolicy, ContractAddresses, NativeCurrency, Redacted, SpenderPolicy,
};

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Private key of the local wallet
    pub wallet_private_key: Redacted<String>,
    /// RPC URL of the wallet's home network
    pub wallet_rpc_url: String,
    /// Chain id of the wallet's home network
    pub wallet_chain_id: u64,

    pub contracts: ContractAddresses,

    /// Network the session must run on
    pub target: ChainTarget,

    /// Which address receives the approval
    pub spender: SpenderPolicy,

    pub confirmation: ConfirmationPolicy,
}

impl Config {
    /// Load configuration from `.env` and the environment
    pub fn load() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded .env from {:?}", path);
        }
        Self::from_env()
    }

    /// Load configuration from the process environment only
    pub fn from_env() -> Result<Self> {
        let wallet_rpc_url = required("WALLET_RPC_URL")?;
        validate_rpc_url(&wallet_rpc_url, "WALLET_RPC_URL")?;

        let wallet_chain_id =
            parse_chain_id(&required("WALLET_CHAIN_ID")?).wrap_err("Invalid WALLET_CHAIN_ID")?;

        let contracts = ContractAddresses {
            token_a: address("TOKEN_A_ADDRESS")?,
            token_b: address("TOKEN_B_ADDRESS")?,
            swap: address("SWAP_ADDRESS")?,
        };

        let target = target_from_env()?;

        let spender = match env::var("SWAP_SPENDER") {
            Ok(raw) => SpenderPolicy::from_str(&raw).wrap_err("Invalid SWAP_SPENDER")?,
            Err(_) => SpenderPolicy::default(),
        };

        let confirmation = ConfirmationPolicy {
            poll_interval: Duration::from_millis(
                env::var("CONFIRMATION_POLL_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(1000),
            ),
            timeout: env::var("CONFIRMATION_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs),
        };

        Ok(Self {
            wallet_private_key: Redacted(required("WALLET_PRIVATE_KEY")?),
            wallet_rpc_url,
            wallet_chain_id,
            contracts,
            target,
            spender,
            confirmation,
        })
    }
}

fn required(name: &str) -> Result<String> {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| eyre!("{} required", name))
}

fn address(name: &str) -> Result<Address> {
    let raw = required(name)?;
    Address::from_str(raw.trim()).wrap_err_with(|| format!("Invalid {}", name))
}

/// Chain target, Holesky unless overridden
fn target_from_env() -> Result<ChainTarget> {
    let defaults = ChainTarget::holesky();

    let chain_id = match env::var("TARGET_CHAIN_ID") {
        Ok(raw) => parse_chain_id(&raw).wrap_err("Invalid TARGET_CHAIN_ID")?,
        Err(_) => defaults.chain_id,
    };

    let rpc_urls = env::var("TARGET_RPC_URLS")
        .map(|raw| parse_url_list(&raw))
        .unwrap_or(defaults.rpc_urls);
    let block_explorer_urls = env::var("TARGET_EXPLORER_URLS")
        .map(|raw| parse_url_list(&raw))
        .unwrap_or(defaults.block_explorer_urls);

    let target = ChainTarget {
        chain_id,
        chain_name: env::var("TARGET_CHAIN_NAME").unwrap_or(defaults.chain_name),
        native_currency: NativeCurrency {
            name: env::var("TARGET_CURRENCY_NAME").unwrap_or(defaults.native_currency.name),
            symbol: env::var("TARGET_CURRENCY_SYMBOL").unwrap_or(defaults.native_currency.symbol),
            decimals: defaults.native_currency.decimals,
        },
        rpc_urls,
        block_explorer_urls,
    };

    target.validate().wrap_err("Invalid target chain")?;
    Ok(target)
}
