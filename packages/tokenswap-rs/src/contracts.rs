//! Contract ABI definitions and session-scoped bindings
//!
//! Uses alloy's sol! macro for the ABI and routes every call through the
//! wallet provider, so reads and writes go wherever the wallet is pointed.
//!
//! A binding shares a liveness flag with the session that created it. Once
//! the session disconnects the flag drops and every further call on a
//! retained binding fails with [`WalletError::StaleBinding`] without
//! reaching the wallet.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::SolCall;
use tracing::{debug, info};

use crate::confirmation::{wait_for_receipt, ConfirmationPolicy};
use crate::error::WalletError;
use crate::provider::{self, ReceiptSummary, WalletProvider};
use crate::types::{ContractAddresses, SwapDirection, TokenSide};

sol! {
    /// ERC20 subset exposed by TokenA and TokenB
    contract ERC20 {
        function balanceOf(address account) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
    }

    /// Swap contract entry points, one per direction
    contract ISwap {
        /// TokenB in, TokenA out
        function swapToken1ForToken2(uint256 amount) external;
        /// TokenA in, TokenB out
        function swapToken2ForToken1(uint256 amount) external;
    }
}

// ============================================================================
// Generic Binding
// ============================================================================

/// Callable handle to one deployed contract for one signer
#[derive(Clone)]
pub struct ContractBinding {
    name: &'static str,
    address: Address,
    signer: Address,
    provider: Arc<dyn WalletProvider>,
    live: Arc<AtomicBool>,
    confirmation: ConfirmationPolicy,
}

impl fmt::Debug for ContractBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractBinding")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("signer", &self.signer)
            .field("live", &self.live.load(Ordering::Acquire))
            .finish()
    }
}

impl ContractBinding {
    fn new(
        name: &'static str,
        address: Address,
        signer: Address,
        provider: Arc<dyn WalletProvider>,
        live: Arc<AtomicBool>,
        confirmation: ConfirmationPolicy,
    ) -> Self {
        Self {
            name,
            address,
            signer,
            provider,
            live,
            confirmation,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn signer(&self) -> Address {
        self.signer
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    fn ensure_live(&self) -> Result<(), WalletError> {
        if self.is_live() {
            Ok(())
        } else {
            Err(WalletError::StaleBinding {
                contract: self.name.to_string(),
            })
        }
    }

    /// `eth_call` with the given calldata
    pub async fn read(&self, calldata: Vec<u8>) -> Result<Bytes, WalletError> {
        self.ensure_live()?;
        provider::call(
            self.provider.as_ref(),
            self.signer,
            self.address,
            Bytes::from(calldata),
        )
        .await
    }

    /// Submit a transaction with the given calldata and wait for its receipt
    pub async fn transact(&self, calldata: Vec<u8>) -> Result<ReceiptSummary, WalletError> {
        self.ensure_live()?;
        let tx_hash = provider::send_transaction(
            self.provider.as_ref(),
            self.signer,
            self.address,
            Bytes::from(calldata),
        )
        .await?;

        info!(
            contract = self.name,
            address = %self.address,
            tx_hash = %tx_hash,
            "Transaction submitted, awaiting confirmation"
        );

        wait_for_receipt(self.provider.as_ref(), tx_hash, self.confirmation).await
    }
}

// ============================================================================
// Token & Swap Bindings
// ============================================================================

/// Binding for TokenA or TokenB
#[derive(Debug, Clone)]
pub struct TokenBinding(ContractBinding);

impl TokenBinding {
    pub fn address(&self) -> Address {
        self.0.address()
    }

    pub async fn balance_of(&self, account: Address) -> Result<U256, WalletError> {
        let raw = self
            .0
            .read(ERC20::balanceOfCall { account }.abi_encode())
            .await?;
        let decoded = ERC20::balanceOfCall::abi_decode_returns(&raw, true)
            .map_err(|e| WalletError::malformed("balanceOf", e))?;
        Ok(decoded._0)
    }

    pub async fn approve(&self, spender: Address, amount: U256) -> Result<ReceiptSummary, WalletError> {
        debug!(
            token = self.0.name(),
            spender = %spender,
            amount = %amount,
            "Submitting approve"
        );
        self.0
            .transact(ERC20::approveCall { spender, amount }.abi_encode())
            .await
    }
}

/// Binding for the Swap contract
#[derive(Debug, Clone)]
pub struct SwapBinding(ContractBinding);

impl SwapBinding {
    pub fn address(&self) -> Address {
        self.0.address()
    }

    /// Calldata for the direction-specific entry point
    pub fn swap_calldata(direction: SwapDirection, amount: U256) -> Vec<u8> {
        match direction {
            SwapDirection::AToB => ISwap::swapToken2ForToken1Call { amount }.abi_encode(),
            SwapDirection::BToA => ISwap::swapToken1ForToken2Call { amount }.abi_encode(),
        }
    }

    pub async fn swap(&self, direction: SwapDirection, amount: U256) -> Result<ReceiptSummary, WalletError> {
        debug!(direction = %direction, amount = %amount, "Submitting swap");
        self.0.transact(Self::swap_calldata(direction, amount)).await
    }
}

// ============================================================================
// Session Bindings
// ============================================================================

/// The three bindings created for one connected signer
#[derive(Debug)]
pub struct SessionBindings {
    signer: Address,
    contracts: ContractAddresses,
    token_a: TokenBinding,
    token_b: TokenBinding,
    swap: SwapBinding,
    live: Arc<AtomicBool>,
}

impl SessionBindings {
    pub fn new(
        provider: Arc<dyn WalletProvider>,
        signer: Address,
        contracts: ContractAddresses,
        confirmation: ConfirmationPolicy,
    ) -> Self {
        let live = Arc::new(AtomicBool::new(true));
        let bind = |name, address| {
            ContractBinding::new(
                name,
                address,
                signer,
                provider.clone(),
                live.clone(),
                confirmation,
            )
        };

        Self {
            signer,
            contracts,
            token_a: TokenBinding(bind("TokenA", contracts.token_a)),
            token_b: TokenBinding(bind("TokenB", contracts.token_b)),
            swap: SwapBinding(bind("Swap", contracts.swap)),
            live,
        }
    }

    pub fn signer(&self) -> Address {
        self.signer
    }

    pub fn contracts(&self) -> &ContractAddresses {
        &self.contracts
    }

    pub fn token(&self, side: TokenSide) -> &TokenBinding {
        match side {
            TokenSide::A => &self.token_a,
            TokenSide::B => &self.token_b,
        }
    }

    pub fn swap(&self) -> &SwapBinding {
        &self.swap
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Mark every binding created from this set as stale
    pub fn invalidate(&self) {
        self.live.store(false, Ordering::Release);
    }
}
