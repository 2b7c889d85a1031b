//! TokenSwap-RS: Wallet Session and Swap Workflow
//!
//! This crate connects to a wallet, keeps it on the expected network and
//! drives the approve-then-swap sequence against the TokenA/TokenB/Swap
//! contracts:
//!
//! - **Provider** - EIP-1193 style `request(method, params)` seam plus typed helpers
//! - **Session** - connect/disconnect lifecycle, network alignment, contract bindings
//! - **Swap** - balances, approval gating, direction toggle, single-flight guard
//! - **Units** - 18-decimal amount conversion
//! - **Local Wallet** - private-key provider over alloy for terminal use
//! - **Testing** - scripted `MockWallet`
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! tokenswap-rs = { path = "../tokenswap-rs" }
//! ```
//!
//! ## Feature Flags
//!
//! - `local-wallet` - Enable the alloy-backed private-key wallet (default)
//! - `testing` - Enable the scripted mock wallet

pub mod chain;
pub mod confirmation;
pub mod contracts;
pub mod error;
pub mod provider;
pub mod redact;
pub mod session;
pub mod swap;
pub mod types;
pub mod units;

#[cfg(feature = "local-wallet")]
pub mod local_wallet;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use chain::{ChainTarget, NativeCurrency, HOLESKY_CHAIN_ID};
pub use confirmation::ConfirmationPolicy;
pub use error::{ErrorKind, ProviderError, WalletError};
pub use provider::{ReceiptSummary, WalletProvider};
pub use redact::Redacted;
pub use session::{NetworkSwitch, SessionManager, SessionState, SessionStatus};
pub use swap::{Approval, PendingAction, SwapOutcome, SwapState, SwapWorkflow};
pub use types::{BalancePair, ContractAddresses, SpenderPolicy, SwapDirection, TokenSide};
pub use units::{from_base_units, to_base_units, TOKEN_DECIMALS};

#[cfg(feature = "local-wallet")]
pub use local_wallet::{AutoApprove, ConsentRequest, KnownNetwork, LocalWallet, SigningPrompt};
