//! Shared types for the session and swap workflow

use std::fmt;
use std::str::FromStr;

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

use crate::error::WalletError;

// ============================================================================
// Swap Direction
// ============================================================================

/// Which token is spent and which is received
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SwapDirection {
    /// Spend TokenA, receive TokenB
    #[default]
    AToB,
    /// Spend TokenB, receive TokenA
    BToA,
}

impl SwapDirection {
    pub fn toggled(self) -> Self {
        match self {
            SwapDirection::AToB => SwapDirection::BToA,
            SwapDirection::BToA => SwapDirection::AToB,
        }
    }

    /// Token the user spends
    pub fn input(self) -> TokenSide {
        match self {
            SwapDirection::AToB => TokenSide::A,
            SwapDirection::BToA => TokenSide::B,
        }
    }

    /// Token the user receives
    pub fn output(self) -> TokenSide {
        self.input().other()
    }
}

impl fmt::Display for SwapDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwapDirection::AToB => write!(f, "TokenA -> TokenB"),
            SwapDirection::BToA => write!(f, "TokenB -> TokenA"),
        }
    }
}

impl FromStr for SwapDirection {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a-to-b" | "atob" | "a2b" | "ab" => Ok(SwapDirection::AToB),
            "b-to-a" | "btoa" | "b2a" | "ba" => Ok(SwapDirection::BToA),
            other => Err(WalletError::invalid_config(format!(
                "unknown swap direction {:?} (expected a-to-b or b-to-a)",
                other
            ))),
        }
    }
}

/// One of the two tokens in the pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenSide {
    A,
    B,
}

impl TokenSide {
    pub fn other(self) -> Self {
        match self {
            TokenSide::A => TokenSide::B,
            TokenSide::B => TokenSide::A,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TokenSide::A => "TokenA",
            TokenSide::B => "TokenB",
        }
    }
}

// ============================================================================
// Deployment
// ============================================================================

/// Addresses of the deployed contract triplet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractAddresses {
    pub token_a: Address,
    pub token_b: Address,
    pub swap: Address,
}

impl ContractAddresses {
    pub fn token(&self, side: TokenSide) -> Address {
        match side {
            TokenSide::A => self.token_a,
            TokenSide::B => self.token_b,
        }
    }
}

/// Which contract is authorized to pull the input token
///
/// The deployed Swap contract has each token contract pull from the
/// other side, so the default approves the output-side token contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SpenderPolicy {
    #[default]
    CounterToken,
    SwapContract,
}

impl SpenderPolicy {
    pub fn resolve(self, direction: SwapDirection, contracts: &ContractAddresses) -> Address {
        match self {
            SpenderPolicy::CounterToken => contracts.token(direction.output()),
            SpenderPolicy::SwapContract => contracts.swap,
        }
    }
}

impl FromStr for SpenderPolicy {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "counter-token" | "token" => Ok(SpenderPolicy::CounterToken),
            "swap-contract" | "swap" => Ok(SpenderPolicy::SwapContract),
            other => Err(WalletError::invalid_config(format!(
                "unknown spender policy {:?} (expected counter-token or swap-contract)",
                other
            ))),
        }
    }
}

// ============================================================================
// Balances
// ============================================================================

/// Displayed token holdings of the session address
///
/// Empty strings mean the balance has not been read yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalancePair {
    pub token_a: String,
    pub token_b: String,
}

impl BalancePair {
    pub fn is_loaded(&self) -> bool {
        !self.token_a.is_empty() && !self.token_b.is_empty()
    }

    pub fn get(&self, side: TokenSide) -> &str {
        match side {
            TokenSide::A => &self.token_a,
            TokenSide::B => &self.token_b,
        }
    }
}
