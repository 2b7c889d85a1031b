//! Scripted wallet provider
//!
//! Answers the provider methods the workflow uses from in-memory state and
//! records every request, so tests can both drive edge cases (rejections,
//! unknown chains, reverts, failing reads) and assert on what was sent.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use alloy::primitives::{keccak256, Address, Bytes, B256, U256};
use alloy::sol_types::{SolCall, SolValue};
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::chain::{format_chain_id, parse_chain_id, HOLESKY_CHAIN_ID};
use crate::contracts::ERC20;
use crate::error::ProviderError;
use crate::provider::WalletProvider;

/// A request as the wallet received it
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: String,
    pub params: Value,
}

/// A transaction accepted by `eth_sendTransaction`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentTransaction {
    pub from: Address,
    pub to: Address,
    pub data: Bytes,
    pub tx_hash: B256,
}

struct MockState {
    accounts: Vec<Address>,
    reject_accounts: bool,
    chain_id: u64,
    known_chains: HashSet<u64>,
    switch_error: Option<ProviderError>,
    added_chains: Vec<Value>,
    native_balances: HashMap<Address, U256>,
    token_balances: HashMap<(Address, Address), U256>,
    fail_reads: bool,
    reject_signing: bool,
    revert_transactions: bool,
    receipts: HashMap<B256, Value>,
    receipt_delay: u32,
    receipt_polls: HashMap<B256, u32>,
    hold_receipts: bool,
    requests: Vec<RecordedRequest>,
    sent: Vec<SentTransaction>,
    nonce: u64,
}

/// In-memory wallet that starts connected to Holesky with one account
pub struct MockWallet {
    state: Mutex<MockState>,
}

impl Default for MockWallet {
    fn default() -> Self {
        Self::new()
    }
}

impl MockWallet {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                accounts: vec![Address::repeat_byte(0x11)],
                reject_accounts: false,
                chain_id: HOLESKY_CHAIN_ID,
                known_chains: HashSet::from([1, HOLESKY_CHAIN_ID]),
                switch_error: None,
                added_chains: Vec::new(),
                native_balances: HashMap::new(),
                token_balances: HashMap::new(),
                fail_reads: false,
                reject_signing: false,
                revert_transactions: false,
                receipts: HashMap::new(),
                receipt_delay: 0,
                receipt_polls: HashMap::new(),
                hold_receipts: false,
                requests: Vec::new(),
                sent: Vec::new(),
                nonce: 0,
            }),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }

    // =========================================================================
    // Scripting
    // =========================================================================

    /// First exposed account
    pub fn account(&self) -> Address {
        self.with_state(|s| s.accounts.first().copied().unwrap_or(Address::ZERO))
    }

    pub fn set_accounts(&self, accounts: Vec<Address>) {
        self.with_state(|s| s.accounts = accounts);
    }

    pub fn reject_account_requests(&self, reject: bool) {
        self.with_state(|s| s.reject_accounts = reject);
    }

    /// Select `chain_id` as the wallet's current chain and mark it known
    pub fn set_chain(&self, chain_id: u64) {
        self.with_state(|s| {
            s.chain_id = chain_id;
            s.known_chains.insert(chain_id);
        });
    }

    pub fn current_chain(&self) -> u64 {
        self.with_state(|s| s.chain_id)
    }

    /// Make `chain_id` unknown so switching to it yields 4902
    pub fn forget_chain(&self, chain_id: u64) {
        self.with_state(|s| {
            s.known_chains.remove(&chain_id);
        });
    }

    /// Fail every chain switch with `error`
    pub fn fail_switch_with(&self, error: ProviderError) {
        self.with_state(|s| s.switch_error = Some(error));
    }

    /// Descriptors received through `wallet_addEthereumChain`
    pub fn added_chains(&self) -> Vec<Value> {
        self.with_state(|s| s.added_chains.clone())
    }

    pub fn set_native_balance(&self, account: Address, balance: U256) {
        self.with_state(|s| {
            s.native_balances.insert(account, balance);
        });
    }

    pub fn set_token_balance(&self, token: Address, owner: Address, balance: U256) {
        self.with_state(|s| {
            s.token_balances.insert((token, owner), balance);
        });
    }

    /// Make every `eth_call` fail
    pub fn fail_reads(&self, fail: bool) {
        self.with_state(|s| s.fail_reads = fail);
    }

    /// Decline every `eth_sendTransaction`
    pub fn reject_signing(&self, reject: bool) {
        self.with_state(|s| s.reject_signing = reject);
    }

    /// Mine future transactions with a failed status
    pub fn revert_transactions(&self, revert: bool) {
        self.with_state(|s| s.revert_transactions = revert);
    }

    /// Answer this many receipt polls per transaction with `null` first
    pub fn set_receipt_delay(&self, polls: u32) {
        self.with_state(|s| s.receipt_delay = polls);
    }

    /// While held, every receipt poll returns `null`
    pub fn hold_receipts(&self, hold: bool) {
        self.with_state(|s| s.hold_receipts = hold);
    }

    /// Register a mined receipt for a fresh hash
    pub fn insert_receipt(&self, success: bool) -> B256 {
        self.with_state(|s| {
            let tx_hash = next_hash(s);
            s.receipts.insert(tx_hash, receipt_json(tx_hash, success));
            tx_hash
        })
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.with_state(|s| s.requests.clone())
    }

    pub fn count_requests(&self, method: &str) -> usize {
        self.with_state(|s| s.requests.iter().filter(|r| r.method == method).count())
    }

    pub fn sent_transactions(&self) -> Vec<SentTransaction> {
        self.with_state(|s| s.sent.clone())
    }
}

fn next_hash(state: &mut MockState) -> B256 {
    state.nonce += 1;
    keccak256(state.nonce.to_be_bytes())
}

fn receipt_json(tx_hash: B256, success: bool) -> Value {
    json!({
        "transactionHash": tx_hash,
        "blockNumber": "0x1",
        "status": if success { "0x1" } else { "0x0" },
    })
}

fn first_param<T: serde::de::DeserializeOwned>(params: &Value, field: &str) -> Result<T, ProviderError> {
    let raw = params
        .get(0)
        .and_then(|p| p.get(field))
        .cloned()
        .ok_or_else(|| ProviderError::invalid_params(format!("missing {}", field)))?;
    serde_json::from_value(raw).map_err(|e| ProviderError::invalid_params(e.to_string()))
}

#[async_trait]
impl WalletProvider for MockWallet {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        self.with_state(|s| {
            s.requests.push(RecordedRequest {
                method: method.to_string(),
                params: params.clone(),
            });

            match method {
                "eth_requestAccounts" if s.reject_accounts => Err(ProviderError::user_rejected()),
                "eth_requestAccounts" | "eth_accounts" => Ok(json!(s.accounts)),

                "eth_chainId" => Ok(json!(format_chain_id(s.chain_id))),

                "wallet_switchEthereumChain" => {
                    if let Some(err) = s.switch_error.clone() {
                        return Err(err);
                    }
                    let raw: String = first_param(&params, "chainId")?;
                    let chain_id = parse_chain_id(&raw).map_err(|e| ProviderError::invalid_params(e.to_string()))?;
                    if !s.known_chains.contains(&chain_id) {
                        return Err(ProviderError::unrecognized_chain(&raw));
                    }
                    s.chain_id = chain_id;
                    Ok(Value::Null)
                }

                "wallet_addEthereumChain" => {
                    let raw: String = first_param(&params, "chainId")?;
                    let chain_id = parse_chain_id(&raw).map_err(|e| ProviderError::invalid_params(e.to_string()))?;
                    if let Some(descriptor) = params.get(0) {
                        s.added_chains.push(descriptor.clone());
                    }
                    s.known_chains.insert(chain_id);
                    s.chain_id = chain_id;
                    Ok(Value::Null)
                }

                "eth_getBalance" => {
                    let account: Address = params
                        .get(0)
                        .cloned()
                        .and_then(|v| serde_json::from_value(v).ok())
                        .ok_or_else(|| ProviderError::invalid_params("missing address"))?;
                    let balance = s.native_balances.get(&account).copied().unwrap_or_default();
                    Ok(json!(balance))
                }

                "eth_call" => {
                    if s.fail_reads {
                        return Err(ProviderError::internal("node unavailable"));
                    }
                    let to: Address = first_param(&params, "to")?;
                    let data: Bytes = first_param(&params, "data")?;
                    let call = ERC20::balanceOfCall::abi_decode(&data, true)
                        .map_err(|_| ProviderError::new(-32000, "execution reverted"))?;
                    let balance = s
                        .token_balances
                        .get(&(to, call.account))
                        .copied()
                        .unwrap_or_default();
                    Ok(json!(Bytes::from(balance.abi_encode())))
                }

                "eth_sendTransaction" => {
                    if s.reject_signing {
                        return Err(ProviderError::user_rejected());
                    }
                    let from: Address = first_param(&params, "from")?;
                    let to: Address = first_param(&params, "to")?;
                    let data: Bytes = first_param(&params, "data")?;
                    let tx_hash = next_hash(s);
                    let success = !s.revert_transactions;
                    s.receipts.insert(tx_hash, receipt_json(tx_hash, success));
                    s.sent.push(SentTransaction {
                        from,
                        to,
                        data,
                        tx_hash,
                    });
                    Ok(json!(tx_hash))
                }

                "eth_getTransactionReceipt" => {
                    let tx_hash: B256 = params
                        .get(0)
                        .cloned()
                        .and_then(|v| serde_json::from_value(v).ok())
                        .ok_or_else(|| ProviderError::invalid_params("missing hash"))?;
                    if s.hold_receipts {
                        return Ok(Value::Null);
                    }
                    let polls = s.receipt_polls.entry(tx_hash).or_insert(0);
                    if *polls < s.receipt_delay {
                        *polls += 1;
                        return Ok(Value::Null);
                    }
                    Ok(s.receipts.get(&tx_hash).cloned().unwrap_or(Value::Null))
                }

                other => Err(ProviderError::unsupported_method(other)),
            }
        })
    }
}
