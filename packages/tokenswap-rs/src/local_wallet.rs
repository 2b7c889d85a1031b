//! Local key wallet
//!
//! A [`WalletProvider`] that holds a private key and talks to nodes over
//! HTTP with alloy, standing in for a browser extension when the workflow
//! runs from a terminal.
//!
//! ## Behavior
//!
//! - Account access, chain switches, chain additions and every transaction
//!   go through a [`SigningPrompt`]. A refusal is reported as 4001.
//! - The wallet knows a set of networks (chain id, name, RPC URL) seeded
//!   with its home network. Switching to an unknown one yields 4902.
//! - `wallet_addEthereumChain` checks the descriptor and asks the node for
//!   its chain id before registering and selecting it.
//! - Reads are forwarded verbatim to the selected network.
//! - Transactions are filled (nonce, gas, fees) with alloy's recommended
//!   fillers, signed locally and broadcast.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use alloy::network::EthereumWallet;
use alloy::primitives::{Address, Bytes};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::TransportError;
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

use crate::chain::{format_chain_id, parse_chain_id, validate_rpc_url, ChainTarget};
use crate::error::{ProviderError, WalletError, UNAUTHORIZED};
use crate::provider::WalletProvider;
use crate::redact::Redacted;

// ============================================================================
// Consent
// ============================================================================

/// Something the wallet needs the user to agree to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsentRequest {
    Connect {
        address: Address,
    },
    SwitchChain {
        chain_id: u64,
        name: String,
    },
    AddChain {
        chain_id: u64,
        name: String,
        rpc_url: String,
    },
    SendTransaction {
        chain_id: u64,
        from: Address,
        to: Option<Address>,
        data: Bytes,
    },
}

impl fmt::Display for ConsentRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsentRequest::Connect { address } => {
                write!(f, "Connect account {} to this session?", address)
            }
            ConsentRequest::SwitchChain { chain_id, name } => {
                write!(f, "Switch network to {} (chain {})?", name, chain_id)
            }
            ConsentRequest::AddChain {
                chain_id,
                name,
                rpc_url,
            } => write!(
                f,
                "Add network {} (chain {}, RPC {}) and switch to it?",
                name, chain_id, rpc_url
            ),
            ConsentRequest::SendTransaction {
                chain_id,
                from,
                to,
                data,
            } => {
                let to = to.map(|a| a.to_string()).unwrap_or_else(|| "<create>".to_string());
                let selector = data
                    .get(..4)
                    .map(|s| format!("0x{}", alloy::primitives::hex::encode(s)))
                    .unwrap_or_else(|| "-".to_string());
                write!(
                    f,
                    "Sign transaction on chain {} from {} to {} (selector {})?",
                    chain_id, from, to, selector
                )
            }
        }
    }
}

/// Asks the user to approve wallet actions
#[async_trait]
pub trait SigningPrompt: Send + Sync {
    async fn confirm(&self, request: &ConsentRequest) -> bool;
}

/// Approves everything. For `--yes` runs and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

#[async_trait]
impl SigningPrompt for AutoApprove {
    async fn confirm(&self, request: &ConsentRequest) -> bool {
        debug!(request = %request, "Auto-approved");
        true
    }
}

// ============================================================================
// Networks
// ============================================================================

/// A network the wallet can operate on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownNetwork {
    pub chain_id: u64,
    pub name: String,
    pub rpc_url: Url,
}

impl KnownNetwork {
    pub fn new(chain_id: u64, name: impl Into<String>, rpc_url: &str) -> Result<Self, WalletError> {
        let name = name.into();
        let rpc_url = validate_rpc_url(rpc_url, &name)?;
        Ok(Self {
            chain_id,
            name,
            rpc_url,
        })
    }
}

#[derive(Debug)]
struct Networks {
    known: HashMap<u64, KnownNetwork>,
    current: u64,
}

impl Networks {
    fn selected(&self) -> Result<KnownNetwork, ProviderError> {
        self.known
            .get(&self.current)
            .cloned()
            .ok_or_else(|| ProviderError::internal("selected network is not registered"))
    }
}

// ============================================================================
// Wallet
// ============================================================================

/// Private-key wallet speaking the provider protocol
pub struct LocalWallet {
    signer: PrivateKeySigner,
    prompt: Arc<dyn SigningPrompt>,
    networks: RwLock<Networks>,
    authorized: AtomicBool,
}

impl fmt::Debug for LocalWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalWallet")
            .field("address", &self.signer.address())
            .field("authorized", &self.authorized.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

impl LocalWallet {
    pub fn new(signer: PrivateKeySigner, home: KnownNetwork, prompt: Arc<dyn SigningPrompt>) -> Self {
        info!(
            address = %signer.address(),
            chain_id = home.chain_id,
            network = %home.name,
            "Local wallet initialized"
        );
        let current = home.chain_id;
        Self {
            signer,
            prompt,
            networks: RwLock::new(Networks {
                known: HashMap::from([(current, home)]),
                current,
            }),
            authorized: AtomicBool::new(false),
        }
    }

    /// Build from a hex private key
    pub fn from_private_key(
        private_key: &Redacted<String>,
        home: KnownNetwork,
        prompt: Arc<dyn SigningPrompt>,
    ) -> Result<Self, WalletError> {
        let signer: PrivateKeySigner = private_key
            .expose()
            .trim()
            .parse()
            .map_err(|_| WalletError::InvalidKey)?;
        Ok(Self::new(signer, home, prompt))
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Register another network without selecting it
    pub async fn register_network(&self, network: KnownNetwork) {
        let mut networks = self.networks.write().await;
        debug!(chain_id = network.chain_id, network = %network.name, "Network registered");
        networks.known.insert(network.chain_id, network);
    }

    pub async fn current_chain(&self) -> u64 {
        self.networks.read().await.current
    }

    pub fn is_authorized(&self) -> bool {
        self.authorized.load(Ordering::Acquire)
    }

    async fn consent(&self, request: ConsentRequest) -> Result<(), ProviderError> {
        if self.prompt.confirm(&request).await {
            Ok(())
        } else {
            info!(request = %request, "User declined");
            Err(ProviderError::user_rejected())
        }
    }

    fn ensure_authorized(&self) -> Result<(), ProviderError> {
        if self.is_authorized() {
            Ok(())
        } else {
            Err(ProviderError::new(
                UNAUTHORIZED,
                "The requested account has not been authorized by the user",
            ))
        }
    }

    // =========================================================================
    // Methods
    // =========================================================================

    async fn request_accounts(&self) -> Result<Value, ProviderError> {
        if !self.is_authorized() {
            self.consent(ConsentRequest::Connect {
                address: self.address(),
            })
            .await?;
            self.authorized.store(true, Ordering::Release);
        }
        Ok(json!([self.address()]))
    }

    fn accounts(&self) -> Value {
        if self.is_authorized() {
            json!([self.address()])
        } else {
            json!([])
        }
    }

    async fn switch_chain(&self, params: &Value) -> Result<Value, ProviderError> {
        let raw: String = param_field(params, "chainId")?;
        let chain_id = parse_chain_id(&raw).map_err(|e| ProviderError::invalid_params(e.to_string()))?;

        let network = {
            let networks = self.networks.read().await;
            if networks.current == chain_id {
                return Ok(Value::Null);
            }
            networks
                .known
                .get(&chain_id)
                .cloned()
                .ok_or_else(|| ProviderError::unrecognized_chain(&raw))?
        };

        self.consent(ConsentRequest::SwitchChain {
            chain_id,
            name: network.name.clone(),
        })
        .await?;

        self.networks.write().await.current = chain_id;
        info!(chain_id, network = %network.name, "Switched network");
        Ok(Value::Null)
    }

    async fn add_chain(&self, params: &Value) -> Result<Value, ProviderError> {
        let descriptor = params
            .get(0)
            .cloned()
            .ok_or_else(|| ProviderError::invalid_params("missing chain descriptor"))?;
        let target: ChainTarget = serde_json::from_value(descriptor)
            .map_err(|e| ProviderError::invalid_params(e.to_string()))?;
        target
            .validate()
            .map_err(|e| ProviderError::invalid_params(e.to_string()))?;

        let rpc_url = target
            .rpc_urls
            .first()
            .ok_or_else(|| ProviderError::invalid_params("no RPC URL"))?;
        let network = KnownNetwork::new(target.chain_id, target.chain_name.clone(), rpc_url)
            .map_err(|e| ProviderError::invalid_params(e.to_string()))?;

        self.consent(ConsentRequest::AddChain {
            chain_id: network.chain_id,
            name: network.name.clone(),
            rpc_url: network.rpc_url.to_string(),
        })
        .await?;

        let reported = ProviderBuilder::new()
            .on_http(network.rpc_url.clone())
            .get_chain_id()
            .await
            .map_err(transport_error)?;
        if reported != network.chain_id {
            warn!(
                expected = network.chain_id,
                reported,
                rpc_url = %network.rpc_url,
                "RPC endpoint reports a different chain"
            );
            return Err(ProviderError::invalid_params(format!(
                "RPC endpoint returned chain id {}, expected {}",
                format_chain_id(reported),
                target.chain_id_hex()
            )));
        }

        let mut networks = self.networks.write().await;
        info!(chain_id = network.chain_id, network = %network.name, "Network added and selected");
        networks.current = network.chain_id;
        networks.known.insert(network.chain_id, network);
        Ok(Value::Null)
    }

    /// Pass a read-only method through to the selected network
    async fn forward(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let network = self.networks.read().await.selected()?;
        let provider = ProviderBuilder::new().on_http(network.rpc_url);
        provider
            .raw_request::<Value, Value>(method.to_string().into(), params)
            .await
            .map_err(transport_error)
    }

    async fn send_transaction(&self, params: &Value) -> Result<Value, ProviderError> {
        self.ensure_authorized()?;

        let raw = params
            .get(0)
            .cloned()
            .ok_or_else(|| ProviderError::invalid_params("missing transaction"))?;
        let tx: TransactionRequest =
            serde_json::from_value(raw).map_err(|e| ProviderError::invalid_params(e.to_string()))?;

        let from = tx.from.unwrap_or_else(|| self.address());
        if from != self.address() {
            return Err(ProviderError::new(
                UNAUTHORIZED,
                format!("account {} is not managed by this wallet", from),
            ));
        }

        let network = self.networks.read().await.selected()?;
        self.consent(ConsentRequest::SendTransaction {
            chain_id: network.chain_id,
            from,
            to: tx.to.and_then(|kind| kind.to().copied()),
            data: tx.input.input().cloned().unwrap_or_default(),
        })
        .await?;

        let wallet = EthereumWallet::from(self.signer.clone());
        let provider = ProviderBuilder::new()
            .with_recommended_fillers()
            .wallet(wallet)
            .on_http(network.rpc_url);

        let pending = provider
            .send_transaction(tx.from(from))
            .await
            .map_err(transport_error)?;
        let tx_hash = *pending.tx_hash();
        info!(tx_hash = %tx_hash, chain_id = network.chain_id, "Transaction broadcast");
        Ok(json!(tx_hash))
    }
}

#[async_trait]
impl WalletProvider for LocalWallet {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        debug!(method, "Wallet request");
        match method {
            "eth_requestAccounts" => self.request_accounts().await,
            "eth_accounts" => Ok(self.accounts()),
            "eth_chainId" => Ok(json!(format_chain_id(self.current_chain().await))),
            "wallet_switchEthereumChain" => self.switch_chain(&params).await,
            "wallet_addEthereumChain" => self.add_chain(&params).await,
            "eth_call" | "eth_getBalance" | "eth_getTransactionReceipt" => {
                self.forward(method, params).await
            }
            "eth_sendTransaction" => self.send_transaction(&params).await,
            other => Err(ProviderError::unsupported_method(other)),
        }
    }
}

fn param_field<T: serde::de::DeserializeOwned>(params: &Value, field: &str) -> Result<T, ProviderError> {
    let raw = params
        .get(0)
        .and_then(|p| p.get(field))
        .cloned()
        .ok_or_else(|| ProviderError::invalid_params(format!("missing {}", field)))?;
    serde_json::from_value(raw).map_err(|e| ProviderError::invalid_params(e.to_string()))
}

/// Keep the node's JSON-RPC error code when there is one
fn transport_error(err: TransportError) -> ProviderError {
    match err.as_error_resp() {
        Some(payload) => ProviderError::new(payload.code, payload.message.to_string()),
        None => ProviderError::internal(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{UNRECOGNIZED_CHAIN, UNSUPPORTED_METHOD, USER_REJECTED_REQUEST};
    use std::sync::Mutex;

    /// Records prompts and answers with a fixed decision
    struct ScriptedPrompt {
        answer: bool,
        seen: Mutex<Vec<ConsentRequest>>,
    }

    impl ScriptedPrompt {
        fn new(answer: bool) -> Arc<Self> {
            Arc::new(Self {
                answer,
                seen: Mutex::new(Vec::new()),
            })
        }

        fn seen(&self) -> Vec<ConsentRequest> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SigningPrompt for ScriptedPrompt {
        async fn confirm(&self, request: &ConsentRequest) -> bool {
            self.seen.lock().unwrap().push(request.clone());
            self.answer
        }
    }

    fn home() -> KnownNetwork {
        KnownNetwork::new(31337, "Anvil", "http://127.0.0.1:8545").unwrap()
    }

    fn wallet(prompt: Arc<dyn SigningPrompt>) -> LocalWallet {
        LocalWallet::new(PrivateKeySigner::random(), home(), prompt)
    }

    #[test]
    fn test_known_network_rejects_bad_scheme() {
        assert!(matches!(
            KnownNetwork::new(1, "Bad", "ws://localhost:8545"),
            Err(WalletError::InvalidConfig(_))
        ));
        assert!(KnownNetwork::new(1, "Bad", "not a url").is_err());
    }

    #[test]
    fn test_from_private_key() {
        let key = Redacted(
            "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80".to_string(),
        );
        let wallet = LocalWallet::from_private_key(&key, home(), Arc::new(AutoApprove)).unwrap();
        assert_eq!(
            wallet.address(),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse::<Address>().unwrap()
        );
        assert!(!format!("{:?}", wallet).contains("ac0974"));

        let bad = Redacted("0x1234".to_string());
        let err = LocalWallet::from_private_key(&bad, home(), Arc::new(AutoApprove)).unwrap_err();
        assert!(matches!(err, WalletError::InvalidKey));
        assert!(!err.to_string().contains("1234"));
    }

    #[tokio::test]
    async fn test_accounts_hidden_until_consent() {
        let prompt = ScriptedPrompt::new(true);
        let wallet = wallet(prompt.clone());

        let before = wallet.request("eth_accounts", json!([])).await.unwrap();
        assert_eq!(before, json!([]));

        let granted = wallet.request("eth_requestAccounts", json!([])).await.unwrap();
        assert_eq!(granted, json!([wallet.address()]));
        assert_eq!(wallet.request("eth_accounts", json!([])).await.unwrap(), granted);

        // a second request does not prompt again
        wallet.request("eth_requestAccounts", json!([])).await.unwrap();
        assert_eq!(prompt.seen().len(), 1);
    }

    #[tokio::test]
    async fn test_declined_connect_is_user_rejection() {
        let wallet = wallet(ScriptedPrompt::new(false));
        let err = wallet.request("eth_requestAccounts", json!([])).await.unwrap_err();
        assert_eq!(err.code, USER_REJECTED_REQUEST);
        assert!(!wallet.is_authorized());
    }

    #[tokio::test]
    async fn test_chain_id_reports_selected_network() {
        let wallet = wallet(Arc::new(AutoApprove));
        let chain = wallet.request("eth_chainId", json!([])).await.unwrap();
        assert_eq!(chain, json!("0x7a69"));
    }

    #[tokio::test]
    async fn test_switch_to_unknown_chain_is_4902() {
        let wallet = wallet(Arc::new(AutoApprove));
        let err = wallet
            .request("wallet_switchEthereumChain", json!([{ "chainId": "0x4268" }]))
            .await
            .unwrap_err();
        assert_eq!(err.code, UNRECOGNIZED_CHAIN);
        assert_eq!(wallet.current_chain().await, 31337);
    }

    #[tokio::test]
    async fn test_switch_to_registered_chain() {
        let prompt = ScriptedPrompt::new(true);
        let wallet = wallet(prompt.clone());
        wallet
            .register_network(KnownNetwork::new(17000, "Holsky", "https://rpc.ankr.com/eth_holesky").unwrap())
            .await;

        wallet
            .request("wallet_switchEthereumChain", json!([{ "chainId": "0x4268" }]))
            .await
            .unwrap();
        assert_eq!(wallet.current_chain().await, 17000);
        assert!(matches!(
            prompt.seen().as_slice(),
            [ConsentRequest::SwitchChain { chain_id: 17000, .. }]
        ));
    }

    #[tokio::test]
    async fn test_declined_switch_keeps_network() {
        let wallet = wallet(ScriptedPrompt::new(false));
        wallet
            .register_network(KnownNetwork::new(17000, "Holsky", "https://rpc.ankr.com/eth_holesky").unwrap())
            .await;

        let err = wallet
            .request("wallet_switchEthereumChain", json!([{ "chainId": "0x4268" }]))
            .await
            .unwrap_err();
        assert_eq!(err.code, USER_REJECTED_REQUEST);
        assert_eq!(wallet.current_chain().await, 31337);
    }

    #[tokio::test]
    async fn test_add_chain_rejects_invalid_descriptor() {
        let prompt = ScriptedPrompt::new(true);
        let wallet = wallet(prompt.clone());
        let mut target = ChainTarget::holesky();
        target.rpc_urls = vec!["ftp://example.com".to_string()];

        let err = wallet
            .request("wallet_addEthereumChain", json!([target]))
            .await
            .unwrap_err();
        assert_eq!(err.code, crate::error::INVALID_PARAMS);
        assert!(prompt.seen().is_empty(), "no prompt for an invalid descriptor");
    }

    #[tokio::test]
    async fn test_send_requires_authorization() {
        let wallet = wallet(Arc::new(AutoApprove));
        let err = wallet
            .request(
                "eth_sendTransaction",
                json!([{ "from": wallet.address(), "to": Address::ZERO, "data": "0x" }]),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_send_from_foreign_account_is_refused() {
        let wallet = wallet(Arc::new(AutoApprove));
        wallet.request("eth_requestAccounts", json!([])).await.unwrap();

        let err = wallet
            .request(
                "eth_sendTransaction",
                json!([{ "from": Address::repeat_byte(0x22), "to": Address::ZERO, "data": "0x" }]),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_method_is_4200() {
        let wallet = wallet(Arc::new(AutoApprove));
        let err = wallet.request("eth_sign", json!([])).await.unwrap_err();
        assert_eq!(err.code, UNSUPPORTED_METHOD);
    }

    #[test]
    fn test_consent_display_shows_selector() {
        let request = ConsentRequest::SendTransaction {
            chain_id: 17000,
            from: Address::repeat_byte(0x11),
            to: Some(Address::repeat_byte(0xaa)),
            data: Bytes::from(vec![0x09, 0x5e, 0xa7, 0xb3, 0x00]),
        };
        let text = request.to_string();
        assert!(text.contains("0x095ea7b3"));
        assert!(text.contains("chain 17000"));
    }

    /// Requires a node at WALLET_RPC_URL
    #[tokio::test]
    #[ignore]
    async fn test_live_reads_forwarded() {
        let rpc_url =
            std::env::var("WALLET_RPC_URL").unwrap_or_else(|_| "http://127.0.0.1:8545".to_string());
        let reported = ProviderBuilder::new()
            .on_http(rpc_url.parse().unwrap())
            .get_chain_id()
            .await
            .unwrap();
        let network = KnownNetwork::new(reported, "Live", &rpc_url).unwrap();
        let wallet = LocalWallet::new(PrivateKeySigner::random(), network, Arc::new(AutoApprove));

        let balance = wallet
            .request("eth_getBalance", json!([wallet.address(), "latest"]))
            .await
            .unwrap();
        assert!(balance.is_string());

        let receipt = wallet
            .request("eth_getTransactionReceipt", json!([alloy::primitives::B256::ZERO]))
            .await
            .unwrap();
        assert!(receipt.is_null());
    }
}
