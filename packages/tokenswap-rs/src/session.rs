//! Wallet Session Manager
//!
//! Owns the wallet connection lifecycle and is the only writer of session
//! state. Other components read it through [`SessionManager::state`] or
//! follow changes through [`SessionManager::subscribe`].
//!
//! ## Lifecycle
//!
//! ```text
//! Disconnected -> Connecting -> Connected
//! Connected -> Disconnecting -> Disconnected
//! ```
//!
//! The transient states are published while the underlying wallet calls are
//! in flight and cleared as soon as they resolve.
//!
//! ## Connect sequence
//!
//! 1. Request account access, take the first account as signer
//! 2. Build TokenA, TokenB and Swap bindings for that signer
//! 3. Read the native balance (best effort)
//! 4. Align the wallet with the chain target (best effort)
//! 5. Publish `Connected`

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use alloy::primitives::Address;
use tokio::sync::{watch, Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::chain::ChainTarget;
use crate::confirmation::ConfirmationPolicy;
use crate::contracts::SessionBindings;
use crate::error::{ErrorKind, WalletError};
use crate::provider::{self, WalletProvider};
use crate::types::ContractAddresses;
use crate::units::from_base_units;

/// Session lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

impl SessionStatus {
    /// Whether a loading indicator should be shown
    pub fn is_pending(self) -> bool {
        matches!(self, SessionStatus::Connecting | SessionStatus::Disconnecting)
    }
}

/// Snapshot of the session published to subscribers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub status: SessionStatus,
    pub address: Option<Address>,
    pub chain_id: Option<u64>,
    /// Native currency balance as a decimal string
    pub native_balance: Option<String>,
    /// Last error worth showing to the user
    pub notice: Option<String>,
    pub notice_kind: Option<ErrorKind>,
}

impl SessionState {
    pub fn is_connected(&self) -> bool {
        self.status == SessionStatus::Connected
    }

    /// Session address, or the empty string when disconnected
    pub fn address_display(&self) -> String {
        self.address.map(|a| a.to_string()).unwrap_or_default()
    }

    fn disconnected_with(notice: Option<&WalletError>) -> Self {
        Self {
            notice: notice.map(|e| e.to_string()),
            notice_kind: notice.map(WalletError::kind),
            ..Self::default()
        }
    }
}

/// Result of a network alignment attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkSwitch {
    /// Wallet was already on the target chain
    AlreadyOnTarget,
    /// Wallet switched to the known target chain
    Switched,
    /// Wallet did not know the chain; it was added (and selected)
    Added,
}

/// Owns the wallet connection and the contract bindings derived from it
pub struct SessionManager {
    provider: Option<Arc<dyn WalletProvider>>,
    target: ChainTarget,
    contracts: ContractAddresses,
    confirmation: ConfirmationPolicy,
    state: watch::Sender<SessionState>,
    bindings: RwLock<Option<Arc<SessionBindings>>>,
    lifecycle: Mutex<()>,
    mounted: AtomicBool,
}

impl SessionManager {
    /// Create a manager; `provider` is `None` when no wallet is installed
    pub fn new(
        provider: Option<Arc<dyn WalletProvider>>,
        target: ChainTarget,
        contracts: ContractAddresses,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            provider,
            target,
            contracts,
            confirmation: ConfirmationPolicy::default(),
            state,
            bindings: RwLock::new(None),
            lifecycle: Mutex::new(()),
            mounted: AtomicBool::new(false),
        }
    }

    /// Override how transaction receipts are awaited by the bindings
    pub fn with_confirmation(mut self, confirmation: ConfirmationPolicy) -> Self {
        self.confirmation = confirmation;
        self
    }

    pub fn target(&self) -> &ChainTarget {
        &self.target
    }

    pub fn contracts(&self) -> &ContractAddresses {
        &self.contracts
    }

    // =========================================================================
    // State Access
    // =========================================================================

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Bindings of the connected session
    pub async fn bindings(&self) -> Result<Arc<SessionBindings>, WalletError> {
        self.bindings
            .read()
            .await
            .as_ref()
            .filter(|b| b.is_live())
            .cloned()
            .ok_or(WalletError::NotConnected)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Connect automatically the first time it is called; later calls do nothing
    pub async fn mount(&self) -> Option<SessionState> {
        if self.mounted.swap(true, Ordering::AcqRel) {
            debug!("Session already mounted, skipping automatic connect");
            return None;
        }
        Some(self.connect().await)
    }

    /// Connect the wallet. Never fails: errors land in [`SessionState::notice`].
    pub async fn connect(&self) -> SessionState {
        let _lifecycle = self.lifecycle.lock().await;

        let current = self.state();
        if current.is_connected() {
            debug!(address = %current.address_display(), "Session already connected");
            return current;
        }

        self.state.send_modify(|s| {
            s.status = SessionStatus::Connecting;
            s.notice = None;
            s.notice_kind = None;
        });

        match self.establish().await {
            Ok(state) => {
                info!(
                    address = %state.address_display(),
                    chain_id = ?state.chain_id,
                    "Wallet session connected"
                );
                self.state.send_replace(state.clone());
                state
            }
            Err(e) => {
                match e.kind() {
                    ErrorKind::ProviderAbsent => error!(error = %e, "Cannot connect"),
                    _ => warn!(error = %e, "Wallet connection failed"),
                }
                self.clear_bindings().await;
                let state = SessionState::disconnected_with(Some(&e));
                self.state.send_replace(state.clone());
                state
            }
        }
    }

    async fn establish(&self) -> Result<SessionState, WalletError> {
        let provider = self.provider.clone().ok_or(WalletError::ProviderMissing)?;

        let accounts = provider::request_accounts(provider.as_ref()).await?;
        let address = *accounts.first().ok_or(WalletError::NoAccounts)?;
        debug!(address = %address, accounts = accounts.len(), "Account access granted");

        let bindings = Arc::new(SessionBindings::new(
            provider.clone(),
            address,
            self.contracts,
            self.confirmation,
        ));
        self.replace_bindings(Some(bindings)).await;

        let native_balance = match provider::get_balance(provider.as_ref(), address).await {
            Ok(balance) => Some(from_base_units(balance)),
            Err(e) => {
                warn!(address = %address, error = %e, "Failed to read native balance");
                None
            }
        };

        let mut notice = None;
        match self.switch_network().await {
            Ok(outcome) => debug!(?outcome, "Network aligned"),
            Err(e) => {
                warn!(
                    target_chain = self.target.chain_id,
                    error = %e,
                    "Failed to switch or add target network"
                );
                notice = Some(e);
            }
        }

        let chain_id = match provider::chain_id(provider.as_ref()).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(error = %e, "Failed to read wallet chain id");
                None
            }
        };

        Ok(SessionState {
            status: SessionStatus::Connected,
            address: Some(address),
            chain_id,
            native_balance,
            notice_kind: notice.as_ref().map(WalletError::kind),
            notice: notice.map(|e| e.to_string()),
        })
    }

    /// Align the wallet with the chain target.
    ///
    /// Switches when the wallet is elsewhere and falls back to adding the
    /// full descriptor when the wallet does not know the chain.
    pub async fn switch_network(&self) -> Result<NetworkSwitch, WalletError> {
        let provider = self.provider.as_ref().ok_or(WalletError::ProviderMissing)?;
        let provider = provider.as_ref();

        let current = provider::chain_id(provider).await?;
        if current == self.target.chain_id {
            return Ok(NetworkSwitch::AlreadyOnTarget);
        }

        info!(
            current_chain = current,
            target_chain = self.target.chain_id,
            "Wallet on wrong network, requesting switch"
        );

        let outcome = match provider::switch_chain(provider, self.target.chain_id).await {
            Ok(()) => NetworkSwitch::Switched,
            Err(WalletError::UnrecognizedChain(reason)) => {
                info!(
                    target_chain = self.target.chain_id,
                    reason = %reason,
                    "Target chain unknown to wallet, requesting addition"
                );
                provider::add_chain(provider, &self.target).await?;
                NetworkSwitch::Added
            }
            Err(e) => return Err(e),
        };

        if self.state.borrow().is_connected() {
            self.state
                .send_modify(|s| s.chain_id = Some(self.target.chain_id));
        }

        Ok(outcome)
    }

    /// Forget the connection locally. Wallet permissions are left untouched.
    pub async fn disconnect(&self) -> SessionState {
        let _lifecycle = self.lifecycle.lock().await;

        if self.state.borrow().status == SessionStatus::Disconnected {
            return self.state();
        }

        self.state
            .send_modify(|s| s.status = SessionStatus::Disconnecting);
        self.clear_bindings().await;

        let state = SessionState::default();
        self.state.send_replace(state.clone());
        info!("Wallet session disconnected");
        state
    }

    async fn clear_bindings(&self) {
        self.replace_bindings(None).await;
    }

    async fn replace_bindings(&self, next: Option<Arc<SessionBindings>>) {
        let mut guard = self.bindings.write().await;
        if let Some(previous) = guard.take() {
            previous.invalidate();
        }
        *guard = next;
    }

    /// Hold the bindings slot so callers of `bindings()` wait
    #[cfg(test)]
    pub(crate) async fn lock_bindings(
        &self,
    ) -> tokio::sync::RwLockWriteGuard<'_, Option<Arc<SessionBindings>>> {
        self.bindings.write().await
    }
}
