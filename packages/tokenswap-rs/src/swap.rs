//! Approve-then-swap workflow
//!
//! Drives the two-step transaction sequence against the session's bindings:
//!
//! 1. `approve(amount)` authorizes the spender to pull `amount` of the input
//!    token and records the approval once the receipt is in.
//! 2. `swap(amount)` calls the direction-specific Swap entry point, but only
//!    when `amount` is the displayed amount and an approval exists for
//!    exactly that amount and direction.
//!
//! Only one approve or swap can be in flight per workflow; a second request
//! while one is pending returns [`WalletError::Busy`] and submits nothing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::WalletError;
use crate::provider::ReceiptSummary;
use crate::session::{SessionManager, SessionState, SessionStatus};
use crate::types::{BalancePair, SpenderPolicy, SwapDirection, TokenSide};
use crate::units::{from_base_units, to_base_units};

/// An approval confirmed on-chain for one amount string and direction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Approval {
    pub amount: String,
    pub direction: SwapDirection,
}

/// Transaction currently awaiting the wallet or confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingAction {
    Approving,
    Swapping,
}

/// UI-facing state of the workflow
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwapState {
    pub direction: SwapDirection,
    /// Amount input as typed
    pub amount: String,
    pub approval: Option<Approval>,
    pub balances: BalancePair,
    pub pending: Option<PendingAction>,
    pub last_error: Option<String>,
}

impl SwapState {
    /// Whether the current amount and direction are approved
    pub fn is_approved(&self) -> bool {
        self.approved_for(&self.amount)
    }

    pub fn approved_for(&self, amount: &str) -> bool {
        self.approval
            .as_ref()
            .is_some_and(|a| a.amount == amount && a.direction == self.direction)
    }
}

/// Result of a swap request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapOutcome {
    /// No approval for this amount and direction; nothing was submitted
    Skipped,
    Completed(ReceiptSummary),
}

/// Releases the single-flight flag when dropped
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Approve/swap workflow bound to one session
pub struct SwapWorkflow {
    session: Arc<SessionManager>,
    spender: SpenderPolicy,
    state: watch::Sender<SwapState>,
    in_flight: AtomicBool,
}

impl SwapWorkflow {
    pub fn new(session: Arc<SessionManager>, spender: SpenderPolicy) -> Self {
        let (state, _) = watch::channel(SwapState::default());
        Self {
            session,
            spender,
            state,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn spender_policy(&self) -> SpenderPolicy {
        self.spender
    }

    pub fn state(&self) -> SwapState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SwapState> {
        self.state.subscribe()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    // =========================================================================
    // Inputs
    // =========================================================================

    /// Set the amount input; surrounding whitespace is dropped
    pub fn set_amount(&self, amount: impl Into<String>) {
        let amount = amount.into().trim().to_string();
        self.state.send_modify(|s| s.amount = amount);
    }

    /// Flip the direction. Any existing approval is dropped because it was
    /// granted on the other token.
    pub fn toggle_direction(&self) -> SwapDirection {
        let mut direction = SwapDirection::default();
        self.state.send_modify(|s| {
            s.direction = s.direction.toggled();
            if s.approval.take().is_some() {
                debug!("Approval cleared by direction toggle");
            }
            direction = s.direction;
        });
        info!(direction = %direction, "Swap direction toggled");
        direction
    }

    // =========================================================================
    // Balances
    // =========================================================================

    /// Refresh both token balances for the session address.
    ///
    /// Returns the displayed balances. On failure they stay as they were.
    pub async fn fetch_balances(&self) -> BalancePair {
        let bindings = match self.session.bindings().await {
            Ok(bindings) => bindings,
            Err(e) => {
                debug!(error = %e, "Skipping balance refresh");
                return self.state.borrow().balances.clone();
            }
        };

        let owner = bindings.signer();
        let reads = tokio::try_join!(
            bindings.token(TokenSide::A).balance_of(owner),
            bindings.token(TokenSide::B).balance_of(owner),
        );

        match reads {
            Ok((a, b)) => {
                let balances = BalancePair {
                    token_a: from_base_units(a),
                    token_b: from_base_units(b),
                };
                debug!(
                    owner = %owner,
                    token_a = %balances.token_a,
                    token_b = %balances.token_b,
                    "Balances refreshed"
                );
                self.state.send_modify(|s| s.balances = balances.clone());
                balances
            }
            Err(e) => {
                warn!(owner = %owner, error = %e, "Balance refresh failed, keeping previous values");
                self.state.borrow().balances.clone()
            }
        }
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Approve the spender for `amount` of the current input token
    pub async fn approve(&self, amount: &str) -> Result<ReceiptSummary, WalletError> {
        let amount = amount.trim();
        let _flight = InFlight::acquire(&self.in_flight).ok_or(WalletError::Busy)?;
        let direction = self.state.borrow().direction;

        let result = self.submit_approval(amount, direction).await;
        self.finish(result.as_ref().err());
        result
    }

    async fn submit_approval(
        &self,
        amount: &str,
        direction: SwapDirection,
    ) -> Result<ReceiptSummary, WalletError> {
        let raw = to_base_units(amount)?;
        let bindings = self.session.bindings().await?;
        let spender = self.spender.resolve(direction, bindings.contracts());
        let token = bindings.token(direction.input());

        self.state.send_modify(|s| {
            s.amount = amount.to_string();
            s.pending = Some(PendingAction::Approving);
            s.last_error = None;
        });

        let receipt = token.approve(spender, raw).await?;

        // The session may have been dropped while the receipt was pending
        if !bindings.is_live() {
            warn!(tx_hash = %receipt.tx_hash, "Approval confirmed after disconnect, not recorded");
            return Err(WalletError::StaleBinding {
                contract: direction.input().label().to_string(),
            });
        }

        let mut recorded = false;
        self.state.send_modify(|s| {
            if s.direction == direction {
                s.approval = Some(Approval {
                    amount: amount.to_string(),
                    direction,
                });
                recorded = true;
            }
        });
        if !recorded {
            debug!(direction = %direction, "Direction toggled during approval, not recorded");
        }
        info!(
            token = direction.input().label(),
            spender = %spender,
            amount = %amount,
            tx_hash = %receipt.tx_hash,
            "Approval confirmed"
        );
        Ok(receipt)
    }

    /// Swap `amount` in the current direction.
    ///
    /// Only proceeds when `amount` is the displayed amount and an approval
    /// exists for it in the current direction; otherwise nothing is sent.
    pub async fn swap(&self, amount: &str) -> Result<SwapOutcome, WalletError> {
        let amount = amount.trim();

        // Gate and direction come from one snapshot, taken before any await
        let direction = {
            let state = self.state.borrow();
            if state.amount != amount || !state.is_approved() {
                debug!(amount = %amount, "Swap requested without a matching approval, ignoring");
                return Ok(SwapOutcome::Skipped);
            }
            state.direction
        };

        let flight = InFlight::acquire(&self.in_flight).ok_or(WalletError::Busy)?;
        let result = self.submit_swap(amount, direction).await;
        self.finish(result.as_ref().err());
        drop(flight);

        let receipt = result?;
        self.fetch_balances().await;
        Ok(SwapOutcome::Completed(receipt))
    }

    async fn submit_swap(
        &self,
        amount: &str,
        direction: SwapDirection,
    ) -> Result<ReceiptSummary, WalletError> {
        let raw = to_base_units(amount)?;
        let bindings = self.session.bindings().await?;

        self.state.send_modify(|s| {
            s.pending = Some(PendingAction::Swapping);
            s.last_error = None;
        });

        let receipt = bindings.swap().swap(direction, raw).await?;

        self.state.send_modify(|s| {
            s.amount.clear();
            s.approval = None;
        });
        info!(
            direction = %direction,
            amount = %amount,
            tx_hash = %receipt.tx_hash,
            "Swap confirmed"
        );
        Ok(receipt)
    }

    fn finish(&self, error: Option<&WalletError>) {
        if let Some(e) = error {
            warn!(error = %e, "Transaction step failed");
        }
        self.state.send_modify(|s| {
            s.pending = None;
            s.last_error = error.map(|e| e.to_string());
        });
    }

    // =========================================================================
    // Session Tracking
    // =========================================================================

    /// Apply a session change: load balances on connect, clear on disconnect
    pub async fn sync_session(&self, session: &SessionState) {
        match session.status {
            SessionStatus::Connected => {
                self.fetch_balances().await;
            }
            SessionStatus::Disconnected => self.reset(),
            SessionStatus::Connecting | SessionStatus::Disconnecting => {}
        }
    }

    /// Follow the session in the background until the handle is aborted
    pub fn spawn_session_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let workflow = Arc::clone(self);
        let mut rx = self.session.subscribe();

        tokio::spawn(async move {
            loop {
                let state = rx.borrow_and_update().clone();
                workflow.sync_session(&state).await;
                if rx.changed().await.is_err() {
                    break;
                }
            }
        })
    }

    fn reset(&self) {
        self.state.send_modify(|s| {
            let direction = s.direction;
            *s = SwapState {
                direction,
                ..SwapState::default()
            };
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainTarget;
    use crate::confirmation::ConfirmationPolicy;
    use crate::contracts::ISwap;
    use crate::provider::WalletProvider;
    use crate::testing::MockWallet;
    use crate::types::ContractAddresses;
    use alloy::primitives::Address;
    use alloy::sol_types::SolCall;
    use std::time::Duration;

    fn contracts() -> ContractAddresses {
        ContractAddresses {
            token_a: Address::repeat_byte(0xaa),
            token_b: Address::repeat_byte(0xbb),
            swap: Address::repeat_byte(0x55),
        }
    }

    async fn connected(wallet: &Arc<MockWallet>) -> Arc<SwapWorkflow> {
        let provider: Arc<dyn WalletProvider> = wallet.clone();
        let session = SessionManager::new(Some(provider), ChainTarget::holesky(), contracts())
            .with_confirmation(ConfirmationPolicy {
                poll_interval: Duration::from_millis(1),
                timeout: Some(Duration::from_secs(5)),
            });
        let session = Arc::new(session);
        assert!(session.connect().await.is_connected());
        Arc::new(SwapWorkflow::new(session, SpenderPolicy::CounterToken))
    }

    #[test]
    fn test_in_flight_guard_releases_on_drop() {
        let flag = AtomicBool::new(false);
        let guard = InFlight::acquire(&flag).unwrap();
        assert!(InFlight::acquire(&flag).is_none());
        drop(guard);
        assert!(InFlight::acquire(&flag).is_some());
    }

    #[test]
    fn test_approval_is_tied_to_amount_and_direction() {
        let mut state = SwapState {
            amount: "10".to_string(),
            approval: Some(Approval {
                amount: "10".to_string(),
                direction: SwapDirection::AToB,
            }),
            ..SwapState::default()
        };
        assert!(state.is_approved());
        assert!(!state.approved_for("10.0"));

        state.amount = "11".to_string();
        assert!(!state.is_approved());

        state.amount = "10".to_string();
        state.direction = SwapDirection::BToA;
        assert!(!state.is_approved());
    }

    #[tokio::test]
    async fn test_second_approve_while_in_flight_is_busy() {
        let wallet = Arc::new(MockWallet::new());
        let workflow = connected(&wallet).await;
        wallet.hold_receipts(true);

        let first = {
            let workflow = workflow.clone();
            tokio::spawn(async move { workflow.approve("1").await })
        };

        while wallet.sent_transactions().is_empty() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert!(workflow.is_busy());
        assert_eq!(workflow.state().pending, Some(PendingAction::Approving));

        let second = workflow.approve("1").await;
        assert!(matches!(second, Err(WalletError::Busy)));
        assert_eq!(wallet.sent_transactions().len(), 1);

        wallet.hold_receipts(false);
        first.await.unwrap().unwrap();
        assert!(!workflow.is_busy());
        assert!(workflow.state().is_approved());
        assert_eq!(workflow.state().pending, None);
    }

    #[tokio::test]
    async fn test_empty_amount_is_rejected_without_wallet_call() {
        let wallet = Arc::new(MockWallet::new());
        let workflow = connected(&wallet).await;

        let err = workflow.approve("").await.unwrap_err();
        assert!(matches!(err, WalletError::InvalidAmount { .. }));
        assert!(wallet.sent_transactions().is_empty());
        assert!(workflow.state().last_error.is_some());
        assert!(!workflow.is_busy());
    }

    #[tokio::test]
    async fn test_rejected_signature_leaves_approval_unset() {
        let wallet = Arc::new(MockWallet::new());
        let workflow = connected(&wallet).await;
        wallet.reject_signing(true);

        let err = workflow.approve("3").await.unwrap_err();
        assert!(err.is_user_rejected());
        let state = workflow.state();
        assert!(state.approval.is_none());
        assert_eq!(state.pending, None);
        assert!(state.last_error.unwrap().contains("rejected"));
    }

    #[tokio::test]
    async fn test_reverted_approval_leaves_approval_unset() {
        let wallet = Arc::new(MockWallet::new());
        let workflow = connected(&wallet).await;
        wallet.revert_transactions(true);

        let err = workflow.approve("3").await.unwrap_err();
        assert!(matches!(err, WalletError::Reverted { .. }));
        assert!(workflow.state().approval.is_none());
    }

    #[tokio::test]
    async fn test_reverted_swap_keeps_approval_and_amount() {
        let wallet = Arc::new(MockWallet::new());
        let workflow = connected(&wallet).await;

        workflow.approve("4").await.unwrap();
        wallet.revert_transactions(true);

        let err = workflow.swap("4").await.unwrap_err();
        assert!(matches!(err, WalletError::Reverted { .. }));
        let state = workflow.state();
        assert!(state.is_approved());
        assert_eq!(state.amount, "4");
    }

    #[tokio::test]
    async fn test_sync_session_resets_on_disconnect() {
        let wallet = Arc::new(MockWallet::new());
        let workflow = connected(&wallet).await;
        wallet.set_token_balance(contracts().token_a, wallet.account(), "5".parse().unwrap());

        workflow.sync_session(&workflow.session().state()).await;
        workflow.approve("1").await.unwrap();
        workflow.toggle_direction();
        assert!(workflow.state().balances.is_loaded());

        let state = workflow.session().disconnect().await;
        workflow.sync_session(&state).await;

        let swap_state = workflow.state();
        assert_eq!(swap_state.balances, BalancePair::default());
        assert!(swap_state.approval.is_none());
        assert!(swap_state.amount.is_empty());
        assert_eq!(swap_state.direction, SwapDirection::BToA);
    }

    #[tokio::test]
    async fn test_swap_keeps_direction_it_was_requested_with() {
        let wallet = Arc::new(MockWallet::new());
        let workflow = connected(&wallet).await;
        workflow.approve("10").await.unwrap();

        let slot = workflow.session().lock_bindings().await;
        let pending = {
            let workflow = workflow.clone();
            tokio::spawn(async move { workflow.swap("10").await })
        };
        while !workflow.is_busy() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert_eq!(workflow.toggle_direction(), SwapDirection::BToA);
        drop(slot);

        let outcome = pending.await.unwrap().unwrap();
        assert!(matches!(outcome, SwapOutcome::Completed(_)));

        let sent = wallet.sent_transactions();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].to, contracts().swap);
        assert_eq!(
            &sent[1].data[..4],
            ISwap::swapToken2ForToken1Call::SELECTOR.as_slice()
        );
    }

    #[tokio::test]
    async fn test_swap_requires_the_displayed_amount() {
        let wallet = Arc::new(MockWallet::new());
        let workflow = connected(&wallet).await;
        workflow.approve("10").await.unwrap();
        workflow.set_amount("20");

        let outcome = workflow.swap("10").await.unwrap();
        assert!(matches!(outcome, SwapOutcome::Skipped));
        assert_eq!(wallet.sent_transactions().len(), 1);
        assert!(!workflow.is_busy());
    }

    #[tokio::test]
    async fn test_approval_confirmed_after_disconnect_is_not_recorded() {
        let wallet = Arc::new(MockWallet::new());
        let workflow = connected(&wallet).await;
        wallet.hold_receipts(true);

        let pending = {
            let workflow = workflow.clone();
            tokio::spawn(async move { workflow.approve("5").await })
        };
        while wallet.sent_transactions().is_empty() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        let state = workflow.session().disconnect().await;
        workflow.sync_session(&state).await;
        wallet.hold_receipts(false);

        let err = pending.await.unwrap().unwrap_err();
        assert!(matches!(err, WalletError::StaleBinding { .. }));
        let swap_state = workflow.state();
        assert!(swap_state.approval.is_none());
        assert_eq!(swap_state.pending, None);
        assert!(!workflow.is_busy());
    }

    #[tokio::test]
    async fn test_approval_is_dropped_when_direction_toggles_mid_flight() {
        let wallet = Arc::new(MockWallet::new());
        let workflow = connected(&wallet).await;
        wallet.hold_receipts(true);

        let pending = {
            let workflow = workflow.clone();
            tokio::spawn(async move { workflow.approve("5").await })
        };
        while wallet.sent_transactions().is_empty() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        workflow.toggle_direction();
        wallet.hold_receipts(false);

        pending.await.unwrap().unwrap();
        let state = workflow.state();
        assert_eq!(state.direction, SwapDirection::BToA);
        assert!(state.approval.is_none());
        assert!(matches!(workflow.swap("5").await, Ok(SwapOutcome::Skipped)));
    }

    #[tokio::test]
    async fn test_amount_whitespace_is_trimmed() {
        let wallet = Arc::new(MockWallet::new());
        let workflow = connected(&wallet).await;

        workflow.approve(" 10 ").await.unwrap();
        assert_eq!(workflow.state().amount, "10");
        assert!(workflow.state().is_approved());

        let outcome = workflow.swap("10").await.unwrap();
        assert!(matches!(outcome, SwapOutcome::Completed(_)));

        workflow.set_amount(" 2.5\t");
        assert_eq!(workflow.state().amount, "2.5");
    }
}
