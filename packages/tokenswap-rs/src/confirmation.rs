//! Transaction confirmation polling
//!
//! Once the wallet accepts a transaction the workflow can only wait for it.
//! The receipt is polled through the same provider surface; there is no
//! cancellation. By default there is no timeout either, so an unresponsive
//! node stalls the wait until a timeout is configured.

use std::time::{Duration, Instant};

use alloy::primitives::B256;
use tracing::{debug, info, warn};

use crate::error::WalletError;
use crate::provider::{self, ReceiptSummary, WalletProvider};

/// How receipts are awaited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationPolicy {
    /// Delay between receipt polls
    pub poll_interval: Duration,
    /// Give up after this long; `None` waits indefinitely
    pub timeout: Option<Duration>,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1000),
            timeout: None,
        }
    }
}

/// Poll until `tx_hash` has a receipt, failing if it reverted.
pub async fn wait_for_receipt(
    provider: &dyn WalletProvider,
    tx_hash: B256,
    policy: ConfirmationPolicy,
) -> Result<ReceiptSummary, WalletError> {
    let start = Instant::now();
    let mut polls: u32 = 0;

    loop {
        polls += 1;
        match provider::transaction_receipt(provider, tx_hash).await {
            Ok(Some(receipt)) => {
                if !receipt.succeeded() {
                    warn!(tx_hash = %tx_hash, "Transaction reverted");
                    return Err(WalletError::Reverted { tx_hash });
                }
                info!(
                    tx_hash = %tx_hash,
                    block = ?receipt.block(),
                    polls,
                    "Transaction confirmed"
                );
                return Ok(receipt);
            }
            Ok(None) => {
                debug!(tx_hash = %tx_hash, polls, "Receipt not available yet");
            }
            // Malformed or failed receipt queries are retried; the transaction
            // itself has already been accepted.
            Err(e) => {
                warn!(tx_hash = %tx_hash, error = %e, "Receipt query failed, retrying");
            }
        }

        if let Some(timeout) = policy.timeout {
            if start.elapsed() >= timeout {
                return Err(WalletError::ConfirmationTimeout {
                    tx_hash,
                    waited_ms: start.elapsed().as_millis(),
                });
            }
        }

        tokio::time::sleep(policy.poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockWallet;

    fn fast() -> ConfirmationPolicy {
        ConfirmationPolicy {
            poll_interval: Duration::from_millis(1),
            timeout: Some(Duration::from_secs(5)),
        }
    }

    #[tokio::test]
    async fn test_waits_through_pending_polls() {
        let wallet = MockWallet::new();
        wallet.set_receipt_delay(3);
        let tx_hash = wallet.insert_receipt(true);

        let receipt = wait_for_receipt(&wallet, tx_hash, fast()).await.unwrap();
        assert_eq!(receipt.tx_hash, tx_hash);
        assert_eq!(wallet.count_requests("eth_getTransactionReceipt"), 4);
    }

    #[tokio::test]
    async fn test_reverted_receipt_is_an_error() {
        let wallet = MockWallet::new();
        let tx_hash = wallet.insert_receipt(false);

        let err = wait_for_receipt(&wallet, tx_hash, fast()).await.unwrap_err();
        assert!(matches!(err, WalletError::Reverted { tx_hash: h } if h == tx_hash));
    }

    #[tokio::test]
    async fn test_times_out_when_configured() {
        let wallet = MockWallet::new();
        let policy = ConfirmationPolicy {
            poll_interval: Duration::from_millis(1),
            timeout: Some(Duration::from_millis(20)),
        };

        let err = wait_for_receipt(&wallet, B256::repeat_byte(9), policy)
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::ConfirmationTimeout { .. }));
    }
}
