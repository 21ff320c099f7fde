//! Donation submission flow.
//!
//! One submission may be in flight at a time, and every attempt ends in
//! exactly one terminal outcome.  A failed attempt leaves the amount fields
//! untouched so the user can retry.

use std::sync::atomic::{AtomicBool, Ordering};

use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::info;

use crate::amounts::{self, AmountPair};
use crate::errors::{EngineError, Result};
use crate::rpc::{TxReceipt, WalletSubmitter};

/// The terminal success of one attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct DonationOutcome {
    pub receipt: TxReceipt,
    pub amount_eth: String,
    pub amount_wei: u128,
    pub amount_usd: Option<Decimal>,
}

/// Run one donation attempt end to end.
///
/// Preconditions (checked before anything is dispatched): a donor address is
/// known and the ETH field holds a positive amount.  On success the amount
/// pair is reset; on failure it is left exactly as it was.
pub async fn submit_donation<S: WalletSubmitter>(
    submitter: &S,
    pair: &Mutex<AmountPair>,
    in_flight: &AtomicBool,
    project_id: u64,
    donor: Option<&str>,
    rate: Option<Decimal>,
) -> Result<DonationOutcome> {
    if in_flight.swap(true, Ordering::SeqCst) {
        return Err(EngineError::SubmissionInFlight);
    }
    let result = run_attempt(submitter, pair, project_id, donor, rate).await;
    in_flight.store(false, Ordering::SeqCst);
    result
}

async fn run_attempt<S: WalletSubmitter>(
    submitter: &S,
    pair: &Mutex<AmountPair>,
    project_id: u64,
    donor: Option<&str>,
    rate: Option<Decimal>,
) -> Result<DonationOutcome> {
    let donor = donor.ok_or_else(|| {
        EngineError::Precondition("connect a wallet before donating".to_string())
    })?;

    let (amount_eth, amount_wei, eth_value) = {
        let pair = pair.lock().await;
        let eth_value = pair
            .eth_value()
            .filter(|v| *v > Decimal::ZERO)
            .ok_or_else(|| {
                EngineError::Precondition("enter a positive ETH amount".to_string())
            })?;
        (pair.eth.clone(), amounts::to_wei(&pair.eth)?, eth_value)
    };

    let amount_usd = rate
        .filter(|r| *r > Decimal::ZERO)
        .and_then(|r| amounts::eth_to_usd(eth_value, r).ok());

    info!("submitting donation of {amount_eth} ETH from {donor} to project {project_id}");
    let receipt = submitter.deposit_eth(project_id, amount_wei).await?;
    info!("donation confirmed: {}", receipt.tx_hash);

    pair.lock().await.reset();

    Ok(DonationOutcome {
        receipt,
        amount_eth,
        amount_wei,
        amount_usd,
    })
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;
    use std::sync::Arc;

    use tokio::sync::Notify;

    use super::*;
    use crate::amounts::EditedField;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn pair_with_eth(eth: &str) -> Mutex<AmountPair> {
        Mutex::new(AmountPair {
            eth: eth.to_string(),
            usd: String::new(),
            last_edited: EditedField::Eth,
        })
    }

    struct OkSubmitter {
        calls: AtomicU32,
    }

    impl OkSubmitter {
        fn new() -> Self {
            Self {
                calls: AtomicU32::new(0),
            }
        }
    }

    impl WalletSubmitter for OkSubmitter {
        async fn deposit_eth(&self, _project_id: u64, _value_wei: u128) -> Result<TxReceipt> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(TxReceipt {
                tx_hash: "0xabc".to_string(),
                block_number: Some(100),
            })
        }
    }

    struct RejectingSubmitter;

    impl WalletSubmitter for RejectingSubmitter {
        async fn deposit_eth(&self, _project_id: u64, _value_wei: u128) -> Result<TxReceipt> {
            Err(EngineError::Wallet("user rejected transaction".to_string()))
        }
    }

    struct SlowSubmitter {
        release: Arc<Notify>,
    }

    impl WalletSubmitter for SlowSubmitter {
        async fn deposit_eth(&self, _project_id: u64, _value_wei: u128) -> Result<TxReceipt> {
            self.release.notified().await;
            Ok(TxReceipt {
                tx_hash: "0xslow".to_string(),
                block_number: None,
            })
        }
    }

    #[tokio::test]
    async fn success_resets_the_amount_pair() {
        let pair = pair_with_eth("0.01");
        let in_flight = AtomicBool::new(false);

        let outcome = submit_donation(
            &OkSubmitter::new(),
            &pair,
            &in_flight,
            1,
            Some("0xdonor"),
            Some(dec("2500")),
        )
        .await
        .unwrap();

        assert_eq!(outcome.amount_wei, 10_000_000_000_000_000);
        assert_eq!(outcome.amount_usd, Some(dec("25.00")));
        assert_eq!(*pair.lock().await, AmountPair::default());
        assert!(!in_flight.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn failure_leaves_state_intact_and_allows_retry() {
        let pair = pair_with_eth("0.01");
        let in_flight = AtomicBool::new(false);

        let err = submit_donation(
            &RejectingSubmitter,
            &pair,
            &in_flight,
            1,
            Some("0xdonor"),
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, EngineError::Wallet(_)));

        assert_eq!(pair.lock().await.eth, "0.01");
        assert!(!in_flight.load(Ordering::SeqCst));

        // The same attempt can be retried.
        let submitter = OkSubmitter::new();
        submit_donation(&submitter, &pair, &in_flight, 1, Some("0xdonor"), None)
            .await
            .unwrap();
        assert_eq!(submitter.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_wallet_is_rejected_before_dispatch() {
        let pair = pair_with_eth("0.01");
        let in_flight = AtomicBool::new(false);
        let submitter = OkSubmitter::new();

        let err = submit_donation(&submitter, &pair, &in_flight, 1, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Precondition(_)));
        assert_eq!(submitter.calls.load(Ordering::SeqCst), 0);
        assert_eq!(pair.lock().await.eth, "0.01");
    }

    #[tokio::test]
    async fn non_positive_amount_is_rejected_before_dispatch() {
        let in_flight = AtomicBool::new(false);
        let submitter = OkSubmitter::new();

        for eth in ["", "0", "abc"] {
            let pair = pair_with_eth(eth);
            let err = submit_donation(&submitter, &pair, &in_flight, 1, Some("0xdonor"), None)
                .await
                .unwrap_err();
            assert!(matches!(err, EngineError::Precondition(_)), "{eth:?}");
        }
        assert_eq!(submitter.calls.load(Ordering::SeqCst), 0);
        assert!(!in_flight.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn second_submission_while_in_flight_is_refused() {
        let release = Arc::new(Notify::new());
        let submitter = Arc::new(SlowSubmitter {
            release: release.clone(),
        });
        let pair = Arc::new(pair_with_eth("0.01"));
        let in_flight = Arc::new(AtomicBool::new(false));

        let first = {
            let (submitter, pair, in_flight) = (submitter.clone(), pair.clone(), in_flight.clone());
            tokio::spawn(async move {
                submit_donation(&*submitter, &pair, &in_flight, 1, Some("0xdonor"), None).await
            })
        };

        // Let the first attempt reach the wallet call.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let err = submit_donation(&*submitter, &pair, &in_flight, 1, Some("0xdonor"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::SubmissionInFlight));

        release.notify_one();
        let outcome = first.await.unwrap().unwrap();
        assert_eq!(outcome.receipt.tx_hash, "0xslow");
        assert!(!in_flight.load(Ordering::SeqCst));
    }
}
