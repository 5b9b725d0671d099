//! Stake adjustment from a sentiment score.
//!
//! ```text
//! neutral ─────────────────────────────────────────────▶ no-op (false, nothing recorded)
//! otherwise ─▶ registration ─▶ sufficiency ─▶ extrinsic ─▶ record outcome
//! ```
//!
//! Every non-neutral call ends in exactly one ledger row: `success`, `failed` with a
//! reason, or `error` with the chain error or panic text. Nothing is propagated to the
//! caller.

use chrono::Utc;
use futures::FutureExt;
use std::{any::Any, panic::AssertUnwindSafe, sync::Arc, time::Duration};
use taodiv_chain::{ChainError, StakeOperator};
use taodiv_core::{
    Balance, Coldkey, Hotkey, Netuid, SentimentScore, StakeStatus, StakeType,
    DEFAULT_TAO_PER_SENTIMENT_POINT,
};
use tracing::{debug, error, info, warn};

use crate::ledger::{LedgerSink, NewStakeAction};

const NOT_REGISTERED: &str = "hotkey not registered";
const NOT_REGISTERED_FOR_UNSTAKE: &str = "hotkey not registered for unstake";
const INSUFFICIENT_BALANCE: &str = "Insufficient balance";
const INSUFFICIENT_STAKE: &str = "Insufficient stake";
const TRANSACTION_FAILED: &str = "Transaction failed";

/// Tunables for [`StakeAdjuster`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StakeSettings {
    /// TAO moved per sentiment point.
    pub tao_per_point: f64,
    /// Registration attempts before giving up.
    pub registration_attempts: u32,
    /// Wait between registration attempts.
    pub registration_delay: Duration,
}

impl Default for StakeSettings {
    fn default() -> Self {
        Self {
            tao_per_point: DEFAULT_TAO_PER_SENTIMENT_POINT,
            registration_attempts: 3,
            registration_delay: Duration::from_secs(5),
        }
    }
}

/// Terminal result of the checks and extrinsic, before it is recorded.
enum Outcome {
    Completed,
    Rejected(&'static str),
}

/// Moves stake on behalf of the service coldkey.
#[derive(Clone)]
pub struct StakeAdjuster {
    operator: Arc<dyn StakeOperator>,
    ledger: Arc<dyn LedgerSink>,
    coldkey: Coldkey,
    settings: StakeSettings,
}

impl StakeAdjuster {
    /// Create an adjuster acting for `coldkey`.
    pub fn new(
        operator: Arc<dyn StakeOperator>,
        ledger: Arc<dyn LedgerSink>,
        coldkey: Coldkey,
        settings: StakeSettings,
    ) -> Self {
        Self {
            operator,
            ledger,
            coldkey,
            settings,
        }
    }

    /// Stake (positive sentiment) or unstake (negative sentiment)
    /// `tao_per_point × |sentiment|` on `hotkey` in `netuid`.
    ///
    /// Returns `true` only when the extrinsic was accepted.
    pub async fn submit_stake_adjustment(
        &self,
        netuid: Netuid,
        hotkey: &Hotkey,
        sentiment: SentimentScore,
    ) -> bool {
        if sentiment.is_neutral() {
            debug!(netuid, hotkey = %hotkey, "Neutral sentiment, no stake adjustment");
            return false;
        }

        let stake_type = if sentiment.is_positive() {
            StakeType::Stake
        } else {
            StakeType::Unstake
        };
        let tao_amount = self.settings.tao_per_point * sentiment.magnitude();
        let amount = Balance::from_tao(tao_amount);

        let adjusted = AssertUnwindSafe(self.adjust(netuid, hotkey, stake_type, amount))
            .catch_unwind()
            .await;
        let (status, error_message) = match adjusted {
            Ok(Ok(Outcome::Completed)) => {
                info!(netuid, hotkey = %hotkey, %stake_type, %amount, "Stake adjusted");
                (StakeStatus::Success, None)
            }
            Ok(Ok(Outcome::Rejected(reason))) => {
                warn!(netuid, hotkey = %hotkey, %stake_type, %amount, "Stake adjustment failed: {}", reason);
                (StakeStatus::Failed, Some(reason.to_string()))
            }
            Ok(Err(e)) => {
                error!(netuid, hotkey = %hotkey, %stake_type, "Error in stake adjustment: {}", e);
                (StakeStatus::Error, Some(e.to_string()))
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(netuid, hotkey = %hotkey, %stake_type, "Stake adjustment panicked: {}", message);
                (StakeStatus::Error, Some(message))
            }
        };

        let action = NewStakeAction {
            timestamp: Utc::now(),
            netuid,
            hotkey: hotkey.clone(),
            sentiment,
            stake_type,
            tao_amount,
            status,
            error_message,
        };
        if let Err(e) = self.ledger.append(&action).await {
            error!(netuid, hotkey = %hotkey, "Failed to record stake action: {:#}", e);
        }

        status == StakeStatus::Success
    }

    async fn adjust(
        &self,
        netuid: Netuid,
        hotkey: &Hotkey,
        stake_type: StakeType,
        amount: Balance,
    ) -> Result<Outcome, ChainError> {
        if !self.operator.is_hotkey_registered(netuid, hotkey).await? {
            match stake_type {
                StakeType::Unstake => return Ok(Outcome::Rejected(NOT_REGISTERED_FOR_UNSTAKE)),
                StakeType::Stake => {
                    if !self.register_with_retry(netuid, hotkey).await {
                        return Ok(Outcome::Rejected(NOT_REGISTERED));
                    }
                }
            }
        }

        let balance = self.operator.free_balance(&self.coldkey).await?;
        let current_stake = self.operator.stake(&self.coldkey, hotkey, netuid).await?;
        info!(
            coldkey = %self.coldkey,
            %balance,
            %current_stake,
            "Attempting to {} {} on {} in subnet {}",
            stake_type,
            amount,
            hotkey,
            netuid
        );

        let accepted = match stake_type {
            StakeType::Stake => {
                if balance < amount {
                    return Ok(Outcome::Rejected(INSUFFICIENT_BALANCE));
                }
                self.operator.add_stake(netuid, hotkey, amount).await?
            }
            StakeType::Unstake => {
                if current_stake < amount {
                    return Ok(Outcome::Rejected(INSUFFICIENT_STAKE));
                }
                self.operator.remove_stake(netuid, hotkey, amount).await?
            }
        };

        Ok(if accepted {
            Outcome::Completed
        } else {
            Outcome::Rejected(TRANSACTION_FAILED)
        })
    }

    /// Errors and refusals are logged per attempt; only exhaustion fails.
    async fn register_with_retry(&self, netuid: Netuid, hotkey: &Hotkey) -> bool {
        let attempts = self.settings.registration_attempts.max(1);
        info!(netuid, hotkey = %hotkey, "Hotkey not registered, attempting registration");

        for attempt in 1..=attempts {
            match self.operator.register(netuid, hotkey).await {
                Ok(true) => {
                    info!(netuid, hotkey = %hotkey, attempt, "Registered hotkey");
                    return true;
                }
                Ok(false) => warn!(netuid, hotkey = %hotkey, attempt, "Registration attempt failed"),
                Err(e) => warn!(netuid, hotkey = %hotkey, attempt, "Registration attempt error: {}", e),
            }

            if attempt < attempts {
                tokio::time::sleep(self.settings.registration_delay).await;
            }
        }

        false
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panic: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panic: {}", s)
    } else {
        "panic: unknown payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemoryLedger;
    use taodiv_chain::MemoryChain;

    const NETUID: Netuid = 18;

    struct Fixture {
        chain: Arc<MemoryChain>,
        ledger: Arc<MemoryLedger>,
        coldkey: Coldkey,
        hotkey: Hotkey,
        adjuster: StakeAdjuster,
    }

    fn fixture() -> Fixture {
        let chain = Arc::new(MemoryChain::new());
        let ledger = Arc::new(MemoryLedger::new());
        let coldkey = Coldkey::from_account([0x01; 32]);
        let hotkey = Hotkey::from_account([0x02; 32]);
        chain.set_wallet(&coldkey);

        let adjuster = StakeAdjuster::new(
            chain.clone(),
            ledger.clone(),
            coldkey.clone(),
            StakeSettings::default(),
        );

        Fixture {
            chain,
            ledger,
            coldkey,
            hotkey,
            adjuster,
        }
    }

    #[tokio::test]
    async fn test_neutral_sentiment_is_noop() {
        let f = fixture();

        let ok = f
            .adjuster
            .submit_stake_adjustment(NETUID, &f.hotkey, SentimentScore::NEUTRAL)
            .await;

        assert!(!ok);
        assert_eq!(f.chain.calls().total(), 0);
        assert!(f.ledger.actions().is_empty());
    }

    #[tokio::test]
    async fn test_stake_success() {
        let f = fixture();
        f.chain.set_registered(NETUID, &f.hotkey);
        f.chain.set_balance(&f.coldkey, Balance::from_tao(1.0));

        let ok = f
            .adjuster
            .submit_stake_adjustment(NETUID, &f.hotkey, SentimentScore::new(40.0))
            .await;

        assert!(ok);
        assert_eq!(f.chain.stake_of(&f.coldkey, &f.hotkey, NETUID), Balance::from_tao(0.4));

        let actions = f.ledger.actions();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].status, StakeStatus::Success);
        assert_eq!(actions[0].stake_type, StakeType::Stake);
        assert!((actions[0].tao_amount - 0.4).abs() < 1e-12);
        assert_eq!(actions[0].error_message, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_registration_succeeds_on_third_attempt() {
        let f = fixture();
        f.chain.set_balance(&f.coldkey, Balance::from_tao(1.0));
        f.chain
            .script_registrations([Ok(false), Err("pool full".to_string()), Ok(true)]);
        let started = tokio::time::Instant::now();

        let ok = f
            .adjuster
            .submit_stake_adjustment(NETUID, &f.hotkey, SentimentScore::new(10.0))
            .await;

        assert!(ok);
        assert_eq!(f.chain.calls().register, 3);
        assert_eq!(f.chain.calls().add_stake, 1);
        assert_eq!(started.elapsed(), Duration::from_secs(10));

        let actions = f.ledger.actions();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].status, StakeStatus::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_registration_exhausted() {
        let f = fixture();
        f.chain.set_balance(&f.coldkey, Balance::from_tao(1.0));
        f.chain.script_registrations([Ok(false), Ok(false), Ok(false)]);

        let ok = f
            .adjuster
            .submit_stake_adjustment(NETUID, &f.hotkey, SentimentScore::new(10.0))
            .await;

        assert!(!ok);
        assert_eq!(f.chain.calls().register, 3);
        assert_eq!(f.chain.calls().transactions(), 0);

        let actions = f.ledger.actions();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].status, StakeStatus::Failed);
        assert_eq!(actions[0].error_message.as_deref(), Some("hotkey not registered"));
    }

    #[tokio::test]
    async fn test_unstake_unregistered_fails_without_retry() {
        let f = fixture();

        let ok = f
            .adjuster
            .submit_stake_adjustment(NETUID, &f.hotkey, SentimentScore::new(-30.0))
            .await;

        assert!(!ok);
        assert_eq!(f.chain.calls().register, 0);
        assert_eq!(f.chain.calls().transactions(), 0);

        let actions = f.ledger.actions();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].stake_type, StakeType::Unstake);
        assert_eq!(actions[0].status, StakeStatus::Failed);
        assert_eq!(
            actions[0].error_message.as_deref(),
            Some("hotkey not registered for unstake")
        );
    }

    #[tokio::test]
    async fn test_insufficient_balance() {
        let f = fixture();
        f.chain.set_registered(NETUID, &f.hotkey);
        f.chain.set_balance(&f.coldkey, Balance::from_tao(0.001));

        let ok = f
            .adjuster
            .submit_stake_adjustment(NETUID, &f.hotkey, SentimentScore::new(5.0))
            .await;

        assert!(!ok);
        assert_eq!(f.chain.calls().transactions(), 0);

        let actions = f.ledger.actions();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].status, StakeStatus::Failed);
        assert_eq!(actions[0].error_message.as_deref(), Some("Insufficient balance"));
        assert!((actions[0].tao_amount - 0.05).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_insufficient_stake() {
        let f = fixture();
        f.chain.set_registered(NETUID, &f.hotkey);
        f.chain
            .set_stake(&f.coldkey, &f.hotkey, NETUID, Balance::from_tao(0.1));

        let ok = f
            .adjuster
            .submit_stake_adjustment(NETUID, &f.hotkey, SentimentScore::new(-20.0))
            .await;

        assert!(!ok);
        assert_eq!(f.chain.calls().transactions(), 0);
        assert_eq!(
            f.ledger.actions()[0].error_message.as_deref(),
            Some("Insufficient stake")
        );
    }

    #[tokio::test]
    async fn test_unstake_success() {
        let f = fixture();
        f.chain.set_registered(NETUID, &f.hotkey);
        f.chain
            .set_stake(&f.coldkey, &f.hotkey, NETUID, Balance::from_tao(1.0));

        let ok = f
            .adjuster
            .submit_stake_adjustment(NETUID, &f.hotkey, SentimentScore::new(-50.0))
            .await;

        assert!(ok);
        assert_eq!(f.chain.calls().remove_stake, 1);
        assert_eq!(f.chain.balance_of(&f.coldkey), Balance::from_tao(0.5));
    }

    #[tokio::test]
    async fn test_rejected_transaction() {
        let f = fixture();
        f.chain.set_registered(NETUID, &f.hotkey);
        f.chain.set_balance(&f.coldkey, Balance::from_tao(1.0));
        f.chain.set_transaction_outcome(Ok(false));

        let ok = f
            .adjuster
            .submit_stake_adjustment(NETUID, &f.hotkey, SentimentScore::new(20.0))
            .await;

        assert!(!ok);
        let actions = f.ledger.actions();
        assert_eq!(actions[0].status, StakeStatus::Failed);
        assert_eq!(actions[0].error_message.as_deref(), Some("Transaction failed"));
    }

    #[tokio::test]
    async fn test_chain_error_is_recorded() {
        let f = fixture();
        f.chain.set_registered(NETUID, &f.hotkey);
        f.chain.set_balance(&f.coldkey, Balance::from_tao(1.0));
        f.chain
            .set_transaction_outcome(Err("connection reset".to_string()));

        let ok = f
            .adjuster
            .submit_stake_adjustment(NETUID, &f.hotkey, SentimentScore::new(20.0))
            .await;

        assert!(!ok);
        let actions = f.ledger.actions();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].status, StakeStatus::Error);
        assert!(actions[0]
            .error_message
            .as_deref()
            .is_some_and(|m| m.contains("connection reset")));
    }

    #[tokio::test]
    async fn test_ledger_failure_is_swallowed() {
        let f = fixture();
        f.chain.set_registered(NETUID, &f.hotkey);
        f.chain.set_balance(&f.coldkey, Balance::from_tao(1.0));
        f.ledger.set_fail_writes(true);

        let ok = f
            .adjuster
            .submit_stake_adjustment(NETUID, &f.hotkey, SentimentScore::new(20.0))
            .await;

        assert!(ok);
        assert!(f.ledger.actions().is_empty());
    }

    struct PanickingOperator;

    #[async_trait::async_trait]
    impl StakeOperator for PanickingOperator {
        async fn free_balance(&self, _coldkey: &Coldkey) -> taodiv_chain::error::Result<Balance> {
            Ok(Balance::from_tao(100.0))
        }

        async fn stake(
            &self,
            _coldkey: &Coldkey,
            _hotkey: &Hotkey,
            _netuid: Netuid,
        ) -> taodiv_chain::error::Result<Balance> {
            Ok(Balance::ZERO)
        }

        async fn is_hotkey_registered(
            &self,
            _netuid: Netuid,
            _hotkey: &Hotkey,
        ) -> taodiv_chain::error::Result<bool> {
            Ok(true)
        }

        async fn register(&self, _netuid: Netuid, _hotkey: &Hotkey) -> taodiv_chain::error::Result<bool> {
            Ok(true)
        }

        async fn add_stake(
            &self,
            _netuid: Netuid,
            _hotkey: &Hotkey,
            _amount: Balance,
        ) -> taodiv_chain::error::Result<bool> {
            panic!("extrinsic decode failed");
        }

        async fn remove_stake(
            &self,
            _netuid: Netuid,
            _hotkey: &Hotkey,
            _amount: Balance,
        ) -> taodiv_chain::error::Result<bool> {
            Ok(true)
        }
    }

    #[tokio::test]
    async fn test_operator_panic_is_recorded_as_error() {
        let ledger = Arc::new(MemoryLedger::new());
        let adjuster = StakeAdjuster::new(
            Arc::new(PanickingOperator),
            ledger.clone(),
            Coldkey::from_account([0x01; 32]),
            StakeSettings::default(),
        );
        let hotkey = Hotkey::from_account([0x02; 32]);

        let handle = tokio::spawn(async move {
            adjuster
                .submit_stake_adjustment(NETUID, &hotkey, SentimentScore::new(10.0))
                .await
        });
        let ok = handle.await.unwrap();

        assert!(!ok);
        let actions = ledger.actions();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].status, StakeStatus::Error);
        assert_eq!(
            actions[0].error_message.as_deref(),
            Some("panic: extrinsic decode failed")
        );
    }
}
