//! Wallet provisioning: generate a keypair for a new user and top it up from
//! the funder pool.
//!
//! # Flow
//! ```text
//! provision()
//!     → acquire permit (at most `max_concurrent_provisioning` in flight)
//!     → generate keypair
//!     → balance already ≥ target?  done
//!     → fund(target)
//!         → unlock every funder (skip the ones that fail)
//!         → estimate gas once
//!         → per funder: re-read target balance, send only the shortfall,
//!           retry rejected sends, wait for the receipt
//!         → report; error if still short
//! ```

use alloy::primitives::utils::parse_ether;
use alloy::primitives::{Address, TxHash, U256};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::sync::Semaphore;

use crate::blockchain::client::BlockchainClient;
use crate::blockchain::types::{
    BlockchainConfig, BlockchainError, BlockchainResult, ConfirmationStatus, FundingReport,
    FundingTransfer, TransferOutcome,
};
use crate::blockchain::wallet::GeneratedWallet;
use crate::observability::metrics;
use crate::resilience::{retry_with_backoff, RetryPolicy};

/// The chain operations funding needs. Implemented by [`BlockchainClient`].
#[async_trait]
pub trait FundingChain: Send + Sync {
    async fn balance(&self, address: Address) -> BlockchainResult<U256>;
    async fn gas_price(&self) -> BlockchainResult<u128>;
    async fn estimate_transfer_gas(
        &self,
        from: Address,
        to: Address,
        value: U256,
    ) -> BlockchainResult<u64>;
    async fn unlock(&self, funder: Address, password: &str, duration_secs: u64)
        -> BlockchainResult<bool>;
    async fn send_transfer(
        &self,
        from: Address,
        to: Address,
        value: U256,
        gas_limit: u64,
    ) -> BlockchainResult<TxHash>;
    async fn wait_for_receipt(
        &self,
        tx_hash: TxHash,
        wait: Duration,
    ) -> BlockchainResult<ConfirmationStatus>;
}

#[async_trait]
impl FundingChain for BlockchainClient {
    async fn balance(&self, address: Address) -> BlockchainResult<U256> {
        self.get_balance(address).await
    }

    async fn gas_price(&self) -> BlockchainResult<u128> {
        self.get_gas_price().await
    }

    async fn estimate_transfer_gas(
        &self,
        from: Address,
        to: Address,
        value: U256,
    ) -> BlockchainResult<u64> {
        BlockchainClient::estimate_transfer_gas(self, from, to, value).await
    }

    async fn unlock(
        &self,
        funder: Address,
        password: &str,
        duration_secs: u64,
    ) -> BlockchainResult<bool> {
        self.unlock_account(funder, password, duration_secs).await
    }

    async fn send_transfer(
        &self,
        from: Address,
        to: Address,
        value: U256,
        gas_limit: u64,
    ) -> BlockchainResult<TxHash> {
        BlockchainClient::send_transfer(self, from, to, value, gas_limit).await
    }

    async fn wait_for_receipt(
        &self,
        tx_hash: TxHash,
        wait: Duration,
    ) -> BlockchainResult<ConfirmationStatus> {
        BlockchainClient::wait_for_receipt(self, tx_hash, wait).await
    }
}

/// Errors from provisioning or funding a wallet.
#[derive(Debug, Error)]
pub enum FundingError {
    #[error(transparent)]
    Chain(#[from] BlockchainError),

    #[error("No funder account could be unlocked")]
    NoUsableFunders,

    #[error("Wallet {} holds {balance} wei after funding, {required} required", .report.target)]
    Insufficient {
        required: U256,
        balance: U256,
        report: Box<FundingReport>,
    },

    /// A chain call failed after transfers had already been made.
    #[error("Funding stopped after {} transfer(s): {source}", .report.transfers.len())]
    Interrupted {
        source: BlockchainError,
        report: Box<FundingReport>,
    },

    #[error("Invalid funding configuration: {0}")]
    Config(String),

    #[error("Provisioner is shutting down")]
    Closed,
}

/// A wallet handed to a new user, with what was done to fund it.
#[derive(Debug, Clone)]
pub struct ProvisionedWallet {
    pub wallet: GeneratedWallet,
    /// `None` when blockchain integration is disabled.
    pub funding: Option<FundingReport>,
    /// Set when funding ran but did not reach the target.
    pub funding_error: Option<String>,
}

impl FundingError {
    /// Transfers made before the error, if any were.
    pub fn into_report(self) -> Option<FundingReport> {
        match self {
            FundingError::Insufficient { report, .. } | FundingError::Interrupted { report, .. } => {
                Some(*report)
            }
            _ => None,
        }
    }
}

impl ProvisionedWallet {
    pub fn is_funded(&self) -> bool {
        self.funding.as_ref().is_some_and(FundingReport::is_funded)
    }
}

/// Funding parameters resolved from configuration.
#[derive(Debug, Clone)]
pub struct FundingSettings {
    pub funders: Vec<Address>,
    pub password: String,
    pub unlock_duration_secs: u64,
    /// Target balance in wei.
    pub amount: U256,
    pub receipt_timeout: Duration,
    pub retry: RetryPolicy,
}

impl FundingSettings {
    pub fn from_config(config: &BlockchainConfig) -> Result<Self, FundingError> {
        let amount = parse_ether(&config.fund_amount_eth)
            .map_err(|e| FundingError::Config(format!("fund_amount_eth: {}", e)))?;
        let funders = config
            .funder_addresses
            .iter()
            .map(|a| {
                a.parse::<Address>()
                    .map_err(|e| FundingError::Config(format!("funder '{}': {}", a, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            funders,
            password: config.funder_password.clone(),
            unlock_duration_secs: config.unlock_duration_secs,
            amount,
            receipt_timeout: Duration::from_secs(config.receipt_timeout_secs),
            retry: RetryPolicy::from(&config.funding),
        })
    }
}

/// Generates and funds user wallets with bounded concurrency.
#[derive(Clone)]
pub struct WalletProvisioner {
    chain: Option<Arc<dyn FundingChain>>,
    settings: Arc<FundingSettings>,
    permits: Arc<Semaphore>,
    max_in_flight: usize,
}

impl WalletProvisioner {
    /// Create a provisioner. `chain = None` generates wallets without funding.
    pub fn new(
        chain: Option<Arc<dyn FundingChain>>,
        settings: FundingSettings,
        max_in_flight: usize,
    ) -> Self {
        let max_in_flight = max_in_flight.max(1);
        Self {
            chain,
            settings: Arc::new(settings),
            permits: Arc::new(Semaphore::new(max_in_flight)),
            max_in_flight,
        }
    }

    /// Target balance for new wallets, in wei.
    pub fn fund_amount(&self) -> U256 {
        self.settings.amount
    }

    pub fn funding_enabled(&self) -> bool {
        self.chain.is_some()
    }

    /// Live balance of `address`, or `None` when funding is disabled.
    pub async fn balance(&self, address: Address) -> Result<Option<U256>, FundingError> {
        match &self.chain {
            Some(chain) => Ok(Some(chain.balance(address).await?)),
            None => Ok(None),
        }
    }

    /// Number of provisions currently holding a permit.
    pub fn in_flight(&self) -> usize {
        self.max_in_flight - self.permits.available_permits()
    }

    /// Generate a keypair and bring its balance up to the configured amount.
    ///
    /// Funding shortfalls do not fail provisioning; they are reported on the
    /// result so the wallet (and any value already sent to it) is kept.
    pub async fn provision(&self) -> Result<ProvisionedWallet, FundingError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| FundingError::Closed)?;
        metrics::record_provisioning_in_flight(self.in_flight());

        let wallet = GeneratedWallet::generate();
        let address = wallet.address();

        let Some(chain) = &self.chain else {
            metrics::record_provision("unfunded");
            return Ok(ProvisionedWallet {
                wallet,
                funding: None,
                funding_error: None,
            });
        };

        let outcome = match chain.balance(address).await {
            Ok(balance) if balance >= self.settings.amount => Ok(FundingReport {
                target: address,
                required: self.settings.amount,
                final_balance: balance,
                transfers: Vec::new(),
            }),
            Ok(_) => self.fund_with(chain.as_ref(), address).await,
            Err(e) => Err(FundingError::Chain(e)),
        };

        let provisioned = match outcome {
            Ok(report) => {
                metrics::record_provision("funded");
                tracing::info!(address = %address, transfers = report.transfers.len(), "Wallet provisioned");
                ProvisionedWallet {
                    wallet,
                    funding: Some(report),
                    funding_error: None,
                }
            }
            Err(FundingError::Insufficient { report, .. }) => {
                metrics::record_provision("underfunded");
                tracing::warn!(
                    address = %address,
                    balance = %report.final_balance,
                    required = %report.required,
                    "Wallet provisioned but not fully funded"
                );
                let message = format!(
                    "funded {} of {} wei",
                    report.final_balance, report.required
                );
                ProvisionedWallet {
                    wallet,
                    funding: Some(*report),
                    funding_error: Some(message),
                }
            }
            Err(e @ FundingError::Interrupted { .. }) => {
                metrics::record_provision("underfunded");
                tracing::warn!(address = %address, error = %e, "Wallet funding interrupted");
                let message = e.to_string();
                ProvisionedWallet {
                    wallet,
                    funding: e.into_report(),
                    funding_error: Some(message),
                }
            }
            Err(e) => {
                metrics::record_provision("unfunded");
                tracing::warn!(address = %address, error = %e, "Wallet provisioned without funding");
                ProvisionedWallet {
                    wallet,
                    funding: None,
                    funding_error: Some(e.to_string()),
                }
            }
        };

        drop(_permit);
        metrics::record_provisioning_in_flight(self.in_flight());
        Ok(provisioned)
    }

    /// Top up an existing wallet. A wallet already at the target gets no transfers.
    pub async fn fund(&self, target: Address) -> Result<FundingReport, FundingError> {
        let chain = self
            .chain
            .as_ref()
            .ok_or_else(|| BlockchainError::NotAvailable("blockchain integration disabled".into()))?;
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| FundingError::Closed)?;
        self.fund_with(chain.as_ref(), target).await
    }

    async fn fund_with(
        &self,
        chain: &dyn FundingChain,
        target: Address,
    ) -> Result<FundingReport, FundingError> {
        let settings = &*self.settings;
        let required = settings.amount;

        let mut usable = Vec::with_capacity(settings.funders.len());
        for funder in &settings.funders {
            match chain
                .unlock(*funder, &settings.password, settings.unlock_duration_secs)
                .await
            {
                Ok(true) => usable.push(*funder),
                Ok(false) => tracing::warn!(funder = %funder, "Funder unlock refused"),
                Err(e) => tracing::warn!(funder = %funder, error = %e, "Funder unlock failed"),
            }
        }
        let first = *usable.first().ok_or(FundingError::NoUsableFunders)?;

        let gas_price = chain.gas_price().await?;
        let gas_limit = chain.estimate_transfer_gas(first, target, required).await?;
        let gas_cost = U256::from(gas_price).saturating_mul(U256::from(gas_limit));

        let mut transfers = Vec::new();
        let mut last_balance = U256::ZERO;
        let outcome = self
            .send_shortfalls(chain, target, &usable, gas_limit, gas_cost, &mut transfers, &mut last_balance)
            .await;

        let final_balance = match outcome {
            Ok(()) => chain.balance(target).await,
            Err(e) => Err(e),
        };
        let final_balance = match final_balance {
            Ok(balance) => balance,
            Err(source) if transfers.is_empty() => return Err(FundingError::Chain(source)),
            Err(source) => {
                return Err(FundingError::Interrupted {
                    source,
                    report: Box::new(FundingReport {
                        target,
                        required,
                        final_balance: last_balance,
                        transfers,
                    }),
                })
            }
        };
        let report = FundingReport {
            target,
            required,
            final_balance,
            transfers,
        };

        if report.is_funded() {
            Ok(report)
        } else {
            Err(FundingError::Insufficient {
                required,
                balance: final_balance,
                report: Box::new(report),
            })
        }
    }

    /// Walk the funders, sending each one's share of the remaining
    /// shortfall. Every attempt is pushed to `transfers` as it happens, so
    /// the caller keeps them when a later chain call fails.
    #[allow(clippy::too_many_arguments)]
    async fn send_shortfalls(
        &self,
        chain: &dyn FundingChain,
        target: Address,
        funders: &[Address],
        gas_limit: u64,
        gas_cost: U256,
        transfers: &mut Vec<FundingTransfer>,
        last_balance: &mut U256,
    ) -> BlockchainResult<()> {
        let settings = &*self.settings;
        let required = settings.amount;

        for &funder in funders {
            let balance = chain.balance(target).await?;
            *last_balance = balance;
            if balance >= required {
                break;
            }
            let shortfall = required - balance;

            let funder_balance = chain.balance(funder).await?;
            if funder_balance < shortfall.saturating_add(gas_cost) {
                tracing::warn!(funder = %funder, balance = %funder_balance, "Funder cannot cover shortfall");
                transfers.push(record(funder, shortfall, None, TransferOutcome::Skipped {
                    reason: format!("funder holds {} wei", funder_balance),
                }));
                continue;
            }

            let sent = retry_with_backoff(
                settings.retry,
                "fund_wallet",
                BlockchainError::is_transient,
                |_| chain.send_transfer(funder, target, shortfall, gas_limit),
            )
            .await;

            let transfer = match sent {
                Ok(tx_hash) => {
                    let outcome = match chain.wait_for_receipt(tx_hash, settings.receipt_timeout).await {
                        Ok(ConfirmationStatus::Confirmed { block_number }) => {
                            TransferOutcome::Confirmed { block_number }
                        }
                        Ok(ConfirmationStatus::Failed(reason)) => TransferOutcome::Reverted { reason },
                        Err(e) => TransferOutcome::Unconfirmed {
                            reason: e.to_string(),
                        },
                    };
                    tracing::info!(funder = %funder, target = %target, value = %shortfall, tx_hash = %tx_hash, outcome = outcome.metric_label(), "Funding transfer");
                    record(funder, shortfall, Some(tx_hash), outcome)
                }
                Err(e) => {
                    tracing::warn!(funder = %funder, error = %e, "Funding transfer not sent");
                    record(funder, shortfall, None, TransferOutcome::SendFailed {
                        reason: e.to_string(),
                    })
                }
            };
            transfers.push(transfer);
        }
        Ok(())
    }
}

fn record(
    funder: Address,
    value: U256,
    tx_hash: Option<TxHash>,
    outcome: TransferOutcome,
) -> FundingTransfer {
    metrics::record_funding_transfer(outcome.metric_label());
    FundingTransfer {
        funder,
        value,
        tx_hash,
        outcome,
        at: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, B256};
    use dashmap::DashMap;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use std::sync::Mutex;

    const FUNDER_A: Address = address!("5322a18E39CD52a62d102e25556A8EF0655De44E");
    const FUNDER_B: Address = address!("50d543E92F381a855B0560f818A59eB14d12fEfC");

    /// In-process chain: balances move instantly when a transfer is sent.
    #[derive(Default)]
    struct MockChain {
        balances: DashMap<Address, U256>,
        locked: Mutex<HashSet<Address>>,
        send_failures: AtomicU32,
        sends: AtomicU32,
        revert_all: bool,
        /// Balance reads fail once a transfer has gone out.
        reads_fail_after_send: bool,
        delay: Option<Duration>,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl MockChain {
        fn with_balances(entries: &[(Address, u64)]) -> Self {
            let chain = Self::default();
            for (addr, wei) in entries {
                chain.balances.insert(*addr, U256::from(*wei));
            }
            chain
        }

        fn balance_of(&self, address: Address) -> U256 {
            self.balances.get(&address).map(|b| *b).unwrap_or_default()
        }
    }

    #[async_trait]
    impl FundingChain for MockChain {
        async fn balance(&self, address: Address) -> BlockchainResult<U256> {
            if self.reads_fail_after_send && self.sends.load(Ordering::SeqCst) > 0 {
                return Err(BlockchainError::Timeout(1));
            }
            Ok(self.balance_of(address))
        }

        async fn gas_price(&self) -> BlockchainResult<u128> {
            Ok(1)
        }

        async fn estimate_transfer_gas(&self, _: Address, _: Address, _: U256) -> BlockchainResult<u64> {
            Ok(21_000)
        }

        async fn unlock(&self, funder: Address, password: &str, _: u64) -> BlockchainResult<bool> {
            if self.locked.lock().unwrap().contains(&funder) {
                return Err(BlockchainError::Rpc("could not decrypt key".into()));
            }
            Ok(password == "admin")
        }

        async fn send_transfer(
            &self,
            from: Address,
            to: Address,
            value: U256,
            gas_limit: u64,
        ) -> BlockchainResult<TxHash> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.active.fetch_sub(1, Ordering::SeqCst);

            if self
                .send_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(BlockchainError::Rejected {
                    code: -32000,
                    message: "txpool is full".into(),
                });
            }
            let n = self.sends.fetch_add(1, Ordering::SeqCst);
            if !self.revert_all {
                let cost = value + U256::from(gas_limit);
                *self.balances.entry(from).or_default() -= cost;
                *self.balances.entry(to).or_default() += value;
            }
            Ok(B256::with_last_byte(n as u8 + 1))
        }

        async fn wait_for_receipt(&self, _: TxHash, _: Duration) -> BlockchainResult<ConfirmationStatus> {
            if self.revert_all {
                Ok(ConfirmationStatus::Failed("Transaction reverted".into()))
            } else {
                Ok(ConfirmationStatus::Confirmed { block_number: 7 })
            }
        }
    }

    fn settings(amount: u64) -> FundingSettings {
        FundingSettings {
            funders: vec![FUNDER_A, FUNDER_B],
            password: "admin".into(),
            unlock_duration_secs: 600,
            amount: U256::from(amount),
            receipt_timeout: Duration::from_secs(1),
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay_ms: 1,
                max_delay_ms: 2,
            },
        }
    }

    fn provisioner(chain: Arc<MockChain>, amount: u64, max: usize) -> WalletProvisioner {
        WalletProvisioner::new(Some(chain as Arc<dyn FundingChain>), settings(amount), max)
    }

    #[test]
    fn test_settings_from_default_config() {
        let settings = FundingSettings::from_config(&BlockchainConfig::default()).unwrap();
        assert_eq!(settings.amount, U256::from(500_000_000_000_000_000u64));
        assert_eq!(settings.funders, vec![FUNDER_A, FUNDER_B]);
        assert_eq!(settings.retry.max_attempts, 3);
    }

    #[tokio::test]
    async fn test_single_funder_covers_target() {
        let chain = Arc::new(MockChain::with_balances(&[(FUNDER_A, 1_000_000), (FUNDER_B, 1_000_000)]));
        let provisioner = provisioner(chain.clone(), 50_000, 5);

        let provisioned = provisioner.provision().await.unwrap();
        assert!(provisioned.is_funded());
        let report = provisioned.funding.unwrap();
        assert_eq!(report.transfers.len(), 1);
        assert_eq!(report.transfers[0].funder, FUNDER_A);
        assert!(report.transfers[0].outcome.is_confirmed());
        assert_eq!(chain.balance_of(provisioned.wallet.address()), U256::from(50_000u64));
        // The second funder is left alone once the target is met.
        assert_eq!(chain.balance_of(FUNDER_B), U256::from(1_000_000u64));
    }

    #[tokio::test]
    async fn test_poor_funder_is_skipped() {
        let chain = Arc::new(MockChain::with_balances(&[(FUNDER_A, 10), (FUNDER_B, 1_000_000)]));
        let provisioner = provisioner(chain.clone(), 50_000, 5);

        let report = provisioner.provision().await.unwrap().funding.unwrap();
        assert_eq!(report.transfers.len(), 2);
        assert!(matches!(report.transfers[0].outcome, TransferOutcome::Skipped { .. }));
        assert_eq!(report.transfers[1].funder, FUNDER_B);
        assert!(report.is_funded());
    }

    #[tokio::test]
    async fn test_locked_funder_is_not_used() {
        let chain = MockChain::with_balances(&[(FUNDER_A, 1_000_000), (FUNDER_B, 1_000_000)]);
        chain.locked.lock().unwrap().insert(FUNDER_A);
        let chain = Arc::new(chain);
        let provisioner = provisioner(chain.clone(), 50_000, 5);

        let report = provisioner.provision().await.unwrap().funding.unwrap();
        assert_eq!(report.transfers.len(), 1);
        assert_eq!(report.transfers[0].funder, FUNDER_B);
        assert_eq!(chain.balance_of(FUNDER_A), U256::from(1_000_000u64));
    }

    #[tokio::test]
    async fn test_no_usable_funders() {
        let chain = MockChain::with_balances(&[(FUNDER_A, 1_000_000)]);
        chain.locked.lock().unwrap().extend([FUNDER_A, FUNDER_B]);
        let provisioner = provisioner(Arc::new(chain), 50_000, 5);

        let err = provisioner.fund(Address::repeat_byte(9)).await.unwrap_err();
        assert!(matches!(err, FundingError::NoUsableFunders));

        let provisioned = provisioner.provision().await.unwrap();
        assert!(!provisioned.is_funded());
        assert!(provisioned.funding_error.unwrap().contains("No funder"));
    }

    #[tokio::test]
    async fn test_transient_send_failures_are_retried() {
        let chain = MockChain::with_balances(&[(FUNDER_A, 1_000_000)]);
        chain.send_failures.store(2, Ordering::SeqCst);
        let chain = Arc::new(chain);
        let provisioner = provisioner(chain.clone(), 50_000, 5);

        let report = provisioner.provision().await.unwrap().funding.unwrap();
        assert!(report.is_funded());
        assert_eq!(chain.sends.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausted_funders_report_shortfall() {
        let chain = Arc::new(MockChain::with_balances(&[(FUNDER_A, 10), (FUNDER_B, 20)]));
        let provisioner = provisioner(chain, 50_000, 5);
        let target = Address::repeat_byte(7);

        match provisioner.fund(target).await.unwrap_err() {
            FundingError::Insufficient { required, balance, report } => {
                assert_eq!(required, U256::from(50_000u64));
                assert_eq!(balance, U256::ZERO);
                assert_eq!(report.transfers.len(), 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_reverted_transfers_are_recorded() {
        let chain = MockChain {
            revert_all: true,
            ..MockChain::with_balances(&[(FUNDER_A, 1_000_000), (FUNDER_B, 1_000_000)])
        };
        let provisioner = provisioner(Arc::new(chain), 50_000, 5);

        let provisioned = provisioner.provision().await.unwrap();
        let report = provisioned.funding.unwrap();
        assert!(report
            .transfers
            .iter()
            .all(|t| matches!(t.outcome, TransferOutcome::Reverted { .. })));
        assert!(provisioned.funding_error.is_some());
    }

    #[tokio::test]
    async fn test_read_failure_after_send_keeps_the_transfer() {
        let flaky_reads = || {
            Arc::new(MockChain {
                reads_fail_after_send: true,
                ..MockChain::with_balances(&[(FUNDER_A, 1_000_000), (FUNDER_B, 1_000_000)])
            })
        };

        match provisioner(flaky_reads(), 50_000, 5).fund(Address::repeat_byte(4)).await.unwrap_err() {
            FundingError::Interrupted { source, report } => {
                assert!(matches!(source, BlockchainError::Timeout(_)));
                assert_eq!(report.transfers.len(), 1);
                assert!(report.transfers[0].tx_hash.is_some());
                assert!(report.transfers[0].outcome.is_confirmed());
            }
            other => panic!("unexpected error: {other}"),
        }

        let chain = flaky_reads();
        let provisioned = provisioner(chain.clone(), 50_000, 5).provision().await.unwrap();
        let report = provisioned.funding.expect("transfers kept");
        assert_eq!(report.transfers.len(), 1);
        assert!(report.transfers[0].tx_hash.is_some());
        assert!(provisioned.funding_error.unwrap().contains("stopped after 1"));
        assert_eq!(chain.sends.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_funded_wallet_gets_no_more_transfers() {
        let target = Address::repeat_byte(3);
        let chain = Arc::new(MockChain::with_balances(&[(FUNDER_A, 1_000_000), (target, 60_000)]));
        let provisioner = provisioner(chain.clone(), 50_000, 5);

        let report = provisioner.fund(target).await.unwrap();
        assert!(report.transfers.is_empty());
        assert_eq!(chain.sends.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_concurrent_provisions_are_bounded() {
        let chain = Arc::new(MockChain {
            delay: Some(Duration::from_millis(30)),
            ..MockChain::with_balances(&[(FUNDER_A, u64::MAX / 2)])
        });
        let provisioner = provisioner(chain.clone(), 1_000, 2);

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let p = provisioner.clone();
                tokio::spawn(async move { p.provision().await })
            })
            .collect();
        for handle in handles {
            assert!(handle.await.unwrap().unwrap().is_funded());
        }

        assert!(chain.peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(chain.sends.load(Ordering::SeqCst), 6);
        assert_eq!(provisioner.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_disabled_chain_only_generates() {
        let provisioner = WalletProvisioner::new(None, settings(1), 5);
        let provisioned = provisioner.provision().await.unwrap();
        assert!(provisioned.funding.is_none());
        assert!(provisioned.funding_error.is_none());
        assert!(!provisioner.funding_enabled());
        assert!(matches!(
            provisioner.fund(provisioned.wallet.address()).await,
            Err(FundingError::Chain(BlockchainError::NotAvailable(_)))
        ));
    }
}
