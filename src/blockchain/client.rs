//! Blockchain RPC client with timeout and error handling.
//!
//! # Responsibilities
//! - Connect to JSON-RPC endpoint (primary + failovers)
//! - Query chain state (block number, balances, gas, receipts)
//! - Drive node-managed funder accounts (unlock, send)
//! - Handle timeouts and network errors gracefully
//! - Provide health check for blockchain connectivity

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, TxHash, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use alloy::transports::{TransportError, TransportResult};
use std::future::Future;
use std::time::Duration;
use tokio::time::{interval, timeout};

use crate::blockchain::types::{
    BlockchainConfig, BlockchainError, BlockchainResult, ChainId, ConfirmationStatus,
};
use crate::observability::metrics;

/// Blockchain RPC client wrapper with failover support.
#[derive(Clone)]
pub struct BlockchainClient {
    /// List of providers (primary + failovers).
    providers: Vec<DynProvider>,
    /// Configuration.
    config: BlockchainConfig,
    /// Request timeout duration.
    timeout_duration: Duration,
}

impl BlockchainClient {
    /// Create a new blockchain client.
    ///
    /// An unreachable node is not an error here; the mismatch is logged and
    /// calls fail individually later.
    pub async fn new(config: BlockchainConfig) -> BlockchainResult<Self> {
        let timeout_duration = Duration::from_secs(config.rpc_timeout_secs);
        let mut providers = Vec::new();

        // 1. Add primary provider
        let primary_url: url::Url = config.rpc_url.parse().map_err(|e| {
            BlockchainError::Rpc(format!("Invalid RPC URL '{}': {}", config.rpc_url, e))
        })?;
        providers.push(ProviderBuilder::new().connect_http(primary_url).erased());

        // 2. Add failover providers
        for url_str in &config.failover_urls {
            match url_str.parse::<url::Url>() {
                Ok(url) => providers.push(ProviderBuilder::new().connect_http(url).erased()),
                Err(_) => tracing::warn!(url = %url_str, "Ignoring invalid failover RPC URL"),
            }
        }

        let client = Self {
            providers,
            config: config.clone(),
            timeout_duration,
        };

        match client.verify_chain_id().await {
            Ok(()) => {
                tracing::info!(
                    rpc_url = %config.rpc_url,
                    chain_id = config.chain_id,
                    "Blockchain client initialized"
                );
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Blockchain client initialized but chain verification failed"
                );
            }
        }

        Ok(client)
    }

    /// Run a read-only call against each provider in turn until one answers.
    async fn with_failover<T, F, Fut>(&self, what: &str, call: F) -> BlockchainResult<T>
    where
        F: Fn(DynProvider) -> Fut,
        Fut: Future<Output = TransportResult<T>>,
    {
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, call(provider.clone())).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => {
                    tracing::warn!(provider_idx = i, call = what, error = %e, "RPC error, trying next provider");
                }
                Err(_) => {
                    tracing::warn!(provider_idx = i, call = what, "RPC timeout, trying next provider");
                }
            }
        }
        Err(BlockchainError::Rpc(format!("All RPC providers failed to {}", what)))
    }

    /// Run a state-changing call against the primary provider only.
    ///
    /// Failing over a send could broadcast the same transfer twice.
    async fn on_primary<T, Fut>(&self, call: Fut) -> BlockchainResult<T>
    where
        Fut: Future<Output = TransportResult<T>>,
    {
        match timeout(self.timeout_duration, call).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => Err(classify_send_error(&e)),
            Err(_) => Err(BlockchainError::Timeout(self.config.rpc_timeout_secs)),
        }
    }

    /// Verify the connected chain ID matches configuration.
    pub async fn verify_chain_id(&self) -> BlockchainResult<()> {
        let chain_id = self.get_chain_id().await?;
        if chain_id.0 != self.config.chain_id {
            return Err(BlockchainError::ChainMismatch {
                expected: self.config.chain_id,
                actual: chain_id.0,
            });
        }
        Ok(())
    }

    /// Get the chain ID from the RPC.
    pub async fn get_chain_id(&self) -> BlockchainResult<ChainId> {
        self.with_failover("get chain id", |p| async move { p.get_chain_id().await })
            .await
            .map(ChainId)
    }

    /// Get the latest block number.
    pub async fn get_block_number(&self) -> BlockchainResult<u64> {
        self.with_failover("get block number", |p| async move { p.get_block_number().await })
            .await
    }

    /// Get the balance of an address.
    pub async fn get_balance(&self, address: Address) -> BlockchainResult<U256> {
        self.with_failover("get balance", |p| async move { p.get_balance(address).await })
            .await
    }

    /// Get current gas price in wei.
    pub async fn get_gas_price(&self) -> BlockchainResult<u128> {
        self.with_failover("get gas price", |p| async move { p.get_gas_price().await })
            .await
    }

    /// Get a transaction receipt by hash.
    pub async fn get_transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> BlockchainResult<Option<TransactionReceipt>> {
        self.with_failover("get receipt", |p| async move {
            p.get_transaction_receipt(tx_hash).await
        })
        .await
    }

    /// Estimate gas for a plain value transfer.
    pub async fn estimate_transfer_gas(
        &self,
        from: Address,
        to: Address,
        value: U256,
    ) -> BlockchainResult<u64> {
        let tx = transfer_request(from, to, value);
        self.with_failover("estimate gas", |p| {
            let tx = tx.clone();
            async move { p.estimate_gas(tx).await }
        })
        .await
    }

    /// Unlock a node-managed account with `personal_unlockAccount`.
    pub async fn unlock_account(
        &self,
        address: Address,
        password: &str,
        duration_secs: u64,
    ) -> BlockchainResult<bool> {
        let provider = self.providers[0].clone();
        let params = (address, password.to_string(), duration_secs);
        self.on_primary(async move {
            provider
                .raw_request::<_, bool>("personal_unlockAccount".into(), params)
                .await
        })
        .await
    }

    /// Send value from a node-managed (unlocked) account via `eth_sendTransaction`.
    pub async fn send_transfer(
        &self,
        from: Address,
        to: Address,
        value: U256,
        gas_limit: u64,
    ) -> BlockchainResult<TxHash> {
        let provider = self.providers[0].clone();
        let tx = transfer_request(from, to, value).with_gas_limit(gas_limit);
        self.on_primary(async move {
            let pending = provider.send_transaction(tx).await?;
            Ok(*pending.tx_hash())
        })
        .await
    }

    /// Poll for a receipt until it shows up or `wait` elapses.
    pub async fn wait_for_receipt(
        &self,
        tx_hash: TxHash,
        wait: Duration,
    ) -> BlockchainResult<ConfirmationStatus> {
        let poll_interval = Duration::from_secs(1);

        let result = timeout(wait, async {
            let mut ticker = interval(poll_interval);

            loop {
                ticker.tick().await;

                let receipt = match self.get_transaction_receipt(tx_hash).await? {
                    Some(r) => r,
                    None => {
                        tracing::debug!(tx_hash = %tx_hash, "Transaction pending");
                        continue;
                    }
                };

                if !receipt.status() {
                    return Ok(ConfirmationStatus::Failed("Transaction reverted".to_string()));
                }

                let block_number = match receipt.block_number {
                    Some(n) => n,
                    None => self.get_block_number().await?,
                };
                return Ok(ConfirmationStatus::Confirmed { block_number });
            }
        })
        .await;

        match result {
            Ok(status) => status,
            Err(_) => Err(BlockchainError::ConfirmationTimeout(tx_hash)),
        }
    }

    /// Check if the blockchain is reachable and healthy.
    ///
    /// Returns true if we can query the block number.
    pub async fn is_healthy(&self) -> bool {
        let healthy = self.get_block_number().await.is_ok();
        metrics::record_rpc_health(healthy);
        healthy
    }

    /// Get the underlying primary provider.
    pub fn provider(&self) -> &DynProvider {
        &self.providers[0]
    }

    /// Get the configuration.
    pub fn config(&self) -> &BlockchainConfig {
        &self.config
    }
}

/// Keep JSON-RPC error objects apart from transport failures: only the
/// former prove the node did not accept the request.
fn classify_send_error(e: &TransportError) -> BlockchainError {
    match e.as_error_resp() {
        Some(payload) => BlockchainError::Rejected {
            code: payload.code,
            message: payload.message.to_string(),
        },
        None => BlockchainError::Rpc(e.to_string()),
    }
}

fn transfer_request(from: Address, to: Address, value: U256) -> TransactionRequest {
    TransactionRequest::default()
        .with_from(from)
        .with_to(to)
        .with_value(value)
}

impl std::fmt::Debug for BlockchainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockchainClient")
            .field("rpc_url", &self.config.rpc_url)
            .field("chain_id", &self.config.chain_id)
            .field("timeout_secs", &self.config.rpc_timeout_secs)
            .finish()
    }
}
