//! Chain-specific types and error definitions.

use alloy::primitives::{Address, TxHash, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use crate::config::schema::BlockchainConfig;

/// Chain ID type for strong typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainId(pub u64);

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<ChainId> for u64 {
    fn from(id: ChainId) -> Self {
        id.0
    }
}

/// Errors that can occur during blockchain operations.
#[derive(Debug, Error)]
pub enum BlockchainError {
    /// RPC connection or request failed.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// The node answered with a JSON-RPC error object.
    #[error("RPC rejected request ({code}): {message}")]
    Rejected { code: i64, message: String },

    /// RPC request timed out.
    #[error("RPC timeout after {0} seconds")]
    Timeout(u64),

    /// Transaction was not confirmed within expected time.
    #[error("Transaction {0} not confirmed in time")]
    ConfirmationTimeout(TxHash),

    /// Transaction was reverted on-chain.
    #[error("Transaction reverted: {0}")]
    Reverted(String),

    /// Invalid private key format or derivation error.
    #[error("Wallet error: {0}")]
    Wallet(String),

    /// Chain configuration mismatch.
    #[error("Chain ID mismatch: expected {expected}, got {actual}")]
    ChainMismatch { expected: u64, actual: u64 },

    /// Blockchain client not initialized or disabled.
    #[error("Blockchain not available: {0}")]
    NotAvailable(String),
}

impl BlockchainError {
    /// Whether a send that failed this way can be safely re-sent.
    ///
    /// Only an explicit rejection from the node qualifies. Transport errors
    /// and timeouts may hide a broadcast transaction, and nonce conflicts
    /// mean one with the same nonce is already pending.
    pub fn is_transient(&self) -> bool {
        match self {
            BlockchainError::Rejected { message, .. } => {
                let message = message.to_lowercase();
                !NONCE_CONFLICTS.iter().any(|m| message.contains(m))
            }
            _ => false,
        }
    }
}

/// Rejection messages meaning the transaction may already be in the pool.
const NONCE_CONFLICTS: &[&str] = &["nonce", "already known", "replacement transaction"];

/// Result type for blockchain operations.
pub type BlockchainResult<T> = Result<T, BlockchainError>;

/// Transaction confirmation status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationStatus {
    /// Transaction is mined with a success status.
    Confirmed { block_number: u64 },
    /// Transaction was mined but reverted.
    Failed(String),
}

/// What happened to one funder's contribution to a new wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TransferOutcome {
    Confirmed { block_number: u64 },
    Reverted { reason: String },
    Unconfirmed { reason: String },
    SendFailed { reason: String },
    Skipped { reason: String },
}

impl TransferOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, TransferOutcome::Confirmed { .. })
    }

    pub fn metric_label(&self) -> &'static str {
        match self {
            TransferOutcome::Confirmed { .. } => "confirmed",
            TransferOutcome::Reverted { .. } => "reverted",
            TransferOutcome::Unconfirmed { .. } => "unconfirmed",
            TransferOutcome::SendFailed { .. } => "send_failed",
            TransferOutcome::Skipped { .. } => "skipped",
        }
    }
}

/// A single funder → wallet transfer, persisted with the wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingTransfer {
    pub funder: Address,
    /// Amount in wei.
    pub value: U256,
    pub tx_hash: Option<TxHash>,
    pub outcome: TransferOutcome,
    /// Unix seconds.
    pub at: u64,
}

/// Everything a funding run did for one wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingReport {
    pub target: Address,
    /// Target balance in wei.
    pub required: U256,
    /// Balance observed after the last transfer.
    pub final_balance: U256,
    pub transfers: Vec<FundingTransfer>,
}

impl FundingReport {
    pub fn is_funded(&self) -> bool {
        self.final_balance >= self.required
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_id_conversion() {
        let chain_id = ChainId::from(1u64);
        assert_eq!(chain_id.0, 1);
        assert_eq!(u64::from(chain_id), 1);
    }

    #[test]
    fn test_default_config() {
        let config = BlockchainConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.rpc_timeout_secs, 10);
        assert_eq!(config.unlock_duration_secs, 600);
    }

    #[test]
    fn test_error_display() {
        let err = BlockchainError::Timeout(10);
        assert_eq!(err.to_string(), "RPC timeout after 10 seconds");
        assert!(!err.is_transient());
    }

    #[test]
    fn test_only_plain_rejections_are_transient() {
        let rejected = |message: &str| BlockchainError::Rejected {
            code: -32000,
            message: message.into(),
        };
        assert!(rejected("txpool is full").is_transient());
        assert!(!rejected("nonce too low").is_transient());
        assert!(!rejected("Nonce too high").is_transient());
        assert!(!rejected("already known").is_transient());
        assert!(!rejected("replacement transaction underpriced").is_transient());
        // connection drops may hide a broadcast send
        assert!(!BlockchainError::Rpc("connection reset by peer".into()).is_transient());
        assert!(!BlockchainError::Timeout(10).is_transient());
    }

    #[test]
    fn test_transfer_outcome_serializes_tagged() {
        let outcome = TransferOutcome::Skipped {
            reason: "funder balance too low".into(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "skipped");
        assert_eq!(json["reason"], "funder balance too low");
    }

    #[test]
    fn test_report_funded_threshold() {
        let mut report = FundingReport {
            target: Address::ZERO,
            required: U256::from(100u64),
            final_balance: U256::from(99u64),
            transfers: Vec::new(),
        };
        assert!(!report.is_funded());
        report.final_balance = U256::from(100u64);
        assert!(report.is_funded());
    }
}
