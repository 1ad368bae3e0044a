//! Blockchain integration subsystem.
//!
//! # Data Flow
//! ```text
//! Sign-up
//!     → wallet.rs (fresh keypair per user)
//!     → funding.rs (bounded provisioning, multi-funder top-up)
//!     → client.rs (RPC with timeouts and read failover)
//! ```
//!
//! # Security Constraints
//! - Never log private keys or funder passwords
//! - All RPC calls have configurable timeouts
//! - Graceful degradation when blockchain unreachable

pub mod client;
pub mod funding;
pub mod types;
pub mod wallet;

pub use client::BlockchainClient;
pub use funding::{FundingChain, FundingError, FundingSettings, ProvisionedWallet, WalletProvisioner};
pub use types::{BlockchainConfig, BlockchainError, ChainId, FundingReport, TransferOutcome};
pub use wallet::GeneratedWallet;
