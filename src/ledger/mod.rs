//! Election ledger subsystem.
//!
//! # Data Flow
//! ```text
//! ElectionService (caller = acting user's wallet)
//!     → ElectionLedger
//!         → memory.rs  (in-process state machine, default)
//!         → onchain.rs (Voting contract via alloy, one signed tx per mutation)
//! ```
//!
//! # Rules
//! - Only an election's admin mutates it; candidates withdraw themselves
//! - One vote per registered voter per election
//! - Nothing is added or removed after an election has ended
//! - Candidate and voter ids are never reused

pub mod error;
pub mod memory;
pub mod onchain;
pub mod types;

use alloy::primitives::Address;
use async_trait::async_trait;

use crate::blockchain::GeneratedWallet;

pub use error::{LedgerError, LedgerResult};
pub use memory::InMemoryLedger;
pub use onchain::OnChainLedger;
pub use types::{Candidate, Election, ElectionPeriod, ElectionResult, Voter};

/// Election state, keyed by sequential election ids starting at 0.
///
/// Mutations take the acting user's wallet; queries only need addresses.
#[async_trait]
pub trait ElectionLedger: Send + Sync {
    async fn create_election(
        &self,
        caller: &GeneratedWallet,
        name: &str,
        description: &str,
        period: Option<ElectionPeriod>,
    ) -> LedgerResult<u64>;

    async fn start_election(&self, caller: &GeneratedWallet, election_id: u64) -> LedgerResult<()>;

    async fn extend_election(
        &self,
        caller: &GeneratedWallet,
        election_id: u64,
        secs: u64,
    ) -> LedgerResult<()>;

    async fn end_election(
        &self,
        caller: &GeneratedWallet,
        election_id: u64,
        reason: &str,
    ) -> LedgerResult<()>;

    async fn add_candidate(
        &self,
        caller: &GeneratedWallet,
        election_id: u64,
        name: &str,
        delegate: Address,
    ) -> LedgerResult<u64>;

    async fn remove_candidate(
        &self,
        caller: &GeneratedWallet,
        election_id: u64,
        candidate_id: u64,
    ) -> LedgerResult<()>;

    async fn withdraw_candidate(
        &self,
        caller: &GeneratedWallet,
        election_id: u64,
        candidate_id: u64,
    ) -> LedgerResult<()>;

    async fn add_voter(
        &self,
        caller: &GeneratedWallet,
        election_id: u64,
        name: &str,
        password: &str,
        delegate: Address,
    ) -> LedgerResult<u64>;

    async fn update_voter(
        &self,
        caller: &GeneratedWallet,
        election_id: u64,
        voter_id: u64,
        name: &str,
        password: &str,
    ) -> LedgerResult<()>;

    async fn cast_vote(
        &self,
        caller: &GeneratedWallet,
        election_id: u64,
        candidate_id: u64,
    ) -> LedgerResult<()>;

    async fn election(&self, election_id: u64) -> LedgerResult<Election>;

    async fn election_period(&self, election_id: u64) -> LedgerResult<ElectionPeriod>;

    async fn candidate(&self, election_id: u64, candidate_id: u64) -> LedgerResult<Candidate>;

    /// Remaining candidates in id order.
    async fn candidates(&self, election_id: u64) -> LedgerResult<Vec<Candidate>>;

    async fn voter(&self, election_id: u64, voter_id: u64) -> LedgerResult<Voter>;

    async fn has_voted(&self, election_id: u64, voter: Address) -> LedgerResult<bool>;

    async fn admin_elections(&self, admin: Address) -> LedgerResult<Vec<Election>>;

    /// Elections where `participant` is a candidate or a voter.
    async fn participant_elections(&self, participant: Address) -> LedgerResult<Vec<Election>>;

    /// Every election that has not ended, started or not.
    async fn open_elections(&self) -> LedgerResult<Vec<Election>>;

    async fn elections_with_results(&self) -> LedgerResult<Vec<ElectionResult>>;
}
