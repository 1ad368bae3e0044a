//! Ledger errors. Messages match the `Voting` contract's revert strings.

use thiserror::Error;

use crate::blockchain::BlockchainError;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Only Admins can perform this action")]
    NotAdmin,

    #[error("Candidate does not exist")]
    CandidateNotFound,

    #[error("Voter has already voted")]
    AlreadyVoted,

    #[error("Election does not exist")]
    ElectionNotFound,

    #[error("Voter not registered")]
    VoterNotRegistered,

    #[error("Election not started")]
    NotStarted,

    #[error("Election already started")]
    AlreadyStarted,

    #[error("Election has ended")]
    Ended,

    #[error("Voter does not exist")]
    VoterNotFound,

    #[error("Only the candidate can withdraw")]
    NotCandidate,

    #[error("Delegate already registered in this election")]
    DuplicateDelegate,

    #[error("Election period must start before it ends")]
    InvalidPeriod,

    /// A revert whose reason is not one of the above.
    #[error("Transaction reverted: {0}")]
    Reverted(String),

    #[error(transparent)]
    Chain(#[from] BlockchainError),
}

/// Errors that the contract raises as plain revert strings.
fn known_reverts() -> [LedgerError; 12] {
    [
        LedgerError::NotAdmin,
        LedgerError::CandidateNotFound,
        LedgerError::AlreadyVoted,
        LedgerError::ElectionNotFound,
        LedgerError::VoterNotRegistered,
        LedgerError::NotStarted,
        LedgerError::AlreadyStarted,
        LedgerError::Ended,
        LedgerError::VoterNotFound,
        LedgerError::NotCandidate,
        LedgerError::DuplicateDelegate,
        LedgerError::InvalidPeriod,
    ]
}

impl LedgerError {
    /// Map a revert reason (or an RPC error message that embeds one) back
    /// onto a typed error.
    pub fn from_revert(message: &str) -> Self {
        known_reverts()
            .into_iter()
            .find(|e| message.contains(&e.to_string()))
            .unwrap_or_else(|| LedgerError::Reverted(message.to_string()))
    }

    pub fn is_revert(&self) -> bool {
        !matches!(self, LedgerError::Chain(_))
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
