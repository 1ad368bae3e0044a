//! Election, candidate and voter records.

use alloy::primitives::{keccak256, Address, B256};
use serde::{Deserialize, Serialize};

/// A pre-scheduled voting window, in unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionPeriod {
    pub start: u64,
    pub end: u64,
}

impl ElectionPeriod {
    pub fn is_valid(&self) -> bool {
        self.start < self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Election {
    pub id: u64,
    pub name: String,
    pub description: String,
    pub admin: Address,
    pub is_started: bool,
    pub started_at: u64,
    /// 0 while the election is open-ended.
    pub ended_at: u64,
    pub scheduled_start: u64,
    pub scheduled_end: u64,
    pub end_reason: String,
}

impl Election {
    /// An election has ended once it was closed explicitly, or once a
    /// running election passes a non-zero `ended_at`.
    pub fn is_ended(&self, now: u64) -> bool {
        self.ended_at != 0 && (!self.is_started || now >= self.ended_at)
    }

    /// Accepting votes right now.
    pub fn is_running(&self, now: u64) -> bool {
        self.is_started && !self.is_ended(now)
    }

    pub fn period(&self) -> ElectionPeriod {
        ElectionPeriod {
            start: self.scheduled_start,
            end: self.scheduled_end,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: u64,
    pub name: String,
    pub delegate: Address,
    pub votes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voter {
    pub id: u64,
    pub name: String,
    pub delegate: Address,
    pub has_voted: bool,
    #[serde(skip_serializing, default)]
    pub password_hash: B256,
}

impl Voter {
    pub fn password_matches(&self, password: &str) -> bool {
        hash_voter_password(password) == self.password_hash
    }
}

/// An ended election with its remaining candidates, in id order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionResult {
    pub election: Election,
    pub candidates: Vec<Candidate>,
}

/// Voter passwords are only ever stored as their keccak-256 digest.
pub fn hash_voter_password(password: &str) -> B256 {
    keccak256(password.as_bytes())
}
