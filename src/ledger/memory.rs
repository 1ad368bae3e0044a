//! In-process election ledger.
//!
//! Follows the `Voting` contract's rules exactly, with `now` taken from an
//! injectable clock instead of the block timestamp.

use alloy::primitives::Address;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::blockchain::GeneratedWallet;
use crate::ledger::types::hash_voter_password;
use crate::ledger::{
    Candidate, Election, ElectionLedger, ElectionPeriod, ElectionResult, LedgerError,
    LedgerResult, Voter,
};

/// Source of the current unix time in seconds.
pub type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

fn system_clock() -> Clock {
    Arc::new(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    })
}

#[derive(Debug, Clone)]
struct ElectionEntry {
    election: Election,
    /// `None` marks a removed or withdrawn candidate; its id stays taken.
    candidates: Vec<Option<Candidate>>,
    voters: Vec<Voter>,
}

impl ElectionEntry {
    fn require_admin(&self, caller: Address) -> LedgerResult<()> {
        if self.election.admin != caller {
            return Err(LedgerError::NotAdmin);
        }
        Ok(())
    }

    fn require_not_ended(&self, now: u64) -> LedgerResult<()> {
        if self.election.is_ended(now) {
            return Err(LedgerError::Ended);
        }
        Ok(())
    }

    fn candidate(&self, candidate_id: u64) -> LedgerResult<&Candidate> {
        self.candidates
            .get(candidate_id as usize)
            .and_then(Option::as_ref)
            .ok_or(LedgerError::CandidateNotFound)
    }

    fn active_candidates(&self) -> Vec<Candidate> {
        self.candidates.iter().flatten().cloned().collect()
    }

    fn involves(&self, participant: Address) -> bool {
        self.candidates.iter().flatten().any(|c| c.delegate == participant)
            || self.voters.iter().any(|v| v.delegate == participant)
    }
}

/// Election ledger held in memory.
#[derive(Clone)]
pub struct InMemoryLedger {
    elections: Arc<DashMap<u64, ElectionEntry>>,
    next_id: Arc<AtomicU64>,
    clock: Clock,
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    pub fn with_clock(clock: Clock) -> Self {
        Self {
            elections: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU64::new(0)),
            clock,
        }
    }

    pub fn len(&self) -> usize {
        self.elections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elections.is_empty()
    }

    fn now(&self) -> u64 {
        (self.clock)()
    }

    fn read<T>(&self, election_id: u64, f: impl FnOnce(&ElectionEntry) -> LedgerResult<T>) -> LedgerResult<T> {
        let entry = self
            .elections
            .get(&election_id)
            .ok_or(LedgerError::ElectionNotFound)?;
        f(&entry)
    }

    fn write<T>(
        &self,
        election_id: u64,
        f: impl FnOnce(&mut ElectionEntry, u64) -> LedgerResult<T>,
    ) -> LedgerResult<T> {
        let now = self.now();
        let mut entry = self
            .elections
            .get_mut(&election_id)
            .ok_or(LedgerError::ElectionNotFound)?;
        f(&mut entry, now)
    }

    fn collect<T>(&self, f: impl Fn(&ElectionEntry) -> Option<T>, id: impl Fn(&T) -> u64) -> Vec<T> {
        let mut out: Vec<T> = self.elections.iter().filter_map(|e| f(e.value())).collect();
        out.sort_by_key(|item| id(item));
        out
    }
}

#[async_trait]
impl ElectionLedger for InMemoryLedger {
    async fn create_election(
        &self,
        caller: &GeneratedWallet,
        name: &str,
        description: &str,
        period: Option<ElectionPeriod>,
    ) -> LedgerResult<u64> {
        if period.is_some_and(|p| !p.is_valid()) {
            return Err(LedgerError::InvalidPeriod);
        }
        let period = period.unwrap_or(ElectionPeriod { start: 0, end: 0 });

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let election = Election {
            id,
            name: name.to_string(),
            description: description.to_string(),
            admin: caller.address(),
            is_started: false,
            started_at: 0,
            ended_at: 0,
            scheduled_start: period.start,
            scheduled_end: period.end,
            end_reason: String::new(),
        };
        self.elections.insert(
            id,
            ElectionEntry {
                election,
                candidates: Vec::new(),
                voters: Vec::new(),
            },
        );
        Ok(id)
    }

    async fn start_election(&self, caller: &GeneratedWallet, election_id: u64) -> LedgerResult<()> {
        self.write(election_id, |entry, now| {
            entry.require_admin(caller.address())?;
            if entry.election.is_started {
                return Err(LedgerError::AlreadyStarted);
            }
            entry.require_not_ended(now)?;

            let election = &mut entry.election;
            election.is_started = true;
            election.started_at = now;
            election.ended_at = election.scheduled_end;
            Ok(())
        })
    }

    async fn extend_election(
        &self,
        caller: &GeneratedWallet,
        election_id: u64,
        secs: u64,
    ) -> LedgerResult<()> {
        self.write(election_id, |entry, now| {
            entry.require_admin(caller.address())?;
            if !entry.election.is_started {
                return Err(LedgerError::NotStarted);
            }
            entry.require_not_ended(now)?;

            let election = &mut entry.election;
            election.ended_at = if election.ended_at == 0 {
                now.saturating_add(secs)
            } else {
                election.ended_at.saturating_add(secs)
            };
            Ok(())
        })
    }

    async fn end_election(
        &self,
        caller: &GeneratedWallet,
        election_id: u64,
        reason: &str,
    ) -> LedgerResult<()> {
        self.write(election_id, |entry, now| {
            entry.require_admin(caller.address())?;
            if !entry.election.is_started {
                return Err(LedgerError::NotStarted);
            }

            let election = &mut entry.election;
            election.is_started = false;
            // A timed election that already ran out keeps its scheduled end.
            if election.ended_at == 0 || election.ended_at > now {
                election.ended_at = now;
            }
            election.end_reason = reason.to_string();
            Ok(())
        })
    }

    async fn add_candidate(
        &self,
        caller: &GeneratedWallet,
        election_id: u64,
        name: &str,
        delegate: Address,
    ) -> LedgerResult<u64> {
        self.write(election_id, |entry, now| {
            entry.require_admin(caller.address())?;
            entry.require_not_ended(now)?;
            if entry.candidates.iter().flatten().any(|c| c.delegate == delegate) {
                return Err(LedgerError::DuplicateDelegate);
            }

            let id = entry.candidates.len() as u64;
            entry.candidates.push(Some(Candidate {
                id,
                name: name.to_string(),
                delegate,
                votes: 0,
            }));
            Ok(id)
        })
    }

    async fn remove_candidate(
        &self,
        caller: &GeneratedWallet,
        election_id: u64,
        candidate_id: u64,
    ) -> LedgerResult<()> {
        self.write(election_id, |entry, now| {
            entry.require_admin(caller.address())?;
            entry.require_not_ended(now)?;
            entry.candidate(candidate_id)?;
            entry.candidates[candidate_id as usize] = None;
            Ok(())
        })
    }

    async fn withdraw_candidate(
        &self,
        caller: &GeneratedWallet,
        election_id: u64,
        candidate_id: u64,
    ) -> LedgerResult<()> {
        self.write(election_id, |entry, now| {
            if entry.candidate(candidate_id)?.delegate != caller.address() {
                return Err(LedgerError::NotCandidate);
            }
            entry.require_not_ended(now)?;
            entry.candidates[candidate_id as usize] = None;
            Ok(())
        })
    }

    async fn add_voter(
        &self,
        caller: &GeneratedWallet,
        election_id: u64,
        name: &str,
        password: &str,
        delegate: Address,
    ) -> LedgerResult<u64> {
        self.write(election_id, |entry, now| {
            entry.require_admin(caller.address())?;
            entry.require_not_ended(now)?;
            if entry.voters.iter().any(|v| v.delegate == delegate) {
                return Err(LedgerError::DuplicateDelegate);
            }

            let id = entry.voters.len() as u64;
            entry.voters.push(Voter {
                id,
                name: name.to_string(),
                delegate,
                has_voted: false,
                password_hash: hash_voter_password(password),
            });
            Ok(id)
        })
    }

    async fn update_voter(
        &self,
        caller: &GeneratedWallet,
        election_id: u64,
        voter_id: u64,
        name: &str,
        password: &str,
    ) -> LedgerResult<()> {
        self.write(election_id, |entry, now| {
            entry.require_admin(caller.address())?;
            entry.require_not_ended(now)?;
            let voter = entry
                .voters
                .get_mut(voter_id as usize)
                .ok_or(LedgerError::VoterNotFound)?;
            voter.name = name.to_string();
            voter.password_hash = hash_voter_password(password);
            Ok(())
        })
    }

    async fn cast_vote(
        &self,
        caller: &GeneratedWallet,
        election_id: u64,
        candidate_id: u64,
    ) -> LedgerResult<()> {
        let voter_address = caller.address();
        self.write(election_id, |entry, now| {
            if !entry.election.is_started {
                return Err(if entry.election.is_ended(now) {
                    LedgerError::Ended
                } else {
                    LedgerError::NotStarted
                });
            }
            entry.require_not_ended(now)?;

            let voter_idx = entry
                .voters
                .iter()
                .position(|v| v.delegate == voter_address)
                .ok_or(LedgerError::VoterNotRegistered)?;
            if entry.voters[voter_idx].has_voted {
                return Err(LedgerError::AlreadyVoted);
            }
            entry.candidate(candidate_id)?;

            entry.voters[voter_idx].has_voted = true;
            if let Some(candidate) = entry.candidates[candidate_id as usize].as_mut() {
                candidate.votes += 1;
            }
            Ok(())
        })
    }

    async fn election(&self, election_id: u64) -> LedgerResult<Election> {
        self.read(election_id, |entry| Ok(entry.election.clone()))
    }

    async fn election_period(&self, election_id: u64) -> LedgerResult<ElectionPeriod> {
        self.read(election_id, |entry| Ok(entry.election.period()))
    }

    async fn candidate(&self, election_id: u64, candidate_id: u64) -> LedgerResult<Candidate> {
        self.read(election_id, |entry| entry.candidate(candidate_id).cloned())
    }

    async fn candidates(&self, election_id: u64) -> LedgerResult<Vec<Candidate>> {
        self.read(election_id, |entry| Ok(entry.active_candidates()))
    }

    async fn voter(&self, election_id: u64, voter_id: u64) -> LedgerResult<Voter> {
        self.read(election_id, |entry| {
            entry
                .voters
                .get(voter_id as usize)
                .cloned()
                .ok_or(LedgerError::VoterNotFound)
        })
    }

    async fn has_voted(&self, election_id: u64, voter: Address) -> LedgerResult<bool> {
        self.read(election_id, |entry| {
            Ok(entry
                .voters
                .iter()
                .any(|v| v.delegate == voter && v.has_voted))
        })
    }

    async fn admin_elections(&self, admin: Address) -> LedgerResult<Vec<Election>> {
        Ok(self.collect(
            |entry| (entry.election.admin == admin).then(|| entry.election.clone()),
            |e: &Election| e.id,
        ))
    }

    async fn participant_elections(&self, participant: Address) -> LedgerResult<Vec<Election>> {
        Ok(self.collect(
            |entry| entry.involves(participant).then(|| entry.election.clone()),
            |e: &Election| e.id,
        ))
    }

    async fn open_elections(&self) -> LedgerResult<Vec<Election>> {
        let now = self.now();
        Ok(self.collect(
            |entry| (!entry.election.is_ended(now)).then(|| entry.election.clone()),
            |e: &Election| e.id,
        ))
    }

    async fn elections_with_results(&self) -> LedgerResult<Vec<ElectionResult>> {
        let now = self.now();
        Ok(self.collect(
            |entry| {
                entry.election.is_ended(now).then(|| ElectionResult {
                    election: entry.election.clone(),
                    candidates: entry.active_candidates(),
                })
            },
            |r: &ElectionResult| r.election.id,
        ))
    }
}
