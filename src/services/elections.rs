//! Election management on behalf of signed-in users.
//!
//! Every ledger mutation is made with the acting user's own wallet, so the
//! ledger's admin and delegate rules apply to the user behind the token.

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use crate::accounts::{UserRecord, UserStore};
use crate::blockchain::GeneratedWallet;
use crate::ledger::{Candidate, Election, ElectionLedger, ElectionPeriod, ElectionResult, LedgerResult};
use crate::observability::metrics;
use crate::services::{require, ServiceError, ServiceResult};

/// A user to register as voter, with the password the ledger keeps a hash of.
#[derive(Debug, Clone, Deserialize)]
pub struct VoterEntry {
    pub user_id: u64,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateElection {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// User ids.
    #[serde(default)]
    pub candidates: Vec<u64>,
    #[serde(default)]
    pub voters: Vec<VoterEntry>,
    #[serde(default)]
    pub period: Option<ElectionPeriod>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ElectionDetail {
    pub election: Election,
    pub candidates: Vec<Candidate>,
}

pub struct ElectionService {
    ledger: Arc<dyn ElectionLedger>,
    store: UserStore,
}

/// Count the ledger call and lift its error.
fn observed<T>(op: &'static str, result: LedgerResult<T>) -> ServiceResult<T> {
    metrics::record_ledger_op(op, result.is_ok());
    if let Err(e) = &result {
        tracing::debug!(op, error = %e, "Ledger call rejected");
    }
    result.map_err(ServiceError::from)
}

/// Reject a list naming the same user twice.
fn distinct(field: &str, ids: impl IntoIterator<Item = u64>) -> ServiceResult<()> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(ServiceError::Validation(format!(
                "{} lists user {} more than once",
                field, id
            )));
        }
    }
    Ok(())
}

impl ElectionService {
    pub fn new(ledger: Arc<dyn ElectionLedger>, store: UserStore) -> Self {
        Self { ledger, store }
    }

    fn user(&self, user_id: u64) -> ServiceResult<UserRecord> {
        self.store.get(user_id).ok_or(ServiceError::NotFound("User"))
    }

    /// The acting user's wallet, restored from the stored key.
    fn wallet(&self, user_id: u64) -> ServiceResult<GeneratedWallet> {
        let user = self.user(user_id)?;
        GeneratedWallet::from_private_key(&user.wallet.private_key)
            .map_err(|e| ServiceError::Internal(format!("wallet of user {}: {}", user.id, e)))
    }

    fn users(&self, ids: impl IntoIterator<Item = u64>) -> ServiceResult<Vec<UserRecord>> {
        ids.into_iter().map(|id| self.user(id)).collect()
    }

    /// Create an election and register its candidates and voters.
    ///
    /// All referenced users are resolved before anything is written.
    pub async fn create_election(
        &self,
        user_id: u64,
        request: CreateElection,
    ) -> ServiceResult<ElectionDetail> {
        require("name", &request.name)?;
        if request.period.is_some_and(|p| !p.is_valid()) {
            return Err(ServiceError::Validation(
                "period.start must be before period.end".to_string(),
            ));
        }
        distinct("candidates", request.candidates.iter().copied())?;
        distinct("voters", request.voters.iter().map(|v| v.user_id))?;
        let admin = self.wallet(user_id)?;
        let candidates = self.users(request.candidates.iter().copied())?;
        let voters = self.users(request.voters.iter().map(|v| v.user_id))?;

        let id = observed(
            "create_election",
            self.ledger
                .create_election(&admin, request.name.trim(), &request.description, request.period)
                .await,
        )?;

        for candidate in &candidates {
            observed(
                "add_candidate",
                self.ledger
                    .add_candidate(&admin, id, &candidate.name, candidate.wallet.address)
                    .await,
            )?;
        }
        for (voter, entry) in voters.iter().zip(&request.voters) {
            observed(
                "add_voter",
                self.ledger
                    .add_voter(
                        &admin,
                        id,
                        &voter.name,
                        entry.password.as_deref().unwrap_or_default(),
                        voter.wallet.address,
                    )
                    .await,
            )?;
        }

        tracing::info!(
            election_id = id,
            admin = user_id,
            candidates = candidates.len(),
            voters = voters.len(),
            "Election created"
        );
        self.detail(id).await
    }

    pub async fn start(&self, user_id: u64, election_id: u64) -> ServiceResult<Election> {
        let admin = self.wallet(user_id)?;
        observed("start_election", self.ledger.start_election(&admin, election_id).await)?;
        tracing::info!(election_id, "Election started");
        observed("election", self.ledger.election(election_id).await)
    }

    pub async fn end(&self, user_id: u64, election_id: u64, reason: &str) -> ServiceResult<Election> {
        let admin = self.wallet(user_id)?;
        observed("end_election", self.ledger.end_election(&admin, election_id, reason).await)?;
        tracing::info!(election_id, "Election ended");
        observed("election", self.ledger.election(election_id).await)
    }

    pub async fn extend(&self, user_id: u64, election_id: u64, secs: u64) -> ServiceResult<Election> {
        if secs == 0 {
            return Err(ServiceError::Validation("secs must be positive".to_string()));
        }
        let admin = self.wallet(user_id)?;
        observed(
            "extend_election",
            self.ledger.extend_election(&admin, election_id, secs).await,
        )?;
        observed("election", self.ledger.election(election_id).await)
    }

    /// Register more voters. Returns their voter ids in request order.
    pub async fn add_voters(
        &self,
        user_id: u64,
        election_id: u64,
        entries: Vec<VoterEntry>,
    ) -> ServiceResult<Vec<u64>> {
        if entries.is_empty() {
            return Err(ServiceError::Validation("voters must not be empty".to_string()));
        }
        distinct("voters", entries.iter().map(|v| v.user_id))?;
        let admin = self.wallet(user_id)?;
        let voters = self.users(entries.iter().map(|v| v.user_id))?;

        let mut ids = Vec::with_capacity(voters.len());
        for (voter, entry) in voters.iter().zip(&entries) {
            let id = observed(
                "add_voter",
                self.ledger
                    .add_voter(
                        &admin,
                        election_id,
                        &voter.name,
                        entry.password.as_deref().unwrap_or_default(),
                        voter.wallet.address,
                    )
                    .await,
            )?;
            ids.push(id);
        }
        Ok(ids)
    }

    pub async fn update_voter(
        &self,
        user_id: u64,
        election_id: u64,
        voter_id: u64,
        name: &str,
        password: &str,
    ) -> ServiceResult<()> {
        require("name", name)?;
        let admin = self.wallet(user_id)?;
        observed(
            "update_voter",
            self.ledger
                .update_voter(&admin, election_id, voter_id, name.trim(), password)
                .await,
        )
    }

    pub async fn remove_candidate(
        &self,
        user_id: u64,
        election_id: u64,
        candidate_id: u64,
    ) -> ServiceResult<()> {
        let admin = self.wallet(user_id)?;
        observed(
            "remove_candidate",
            self.ledger.remove_candidate(&admin, election_id, candidate_id).await,
        )
    }

    pub async fn withdraw(&self, user_id: u64, election_id: u64, candidate_id: u64) -> ServiceResult<()> {
        let candidate = self.wallet(user_id)?;
        observed(
            "withdraw_candidate",
            self.ledger
                .withdraw_candidate(&candidate, election_id, candidate_id)
                .await,
        )
    }

    pub async fn cast_vote(&self, user_id: u64, election_id: u64, candidate_id: u64) -> ServiceResult<()> {
        let voter = self.wallet(user_id)?;
        observed(
            "cast_vote",
            self.ledger.cast_vote(&voter, election_id, candidate_id).await,
        )?;
        tracing::info!(election_id, "Vote cast");
        Ok(())
    }

    pub async fn has_voted(&self, user_id: u64, election_id: u64) -> ServiceResult<bool> {
        let address = self.address(user_id)?;
        observed("has_voted", self.ledger.has_voted(election_id, address).await)
    }

    pub async fn detail(&self, election_id: u64) -> ServiceResult<ElectionDetail> {
        let election = observed("election", self.ledger.election(election_id).await)?;
        let candidates = observed("candidates", self.ledger.candidates(election_id).await)?;
        Ok(ElectionDetail {
            election,
            candidates,
        })
    }

    pub async fn admin_elections(&self, user_id: u64) -> ServiceResult<Vec<Election>> {
        let address = self.address(user_id)?;
        observed("admin_elections", self.ledger.admin_elections(address).await)
    }

    /// Elections the user takes part in as candidate or voter.
    pub async fn my_elections(&self, user_id: u64) -> ServiceResult<Vec<Election>> {
        let address = self.address(user_id)?;
        observed(
            "participant_elections",
            self.ledger.participant_elections(address).await,
        )
    }

    pub async fn open_elections(&self) -> ServiceResult<Vec<Election>> {
        observed("open_elections", self.ledger.open_elections().await)
    }

    pub async fn results(&self) -> ServiceResult<Vec<ElectionResult>> {
        observed("elections_with_results", self.ledger.elections_with_results().await)
    }

    fn address(&self, user_id: u64) -> ServiceResult<Address> {
        Ok(self.user(user_id)?.wallet.address)
    }
}
