//! Election ledger backed by the deployed `Voting` contract.
//!
//! # Responsibilities
//! - Bind the contract ABI with `sol!`
//! - Sign every mutation with the acting user's own wallet
//! - Recover typed errors from revert reasons
//!
//! Reads go through the shared [`BlockchainClient`] provider.

use alloy::network::EthereumWallet;
use alloy::primitives::{Address, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionReceipt;
use alloy::sol;
use alloy::sol_types::{decode_revert_reason, SolEvent};
use async_trait::async_trait;
use std::time::Duration;

use crate::blockchain::{BlockchainClient, BlockchainError, GeneratedWallet};
use crate::ledger::types::hash_voter_password;
use crate::ledger::{
    Candidate, Election, ElectionLedger, ElectionPeriod, ElectionResult, LedgerError,
    LedgerResult, Voter,
};

sol! {
    #[sol(rpc)]
    contract Voting {
        struct Election {
            uint256 id;
            string name;
            string description;
            address admin;
            bool isStarted;
            uint256 startedAt;
            uint256 endedAt;
            uint256 startPeriod;
            uint256 endPeriod;
            string endReason;
        }

        struct Candidate {
            uint256 id;
            string name;
            address delegate;
            uint256 votes;
        }

        struct Voter {
            uint256 id;
            string name;
            address delegate;
            bytes32 passwordHash;
            bool hasVoted;
        }

        struct ElectionResult {
            Election election;
            Candidate[] candidates;
        }

        #[derive(Debug)]
        event ElectionCreated(uint256 indexed electionId, address indexed admin);
        #[derive(Debug)]
        event CandidateAdded(uint256 indexed electionId, uint256 candidateId, address delegate);
        #[derive(Debug)]
        event VoterAdded(uint256 indexed electionId, uint256 voterId, address delegate);

        function createElection(string name, string description) external;
        function createElection(string name, string description, uint256 startPeriod, uint256 endPeriod) external;
        function startElection(uint256 electionId) external;
        function extendElectionPeriod(uint256 electionId, uint256 duration) external;
        function endElection(uint256 electionId, string reason) external;

        function addCandidate(uint256 electionId, string name, address delegate) external;
        function removeCandidateElection(uint256 electionId, uint256 candidateId) external;
        function withdrawFromElection(uint256 electionId, uint256 candidateId) external;

        function addVoter(uint256 electionId, string name, bytes32 passwordHash, address delegate) external;
        function updateVoter(uint256 electionId, uint256 voterId, string name, bytes32 passwordHash) external;
        function castVote(uint256 electionId, uint256 candidateId) external;

        function getElection(uint256 electionId) external view returns (Election memory);
        function getElectionPeriod(uint256 electionId) external view returns (uint256 startPeriod, uint256 endPeriod);
        function getElectionCandidate(uint256 electionId, uint256 candidateId) external view returns (Candidate memory);
        function getElectionCandidates(uint256 electionId) external view returns (Candidate[] memory);
        function getElectionVoter(uint256 electionId, uint256 voterId) external view returns (Voter memory);
        function hasVotedInElection(uint256 electionId, address voter) external view returns (bool);
        function getAdminElections(address admin) external view returns (Election[] memory);
        function getCandidateElections(address participant) external view returns (Election[] memory);
        function getStartedElections() external view returns (Election[] memory);
        function getElectionsWithResults() external view returns (ElectionResult[] memory);
    }
}

/// Election ledger that talks to a deployed `Voting` contract.
#[derive(Clone)]
pub struct OnChainLedger {
    client: BlockchainClient,
    contract_address: Address,
    rpc_url: url::Url,
    receipt_timeout: Duration,
}

impl OnChainLedger {
    pub fn new(client: BlockchainClient, contract_address: &str) -> LedgerResult<Self> {
        let contract_address: Address = contract_address.parse().map_err(|e| {
            BlockchainError::NotAvailable(format!("Invalid contract address: {}", e))
        })?;
        let config = client.config();
        let rpc_url: url::Url = config
            .rpc_url
            .parse()
            .map_err(|e| BlockchainError::Rpc(format!("Invalid RPC URL '{}': {}", config.rpc_url, e)))?;
        let receipt_timeout = Duration::from_secs(config.receipt_timeout_secs);

        tracing::info!(contract = %contract_address, "Using on-chain election ledger");
        Ok(Self {
            client,
            contract_address,
            rpc_url,
            receipt_timeout,
        })
    }

    fn reader(&self) -> Voting::VotingInstance<DynProvider> {
        Voting::new(self.contract_address, self.client.provider().clone())
    }

    fn writer(&self, caller: &GeneratedWallet) -> Voting::VotingInstance<DynProvider> {
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(caller.signer()))
            .connect_http(self.rpc_url.clone())
            .erased();
        Voting::new(self.contract_address, provider)
    }

    /// Wait for a mined receipt and fail if the transaction reverted.
    async fn confirm(
        &self,
        pending: alloy::providers::PendingTransactionBuilder<alloy::network::Ethereum>,
    ) -> LedgerResult<TransactionReceipt> {
        let tx_hash = *pending.tx_hash();
        let receipt = tokio::time::timeout(self.receipt_timeout, pending.get_receipt())
            .await
            .map_err(|_| BlockchainError::ConfirmationTimeout(tx_hash))?
            .map_err(|e| BlockchainError::Rpc(e.to_string()))?;

        if !receipt.status() {
            tracing::warn!(tx_hash = %tx_hash, "Ledger transaction reverted");
            return Err(LedgerError::Reverted(format!("transaction {} reverted", tx_hash)));
        }
        tracing::debug!(tx_hash = %tx_hash, block = ?receipt.block_number, "Ledger transaction mined");
        Ok(receipt)
    }
}

/// Pull the revert reason out of a contract error when there is one.
fn contract_error(err: alloy::contract::Error) -> LedgerError {
    if let Some(reason) = err
        .as_revert_data()
        .and_then(|data| decode_revert_reason(&data))
    {
        return LedgerError::from_revert(&reason);
    }

    let message = err.to_string();
    match LedgerError::from_revert(&message) {
        LedgerError::Reverted(_) if !message.contains("revert") => {
            LedgerError::Chain(BlockchainError::Rpc(message))
        }
        mapped => mapped,
    }
}

/// Find the first log of type `E` emitted by a receipt.
fn find_event<E: SolEvent>(receipt: &TransactionReceipt) -> Option<E> {
    receipt
        .inner
        .logs()
        .iter()
        .find_map(|log| log.log_decode::<E>().ok())
        .map(|decoded| decoded.inner.data)
}

fn missing_event(name: &str) -> LedgerError {
    LedgerError::Chain(BlockchainError::Rpc(format!("receipt carries no {} event", name)))
}

fn to_u64(value: U256) -> u64 {
    value.saturating_to::<u64>()
}

impl From<Voting::Election> for Election {
    fn from(e: Voting::Election) -> Self {
        Self {
            id: to_u64(e.id),
            name: e.name,
            description: e.description,
            admin: e.admin,
            is_started: e.isStarted,
            started_at: to_u64(e.startedAt),
            ended_at: to_u64(e.endedAt),
            scheduled_start: to_u64(e.startPeriod),
            scheduled_end: to_u64(e.endPeriod),
            end_reason: e.endReason,
        }
    }
}

impl From<Voting::Candidate> for Candidate {
    fn from(c: Voting::Candidate) -> Self {
        Self {
            id: to_u64(c.id),
            name: c.name,
            delegate: c.delegate,
            votes: to_u64(c.votes),
        }
    }
}

impl From<Voting::Voter> for Voter {
    fn from(v: Voting::Voter) -> Self {
        Self {
            id: to_u64(v.id),
            name: v.name,
            delegate: v.delegate,
            has_voted: v.hasVoted,
            password_hash: v.passwordHash,
        }
    }
}

impl From<Voting::ElectionResult> for ElectionResult {
    fn from(r: Voting::ElectionResult) -> Self {
        Self {
            election: r.election.into(),
            candidates: r.candidates.into_iter().map(Candidate::from).collect(),
        }
    }
}

#[async_trait]
impl ElectionLedger for OnChainLedger {
    async fn create_election(
        &self,
        caller: &GeneratedWallet,
        name: &str,
        description: &str,
        period: Option<ElectionPeriod>,
    ) -> LedgerResult<u64> {
        let contract = self.writer(caller);
        let pending = match period {
            Some(p) if !p.is_valid() => return Err(LedgerError::InvalidPeriod),
            Some(p) => contract
                .createElection_1(
                    name.to_string(),
                    description.to_string(),
                    U256::from(p.start),
                    U256::from(p.end),
                )
                .send()
                .await
                .map_err(contract_error)?,
            None => contract
                .createElection_0(name.to_string(), description.to_string())
                .send()
                .await
                .map_err(contract_error)?,
        };
        let receipt = self.confirm(pending).await?;
        find_event::<Voting::ElectionCreated>(&receipt)
            .map(|e| to_u64(e.electionId))
            .ok_or_else(|| missing_event("ElectionCreated"))
    }

    async fn start_election(&self, caller: &GeneratedWallet, election_id: u64) -> LedgerResult<()> {
        let pending = self
            .writer(caller)
            .startElection(U256::from(election_id))
            .send()
            .await
            .map_err(contract_error)?;
        self.confirm(pending).await.map(|_| ())
    }

    async fn extend_election(
        &self,
        caller: &GeneratedWallet,
        election_id: u64,
        secs: u64,
    ) -> LedgerResult<()> {
        let pending = self
            .writer(caller)
            .extendElectionPeriod(U256::from(election_id), U256::from(secs))
            .send()
            .await
            .map_err(contract_error)?;
        self.confirm(pending).await.map(|_| ())
    }

    async fn end_election(
        &self,
        caller: &GeneratedWallet,
        election_id: u64,
        reason: &str,
    ) -> LedgerResult<()> {
        let pending = self
            .writer(caller)
            .endElection(U256::from(election_id), reason.to_string())
            .send()
            .await
            .map_err(contract_error)?;
        self.confirm(pending).await.map(|_| ())
    }

    async fn add_candidate(
        &self,
        caller: &GeneratedWallet,
        election_id: u64,
        name: &str,
        delegate: Address,
    ) -> LedgerResult<u64> {
        let pending = self
            .writer(caller)
            .addCandidate(U256::from(election_id), name.to_string(), delegate)
            .send()
            .await
            .map_err(contract_error)?;
        let receipt = self.confirm(pending).await?;
        find_event::<Voting::CandidateAdded>(&receipt)
            .map(|e| to_u64(e.candidateId))
            .ok_or_else(|| missing_event("CandidateAdded"))
    }

    async fn remove_candidate(
        &self,
        caller: &GeneratedWallet,
        election_id: u64,
        candidate_id: u64,
    ) -> LedgerResult<()> {
        let pending = self
            .writer(caller)
            .removeCandidateElection(U256::from(election_id), U256::from(candidate_id))
            .send()
            .await
            .map_err(contract_error)?;
        self.confirm(pending).await.map(|_| ())
    }

    async fn withdraw_candidate(
        &self,
        caller: &GeneratedWallet,
        election_id: u64,
        candidate_id: u64,
    ) -> LedgerResult<()> {
        let pending = self
            .writer(caller)
            .withdrawFromElection(U256::from(election_id), U256::from(candidate_id))
            .send()
            .await
            .map_err(contract_error)?;
        self.confirm(pending).await.map(|_| ())
    }

    async fn add_voter(
        &self,
        caller: &GeneratedWallet,
        election_id: u64,
        name: &str,
        password: &str,
        delegate: Address,
    ) -> LedgerResult<u64> {
        let pending = self
            .writer(caller)
            .addVoter(
                U256::from(election_id),
                name.to_string(),
                hash_voter_password(password),
                delegate,
            )
            .send()
            .await
            .map_err(contract_error)?;
        let receipt = self.confirm(pending).await?;
        find_event::<Voting::VoterAdded>(&receipt)
            .map(|e| to_u64(e.voterId))
            .ok_or_else(|| missing_event("VoterAdded"))
    }

    async fn update_voter(
        &self,
        caller: &GeneratedWallet,
        election_id: u64,
        voter_id: u64,
        name: &str,
        password: &str,
    ) -> LedgerResult<()> {
        let pending = self
            .writer(caller)
            .updateVoter(
                U256::from(election_id),
                U256::from(voter_id),
                name.to_string(),
                hash_voter_password(password),
            )
            .send()
            .await
            .map_err(contract_error)?;
        self.confirm(pending).await.map(|_| ())
    }

    async fn cast_vote(
        &self,
        caller: &GeneratedWallet,
        election_id: u64,
        candidate_id: u64,
    ) -> LedgerResult<()> {
        let pending = self
            .writer(caller)
            .castVote(U256::from(election_id), U256::from(candidate_id))
            .send()
            .await
            .map_err(contract_error)?;
        self.confirm(pending).await.map(|_| ())
    }

    async fn election(&self, election_id: u64) -> LedgerResult<Election> {
        self.reader()
            .getElection(U256::from(election_id))
            .call()
            .await
            .map(Election::from)
            .map_err(contract_error)
    }

    async fn election_period(&self, election_id: u64) -> LedgerResult<ElectionPeriod> {
        let period = self
            .reader()
            .getElectionPeriod(U256::from(election_id))
            .call()
            .await
            .map_err(contract_error)?;
        Ok(ElectionPeriod {
            start: to_u64(period.startPeriod),
            end: to_u64(period.endPeriod),
        })
    }

    async fn candidate(&self, election_id: u64, candidate_id: u64) -> LedgerResult<Candidate> {
        self.reader()
            .getElectionCandidate(U256::from(election_id), U256::from(candidate_id))
            .call()
            .await
            .map(Candidate::from)
            .map_err(contract_error)
    }

    async fn candidates(&self, election_id: u64) -> LedgerResult<Vec<Candidate>> {
        let candidates = self
            .reader()
            .getElectionCandidates(U256::from(election_id))
            .call()
            .await
            .map_err(contract_error)?;
        Ok(candidates.into_iter().map(Candidate::from).collect())
    }

    async fn voter(&self, election_id: u64, voter_id: u64) -> LedgerResult<Voter> {
        self.reader()
            .getElectionVoter(U256::from(election_id), U256::from(voter_id))
            .call()
            .await
            .map(Voter::from)
            .map_err(contract_error)
    }

    async fn has_voted(&self, election_id: u64, voter: Address) -> LedgerResult<bool> {
        self.reader()
            .hasVotedInElection(U256::from(election_id), voter)
            .call()
            .await
            .map_err(contract_error)
    }

    async fn admin_elections(&self, admin: Address) -> LedgerResult<Vec<Election>> {
        let elections = self
            .reader()
            .getAdminElections(admin)
            .call()
            .await
            .map_err(contract_error)?;
        Ok(elections.into_iter().map(Election::from).collect())
    }

    async fn participant_elections(&self, participant: Address) -> LedgerResult<Vec<Election>> {
        let elections = self
            .reader()
            .getCandidateElections(participant)
            .call()
            .await
            .map_err(contract_error)?;
        Ok(elections.into_iter().map(Election::from).collect())
    }

    async fn open_elections(&self) -> LedgerResult<Vec<Election>> {
        let elections = self
            .reader()
            .getStartedElections()
            .call()
            .await
            .map_err(contract_error)?;
        Ok(elections.into_iter().map(Election::from).collect())
    }

    async fn elections_with_results(&self) -> LedgerResult<Vec<ElectionResult>> {
        let results = self
            .reader()
            .getElectionsWithResults()
            .call()
            .await
            .map_err(contract_error)?;
        Ok(results.into_iter().map(ElectionResult::from).collect())
    }
}
