//! Startup orchestration.
//!
//! Subsystems are built in dependency order: store, chain client,
//! provisioner, ledger, services. Any failure here is fatal.

use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

use crate::accounts::{AccountError, UserStore};
use crate::auth::TokenIssuer;
use crate::blockchain::{BlockchainClient, BlockchainError, FundingChain, FundingError, FundingSettings, WalletProvisioner};
use crate::config::{LedgerBackend, ServiceConfig};
use crate::http::server::AppState;
use crate::ledger::{ElectionLedger, InMemoryLedger, LedgerError, OnChainLedger};
use crate::mail::{build_mailer, MailError, Mailer};
use crate::services::{ElectionService, InviteService, UserService};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("user store: {0}")]
    Store(#[from] AccountError),

    #[error("blockchain: {0}")]
    Blockchain(#[from] BlockchainError),

    #[error("funding: {0}")]
    Funding(#[from] FundingError),

    #[error("ledger: {0}")]
    Ledger(#[from] LedgerError),

    #[error("mail: {0}")]
    Mail(#[from] MailError),
}

/// Build the application state with the configured mail transport.
pub async fn build_state(config: &ServiceConfig) -> Result<AppState, StartupError> {
    let mailer = build_mailer(&config.email)?;
    assemble(config, mailer).await
}

/// Build the application state around an existing mailer.
pub async fn assemble(
    config: &ServiceConfig,
    mailer: Arc<dyn Mailer>,
) -> Result<AppState, StartupError> {
    let store = match &config.store.path {
        Some(path) => UserStore::load_from_file(path)?,
        None => UserStore::new(None),
    };

    let blockchain = if config.blockchain.enabled {
        Some(BlockchainClient::new(config.blockchain.clone()).await?)
    } else {
        tracing::info!("Blockchain integration disabled; wallets will not be funded");
        None
    };

    let settings = FundingSettings::from_config(&config.blockchain)?;
    let chain = blockchain
        .clone()
        .map(|client| Arc::new(client) as Arc<dyn FundingChain>);
    let provisioner = WalletProvisioner::new(
        chain,
        settings,
        config.blockchain.max_concurrent_provisioning,
    );

    let ledger: Arc<dyn ElectionLedger> = match config.ledger.backend {
        LedgerBackend::Memory => Arc::new(InMemoryLedger::new()),
        LedgerBackend::Chain => {
            let client = blockchain.clone().ok_or_else(|| {
                BlockchainError::NotAvailable("chain ledger needs blockchain.enabled".to_string())
            })?;
            Arc::new(OnChainLedger::new(client, &config.blockchain.contract_address)?)
        }
    };
    tracing::info!(backend = ?config.ledger.backend, "Election ledger ready");

    let tokens = Arc::new(TokenIssuer::new(&config.auth));
    let users = UserService::new(
        store.clone(),
        tokens.clone(),
        provisioner.clone(),
        mailer.clone(),
        config.auth.bcrypt_cost,
        config.invites.clone(),
    );
    let elections = ElectionService::new(ledger, store.clone());
    let invites = InviteService::new(store.clone(), mailer, config.invites.clone());

    Ok(AppState {
        users: Arc::new(users),
        elections: Arc::new(elections),
        invites: Arc::new(invites),
        tokens,
        store,
        provisioner,
        blockchain,
        started_at: Instant::now(),
    })
}
