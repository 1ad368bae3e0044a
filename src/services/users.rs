//! Sign-up, sign-in, password recovery and wallet top-ups.

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::accounts::{NewUser, UserRecord, UserStore, UserSummary, UserView};
use crate::auth::{password, TokenIssuer};
use crate::blockchain::types::FundingTransfer;
use crate::blockchain::{FundingError, FundingReport, WalletProvisioner};
use crate::config::InviteConfig;
use crate::mail::{templates, Mailer, OutgoingMail};
use crate::services::{require, validate_email, ServiceError, ServiceResult};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Deserialize)]
pub struct SignUp {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Funding state of a freshly provisioned wallet.
#[derive(Debug, Clone, Serialize)]
pub struct WalletStatus {
    pub address: Address,
    pub funded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub funding_error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignUpOutcome {
    pub user: UserView,
    pub token: String,
    pub wallet: WalletStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionOutcome {
    pub user: UserView,
    pub token: String,
}

/// A user's wallet with its live balance, when the chain is reachable.
#[derive(Debug, Clone, Serialize)]
pub struct WalletInfo {
    pub address: Address,
    /// Wei. `None` when blockchain integration is disabled.
    pub balance: Option<U256>,
    pub funding: Vec<FundingTransfer>,
}

pub struct UserService {
    store: UserStore,
    tokens: Arc<TokenIssuer>,
    provisioner: WalletProvisioner,
    mailer: Arc<dyn Mailer>,
    bcrypt_cost: u32,
    links: InviteConfig,
}

impl UserService {
    pub fn new(
        store: UserStore,
        tokens: Arc<TokenIssuer>,
        provisioner: WalletProvisioner,
        mailer: Arc<dyn Mailer>,
        bcrypt_cost: u32,
        links: InviteConfig,
    ) -> Self {
        Self {
            store,
            tokens,
            provisioner,
            mailer,
            bcrypt_cost,
            links,
        }
    }

    pub fn store(&self) -> &UserStore {
        &self.store
    }

    /// Register a user: hash the password, provision a funded wallet, store
    /// the record and send the welcome mail.
    pub async fn sign_up(&self, request: SignUp) -> ServiceResult<SignUpOutcome> {
        require("name", &request.name)?;
        validate_email(&request.email)?;
        if request.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ServiceError::Validation(format!(
                "password must have at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        // Held across provisioning so a concurrent sign-up cannot fund a
        // second wallet for the same address.
        let reservation = self.store.reserve_email(&request.email)?;

        let password_hash = hash_password(request.password, self.bcrypt_cost).await?;
        let provisioned = self.provisioner.provision().await?;
        let funded = provisioned.is_funded();
        let transfers = provisioned
            .funding
            .map(|report| report.transfers)
            .unwrap_or_default();

        let user = self.store.insert_reserved(
            reservation,
            NewUser {
                name: request.name.trim().to_string(),
                email: request.email.trim().to_string(),
                password_hash,
                wallet_address: provisioned.wallet.address(),
                private_key: provisioned.wallet.private_key_hex(),
            },
        );
        if !transfers.is_empty() {
            self.store.record_funding(user.id, transfers)?;
        }
        tracing::info!(user_id = user.id, wallet = %user.wallet.address, funded, "User registered");

        self.send_best_effort(templates::welcome(&user.email, &user.name)).await;

        let token = self.tokens.issue_session(&user)?;
        Ok(SignUpOutcome {
            wallet: WalletStatus {
                address: user.wallet.address,
                funded,
                funding_error: provisioned.funding_error,
            },
            user: user.view(),
            token,
        })
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> ServiceResult<SessionOutcome> {
        let user = self
            .store
            .find_by_email(email)
            .ok_or(ServiceError::NotFound("User"))?;
        if !verify_password(password.to_string(), user.password_hash.clone()).await? {
            tracing::info!(user_id = user.id, "Sign-in rejected");
            return Err(ServiceError::InvalidCredentials);
        }

        let token = self.tokens.issue_session(&user)?;
        Ok(SessionOutcome {
            user: user.view(),
            token,
        })
    }

    /// Mail a password reset link to a registered address.
    pub async fn send_recovery_link(&self, email: &str) -> ServiceResult<()> {
        let user = self
            .store
            .find_by_email(email)
            .ok_or(ServiceError::NotFound("User"))?;
        let token = self.tokens.issue_recovery(&user.email)?;
        let link = format!(
            "{}/auth/reset-password/{}",
            self.links.app_origin_url.trim_end_matches('/'),
            token
        );

        self.mailer
            .send(templates::password_recovery(&user.email, &user.name, &link))
            .await?;
        tracing::info!(user_id = user.id, "Recovery link sent");
        Ok(())
    }

    pub async fn reset_password(&self, token: &str, new_password: &str) -> ServiceResult<()> {
        let claims = self.tokens.verify_recovery(token)?;
        if new_password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ServiceError::Validation(format!(
                "password must have at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        let user = self
            .store
            .find_by_email(&claims.email)
            .ok_or(ServiceError::NotFound("User"))?;

        let hash = hash_password(new_password.to_string(), self.bcrypt_cost).await?;
        self.store.update_password(user.id, hash)?;
        tracing::info!(user_id = user.id, "Password reset");
        Ok(())
    }

    pub fn search_candidates(&self, name: Option<&str>) -> Vec<UserSummary> {
        self.store
            .search_by_name(name)
            .iter()
            .map(UserSummary::from)
            .collect()
    }

    pub fn user(&self, id: u64) -> ServiceResult<UserRecord> {
        self.store.get(id).ok_or(ServiceError::NotFound("User"))
    }

    pub async fn wallet(&self, user_id: u64) -> ServiceResult<WalletInfo> {
        let user = self.user(user_id)?;
        let balance = self.provisioner.balance(user.wallet.address).await?;
        Ok(WalletInfo {
            address: user.wallet.address,
            balance,
            funding: user.wallet.funding,
        })
    }

    /// Top the user's wallet back up to the configured amount. Transfers are
    /// recorded even when the funders run dry.
    pub async fn fund_wallet(&self, user_id: u64) -> ServiceResult<FundingReport> {
        if !self.provisioner.funding_enabled() {
            return Err(ServiceError::Unavailable(
                "Blockchain integration is disabled".to_string(),
            ));
        }
        let user = self.user(user_id)?;
        let report = match self.provisioner.fund(user.wallet.address).await {
            Ok(report) => report,
            Err(FundingError::Insufficient { report, .. }) => *report,
            Err(FundingError::Interrupted { source, report }) => {
                // Sent transfers stand even when the balance could not be read.
                self.store.record_funding(user.id, report.transfers.clone())?;
                return Err(FundingError::Interrupted { source, report }.into());
            }
            Err(e) => return Err(e.into()),
        };
        if !report.transfers.is_empty() {
            self.store.record_funding(user.id, report.transfers.clone())?;
        }
        tracing::info!(
            user_id = user.id,
            balance = %report.final_balance,
            funded = report.is_funded(),
            "Wallet top-up finished"
        );
        Ok(report)
    }

    async fn send_best_effort(&self, mail: OutgoingMail) {
        let to = mail.to.clone();
        if let Err(e) = self.mailer.send(mail).await {
            tracing::warn!(to = %to, error = %e, "Mail not delivered");
        }
    }
}

async fn hash_password(password: String, cost: u32) -> ServiceResult<String> {
    tokio::task::spawn_blocking(move || password::hash(&password, cost))
        .await
        .map_err(|e| ServiceError::Internal(e.to_string()))?
        .map_err(ServiceError::from)
}

async fn verify_password(password: String, hash: String) -> ServiceResult<bool> {
    tokio::task::spawn_blocking(move || password::verify(&password, &hash))
        .await
        .map_err(|e| ServiceError::Internal(e.to_string()))
}
