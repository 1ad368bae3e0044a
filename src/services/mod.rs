//! Application services between the HTTP handlers and the stores.
//!
//! # Data Flow
//! ```text
//! handlers → UserService     → UserStore, WalletProvisioner, TokenIssuer, Mailer
//!          → ElectionService → ElectionLedger (caller = acting user's wallet)
//!          → InviteService   → UserStore, Mailer
//! ```

pub mod elections;
pub mod invites;
pub mod users;

use thiserror::Error;

use crate::accounts::AccountError;
use crate::auth::AuthError;
use crate::blockchain::FundingError;
use crate::ledger::LedgerError;
use crate::mail::MailError;

pub use elections::{CreateElection, ElectionDetail, ElectionService, VoterEntry};
pub use invites::{InviteReport, InviteService};
pub use users::{SessionOutcome, SignUp, SignUpOutcome, UserService, WalletInfo, WalletStatus};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("Invalid password")]
    InvalidCredentials,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Unavailable(String),

    #[error(transparent)]
    Account(#[from] AccountError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Funding(#[from] FundingError),

    #[error(transparent)]
    Mail(#[from] MailError),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Reject a blank required field.
pub(crate) fn require(field: &str, value: &str) -> ServiceResult<()> {
    if value.trim().is_empty() {
        return Err(ServiceError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

pub(crate) fn validate_email(email: &str) -> ServiceResult<()> {
    let email = email.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(ServiceError::Validation(format!("Invalid e-mail address '{}'", email)));
    }
    Ok(())
}
