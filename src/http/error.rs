//! Error responses.
//!
//! Every domain error lands on one status code; the body is always
//! `{"error": "<message>"}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::accounts::AccountError;
use crate::auth::AuthError;
use crate::blockchain::{BlockchainError, FundingError};
use crate::ledger::LedgerError;
use crate::services::ServiceError;

#[derive(Debug, Clone)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

fn chain_status(e: &BlockchainError) -> StatusCode {
    match e {
        BlockchainError::NotAvailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        BlockchainError::Wallet(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_GATEWAY,
    }
}

fn ledger_status(e: &LedgerError) -> StatusCode {
    match e {
        LedgerError::InvalidPeriod => StatusCode::BAD_REQUEST,
        LedgerError::NotAdmin | LedgerError::NotCandidate | LedgerError::VoterNotRegistered => {
            StatusCode::FORBIDDEN
        }
        LedgerError::ElectionNotFound
        | LedgerError::CandidateNotFound
        | LedgerError::VoterNotFound => StatusCode::NOT_FOUND,
        LedgerError::AlreadyVoted
        | LedgerError::NotStarted
        | LedgerError::AlreadyStarted
        | LedgerError::Ended
        | LedgerError::DuplicateDelegate
        | LedgerError::Reverted(_) => StatusCode::CONFLICT,
        LedgerError::Chain(e) => chain_status(e),
    }
}

fn funding_status(e: &FundingError) -> StatusCode {
    match e {
        FundingError::Chain(e) => chain_status(e),
        FundingError::Closed => StatusCode::SERVICE_UNAVAILABLE,
        FundingError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        FundingError::NoUsableFunders
        | FundingError::Insufficient { .. }
        | FundingError::Interrupted { .. } => StatusCode::BAD_GATEWAY,
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        let status = match e {
            AuthError::Hashing(_) | AuthError::Signing(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        };
        if status.is_server_error() {
            tracing::error!(error = %e, "Auth failure");
        }
        Self::new(status, e.to_string())
    }
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        if let ServiceError::Auth(inner) = e {
            return inner.into();
        }
        let status = match &e {
            ServiceError::Auth(_) => StatusCode::UNAUTHORIZED,
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::Account(AccountError::DuplicateEmail) => StatusCode::CONFLICT,
            ServiceError::Account(AccountError::NotFound) => StatusCode::NOT_FOUND,
            ServiceError::Account(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::Ledger(e) => ledger_status(e),
            ServiceError::Funding(e) => funding_status(e),
            ServiceError::Mail(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %e, "Request failed");
        }
        Self::new(status, e.to_string())
    }
}
