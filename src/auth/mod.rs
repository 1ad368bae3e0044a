//! Authentication: password hashing, tokens and the bearer extractor.

pub mod extractor;
pub mod password;
pub mod token;

use thiserror::Error;

pub use extractor::AuthUser;
pub use token::{RecoveryClaims, SessionClaims, TokenIssuer};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing bearer token")]
    MissingToken,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Token signing failed: {0}")]
    Signing(String),
}
