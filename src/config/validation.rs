//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (bcrypt cost, concurrency bound, secret length)
//! - Check that addresses and amounts parse
//! - Detect combinations that cannot work (chain ledger without RPC)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use alloy::primitives::utils::parse_ether;
use alloy::primitives::Address;
use std::net::SocketAddr;

use crate::config::schema::{LedgerBackend, MailTransport, ServiceConfig};

/// Minimum accepted length of the JWT signing secret, in bytes.
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    let auth = &config.auth;
    if auth.jwt_secret.len() < MIN_JWT_SECRET_LEN {
        errors.push(ValidationError::new(
            "auth.jwt_secret",
            format!("must be at least {} bytes", MIN_JWT_SECRET_LEN),
        ));
    }
    if !(4..=31).contains(&auth.bcrypt_cost) {
        errors.push(ValidationError::new("auth.bcrypt_cost", "must be between 4 and 31"));
    }
    if auth.token_ttl_secs == 0 || auth.recovery_ttl_secs == 0 {
        errors.push(ValidationError::new("auth", "token lifetimes must be greater than 0"));
    }

    let chain = &config.blockchain;
    if chain.max_concurrent_provisioning == 0 {
        errors.push(ValidationError::new(
            "blockchain.max_concurrent_provisioning",
            "must be greater than 0",
        ));
    }
    if parse_ether(&chain.fund_amount_eth).is_err() {
        errors.push(ValidationError::new(
            "blockchain.fund_amount_eth",
            format!("'{}' is not an ether amount", chain.fund_amount_eth),
        ));
    }
    for (i, funder) in chain.funder_addresses.iter().enumerate() {
        if funder.parse::<Address>().is_err() {
            errors.push(ValidationError::new(
                &format!("blockchain.funder_addresses[{}]", i),
                format!("'{}' is not an address", funder),
            ));
        }
    }
    if chain.enabled && chain.rpc_url.parse::<url::Url>().is_err() {
        errors.push(ValidationError::new(
            "blockchain.rpc_url",
            format!("'{}' is not a URL", chain.rpc_url),
        ));
    }
    if chain.funding.max_attempts == 0 {
        errors.push(ValidationError::new("blockchain.funding.max_attempts", "must be at least 1"));
    }

    if config.ledger.backend == LedgerBackend::Chain {
        if !chain.enabled {
            errors.push(ValidationError::new(
                "ledger.backend",
                "the chain ledger requires blockchain.enabled = true",
            ));
        }
        if chain.contract_address.parse::<Address>().is_err() {
            errors.push(ValidationError::new(
                "blockchain.contract_address",
                "the chain ledger requires a valid contract address",
            ));
        }
    }

    let email = &config.email;
    if email.transport == MailTransport::Smtp {
        if email.smtp_host.is_empty() {
            errors.push(ValidationError::new("email.smtp_host", "required for the smtp transport"));
        }
        if !email.from_address.contains('@') {
            errors.push(ValidationError::new("email.from_address", "must be an e-mail address"));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "is not a socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
