//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the voter authentication service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Password hashing and token settings.
    pub auth: AuthConfig,

    /// Blockchain integration settings.
    pub blockchain: BlockchainConfig,

    /// Which election ledger backs the API.
    pub ledger: LedgerConfig,

    /// User store persistence.
    pub store: StoreConfig,

    /// Outgoing mail.
    pub email: EmailConfig,

    /// Links embedded in invitation and recovery mails.
    pub invites: InviteConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    ///
    /// Sign-up waits for wallet funding, so this is generous.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 120 }
    }
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC-SHA256 secret for signing JWTs.
    pub jwt_secret: String,

    /// Session token lifetime in seconds.
    pub token_ttl_secs: u64,

    /// Password recovery token lifetime in seconds.
    pub recovery_ttl_secs: u64,

    /// bcrypt work factor.
    pub bcrypt_cost: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            // WARNING: This is a placeholder! Set VOTER_AUTH_JWT_SECRET in production.
            jwt_secret: "CHANGE_ME_IN_PRODUCTION_0123456789abcdef".to_string(),
            token_ttl_secs: 24 * 3600,
            recovery_ttl_secs: 24 * 3600,
            bcrypt_cost: 12,
        }
    }
}

/// Blockchain integration configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BlockchainConfig {
    /// Enable blockchain integration (wallet funding, RPC health).
    pub enabled: bool,

    /// JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// Failover JSON-RPC endpoint URLs.
    pub failover_urls: Vec<String>,

    /// Chain ID (1337 for a local geth dev node, 31337 for Hardhat/Anvil).
    pub chain_id: u64,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,

    /// Address of the deployed Voting contract.
    pub contract_address: String,

    /// Node-managed accounts that seed new wallets.
    pub funder_addresses: Vec<String>,

    /// Passphrase used to unlock the funder accounts.
    pub funder_password: String,

    /// How long funders stay unlocked, in seconds.
    pub unlock_duration_secs: u64,

    /// Target balance for a new wallet, in ether (decimal string).
    pub fund_amount_eth: String,

    /// Maximum number of wallet provisions in flight at once.
    pub max_concurrent_provisioning: usize,

    /// How long to wait for a funding receipt, in seconds.
    pub receipt_timeout_secs: u64,

    /// Retry policy for funding transfers.
    pub funding: FundingRetryConfig,
}

impl Default for BlockchainConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            rpc_url: "http://127.0.0.1:8545".to_string(),
            failover_urls: Vec::new(),
            chain_id: 1337,
            rpc_timeout_secs: 10,
            contract_address: String::new(),
            funder_addresses: vec![
                "0x5322a18E39CD52a62d102e25556A8EF0655De44E".to_string(),
                "0x50d543E92F381a855B0560f818A59eB14d12fEfC".to_string(),
            ],
            funder_password: "admin".to_string(),
            unlock_duration_secs: 600,
            fund_amount_eth: "0.5".to_string(),
            max_concurrent_provisioning: 5,
            receipt_timeout_secs: 60,
            funding: FundingRetryConfig::default(),
        }
    }
}

/// Retry configuration for funding transfers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FundingRetryConfig {
    /// Maximum number of send attempts per funder.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for FundingRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 2000,
        }
    }
}

/// Election ledger backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LedgerBackend {
    /// Process-local ledger. State is lost on restart.
    #[default]
    Memory,
    /// The deployed Voting contract.
    Chain,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct LedgerConfig {
    pub backend: LedgerBackend,
}

/// User store configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON snapshot path. `None` keeps users in memory only.
    pub path: Option<String>,
}

/// Mail transport selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MailTransport {
    /// Log recipient and subject, deliver nothing.
    #[default]
    Log,
    /// Deliver through an SMTP relay with STARTTLS.
    Smtp,
}

/// Outgoing mail configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EmailConfig {
    pub transport: MailTransport,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub from_address: String,
    pub from_name: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            transport: MailTransport::Log,
            smtp_host: "smtp.gmail.com".to_string(),
            smtp_port: 587,
            smtp_username: String::new(),
            smtp_password: String::new(),
            from_address: "votacaoblockchain@gmail.com".to_string(),
            from_name: "Votação Blockchain".to_string(),
        }
    }
}

/// Links sent to invited users.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InviteConfig {
    /// Where registered users are sent to vote.
    pub login_url: String,

    /// Where unknown addresses are sent to register.
    pub signup_url: String,

    /// Front-end origin used to build password reset links.
    pub app_origin_url: String,
}

impl Default for InviteConfig {
    fn default() -> Self {
        Self {
            login_url: "https://votoembloco.netlify.app/".to_string(),
            signup_url: "https://votoembloco.netlify.app/cadastro/cadastro".to_string(),
            app_origin_url: "https://votoembloco.netlify.app".to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_local_dev_node() {
        let config = ServiceConfig::default();
        assert_eq!(config.blockchain.rpc_url, "http://127.0.0.1:8545");
        assert_eq!(config.blockchain.max_concurrent_provisioning, 5);
        assert_eq!(config.blockchain.fund_amount_eth, "0.5");
        assert_eq!(config.blockchain.funder_addresses.len(), 2);
        assert_eq!(config.auth.token_ttl_secs, 86_400);
        assert_eq!(config.ledger.backend, LedgerBackend::Memory);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let raw = r#"
            [listener]
            bind_address = "127.0.0.1:9000"

            [blockchain]
            enabled = true
            fund_amount_eth = "1.25"

            [ledger]
            backend = "chain"

            [email]
            transport = "smtp"
        "#;
        let config: ServiceConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:9000");
        assert!(config.blockchain.enabled);
        assert_eq!(config.blockchain.fund_amount_eth, "1.25");
        assert_eq!(config.blockchain.funder_password, "admin");
        assert_eq!(config.ledger.backend, LedgerBackend::Chain);
        assert_eq!(config.email.transport, MailTransport::Smtp);
        assert_eq!(config.email.smtp_port, 587);
    }
}
