//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use crate::config::schema::ServiceConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Overrides `auth.jwt_secret`.
pub const JWT_SECRET_ENV_VAR: &str = "VOTER_AUTH_JWT_SECRET";
/// Overrides `email.smtp_password`.
pub const SMTP_PASSWORD_ENV_VAR: &str = "VOTER_AUTH_SMTP_PASSWORD";
/// Overrides `blockchain.funder_password`.
pub const FUNDER_PASSWORD_ENV_VAR: &str = "VOTER_AUTH_FUNDER_PASSWORD";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load, override and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config = parse_config(&content)?;
    finalize(config)
}

/// Build configuration from defaults plus environment overrides.
pub fn default_config() -> Result<ServiceConfig, ConfigError> {
    finalize(ServiceConfig::default())
}

/// Parse TOML text without touching the environment.
pub fn parse_config(content: &str) -> Result<ServiceConfig, ConfigError> {
    toml::from_str(content).map_err(ConfigError::Parse)
}

fn finalize(mut config: ServiceConfig) -> Result<ServiceConfig, ConfigError> {
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Replace secrets with values from the environment when present.
///
/// `lookup` is injected so tests do not have to mutate process state.
pub fn apply_env_overrides<F>(config: &mut ServiceConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(secret) = lookup(JWT_SECRET_ENV_VAR).filter(|s| !s.is_empty()) {
        config.auth.jwt_secret = secret;
    }
    if let Some(password) = lookup(SMTP_PASSWORD_ENV_VAR).filter(|s| !s.is_empty()) {
        config.email.smtp_password = password;
    }
    if let Some(password) = lookup(FUNDER_PASSWORD_ENV_VAR).filter(|s| !s.is_empty()) {
        config.blockchain.funder_password = password;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_overrides_replace_secrets() {
        let mut config = ServiceConfig::default();
        apply_env_overrides(&mut config, |key| match key {
            JWT_SECRET_ENV_VAR => Some("x".repeat(48)),
            FUNDER_PASSWORD_ENV_VAR => Some("hunter2".into()),
            _ => None,
        });
        assert_eq!(config.auth.jwt_secret, "x".repeat(48));
        assert_eq!(config.blockchain.funder_password, "hunter2");
        assert!(config.email.smtp_password.is_empty());
    }

    #[test]
    fn test_empty_override_is_ignored() {
        let mut config = ServiceConfig::default();
        let before = config.auth.jwt_secret.clone();
        apply_env_overrides(&mut config, |_| Some(String::new()));
        assert_eq!(config.auth.jwt_secret, before);
    }

    #[test]
    fn test_load_reports_validation_errors() {
        let path = std::env::temp_dir().join(format!("voter-auth-{}.toml", uuid::Uuid::new_v4()));
        fs::write(&path, "[auth]\nbcrypt_cost = 99\n").unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("auth.bcrypt_cost"));

        fs::remove_file(&path).unwrap_or_default();
    }

    #[test]
    fn test_parse_error_is_distinct() {
        let err = parse_config("[listener\nbind_address = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
